//! Error types for tool operations.

use thiserror::Error;

use crate::AnnotationUid;

/// Result type for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;

/// Errors that can occur while driving the key image tool.
#[derive(Debug, Error)]
pub enum ToolError {
    /// A drag or end callback fired with no gesture in progress.
    #[error("No active interaction for {callback}")]
    MissingEditData {
        /// Name of the callback that found no edit data.
        callback: &'static str,
    },

    /// A draw or selection was attempted while another gesture holds the tool.
    #[error("Another interaction is already in progress")]
    InteractionInProgress,

    /// The store no longer holds the annotation being edited.
    #[error("Annotation not found: {0}")]
    AnnotationNotFound(AnnotationUid),

    /// A selected handle index is past the annotation's handles.
    #[error("Handle {handle_index} out of range for {annotation_uid} ({handle_count} handles)")]
    HandleOutOfRange {
        /// The annotation.
        annotation_uid: AnnotationUid,
        /// Requested handle.
        handle_index: usize,
        /// Number of handles it has.
        handle_count: usize,
    },

    /// Tool configuration failed validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration or script serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Reading a configuration file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
