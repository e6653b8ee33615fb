//! # Key Image Core
//!
//! Interactive key-image annotation tool for 2D viewports.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               keyimage-core                 │
//! ├─────────────────────────────────────────────┤
//! │  KeyImageTool     │  Capabilities           │
//! │  - Gesture states │  - AnnotationEditable   │
//! │  - Lifecycle      │  - AnnotationHitTestable│
//! │  - Text sessions  │  - AnnotationRenderable │
//! ├─────────────────────────────────────────────┤
//! │  Host traits      │  Headless host          │
//! │  - Store, events  │  - Arena store          │
//! │  - Undo, notify   │  - Recording host       │
//! │  - Viewport       │  - Pan/zoom viewport    │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! The tool holds only transient gesture state. Annotations live in the host's
//! store and are addressed by [`AnnotationUid`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod annotation;
pub mod config;
pub mod error;
pub mod event;
pub mod headless;
pub mod hit;
pub mod host;
pub mod key_image;
pub mod lock;
pub mod render;
pub mod store;
pub mod text;
pub mod tool;

pub use annotation::{
    Annotation, AnnotationData, AnnotationMetadata, AnnotationUid, ElementId, Handles, Point2,
    Point3, ViewportId,
};
pub use config::ToolConfig;
pub use error::{ToolError, ToolResult};
pub use event::{EventKind, EventPoints, InteractionEvent, ListenerKind};
pub use headless::{HeadlessHost, HeadlessViewport, ImageBounds, Notification};
pub use host::{ToolHost, Viewport};
pub use key_image::{EditData, KeyImageTool, ToolState, TOOL_NAME};
pub use render::{Glyph, GlyphSink};
pub use store::AnnotationArena;
pub use text::{TextEditKind, TextOutcome, TextPrompt, TextReply, TextRequest};
pub use tool::{AnnotationEditable, AnnotationHitTestable, AnnotationRenderable};

/// Key image core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
