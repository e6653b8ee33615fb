//! Gesture script format.

use std::path::Path;

use keyimage_core::{HeadlessViewport, ListenerKind, Point2, Point3};
use serde::{Deserialize, Serialize};

use crate::ReplayResult;

/// A gesture script.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Script {
    /// Viewport the gestures happen on.
    #[serde(default = "default_viewport")]
    pub viewport: HeadlessViewport,
    /// Annotations present before the first step, addressed by position.
    #[serde(default)]
    pub preload: Vec<PreloadAnnotation>,
    /// Steps in order.
    pub steps: Vec<Step>,
}

fn default_viewport() -> HeadlessViewport {
    HeadlessViewport::new("viewport-1", "element-1")
}

impl Script {
    /// Parse a script from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not describe a script.
    pub fn from_json(json: &str) -> ReplayResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a script from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> ReplayResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

/// An annotation seeded into the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreloadAnnotation {
    /// Handle position in world space.
    pub world: Point3,
    /// Label.
    #[serde(default)]
    pub text: Option<String>,
    /// Point or arrow.
    #[serde(default = "yes")]
    pub is_point: bool,
    /// Whether it describes the whole series.
    #[serde(default)]
    pub series_level: bool,
    /// Locked annotations are neither drawn nor hit.
    #[serde(default)]
    pub is_locked: bool,
}

const fn yes() -> bool {
    true
}

/// One scripted step. Positions are canvas pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "camelCase")]
pub enum Step {
    /// Press on empty canvas: draw a new annotation.
    Down {
        /// Canvas X.
        x: f64,
        /// Canvas Y.
        y: f64,
    },
    /// Mouse move with a button held.
    Drag {
        /// Canvas X.
        x: f64,
        /// Canvas Y.
        y: f64,
    },
    /// Mouse release.
    Up {
        /// Canvas X.
        x: f64,
        /// Canvas Y.
        y: f64,
    },
    /// Mouse click without movement.
    Click {
        /// Canvas X.
        x: f64,
        /// Canvas Y.
        y: f64,
    },
    /// Touch move.
    TouchDrag {
        /// Canvas X.
        x: f64,
        /// Canvas Y.
        y: f64,
    },
    /// Touch release.
    TouchEnd {
        /// Canvas X.
        x: f64,
        /// Canvas Y.
        y: f64,
    },
    /// Touch tap.
    TouchTap {
        /// Canvas X.
        x: f64,
        /// Canvas Y.
        y: f64,
    },
    /// Grab a handle of a stored annotation.
    Select {
        /// Position of the annotation in the store.
        annotation: usize,
        /// Handle to grab.
        #[serde(default)]
        handle: usize,
    },
    /// Click the body of a stored annotation.
    Highlight {
        /// Position of the annotation in the store.
        annotation: usize,
    },
    /// Double-click to edit a label.
    DoubleClick {
        /// Canvas X.
        x: f64,
        /// Canvas Y.
        y: f64,
    },
    /// Abort the active gesture.
    Cancel,
    /// Answer the oldest open text prompt, or the next one to open.
    Answer {
        /// Entered text; `null` dismisses the prompt.
        #[serde(default)]
        text: Option<String>,
    },
    /// Render the tool's annotations.
    Render,
}

impl Step {
    /// Listener kind and position for steps delivered through the modify
    /// listeners.
    #[must_use]
    pub fn listener(&self) -> Option<(ListenerKind, Point2)> {
        let (kind, x, y) = match *self {
            Self::Drag { x, y } => (ListenerKind::MouseDrag, x, y),
            Self::Up { x, y } => (ListenerKind::MouseUp, x, y),
            Self::Click { x, y } => (ListenerKind::MouseClick, x, y),
            Self::TouchDrag { x, y } => (ListenerKind::TouchDrag, x, y),
            Self::TouchEnd { x, y } => (ListenerKind::TouchEnd, x, y),
            Self::TouchTap { x, y } => (ListenerKind::TouchTap, x, y),
            _ => return None,
        };
        Some((kind, Point2::new(x, y)))
    }
}
