//! Hit-testing for key image annotations.

use crate::{Annotation, Point2, ToolConfig};

/// Proximity, in pixels, used when a double click looks for an annotation.
pub const DOUBLE_CLICK_PROXIMITY_PX: f64 = 6.0;

/// A square screen-space hit box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitBox {
    /// Center of the box.
    pub center: Point2,
    /// Side length.
    pub size: f64,
}

impl HitBox {
    /// The fixed indicator box described by the tool configuration.
    #[must_use]
    pub fn from_config(config: &ToolConfig) -> Self {
        Self {
            center: config.anchor(),
            size: config.canvas_size,
        }
    }

    /// Whether `point` lies in the box. Edges count as inside.
    #[must_use]
    pub fn contains(&self, point: Point2) -> bool {
        let half = self.size / 2.0;
        (point.x - self.center.x).abs() <= half && (point.y - self.center.y).abs() <= half
    }
}

/// Decide whether `canvas_point` selects `annotation`.
///
/// Arrow annotations are never hit here; the host's generic hit-testing owns
/// them. Point annotations are hit through the fixed indicator box, not their
/// projected handle.
#[must_use]
pub fn is_point_near(config: &ToolConfig, annotation: &Annotation, canvas_point: Point2) -> bool {
    if !annotation.data.is_point {
        return false;
    }
    HitBox::from_config(config).contains(canvas_point)
}
