//! Annotations and the identifiers that address them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnnotationUid(Uuid);

impl AnnotationUid {
    /// Create a new unique annotation ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from an existing UUID.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for AnnotationUid {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AnnotationUid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a host element (the surface that receives input events).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(pub String);

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ElementId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Identifier of a viewport rendering onto an element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ViewportId(pub String);

impl std::fmt::Display for ViewportId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ViewportId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A point in canvas (screen) space, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    /// Horizontal position.
    pub x: f64,
    /// Vertical position.
    pub y: f64,
}

impl Point2 {
    /// Create a new canvas point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<[f64; 2]> for Point2 {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

/// A point in world (patient) space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3 {
    /// World X.
    pub x: f64,
    /// World Y.
    pub y: f64,
    /// World Z.
    pub z: f64,
}

impl Point3 {
    /// Create a new world point.
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

impl From<[f64; 3]> for Point3 {
    fn from([x, y, z]: [f64; 3]) -> Self {
        Self { x, y, z }
    }
}

/// Control points of an annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handles {
    /// World-space handle positions. Always exactly one for key images.
    pub points: Vec<Point3>,
    /// Handle currently being manipulated, if any.
    pub active_handle_index: Option<usize>,
}

/// The user-facing content of an annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationData {
    /// Geometry.
    pub handles: Handles,
    /// Draw as a dot at the handle instead of a fixed-position arrow.
    pub is_point: bool,
    /// The annotation describes a whole series rather than one image.
    pub series_level: bool,
    /// Label entered by the user.
    pub text: Option<String>,
}

/// Where an annotation was made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationMetadata {
    /// Name of the tool that owns the annotation.
    pub tool_name: String,
    /// Frame of reference of the viewport it was drawn on.
    pub frame_of_reference_uid: String,
    /// Image that was displayed when it was drawn.
    pub referenced_image_id: Option<String>,
    /// Viewport it was drawn on.
    pub viewport_id: Option<ViewportId>,
}

/// A user-drawn marker with geometry, flags, and optional text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    /// Unique identifier, immutable once assigned.
    pub annotation_uid: AnnotationUid,
    /// Provenance used for filtering.
    pub metadata: AnnotationMetadata,
    /// Geometry, flags, and label.
    pub data: AnnotationData,
    /// Set when the annotation is selected.
    pub highlighted: bool,
    /// Set whenever geometry changes so cached derived values are recomputed.
    pub invalidated: bool,
    /// Locked annotations cannot be interacted with.
    pub is_locked: bool,
    /// Hidden annotations are neither drawn nor interactable.
    pub is_visible: bool,
}

impl Annotation {
    /// Create an annotation with a single handle at `point`.
    #[must_use]
    pub fn new(metadata: AnnotationMetadata, point: Point3) -> Self {
        Self {
            annotation_uid: AnnotationUid::new(),
            metadata,
            data: AnnotationData {
                handles: Handles {
                    points: vec![point],
                    active_handle_index: None,
                },
                is_point: false,
                series_level: false,
                text: None,
            },
            highlighted: false,
            invalidated: false,
            is_locked: false,
            is_visible: true,
        }
    }

    /// Set the point/arrow rendering flag.
    #[must_use]
    pub fn with_is_point(mut self, is_point: bool) -> Self {
        self.data.is_point = is_point;
        self
    }

    /// Set the series-level flag.
    #[must_use]
    pub fn with_series_level(mut self, series_level: bool) -> Self {
        self.data.series_level = series_level;
        self
    }

    /// Set the label.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.data.text = Some(text.into());
        self
    }

    /// The single world-space handle.
    #[must_use]
    pub fn handle(&self) -> Option<Point3> {
        self.data.handles.points.first().copied()
    }

    /// Move the single handle. Marks the annotation invalidated.
    pub fn set_handle(&mut self, point: Point3) {
        match self.data.handles.points.first_mut() {
            Some(first) => *first = point,
            None => self.data.handles.points.push(point),
        }
        self.invalidated = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> AnnotationMetadata {
        AnnotationMetadata {
            tool_name: "KeyImage".to_string(),
            frame_of_reference_uid: "for-1".to_string(),
            referenced_image_id: None,
            viewport_id: None,
        }
    }

    #[test]
    fn test_set_handle_overwrites_single_point() {
        let mut annotation = Annotation::new(metadata(), Point3::new(1.0, 2.0, 3.0));
        assert!(!annotation.invalidated);

        annotation.set_handle(Point3::new(4.0, 5.0, 6.0));

        assert_eq!(annotation.data.handles.points, vec![Point3::new(4.0, 5.0, 6.0)]);
        assert!(annotation.invalidated);
    }

    #[test]
    fn test_annotation_json_uses_camel_case() {
        let annotation = Annotation::new(metadata(), Point3::default())
            .with_is_point(true)
            .with_text("Key");
        let json = serde_json::to_value(&annotation).expect("should serialize");

        assert_eq!(json["data"]["isPoint"], true);
        assert_eq!(json["data"]["text"], "Key");
        assert_eq!(json["metadata"]["toolName"], "KeyImage");
        assert!(json.get("annotationUid").is_some());
    }
}
