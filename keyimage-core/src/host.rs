//! Collaborator interfaces the tool is driven through.
//!
//! The tool owns only transient interaction state. Everything else (annotation
//! storage, listener registration, undo history, notifications, cursor, style,
//! and coordinate transforms) belongs to the host and is reached through the
//! traits below. [`ToolHost`] bundles the ones every callback needs.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{
    Annotation, AnnotationUid, ElementId, ListenerKind, Point2, Point3, ViewportId,
};

/// Annotation storage, addressed by uid.
pub trait AnnotationStore {
    /// Add an annotation for `element`.
    fn add_annotation(&mut self, annotation: Annotation, element: &ElementId);

    /// All annotations of `tool_name` on `element`, in insertion order.
    fn annotations(&self, tool_name: &str, element: &ElementId) -> Vec<&Annotation>;

    /// Look up an annotation.
    fn annotation(&self, uid: AnnotationUid) -> Option<&Annotation>;

    /// Look up an annotation for mutation.
    fn annotation_mut(&mut self, uid: AnnotationUid) -> Option<&mut Annotation>;

    /// Remove an annotation, returning it if it existed.
    fn remove_annotation(&mut self, uid: AnnotationUid) -> Option<Annotation>;
}

/// Element-scoped listener registration.
pub trait EventBus {
    /// Start delivering `kind` events on `element` to the tool.
    fn add_listener(&mut self, element: &ElementId, kind: ListenerKind);

    /// Stop delivering `kind` events on `element` to the tool.
    fn remove_listener(&mut self, element: &ElementId, kind: ListenerKind);
}

/// Handle to an open undo memo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemoId(pub u64);

/// Options recorded with a memo.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoOptions {
    /// The memo wraps the creation of the annotation.
    pub new_annotation: bool,
}

/// Undo history transactions.
pub trait UndoHistory {
    /// Open a memo capturing the annotation's state before an edit.
    fn begin_memo(
        &mut self,
        element: &ElementId,
        annotation: &Annotation,
        options: MemoOptions,
    ) -> MemoId;

    /// Close a memo opened with [`begin_memo`](Self::begin_memo).
    fn end_memo(&mut self, memo: MemoId);
}

/// Annotation lifecycle notifications and render scheduling.
pub trait Notifier {
    /// Fired once when a new annotation is complete.
    fn annotation_completed(&mut self, annotation: &Annotation);

    /// Fired when an existing annotation changes.
    fn annotation_modified(&mut self, annotation: &Annotation, element: Option<&ElementId>);

    /// Viewports on `element`'s rendering engine that render `tool_name`.
    fn viewport_ids_with_tool_to_render(
        &self,
        element: &ElementId,
        tool_name: &str,
    ) -> BTreeSet<ViewportId>;

    /// Schedule an annotation render for the given viewports.
    fn request_render(&mut self, viewport_ids: &BTreeSet<ViewportId>);
}

/// Element cursor control.
pub trait CursorControl {
    /// Hide the cursor while a handle is being moved.
    fn hide_element_cursor(&mut self, element: &ElementId);

    /// Restore the default cursor.
    fn reset_element_cursor(&mut self, element: &ElementId);
}

/// Key used to resolve an annotation's style.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleSpecifier {
    /// Tool group the tool belongs to.
    pub tool_group_id: String,
    /// Tool name.
    pub tool_name: String,
    /// Viewport being rendered.
    pub viewport_id: ViewportId,
    /// Annotation being rendered.
    pub annotation_uid: AnnotationUid,
}

/// Resolved drawing style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationStyle {
    /// Stroke color as a CSS color string.
    pub color: String,
    /// Stroke width in pixels.
    pub line_width: f64,
}

impl Default for AnnotationStyle {
    fn default() -> Self {
        Self {
            color: "rgb(255, 255, 0)".to_string(),
            line_width: 1.0,
        }
    }
}

/// Style lookup.
pub trait StyleResolver {
    /// Resolve the style for one annotation in one viewport.
    fn annotation_style(&self, specifier: &StyleSpecifier, annotation: &Annotation)
        -> AnnotationStyle;
}

/// Everything a tool callback needs from its host.
pub trait ToolHost:
    AnnotationStore + EventBus + UndoHistory + Notifier + CursorControl + StyleResolver
{
}

impl<T> ToolHost for T where
    T: AnnotationStore + EventBus + UndoHistory + Notifier + CursorControl + StyleResolver
{
}

/// A rendering surface mapping world coordinates to canvas coordinates.
pub trait Viewport {
    /// Viewport identifier.
    fn id(&self) -> &ViewportId;

    /// Element the viewport renders onto.
    fn element(&self) -> &ElementId;

    /// Project a world point to canvas pixels.
    fn world_to_canvas(&self, world: Point3) -> Point2;

    /// Whether the owning rendering engine still exists.
    fn rendering_engine_available(&self) -> bool;

    /// Frame of reference of the displayed data.
    fn frame_of_reference_uid(&self) -> &str;

    /// Image currently displayed, for stack viewports.
    fn current_image_id(&self) -> Option<&str>;

    /// Whether a world point lies inside the displayed image.
    fn is_in_image(&self, world: Point3) -> bool;

    /// Keep the annotations that can be drawn and interacted with here.
    ///
    /// The default keeps visible, unlocked annotations in this frame of
    /// reference that were drawn on the current image (or on no specific one).
    fn filter_interactable<'a>(&self, annotations: Vec<&'a Annotation>) -> Vec<&'a Annotation> {
        let frame = self.frame_of_reference_uid();
        let image = self.current_image_id();
        annotations
            .into_iter()
            .filter(|annotation| {
                let meta = &annotation.metadata;
                annotation.is_visible
                    && !annotation.is_locked
                    && meta.frame_of_reference_uid == frame
                    && meta
                        .referenced_image_id
                        .as_deref()
                        .is_none_or(|id| Some(id) == image)
            })
            .collect()
    }
}
