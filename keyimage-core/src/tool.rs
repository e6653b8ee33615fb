//! Capability interfaces a host drives annotation tools through.
//!
//! A host keeps its tools as trait objects and calls whichever capability a
//! gesture or frame needs. All three take the host as `dyn` so tools can be
//! stored side by side.

use crate::host::{ToolHost, Viewport};
use crate::render::GlyphSink;
use crate::{Annotation, AnnotationUid, ElementId, InteractionEvent, Point2, ToolResult};

/// Tools that create and edit annotations in response to input.
pub trait AnnotationEditable {
    /// Name the tool's annotations are stored under.
    fn tool_name(&self) -> &str;

    /// Primary pointer-down on empty canvas: start drawing a new annotation.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InteractionInProgress`](crate::ToolError::InteractionInProgress)
    /// if a gesture is already active.
    fn add_new_annotation(
        &mut self,
        host: &mut dyn ToolHost,
        viewport: &dyn Viewport,
        event: &mut InteractionEvent,
    ) -> ToolResult<AnnotationUid>;

    /// The annotation body was clicked.
    ///
    /// # Errors
    ///
    /// Returns an error if the annotation is not in the store.
    fn tool_selected_callback(
        &mut self,
        host: &mut dyn ToolHost,
        viewport: &dyn Viewport,
        event: &mut InteractionEvent,
        annotation_uid: AnnotationUid,
    ) -> ToolResult<()>;

    /// A handle of the annotation was grabbed: start a modify gesture.
    ///
    /// # Errors
    ///
    /// Returns an error if the annotation is missing, `handle_index` is not
    /// one of its handles, or a gesture is active.
    fn handle_selected_callback(
        &mut self,
        host: &mut dyn ToolHost,
        viewport: &dyn Viewport,
        event: &mut InteractionEvent,
        annotation_uid: AnnotationUid,
        handle_index: usize,
    ) -> ToolResult<()>;

    /// Double click or double tap: edit the label of the annotation under it.
    ///
    /// Returns the annotation being edited, if one was hit.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InteractionInProgress`](crate::ToolError::InteractionInProgress)
    /// if a draw or drag is active, or an error if the hit annotation
    /// vanished from the store.
    fn double_click_callback(
        &mut self,
        host: &mut dyn ToolHost,
        viewport: &dyn Viewport,
        event: &mut InteractionEvent,
    ) -> ToolResult<Option<AnnotationUid>>;

    /// Abort the active gesture. Returns the affected annotation, if any.
    fn cancel(&mut self, host: &mut dyn ToolHost, element: &ElementId) -> Option<AnnotationUid>;
}

/// Tools whose annotations can be picked by screen position.
pub trait AnnotationHitTestable {
    /// Whether `canvas_point` is close enough to `annotation` to select it.
    fn is_point_near_tool(
        &self,
        element: &ElementId,
        annotation: &Annotation,
        canvas_point: Point2,
        proximity: f64,
    ) -> bool;
}

/// Tools that draw their annotations every frame.
pub trait AnnotationRenderable {
    /// Emit glyphs for the tool's annotations on `viewport`. Returns whether
    /// anything was drawn.
    fn render_annotation(
        &self,
        host: &dyn ToolHost,
        viewport: &dyn Viewport,
        sink: &mut dyn GlyphSink,
    ) -> bool;
}
