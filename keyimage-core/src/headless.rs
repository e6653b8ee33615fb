//! Headless host and viewport.
//!
//! A complete in-memory implementation of the collaborator traits. It records
//! every listener change, memo, notification, render request, and cursor
//! change so tests and the replay CLI can inspect exactly what the tool did.

use std::cell::Cell;
use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::host::{
    AnnotationStore, AnnotationStyle, CursorControl, EventBus, MemoId, MemoOptions, Notifier,
    StyleResolver, StyleSpecifier, UndoHistory, Viewport,
};
use crate::store::AnnotationArena;
use crate::{Annotation, AnnotationUid, ElementId, ListenerKind, Point2, Point3, ViewportId};

/// A lifecycle notification as observed by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum Notification {
    /// A new annotation was completed.
    #[serde(rename_all = "camelCase")]
    Completed {
        /// The annotation.
        annotation_uid: AnnotationUid,
    },
    /// An existing annotation was modified.
    #[serde(rename_all = "camelCase")]
    Modified {
        /// The annotation.
        annotation_uid: AnnotationUid,
        /// Element it was modified on, if known.
        element: Option<ElementId>,
    },
}

/// One undo memo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoRecord {
    /// Memo handle.
    pub id: MemoId,
    /// Element the edit happened on.
    pub element: ElementId,
    /// Annotation state when the memo opened.
    pub before: Annotation,
    /// Creation memo.
    pub new_annotation: bool,
    /// Whether the memo has been closed.
    pub closed: bool,
}

/// In-memory [`ToolHost`](crate::host::ToolHost).
#[derive(Debug, Default)]
pub struct HeadlessHost {
    /// Annotation storage.
    pub store: AnnotationArena,
    listeners: HashSet<(ElementId, ListenerKind)>,
    tool_viewports: HashMap<ElementId, BTreeSet<ViewportId>>,
    memos: Vec<MemoRecord>,
    notifications: Vec<Notification>,
    render_requests: Vec<BTreeSet<ViewportId>>,
    hidden_cursors: HashSet<ElementId>,
    styles: HashMap<AnnotationUid, AnnotationStyle>,
}

impl HeadlessHost {
    /// Create an empty host.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare that `viewport_id` on `element` renders the tool.
    pub fn register_viewport(&mut self, element: &ElementId, viewport_id: ViewportId) {
        self.tool_viewports
            .entry(element.clone())
            .or_default()
            .insert(viewport_id);
    }

    /// Override the style of one annotation.
    pub fn set_style(&mut self, uid: AnnotationUid, style: AnnotationStyle) {
        self.styles.insert(uid, style);
    }

    /// Whether `kind` events on `element` are currently routed to the tool.
    #[must_use]
    pub fn is_listening(&self, element: &ElementId, kind: ListenerKind) -> bool {
        self.listeners.contains(&(element.clone(), kind))
    }

    /// Number of bound listeners across all elements.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Whether the cursor is hidden on `element`.
    #[must_use]
    pub fn is_cursor_hidden(&self, element: &ElementId) -> bool {
        self.hidden_cursors.contains(element)
    }

    /// All memos in the order they were opened.
    #[must_use]
    pub fn memos(&self) -> &[MemoRecord] {
        &self.memos
    }

    /// Memos not yet closed.
    pub fn open_memos(&self) -> impl Iterator<Item = &MemoRecord> {
        self.memos.iter().filter(|memo| !memo.closed)
    }

    /// All notifications in emission order.
    #[must_use]
    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    /// All render requests in order.
    #[must_use]
    pub fn render_requests(&self) -> &[BTreeSet<ViewportId>] {
        &self.render_requests
    }

    /// Forget recorded notifications and render requests.
    pub fn clear_log(&mut self) {
        self.notifications.clear();
        self.render_requests.clear();
    }
}

impl AnnotationStore for HeadlessHost {
    fn add_annotation(&mut self, annotation: Annotation, element: &ElementId) {
        self.store.add_annotation(annotation, element);
    }

    fn annotations(&self, tool_name: &str, element: &ElementId) -> Vec<&Annotation> {
        self.store.annotations(tool_name, element)
    }

    fn annotation(&self, uid: AnnotationUid) -> Option<&Annotation> {
        self.store.annotation(uid)
    }

    fn annotation_mut(&mut self, uid: AnnotationUid) -> Option<&mut Annotation> {
        self.store.annotation_mut(uid)
    }

    fn remove_annotation(&mut self, uid: AnnotationUid) -> Option<Annotation> {
        self.store.remove_annotation(uid)
    }
}

impl EventBus for HeadlessHost {
    fn add_listener(&mut self, element: &ElementId, kind: ListenerKind) {
        self.listeners.insert((element.clone(), kind));
    }

    fn remove_listener(&mut self, element: &ElementId, kind: ListenerKind) {
        self.listeners.remove(&(element.clone(), kind));
    }
}

impl UndoHistory for HeadlessHost {
    fn begin_memo(
        &mut self,
        element: &ElementId,
        annotation: &Annotation,
        options: MemoOptions,
    ) -> MemoId {
        let id = MemoId(self.memos.len() as u64);
        self.memos.push(MemoRecord {
            id,
            element: element.clone(),
            before: annotation.clone(),
            new_annotation: options.new_annotation,
            closed: false,
        });
        id
    }

    fn end_memo(&mut self, memo: MemoId) {
        match self.memos.iter_mut().find(|record| record.id == memo) {
            Some(record) if !record.closed => record.closed = true,
            Some(_) => tracing::warn!("Memo {:?} closed twice", memo),
            None => tracing::warn!("Unknown memo {:?}", memo),
        }
    }
}

impl Notifier for HeadlessHost {
    fn annotation_completed(&mut self, annotation: &Annotation) {
        self.notifications.push(Notification::Completed {
            annotation_uid: annotation.annotation_uid,
        });
    }

    fn annotation_modified(&mut self, annotation: &Annotation, element: Option<&ElementId>) {
        self.notifications.push(Notification::Modified {
            annotation_uid: annotation.annotation_uid,
            element: element.cloned(),
        });
    }

    fn viewport_ids_with_tool_to_render(
        &self,
        element: &ElementId,
        _tool_name: &str,
    ) -> BTreeSet<ViewportId> {
        self.tool_viewports.get(element).cloned().unwrap_or_default()
    }

    fn request_render(&mut self, viewport_ids: &BTreeSet<ViewportId>) {
        self.render_requests.push(viewport_ids.clone());
    }
}

impl CursorControl for HeadlessHost {
    fn hide_element_cursor(&mut self, element: &ElementId) {
        self.hidden_cursors.insert(element.clone());
    }

    fn reset_element_cursor(&mut self, element: &ElementId) {
        self.hidden_cursors.remove(element);
    }
}

impl StyleResolver for HeadlessHost {
    fn annotation_style(
        &self,
        specifier: &StyleSpecifier,
        _annotation: &Annotation,
    ) -> AnnotationStyle {
        self.styles
            .get(&specifier.annotation_uid)
            .cloned()
            .unwrap_or_default()
    }
}

/// World-space rectangle covered by the displayed image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageBounds {
    /// Lower corner.
    pub min: [f64; 2],
    /// Upper corner.
    pub max: [f64; 2],
}

impl ImageBounds {
    /// Whether the in-plane part of `world` lies inside.
    #[must_use]
    pub fn contains(&self, world: Point3) -> bool {
        world.x >= self.min[0]
            && world.x <= self.max[0]
            && world.y >= self.min[1]
            && world.y <= self.max[1]
    }
}

/// A pan/zoom viewport with an optional image extent.
///
/// Projection is `canvas = world.xy * zoom + pan`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadlessViewport {
    /// Viewport identifier.
    pub id: ViewportId,
    /// Element rendered onto.
    pub element: ElementId,
    /// Frame of reference of the displayed data.
    #[serde(default = "default_frame_of_reference")]
    pub frame_of_reference_uid: String,
    /// Displayed image, if any.
    #[serde(default)]
    pub image_id: Option<String>,
    /// Canvas offset of the world origin.
    #[serde(default)]
    pub pan: Point2,
    /// Pixels per world unit.
    #[serde(default = "default_zoom")]
    pub zoom: f64,
    /// Extent of the image; unbounded when absent.
    #[serde(default)]
    pub image_bounds: Option<ImageBounds>,
    /// Engine availability checks left before the engine disappears.
    #[serde(skip)]
    engine_checks_left: Cell<Option<u32>>,
}

fn default_frame_of_reference() -> String {
    "default".to_string()
}

fn default_zoom() -> f64 {
    1.0
}

impl HeadlessViewport {
    /// Create an identity viewport on `element`.
    #[must_use]
    pub fn new(id: impl Into<String>, element: impl Into<String>) -> Self {
        Self {
            id: ViewportId(id.into()),
            element: ElementId(element.into()),
            frame_of_reference_uid: default_frame_of_reference(),
            image_id: None,
            pan: Point2::default(),
            zoom: default_zoom(),
            image_bounds: None,
            engine_checks_left: Cell::new(None),
        }
    }

    /// Set pan and zoom.
    #[must_use]
    pub fn with_camera(mut self, pan: Point2, zoom: f64) -> Self {
        self.pan = pan;
        self.zoom = zoom;
        self
    }

    /// Limit the displayed image to `bounds`.
    #[must_use]
    pub fn with_image_bounds(mut self, bounds: ImageBounds) -> Self {
        self.image_bounds = Some(bounds);
        self
    }

    /// Display `image_id`.
    #[must_use]
    pub fn with_image(mut self, image_id: impl Into<String>) -> Self {
        self.image_id = Some(image_id.into());
        self
    }

    /// Let the engine survive `checks` availability checks, then vanish.
    pub fn destroy_engine_after(&self, checks: u32) {
        self.engine_checks_left.set(Some(checks));
    }

    /// Inverse of [`Viewport::world_to_canvas`] on the image plane.
    #[must_use]
    pub fn canvas_to_world(&self, canvas: Point2) -> Point3 {
        Point3::new(
            (canvas.x - self.pan.x) / self.zoom,
            (canvas.y - self.pan.y) / self.zoom,
            0.0,
        )
    }
}

impl Viewport for HeadlessViewport {
    fn id(&self) -> &ViewportId {
        &self.id
    }

    fn element(&self) -> &ElementId {
        &self.element
    }

    fn world_to_canvas(&self, world: Point3) -> Point2 {
        Point2::new(
            world.x * self.zoom + self.pan.x,
            world.y * self.zoom + self.pan.y,
        )
    }

    fn rendering_engine_available(&self) -> bool {
        match self.engine_checks_left.get() {
            None => true,
            Some(0) => false,
            Some(left) => {
                self.engine_checks_left.set(Some(left - 1));
                true
            }
        }
    }

    fn frame_of_reference_uid(&self) -> &str {
        &self.frame_of_reference_uid
    }

    fn current_image_id(&self) -> Option<&str> {
        self.image_id.as_deref()
    }

    fn is_in_image(&self, world: Point3) -> bool {
        self.image_bounds.is_none_or(|bounds| bounds.contains(world))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projection_round_trips_on_plane() {
        let viewport =
            HeadlessViewport::new("vp", "el").with_camera(Point2::new(100.0, 50.0), 2.0);
        let canvas = viewport.world_to_canvas(Point3::new(3.0, 4.0, 0.0));
        assert_eq!(canvas, Point2::new(106.0, 58.0));
        assert_eq!(viewport.canvas_to_world(canvas), Point3::new(3.0, 4.0, 0.0));
    }

    #[test]
    fn test_engine_disappears_after_budget() {
        let viewport = HeadlessViewport::new("vp", "el");
        assert!(viewport.rendering_engine_available());

        viewport.destroy_engine_after(1);
        assert!(viewport.rendering_engine_available());
        assert!(!viewport.rendering_engine_available());
        assert!(!viewport.rendering_engine_available());
    }

    #[test]
    fn test_memo_closed_once() {
        let mut host = HeadlessHost::new();
        let element = ElementId::from("el");
        let annotation = Annotation::new(
            crate::AnnotationMetadata {
                tool_name: "KeyImage".to_string(),
                frame_of_reference_uid: "for".to_string(),
                referenced_image_id: None,
                viewport_id: None,
            },
            Point3::default(),
        );

        let memo = host.begin_memo(&element, &annotation, MemoOptions::default());
        assert_eq!(host.open_memos().count(), 1);
        host.end_memo(memo);
        host.end_memo(memo);
        assert_eq!(host.open_memos().count(), 0);
        assert_eq!(host.memos().len(), 1);
    }

    #[test]
    fn test_viewport_json_defaults() {
        let viewport: HeadlessViewport =
            serde_json::from_str(r#"{ "id": "vp", "element": "el" }"#).expect("should parse");
        assert!((viewport.zoom - 1.0).abs() < f64::EPSILON);
        assert_eq!(viewport.frame_of_reference_uid, "default");
        assert!(viewport.is_in_image(Point3::new(-1e9, 1e9, 0.0)));
    }
}
