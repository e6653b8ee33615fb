//! # Key Image Tool
//!
//! Marks an image (or a whole series) as a key image with a single handle and
//! a text label.
//!
//! ## Gestures
//!
//! ```text
//! Idle ──down──▶ Drawing ──drag*──▶ Drawing ──up──▶ AwaitingText ──text──▶ Idle
//! Idle ──handle──▶ Selected ──drag──▶ Dragging ──up──▶ Idle
//! Drawing | Selected | Dragging ──cancel──▶ Idle
//! ```
//!
//! While a draw or drag is live the tool holds the global interaction lock,
//! one open memo, and the modify listeners on the element. All three are
//! released before any text prompt is opened and before any completed or
//! modified notification fires.

pub mod lifecycle;

use std::collections::BTreeSet;

use crate::hit::{self, DOUBLE_CLICK_PROXIMITY_PX};
use crate::host::{MemoId, MemoOptions, ToolHost, Viewport};
use crate::lock::{self, InteractionLock};
use crate::render::{self, GlyphSink, RenderContext};
use crate::text::{TextEditKind, TextOutcome, TextPrompt, TextRequest, TextSession};
use crate::tool::{AnnotationEditable, AnnotationHitTestable, AnnotationRenderable};
use crate::{
    Annotation, AnnotationUid, ElementId, EventKind, InteractionEvent, ListenerKind, Point2,
    ToolConfig, ToolError, ToolResult, ViewportId,
};

/// Store key for key image annotations.
pub const TOOL_NAME: &str = "KeyImage";

/// Tool group used when none is given.
pub const DEFAULT_TOOL_GROUP: &str = "default";

/// Transient state of the active gesture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditData {
    /// Annotation being drawn or modified.
    pub annotation_uid: AnnotationUid,
    /// Element the modify listeners are bound on.
    pub element: ElementId,
    /// Viewports to re-render on every change.
    pub viewport_ids_to_render: BTreeSet<ViewportId>,
    /// The gesture created the annotation.
    pub new_annotation: bool,
    /// At least one drag event has arrived.
    pub has_moved: bool,
}

/// Where the tool is in its gesture cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolState {
    /// Nothing in progress.
    Idle,
    /// A new annotation is being placed.
    Drawing,
    /// An existing annotation's handle is grabbed but has not moved.
    Selected,
    /// An existing annotation's handle is being moved.
    Dragging,
    /// A new annotation waits for its label; new gestures are allowed.
    AwaitingText,
}

/// The key image annotation tool.
pub struct KeyImageTool {
    tool_name: String,
    tool_group_id: String,
    config: ToolConfig,
    prompt: Box<dyn TextPrompt>,
    edit_data: Option<EditData>,
    memo: Option<MemoId>,
    modify_lock: Option<InteractionLock>,
    is_handle_outside_image: bool,
    text_sessions: Vec<TextSession>,
    resolved: Vec<TextOutcome>,
}

impl std::fmt::Debug for KeyImageTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyImageTool")
            .field("tool_name", &self.tool_name)
            .field("tool_group_id", &self.tool_group_id)
            .field("config", &self.config)
            .field("edit_data", &self.edit_data)
            .field("memo", &self.memo)
            .field("interacting", &self.modify_lock.is_some())
            .field("pending_text", &self.text_sessions.len())
            .finish_non_exhaustive()
    }
}

impl KeyImageTool {
    /// Create a tool with the given configuration and text prompt.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidConfig`] if the configuration is invalid.
    pub fn new(config: ToolConfig, prompt: impl TextPrompt + 'static) -> ToolResult<Self> {
        config.validate()?;
        Ok(Self {
            tool_name: TOOL_NAME.to_string(),
            tool_group_id: DEFAULT_TOOL_GROUP.to_string(),
            config,
            prompt: Box::new(prompt),
            edit_data: None,
            memo: None,
            modify_lock: None,
            is_handle_outside_image: false,
            text_sessions: Vec::new(),
            resolved: Vec::new(),
        })
    }

    /// Place the tool in a tool group (used for style lookup).
    #[must_use]
    pub fn with_tool_group(mut self, tool_group_id: impl Into<String>) -> Self {
        self.tool_group_id = tool_group_id.into();
        self
    }

    /// Current configuration.
    #[must_use]
    pub const fn configuration(&self) -> &ToolConfig {
        &self.config
    }

    /// Replace the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidConfig`] and keeps the old configuration
    /// if the new one is invalid.
    pub fn set_configuration(&mut self, config: ToolConfig) -> ToolResult<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// The active gesture, if any.
    #[must_use]
    pub const fn edit_data(&self) -> Option<&EditData> {
        self.edit_data.as_ref()
    }

    /// Number of text prompts still awaiting an answer.
    #[must_use]
    pub fn pending_text_sessions(&self) -> usize {
        self.text_sessions.len()
    }

    /// Where the tool is in its gesture cycle.
    #[must_use]
    pub fn state(&self) -> ToolState {
        match &self.edit_data {
            Some(edit) if edit.new_annotation => ToolState::Drawing,
            Some(edit) if edit.has_moved => ToolState::Dragging,
            Some(_) => ToolState::Selected,
            None if self
                .text_sessions
                .iter()
                .any(|session| session.request.kind == TextEditKind::Create) =>
            {
                ToolState::AwaitingText
            }
            None => ToolState::Idle,
        }
    }

    /// Route an event from one of the bound modify listeners.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::MissingEditData`] if no gesture is active.
    pub fn handle_modify_event(
        &mut self,
        host: &mut dyn ToolHost,
        viewport: &dyn Viewport,
        event: &mut InteractionEvent,
    ) -> ToolResult<()> {
        match event.kind {
            EventKind::Listener(kind) if kind.is_drag() => {
                self.drag_callback(host, viewport, event)
            }
            EventKind::Listener(_) => self.end_callback(host, event),
            EventKind::Down | EventKind::DoubleClick => {
                tracing::debug!("Ignoring {:?} on modify listeners", event.kind);
                Ok(())
            }
        }
    }

    /// Move the handle to the pointer.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::MissingEditData`] if no gesture is active, or
    /// [`ToolError::AnnotationNotFound`] if the store lost the annotation.
    pub fn drag_callback(
        &mut self,
        host: &mut dyn ToolHost,
        viewport: &dyn Viewport,
        event: &InteractionEvent,
    ) -> ToolResult<()> {
        let Some(edit) = self.edit_data.as_mut() else {
            tracing::error!("Drag on {} with no active interaction", event.element);
            return Err(ToolError::MissingEditData { callback: "drag" });
        };
        edit.has_moved = true;
        let uid = edit.annotation_uid;
        let options = MemoOptions {
            new_annotation: edit.new_annotation,
        };
        let viewport_ids = edit.viewport_ids_to_render.clone();
        let element = edit.element.clone();

        self.create_memo(host, &element, uid, options)?;

        let world = event.current.world;
        let annotation = host
            .annotation_mut(uid)
            .ok_or(ToolError::AnnotationNotFound(uid))?;
        annotation.set_handle(world);
        self.is_handle_outside_image = !viewport.is_in_image(world);

        tracing::trace!("Moved handle of {uid} to {:?}", world);
        host.request_render(&viewport_ids);
        Ok(())
    }

    /// Finish the active draw or drag.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::MissingEditData`] if no gesture is active.
    pub fn end_callback(
        &mut self,
        host: &mut dyn ToolHost,
        event: &InteractionEvent,
    ) -> ToolResult<()> {
        let Some(edit) = self.edit_data.take() else {
            tracing::error!("End on {} with no active interaction", event.element);
            return Err(ToolError::MissingEditData { callback: "end" });
        };
        let element = &edit.element;
        let uid = edit.annotation_uid;

        self.deactivate_modify(host, element);
        host.reset_element_cursor(element);
        self.done_edit_memo(host);

        let outside = std::mem::take(&mut self.is_handle_outside_image);
        if outside && self.config.prevent_handle_outside_image {
            tracing::debug!("Handle of {uid} left the image; removing");
            lifecycle::remove(host, uid);
            host.request_render(&edit.viewport_ids_to_render);
            return Ok(());
        }

        host.request_render(&edit.viewport_ids_to_render);

        if edit.new_annotation {
            let request = TextRequest {
                annotation_uid: uid,
                element: element.clone(),
                kind: TextEditKind::Create,
                current_text: None,
            };
            self.open_text_session(host, request, edit.viewport_ids_to_render, None);
        }
        Ok(())
    }

    /// Resolve every text prompt that has been answered.
    ///
    /// Also returns the outcomes of prompts that answered synchronously since
    /// the last poll. Unanswered prompts stay pending; this never blocks.
    pub fn poll_text_sessions(&mut self, host: &mut dyn ToolHost) -> Vec<TextOutcome> {
        let mut outcomes = std::mem::take(&mut self.resolved);
        outcomes.extend(self.resolve_answered(host));
        outcomes
    }

    fn resolve_answered(&mut self, host: &mut dyn ToolHost) -> Vec<TextOutcome> {
        let mut outcomes = Vec::new();
        let mut pending = Vec::with_capacity(self.text_sessions.len());

        for mut session in std::mem::take(&mut self.text_sessions) {
            match session.try_answer() {
                None => pending.push(session),
                Some(answer) => outcomes.push(resolve_text(host, session, answer)),
            }
        }

        self.text_sessions = pending;
        outcomes
    }

    fn open_text_session(
        &mut self,
        host: &mut dyn ToolHost,
        request: TextRequest,
        viewport_ids: BTreeSet<ViewportId>,
        memo: Option<MemoId>,
    ) {
        tracing::debug!(
            "Requesting {:?} text for {}",
            request.kind,
            request.annotation_uid
        );
        let (session, reply) = TextSession::open(request.clone(), viewport_ids, memo);
        self.text_sessions.push(session);
        self.prompt.request_text(request, reply);

        for outcome in self.resolve_answered(host) {
            tracing::debug!("Text session resolved immediately: {:?}", outcome);
            self.resolved.push(outcome);
        }
    }

    fn create_memo(
        &mut self,
        host: &mut dyn ToolHost,
        element: &ElementId,
        uid: AnnotationUid,
        options: MemoOptions,
    ) -> ToolResult<()> {
        if self.memo.is_some() {
            return Ok(());
        }
        let before = host
            .annotation(uid)
            .cloned()
            .ok_or(ToolError::AnnotationNotFound(uid))?;
        self.memo = Some(host.begin_memo(element, &before, options));
        Ok(())
    }

    fn done_edit_memo(&mut self, host: &mut dyn ToolHost) {
        if let Some(memo) = self.memo.take() {
            host.end_memo(memo);
        }
    }

    fn activate_modify(&mut self, host: &mut dyn ToolHost, element: &ElementId) -> ToolResult<()> {
        let lock = InteractionLock::acquire()?;
        self.modify_lock = Some(lock);
        for kind in ListenerKind::MODIFY {
            host.add_listener(element, kind);
        }
        Ok(())
    }

    fn deactivate_modify(&mut self, host: &mut dyn ToolHost, element: &ElementId) {
        for kind in ListenerKind::MODIFY {
            host.remove_listener(element, kind);
        }
        self.modify_lock = None;
    }

    fn ensure_idle(&self) -> ToolResult<()> {
        if self.edit_data.is_some() || lock::is_interacting_with_tool() {
            return Err(ToolError::InteractionInProgress);
        }
        Ok(())
    }
}

fn resolve_text(
    host: &mut dyn ToolHost,
    session: TextSession,
    answer: Option<String>,
) -> TextOutcome {
    let TextSession {
        request,
        viewport_ids_to_render,
        memo,
        ..
    } = session;
    let uid = request.annotation_uid;

    if host.annotation(uid).is_none() {
        tracing::warn!("Text arrived for {uid}, which is no longer stored");
        if let Some(memo) = memo {
            host.end_memo(memo);
        }
        return TextOutcome::Orphaned {
            annotation_uid: uid,
        };
    }

    match request.kind {
        TextEditKind::Create => match answer.filter(|text| !text.is_empty()) {
            None => {
                lifecycle::cancel_pending_text(host, uid);
                host.request_render(&viewport_ids_to_render);
                TextOutcome::Discarded {
                    annotation_uid: uid,
                }
            }
            Some(text) => {
                host.request_render(&viewport_ids_to_render);
                match lifecycle::finalize(host, uid, text.clone()) {
                    Ok(()) => TextOutcome::Completed {
                        annotation_uid: uid,
                        text,
                    },
                    Err(e) => {
                        tracing::warn!("Could not finalize {uid}: {e}");
                        TextOutcome::Orphaned {
                            annotation_uid: uid,
                        }
                    }
                }
            }
        },
        TextEditKind::Change => {
            let modified = answer.and_then(|text| {
                let annotation = host.annotation_mut(uid)?;
                annotation.data.text = Some(text);
                Some(annotation.clone())
            });
            if let Some(memo) = memo {
                host.end_memo(memo);
            }
            let Some(modified) = modified else {
                return TextOutcome::Unchanged {
                    annotation_uid: uid,
                };
            };
            host.request_render(&viewport_ids_to_render);
            host.annotation_modified(&modified, Some(&request.element));
            tracing::debug!("Changed text of {uid}");
            TextOutcome::Modified {
                annotation_uid: uid,
                text: modified.data.text.unwrap_or_default(),
            }
        }
    }
}

impl AnnotationEditable for KeyImageTool {
    fn tool_name(&self) -> &str {
        &self.tool_name
    }

    fn add_new_annotation(
        &mut self,
        host: &mut dyn ToolHost,
        viewport: &dyn Viewport,
        event: &mut InteractionEvent,
    ) -> ToolResult<AnnotationUid> {
        self.ensure_idle()?;
        let element = event.element.clone();
        self.activate_modify(host, &element)?;

        let uid = lifecycle::create_at_world_point(
            host,
            viewport,
            &self.tool_name,
            &self.config,
            event.current.world,
        );
        let viewport_ids = host.viewport_ids_with_tool_to_render(&element, &self.tool_name);
        self.edit_data = Some(EditData {
            annotation_uid: uid,
            element: element.clone(),
            viewport_ids_to_render: viewport_ids,
            new_annotation: true,
            has_moved: false,
        });
        self.is_handle_outside_image = !viewport.is_in_image(event.current.world);
        self.create_memo(
            host,
            &element,
            uid,
            MemoOptions {
                new_annotation: true,
            },
        )?;

        host.hide_element_cursor(&element);
        event.prevent_default();
        tracing::debug!("Drawing {uid} on {element}");
        Ok(uid)
    }

    fn tool_selected_callback(
        &mut self,
        host: &mut dyn ToolHost,
        _viewport: &dyn Viewport,
        event: &mut InteractionEvent,
        annotation_uid: AnnotationUid,
    ) -> ToolResult<()> {
        let annotation = host
            .annotation_mut(annotation_uid)
            .ok_or(ToolError::AnnotationNotFound(annotation_uid))?;
        annotation.highlighted = true;

        let viewport_ids = host.viewport_ids_with_tool_to_render(&event.element, &self.tool_name);
        host.request_render(&viewport_ids);
        event.prevent_default();
        Ok(())
    }

    fn handle_selected_callback(
        &mut self,
        host: &mut dyn ToolHost,
        _viewport: &dyn Viewport,
        event: &mut InteractionEvent,
        annotation_uid: AnnotationUid,
        handle_index: usize,
    ) -> ToolResult<()> {
        self.ensure_idle()?;
        let handle_count = host
            .annotation(annotation_uid)
            .ok_or(ToolError::AnnotationNotFound(annotation_uid))?
            .data
            .handles
            .points
            .len();
        if handle_index >= handle_count {
            return Err(ToolError::HandleOutOfRange {
                annotation_uid,
                handle_index,
                handle_count,
            });
        }
        let element = event.element.clone();
        self.activate_modify(host, &element)?;

        if let Some(annotation) = host.annotation_mut(annotation_uid) {
            annotation.highlighted = true;
            annotation.data.handles.active_handle_index = Some(handle_index);
        }
        let viewport_ids = host.viewport_ids_with_tool_to_render(&element, &self.tool_name);
        host.hide_element_cursor(&element);
        host.request_render(&viewport_ids);
        self.edit_data = Some(EditData {
            annotation_uid,
            element: element.clone(),
            viewport_ids_to_render: viewport_ids,
            new_annotation: false,
            has_moved: false,
        });

        event.prevent_default();
        tracing::debug!("Selected handle {handle_index} of {annotation_uid}");
        Ok(())
    }

    fn double_click_callback(
        &mut self,
        host: &mut dyn ToolHost,
        viewport: &dyn Viewport,
        event: &mut InteractionEvent,
    ) -> ToolResult<Option<AnnotationUid>> {
        self.ensure_idle()?;
        let element = event.element.clone();
        let canvas = event.current.canvas;

        let hit = {
            let annotations = viewport.filter_interactable(host.annotations(&self.tool_name, &element));
            annotations
                .into_iter()
                .find(|annotation| {
                    self.is_point_near_tool(&element, annotation, canvas, DOUBLE_CLICK_PROXIMITY_PX)
                })
                .map(|annotation| annotation.annotation_uid)
        };
        let Some(uid) = hit else {
            return Ok(None);
        };

        let before = host
            .annotation(uid)
            .cloned()
            .ok_or(ToolError::AnnotationNotFound(uid))?;
        let memo = host.begin_memo(&element, &before, MemoOptions::default());
        let viewport_ids = host.viewport_ids_with_tool_to_render(&element, &self.tool_name);
        let request = TextRequest {
            annotation_uid: uid,
            element,
            kind: TextEditKind::Change,
            current_text: before.data.text,
        };

        event.stop_immediate_propagation();
        event.prevent_default();
        self.open_text_session(host, request, viewport_ids, Some(memo));
        Ok(Some(uid))
    }

    fn cancel(&mut self, host: &mut dyn ToolHost, element: &ElementId) -> Option<AnnotationUid> {
        let edit = self.edit_data.take()?;
        let uid = edit.annotation_uid;
        if edit.element != *element {
            tracing::warn!(
                "Cancel for {element} while interacting on {}; releasing both",
                edit.element
            );
            self.deactivate_modify(host, element);
        }

        self.deactivate_modify(host, &edit.element);
        host.reset_element_cursor(&edit.element);
        self.done_edit_memo(host);
        self.is_handle_outside_image = false;

        let cancelled = host.annotation_mut(uid).map(|annotation| {
            annotation.highlighted = false;
            annotation.data.handles.active_handle_index = None;
            annotation.clone()
        });
        host.request_render(&edit.viewport_ids_to_render);

        if edit.new_annotation {
            if let Some(annotation) = cancelled {
                host.annotation_completed(&annotation);
            }
        }
        tracing::debug!("Cancelled interaction with {uid}");
        Some(uid)
    }
}

impl AnnotationHitTestable for KeyImageTool {
    fn is_point_near_tool(
        &self,
        _element: &ElementId,
        annotation: &Annotation,
        canvas_point: Point2,
        _proximity: f64,
    ) -> bool {
        hit::is_point_near(&self.config, annotation, canvas_point)
    }
}

impl AnnotationRenderable for KeyImageTool {
    fn render_annotation(
        &self,
        host: &dyn ToolHost,
        viewport: &dyn Viewport,
        sink: &mut dyn GlyphSink,
    ) -> bool {
        let cx = RenderContext {
            tool_group_id: &self.tool_group_id,
            tool_name: &self.tool_name,
            config: &self.config,
        };
        render::render_annotations(cx, host, viewport, sink).unwrap_or_else(|e| {
            tracing::error!("Failed to render {} annotations: {e}", self.tool_name);
            false
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{HeadlessHost, HeadlessViewport};
    use crate::text::DismissingPrompt;
    use crate::{Point3, ToolError};

    fn down(viewport: &HeadlessViewport) -> InteractionEvent {
        InteractionEvent::new(
            viewport.element.clone(),
            EventKind::Down,
            Point2::new(1.0, 1.0),
            Point3::new(1.0, 1.0, 0.0),
        )
    }

    #[test]
    fn test_new_tool_is_idle() {
        let tool = KeyImageTool::new(ToolConfig::default(), DismissingPrompt).expect("valid");
        assert_eq!(tool.state(), ToolState::Idle);
        assert_eq!(tool.tool_name(), TOOL_NAME);
        assert!(tool.edit_data().is_none());
    }

    #[test]
    fn test_edit_data_tracks_draw() {
        let viewport = HeadlessViewport::new("vp", "el");
        let mut host = HeadlessHost::new();
        host.register_viewport(&viewport.element, viewport.id.clone());
        let mut tool = KeyImageTool::new(ToolConfig::default(), DismissingPrompt)
            .expect("valid")
            .with_tool_group("group-1");

        let uid = tool
            .add_new_annotation(&mut host, &viewport, &mut down(&viewport))
            .expect("should draw");
        let edit = tool.edit_data().expect("gesture active");
        assert_eq!(edit.annotation_uid, uid);
        assert!(edit.new_annotation);
        assert!(!edit.has_moved);
        assert!(edit.viewport_ids_to_render.contains(&viewport.id));
        assert!(lock::is_interacting_with_tool());

        assert_eq!(tool.cancel(&mut host, &viewport.element), Some(uid));
        assert!(!lock::is_interacting_with_tool());
        assert_eq!(tool.state(), ToolState::Idle);
    }

    #[test]
    fn test_dismissed_draw_leaves_store_empty() {
        let viewport = HeadlessViewport::new("vp", "el");
        let mut host = HeadlessHost::new();
        let mut tool = KeyImageTool::new(ToolConfig::default(), DismissingPrompt).expect("valid");

        tool.add_new_annotation(&mut host, &viewport, &mut down(&viewport))
            .expect("should draw");
        let up = InteractionEvent::new(
            viewport.element.clone(),
            EventKind::Listener(ListenerKind::MouseUp),
            Point2::new(1.0, 1.0),
            Point3::new(1.0, 1.0, 0.0),
        );
        tool.end_callback(&mut host, &up).expect("should end");

        assert!(host.store.is_empty());
        assert!(matches!(
            tool.end_callback(&mut host, &up),
            Err(ToolError::MissingEditData { .. })
        ));
    }
}
