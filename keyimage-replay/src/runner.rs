//! Step-by-step replay on the headless host.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use keyimage_core::headless::MemoRecord;
use keyimage_core::host::{AnnotationStore, Viewport};
use keyimage_core::{
    Annotation, AnnotationEditable, AnnotationMetadata, AnnotationRenderable, AnnotationUid,
    EventKind, Glyph, HeadlessHost, HeadlessViewport, InteractionEvent, KeyImageTool,
    ListenerKind, Notification, Point2, TextOutcome, TextPrompt, TextReply, TextRequest,
    ToolConfig, TOOL_NAME,
};
use serde::{Deserialize, Serialize};

use crate::{PreloadAnnotation, ReplayError, ReplayResult, Script, Step};

#[derive(Debug, Default)]
struct PromptQueue {
    answers: VecDeque<Option<String>>,
    waiting: VecDeque<(TextRequest, TextReply)>,
}

/// Text prompt fed by `answer` steps.
///
/// An answer given before a prompt opens is queued for it. A prompt opened
/// before its answer waits for the next `answer` step.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPrompt {
    queue: Rc<RefCell<PromptQueue>>,
}

impl ScriptedPrompt {
    /// Answer the oldest waiting prompt, or queue the answer.
    pub fn answer(&self, text: Option<String>) {
        let mut queue = self.queue.borrow_mut();
        if let Some((request, reply)) = queue.waiting.pop_front() {
            tracing::debug!(
                "Answering {:?} prompt for {}",
                request.kind,
                request.annotation_uid
            );
            reply.send(text);
        } else {
            queue.answers.push_back(text);
        }
    }

    /// Prompts opened but not yet answered.
    #[must_use]
    pub fn waiting(&self) -> usize {
        self.queue.borrow().waiting.len()
    }
}

impl TextPrompt for ScriptedPrompt {
    fn request_text(&mut self, request: TextRequest, reply: TextReply) {
        let mut queue = self.queue.borrow_mut();
        if let Some(text) = queue.answers.pop_front() {
            reply.send(text);
        } else {
            tracing::debug!(
                "Prompt for {} waits for an answer step",
                request.annotation_uid
            );
            queue.waiting.push_back((request, reply));
        }
    }
}

/// A step the tool refused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRejection {
    /// Position of the step in the script.
    pub index: usize,
    /// The step.
    pub step: Step,
    /// Why it was refused.
    pub error: String,
}

/// Everything the tool did during a replay.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    /// Stored annotations after the last step, in insertion order.
    pub annotations: Vec<Annotation>,
    /// Completed and modified notifications in emission order.
    pub notifications: Vec<Notification>,
    /// Undo memos in the order they were opened.
    pub memos: Vec<MemoRecord>,
    /// Resolved text prompts.
    pub outcomes: Vec<TextOutcome>,
    /// Glyphs drawn by each `render` step.
    pub renders: Vec<Vec<Glyph>>,
    /// Listener steps dropped because no listener was bound.
    pub unrouted_steps: Vec<usize>,
    /// Steps the tool refused.
    pub rejected_steps: Vec<StepRejection>,
    /// Text prompts still unanswered at the end.
    pub pending_text: usize,
}

/// Drives one key image tool through a script.
#[derive(Debug)]
pub struct Replay {
    host: HeadlessHost,
    viewport: HeadlessViewport,
    tool: KeyImageTool,
    prompt: ScriptedPrompt,
    report: ReplayReport,
}

impl Replay {
    /// Set up the host, viewport, and preloaded annotations of `script`.
    ///
    /// # Errors
    ///
    /// Returns an error if the tool configuration is invalid.
    pub fn new(config: ToolConfig, script: &Script) -> ReplayResult<Self> {
        let prompt = ScriptedPrompt::default();
        let tool = KeyImageTool::new(config, prompt.clone())?;
        let viewport = script.viewport.clone();

        let mut host = HeadlessHost::new();
        host.register_viewport(&viewport.element, viewport.id.clone());
        for preload in &script.preload {
            host.add_annotation(preloaded(&viewport, preload), &viewport.element);
        }
        tracing::info!(
            "Replaying {} steps on {} with {} preloaded annotations",
            script.steps.len(),
            viewport.id,
            script.preload.len()
        );

        Ok(Self {
            host,
            viewport,
            tool,
            prompt,
            report: ReplayReport::default(),
        })
    }

    /// Set up and run `script` to completion.
    ///
    /// # Errors
    ///
    /// Returns an error if the tool configuration is invalid.
    pub fn run_script(config: ToolConfig, script: &Script) -> ReplayResult<ReplayReport> {
        Ok(Self::new(config, script)?.run(&script.steps))
    }

    /// Place the tool in a tool group.
    #[must_use]
    pub fn with_tool_group(mut self, tool_group_id: impl Into<String>) -> Self {
        self.tool = self.tool.with_tool_group(tool_group_id);
        self
    }

    /// Run every step, then report.
    #[must_use]
    pub fn run(mut self, steps: &[Step]) -> ReplayReport {
        for (index, step) in steps.iter().enumerate() {
            self.step(index, step);
        }
        self.finish()
    }

    /// Apply one step and resolve any answered text prompts.
    ///
    /// A refused step is recorded in the report and does not stop the replay.
    pub fn step(&mut self, index: usize, step: &Step) {
        tracing::debug!("Step {index}: {:?}", step);
        if let Err(e) = self.apply(index, step) {
            tracing::warn!("Step {index} rejected: {e}");
            self.report.rejected_steps.push(StepRejection {
                index,
                step: step.clone(),
                error: e.to_string(),
            });
        }
        let outcomes = self.tool.poll_text_sessions(&mut self.host);
        self.report.outcomes.extend(outcomes);
    }

    /// Collect the final store and host log.
    #[must_use]
    pub fn finish(self) -> ReplayReport {
        if let Some(edit) = self.tool.edit_data() {
            tracing::warn!(
                "Script ended during a gesture on {}",
                edit.annotation_uid
            );
        }
        let waiting = self.prompt.waiting();
        if waiting > 0 {
            tracing::warn!("{waiting} text prompts were never answered");
        }

        let mut report = self.report;
        report.annotations = self.host.store.iter().cloned().collect();
        report.notifications = self.host.notifications().to_vec();
        report.memos = self.host.memos().to_vec();
        report.pending_text = self.tool.pending_text_sessions();
        report
    }

    fn apply(&mut self, index: usize, step: &Step) -> ReplayResult<()> {
        match step {
            Step::Down { x, y } => {
                let mut event = self.event(EventKind::Down, Point2::new(*x, *y));
                self.tool
                    .add_new_annotation(&mut self.host, &self.viewport, &mut event)?;
            }
            Step::Select { annotation, handle } => {
                let uid = self.uid_at(*annotation)?;
                let mut event = self.event(EventKind::Down, self.handle_canvas(uid));
                self.tool.handle_selected_callback(
                    &mut self.host,
                    &self.viewport,
                    &mut event,
                    uid,
                    *handle,
                )?;
            }
            Step::Highlight { annotation } => {
                let uid = self.uid_at(*annotation)?;
                let mut event = self.event(EventKind::Down, self.handle_canvas(uid));
                self.tool
                    .tool_selected_callback(&mut self.host, &self.viewport, &mut event, uid)?;
            }
            Step::DoubleClick { x, y } => {
                let mut event = self.event(EventKind::DoubleClick, Point2::new(*x, *y));
                let hit = self
                    .tool
                    .double_click_callback(&mut self.host, &self.viewport, &mut event)?;
                if hit.is_none() {
                    tracing::debug!("Double-click at ({x}, {y}) hit nothing");
                }
            }
            Step::Cancel => {
                if self
                    .tool
                    .cancel(&mut self.host, &self.viewport.element)
                    .is_none()
                {
                    tracing::debug!("Nothing to cancel");
                }
            }
            Step::Answer { text } => self.prompt.answer(text.clone()),
            Step::Render => {
                let mut glyphs = Vec::new();
                self.tool
                    .render_annotation(&self.host, &self.viewport, &mut glyphs);
                self.report.renders.push(glyphs);
            }
            Step::Drag { .. }
            | Step::Up { .. }
            | Step::Click { .. }
            | Step::TouchDrag { .. }
            | Step::TouchEnd { .. }
            | Step::TouchTap { .. } => {
                if let Some((kind, canvas)) = step.listener() {
                    self.route(index, kind, canvas)?;
                }
            }
        }
        Ok(())
    }

    fn route(&mut self, index: usize, kind: ListenerKind, canvas: Point2) -> ReplayResult<()> {
        if !self.host.is_listening(&self.viewport.element, kind) {
            tracing::debug!("No {:?} listener bound; step {index} not routed", kind);
            self.report.unrouted_steps.push(index);
            return Ok(());
        }
        let mut event = self.event(EventKind::Listener(kind), canvas);
        self.tool
            .handle_modify_event(&mut self.host, &self.viewport, &mut event)?;
        Ok(())
    }

    fn event(&self, kind: EventKind, canvas: Point2) -> InteractionEvent {
        InteractionEvent::new(
            self.viewport.element.clone(),
            kind,
            canvas,
            self.viewport.canvas_to_world(canvas),
        )
    }

    fn uid_at(&self, index: usize) -> ReplayResult<AnnotationUid> {
        self.host
            .store
            .iter()
            .nth(index)
            .map(|annotation| annotation.annotation_uid)
            .ok_or(ReplayError::NoSuchAnnotation(index))
    }

    fn handle_canvas(&self, uid: AnnotationUid) -> Point2 {
        self.host
            .annotation(uid)
            .and_then(Annotation::handle)
            .map(|world| self.viewport.world_to_canvas(world))
            .unwrap_or_default()
    }
}

fn preloaded(viewport: &HeadlessViewport, preload: &PreloadAnnotation) -> Annotation {
    let metadata = AnnotationMetadata {
        tool_name: TOOL_NAME.to_string(),
        frame_of_reference_uid: viewport.frame_of_reference_uid.clone(),
        referenced_image_id: viewport.image_id.clone(),
        viewport_id: Some(viewport.id.clone()),
    };
    let mut annotation = Annotation::new(metadata, preload.world)
        .with_is_point(preload.is_point)
        .with_series_level(preload.series_level);
    annotation.data.text.clone_from(&preload.text);
    annotation.is_locked = preload.is_locked;
    annotation
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point_config() -> ToolConfig {
        ToolConfig {
            is_point: true,
            ..ToolConfig::default()
        }
    }

    fn script(json: &str) -> Script {
        Script::from_json(json).expect("valid script")
    }

    #[test]
    fn test_draw_with_queued_answer() {
        let script = script(
            r#"{
                "viewport": { "id": "vp", "element": "el" },
                "steps": [
                    { "step": "answer", "text": "Lesion" },
                    { "step": "down", "x": 10, "y": 10 },
                    { "step": "drag", "x": 12, "y": 14 },
                    { "step": "up", "x": 12, "y": 14 },
                    { "step": "render" }
                ]
            }"#,
        );
        let report = Replay::run_script(point_config(), &script).expect("should run");

        assert!(report.rejected_steps.is_empty());
        assert!(report.unrouted_steps.is_empty());
        assert_eq!(report.annotations.len(), 1);
        let annotation = &report.annotations[0];
        assert_eq!(annotation.data.text.as_deref(), Some("Lesion"));
        assert_eq!(
            report.outcomes,
            vec![TextOutcome::Completed {
                annotation_uid: annotation.annotation_uid,
                text: "Lesion".to_string()
            }]
        );
        assert_eq!(report.notifications.len(), 1);
        assert_eq!(report.memos.len(), 1);
        assert!(report.memos[0].closed);
        assert_eq!(report.renders.len(), 1);
        assert!(matches!(
            &report.renders[0][..],
            [Glyph::Handles { points, .. }] if points == &vec![Point2::new(12.0, 14.0)]
        ));
        assert_eq!(report.pending_text, 0);
    }

    #[test]
    fn test_answer_after_prompt_opens() {
        let script = script(
            r#"{ "steps": [
                { "step": "down", "x": 1, "y": 1 },
                { "step": "touchEnd", "x": 1, "y": 1 },
                { "step": "answer", "text": "Late" }
            ] }"#,
        );
        let mut replay = Replay::new(ToolConfig::default(), &script).expect("should set up");

        replay.step(0, &script.steps[0]);
        replay.step(1, &script.steps[1]);
        assert_eq!(replay.prompt.waiting(), 1);
        assert_eq!(replay.tool.pending_text_sessions(), 1);
        replay.step(2, &script.steps[2]);

        let report = replay.finish();
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.annotations.len(), 1);
        assert_eq!(report.annotations[0].data.text.as_deref(), Some("Late"));
        assert_eq!(report.pending_text, 0);
    }

    #[test]
    fn test_unanswered_prompt_stays_pending() {
        let script = script(
            r#"{ "steps": [
                { "step": "down", "x": 1, "y": 1 },
                { "step": "up", "x": 1, "y": 1 }
            ] }"#,
        );
        let report = Replay::run_script(ToolConfig::default(), &script).expect("should run");

        assert_eq!(report.pending_text, 1);
        assert!(report.outcomes.is_empty());
        assert!(report.notifications.is_empty());
        assert_eq!(report.annotations.len(), 1);
    }

    #[test]
    fn test_listener_step_without_gesture_is_unrouted() {
        let script = script(r#"{ "steps": [{ "step": "up", "x": 0, "y": 0 }] }"#);
        let report = Replay::run_script(ToolConfig::default(), &script).expect("should run");

        assert_eq!(report.unrouted_steps, vec![0]);
        assert!(report.rejected_steps.is_empty());
    }

    #[test]
    fn test_second_down_is_rejected() {
        let script = script(
            r#"{ "steps": [
                { "step": "down", "x": 1, "y": 1 },
                { "step": "down", "x": 5, "y": 5 },
                { "step": "cancel" }
            ] }"#,
        );
        let report = Replay::run_script(ToolConfig::default(), &script).expect("should run");

        assert_eq!(report.rejected_steps.len(), 1);
        assert_eq!(report.rejected_steps[0].index, 1);
        assert_eq!(report.annotations.len(), 1);
        // Cancelling a draw completes the annotation without a label.
        assert_eq!(report.notifications.len(), 1);
        assert_eq!(report.pending_text, 0);
    }

    #[test]
    fn test_select_unknown_annotation_is_rejected() {
        let script = script(r#"{ "steps": [{ "step": "select", "annotation": 2 }] }"#);
        let report = Replay::run_script(ToolConfig::default(), &script).expect("should run");

        assert_eq!(report.rejected_steps.len(), 1);
        assert_eq!(report.rejected_steps[0].error, "No annotation at index 2");
    }

    #[test]
    fn test_preloaded_label_edit() {
        let script = script(
            r#"{
                "preload": [{ "world": { "x": 40, "y": 40, "z": 0 }, "text": "Old" }],
                "steps": [
                    { "step": "answer", "text": "New" },
                    { "step": "doubleClick", "x": 10, "y": 10 }
                ]
            }"#,
        );
        let report = Replay::run_script(point_config(), &script).expect("should run");

        assert_eq!(report.annotations[0].data.text.as_deref(), Some("New"));
        assert!(matches!(
            &report.notifications[..],
            [Notification::Modified { .. }]
        ));
        assert!(matches!(
            &report.outcomes[..],
            [TextOutcome::Modified { text, .. }] if text == "New"
        ));
    }

    #[test]
    fn test_select_and_drag_preloaded() {
        let script = script(
            r#"{
                "preload": [{ "world": { "x": 40, "y": 40, "z": 0 }, "text": "A" }],
                "steps": [
                    { "step": "select", "annotation": 0 },
                    { "step": "drag", "x": 50, "y": 45 },
                    { "step": "click", "x": 50, "y": 45 }
                ]
            }"#,
        );
        let report = Replay::run_script(point_config(), &script).expect("should run");

        assert!(report.rejected_steps.is_empty());
        assert!(report.notifications.is_empty());
        assert_eq!(
            report.annotations[0].handle(),
            Some(keyimage_core::Point3::new(50.0, 45.0, 0.0))
        );
        assert_eq!(report.memos.len(), 1);
        assert!(!report.memos[0].new_annotation);
    }

    #[test]
    fn test_scripted_prompt_order() {
        let mut prompt = ScriptedPrompt::default();
        prompt.answer(Some("first".to_string()));

        let (mut first, reply) = keyimage_core::text::TextSession::open(
            request(),
            std::collections::BTreeSet::new(),
            None,
        );
        prompt.request_text(first.request.clone(), reply);
        assert_eq!(first.try_answer(), Some(Some("first".to_string())));

        let (mut second, reply) = keyimage_core::text::TextSession::open(
            request(),
            std::collections::BTreeSet::new(),
            None,
        );
        prompt.request_text(second.request.clone(), reply);
        assert_eq!(prompt.waiting(), 1);
        assert_eq!(second.try_answer(), None);

        prompt.answer(None);
        assert_eq!(second.try_answer(), Some(None));
        assert_eq!(prompt.waiting(), 0);
    }

    fn request() -> TextRequest {
        TextRequest {
            annotation_uid: AnnotationUid::new(),
            element: "el".into(),
            kind: keyimage_core::TextEditKind::Create,
            current_text: None,
        }
    }
}
