//! Asynchronous text entry.
//!
//! The tool never waits for the user. It hands the host prompt a
//! [`TextRequest`] together with a [`TextReply`], keeps the receiving end of
//! the channel as a [`TextSession`], and picks up the answer on a later poll.
//! Pointer listeners and the gesture memo are torn down before a session is
//! opened, so new gestures proceed while a prompt is outstanding.

use std::collections::BTreeSet;

use futures::channel::oneshot;
use serde::{Deserialize, Serialize};

use crate::host::MemoId;
use crate::{AnnotationUid, ElementId, ViewportId};

/// Why text is being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TextEditKind {
    /// Label for a freshly drawn annotation. No text discards it.
    Create,
    /// Change the label of an existing annotation.
    Change,
}

/// What the prompt is asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRequest {
    /// Annotation the text belongs to.
    pub annotation_uid: AnnotationUid,
    /// Element the gesture happened on.
    pub element: ElementId,
    /// Create or change.
    pub kind: TextEditKind,
    /// Label before the edit.
    pub current_text: Option<String>,
}

/// One-shot reply handle given to the prompt.
///
/// Dropping it without answering counts as a cancellation.
#[derive(Debug)]
pub struct TextReply(oneshot::Sender<Option<String>>);

impl TextReply {
    /// Answer with the user's text.
    pub fn submit(self, text: impl Into<String>) {
        self.send(Some(text.into()));
    }

    /// Answer that the user dismissed the prompt.
    pub fn cancel(self) {
        self.send(None);
    }

    /// Answer with an optional text.
    pub fn send(self, text: Option<String>) {
        if self.0.send(text).is_err() {
            tracing::debug!("Text reply dropped: session already gone");
        }
    }
}

/// Host UI that collects annotation labels.
pub trait TextPrompt {
    /// Ask for text. Answer through `reply`, now or later.
    fn request_text(&mut self, request: TextRequest, reply: TextReply);
}

impl<F> TextPrompt for F
where
    F: FnMut(TextRequest, TextReply),
{
    fn request_text(&mut self, request: TextRequest, reply: TextReply) {
        self(request, reply);
    }
}

/// A prompt that cancels every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct DismissingPrompt;

impl TextPrompt for DismissingPrompt {
    fn request_text(&mut self, request: TextRequest, reply: TextReply) {
        tracing::debug!("Dismissing text request for {}", request.annotation_uid);
        reply.cancel();
    }
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum TextOutcome {
    /// A new annotation received its label and was completed.
    Completed {
        /// The annotation.
        annotation_uid: AnnotationUid,
        /// Its label.
        text: String,
    },
    /// A new annotation received no label and was removed.
    Discarded {
        /// The removed annotation.
        annotation_uid: AnnotationUid,
    },
    /// An existing annotation's label was replaced.
    Modified {
        /// The annotation.
        annotation_uid: AnnotationUid,
        /// Its new label.
        text: String,
    },
    /// The prompt was dismissed while editing an existing label.
    Unchanged {
        /// The annotation.
        annotation_uid: AnnotationUid,
    },
    /// The annotation left the store before the answer arrived.
    Orphaned {
        /// The missing annotation.
        annotation_uid: AnnotationUid,
    },
}

/// A text request awaiting its answer.
#[derive(Debug)]
pub struct TextSession {
    /// The request as sent to the prompt.
    pub request: TextRequest,
    /// Viewports to re-render once resolved.
    pub viewport_ids_to_render: BTreeSet<ViewportId>,
    /// Memo wrapping a label change, closed on resolution.
    pub memo: Option<MemoId>,
    receiver: oneshot::Receiver<Option<String>>,
}

impl TextSession {
    /// Open a session and the reply handle that resolves it.
    #[must_use]
    pub fn open(
        request: TextRequest,
        viewport_ids_to_render: BTreeSet<ViewportId>,
        memo: Option<MemoId>,
    ) -> (Self, TextReply) {
        let (sender, receiver) = oneshot::channel();
        let session = Self {
            request,
            viewport_ids_to_render,
            memo,
            receiver,
        };
        (session, TextReply(sender))
    }

    /// Check for an answer without blocking.
    ///
    /// Returns `None` while the prompt is outstanding, `Some(None)` if it was
    /// dismissed or the reply was dropped, and `Some(Some(text))` otherwise.
    pub fn try_answer(&mut self) -> Option<Option<String>> {
        match self.receiver.try_recv() {
            Ok(answer) => answer,
            Err(oneshot::Canceled) => Some(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> TextRequest {
        TextRequest {
            annotation_uid: AnnotationUid::new(),
            element: ElementId::from("el"),
            kind: TextEditKind::Create,
            current_text: None,
        }
    }

    #[test]
    fn test_session_pending_until_answered() {
        let (mut session, reply) = TextSession::open(request(), BTreeSet::new(), None);
        assert_eq!(session.try_answer(), None);

        reply.submit("Liver");
        assert_eq!(session.try_answer(), Some(Some("Liver".to_string())));
    }

    #[test]
    fn test_dropped_reply_reads_as_cancel() {
        let (mut session, reply) = TextSession::open(request(), BTreeSet::new(), None);
        drop(reply);
        assert_eq!(session.try_answer(), Some(None));
    }

    #[test]
    fn test_closure_prompt() {
        let mut seen = Vec::new();
        let mut prompt = |request: TextRequest, reply: TextReply| {
            seen.push(request.kind);
            reply.cancel();
        };
        let (mut session, reply) = TextSession::open(request(), BTreeSet::new(), None);
        prompt.request_text(session.request.clone(), reply);

        assert_eq!(session.try_answer(), Some(None));
        assert_eq!(seen, vec![TextEditKind::Create]);
    }
}
