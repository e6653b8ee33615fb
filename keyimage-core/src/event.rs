//! Input events delivered to the tool.

use serde::{Deserialize, Serialize};

use crate::{ElementId, Point2, Point3};

/// Named pointer/touch events the tool binds listeners for while modifying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ListenerKind {
    /// Mouse button released.
    MouseUp,
    /// Mouse moved with a button held.
    MouseDrag,
    /// Mouse clicked without dragging.
    MouseClick,
    /// Finger lifted.
    TouchEnd,
    /// Finger moved while down.
    TouchDrag,
    /// Finger tapped without dragging.
    TouchTap,
}

impl ListenerKind {
    /// Every listener the tool binds while a draw or drag is active.
    pub const MODIFY: [Self; 6] = [
        Self::MouseUp,
        Self::MouseDrag,
        Self::MouseClick,
        Self::TouchEnd,
        Self::TouchDrag,
        Self::TouchTap,
    ];

    /// Whether this event moves the handle (as opposed to ending the gesture).
    #[must_use]
    pub const fn is_drag(self) -> bool {
        matches!(self, Self::MouseDrag | Self::TouchDrag)
    }
}

/// Kind of input an [`InteractionEvent`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    /// Primary pointer pressed or finger down.
    Down,
    /// One of the modify listener events.
    Listener(ListenerKind),
    /// Double click or double tap.
    DoubleClick,
}

/// Event position in both coordinate spaces.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventPoints {
    /// Canvas position in CSS pixels.
    pub canvas: Point2,
    /// World position under the pointer.
    pub world: Point3,
}

/// A pointer or touch event scoped to one element.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionEvent {
    /// Element that received the event.
    pub element: ElementId,
    /// What happened.
    pub kind: EventKind,
    /// Where it happened.
    pub current: EventPoints,
    default_prevented: bool,
    propagation_stopped: bool,
}

impl InteractionEvent {
    /// Create a new event.
    #[must_use]
    pub fn new(element: ElementId, kind: EventKind, canvas: Point2, world: Point3) -> Self {
        Self {
            element,
            kind,
            current: EventPoints { canvas, world },
            default_prevented: false,
            propagation_stopped: false,
        }
    }

    /// Suppress the host's default handling.
    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    /// Stop other tools from seeing this event.
    pub fn stop_immediate_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    /// Whether [`prevent_default`](Self::prevent_default) was called.
    #[must_use]
    pub const fn default_prevented(&self) -> bool {
        self.default_prevented
    }

    /// Whether [`stop_immediate_propagation`](Self::stop_immediate_propagation) was called.
    #[must_use]
    pub const fn propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modify_listeners_split_into_drag_and_end() {
        let drags: Vec<_> = ListenerKind::MODIFY
            .iter()
            .filter(|kind| kind.is_drag())
            .collect();
        assert_eq!(drags, [&ListenerKind::MouseDrag, &ListenerKind::TouchDrag]);
    }

    #[test]
    fn test_event_flags_start_clear() {
        let mut event = InteractionEvent::new(
            ElementId::from("el"),
            EventKind::DoubleClick,
            Point2::default(),
            Point3::default(),
        );
        assert!(!event.default_prevented());
        assert!(!event.propagation_stopped());

        event.stop_immediate_propagation();
        assert!(event.propagation_stopped());
        assert!(!event.default_prevented());
    }
}
