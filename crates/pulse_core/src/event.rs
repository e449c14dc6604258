//! # Event Values
//!
//! An [`Event`] is an immutable, cloneable value: a kind tag, an
//! integer priority and a closed payload variant. Events are cloned at
//! emission time so every observer sees its own instance - a received
//! copy can be mutated freely without affecting anyone else.

use crate::id::HubId;

/// Closed set of event kinds.
///
/// `Any` is the wildcard: observers registered under `Any` receive
/// every emission regardless of kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Wildcard; matches every emission.
    Any,
    /// A lifecycle object began running.
    Start,
    /// A lifecycle object finished running.
    End,
    /// A paused lifecycle object was resumed.
    Resume,
    /// A lifecycle object was paused.
    Pause,
    /// Observable state changed (geometry, materials, simulation state).
    Modified,
    /// A key was pressed or released.
    KeyPress,
    /// Pointer motion or button activity.
    MouseEvent,
    /// Emitted around a loop step, before the step body.
    PreUpdate,
    /// Emitted around a loop step, after the step body.
    PostUpdate,
    /// Configuration changed.
    Configure,
}

/// Payload carried by an event.
///
/// A closed tagged variant: receivers match on it, there is no
/// downcasting.
#[derive(Clone, Debug, PartialEq)]
pub enum EventPayload {
    /// No payload.
    None,
    /// Keyboard input.
    Key {
        /// Platform key code.
        code: u32,
        /// True on press, false on release.
        pressed: bool,
    },
    /// Pointer input.
    Mouse {
        /// Horizontal position.
        x: f64,
        /// Vertical position.
        y: f64,
        /// Button index, 0 if none.
        button: u8,
    },
    /// A single numeric value.
    Scalar(f64),
    /// Free-form text (console lines, configure keys).
    Text(String),
}

/// An immutable notification value.
///
/// Built with [`Event::new`] and the `with_*` builders. The sender
/// identity is stamped by [`EventHub::emit`](crate::hub::EventHub::emit);
/// before emission it is [`HubId::NONE`].
#[derive(Clone, Debug)]
pub struct Event {
    /// Kind tag.
    pub kind: EventKind,
    /// Priority; defaults to 0, higher compares greater. Carried as
    /// data for receivers to branch on - queued delivery stays FIFO.
    pub priority: i32,
    /// Payload variant.
    pub payload: EventPayload,
    sender: HubId,
}

impl Event {
    /// Creates an event of the given kind with priority 0 and no payload.
    #[must_use]
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            priority: 0,
            payload: EventPayload::None,
            sender: HubId::NONE,
        }
    }

    /// Sets the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the payload.
    #[must_use]
    pub fn with_payload(mut self, payload: EventPayload) -> Self {
        self.payload = payload;
        self
    }

    /// Identity of the hub that emitted this event, or [`HubId::NONE`]
    /// if it has not been emitted yet.
    #[must_use]
    pub fn sender(&self) -> HubId {
        self.sender
    }

    pub(crate) fn stamp_sender(&mut self, sender: HubId) {
        self.sender = sender;
    }
}
