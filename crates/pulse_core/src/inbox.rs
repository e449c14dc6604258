//! # Command Inbox
//!
//! Every hub owns one [`Inbox`]: the FIFO of deferred [`Command`]s
//! produced when queued observers match an emission.
//!
//! ## Single-Consumer Invariant
//!
//! Any thread may push (multiple producers emit concurrently), but
//! only the owning thread drains. The drain methods are not safe to
//! call concurrently with each other on the same inbox; this is a
//! usage contract, not a runtime check.
//!
//! ## Ordering
//!
//! Commands drain in emission order. Event priorities are carried as
//! data and do not reorder the queue.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::event::Event;
use crate::id::HubId;

/// Callback signature shared by direct and queued observers.
///
/// `Arc` so one registration can be invoked from clones without
/// re-boxing; `Send + Sync` because emission happens on arbitrary
/// threads.
pub type ObserverCallback = Arc<dyn Fn(Event) + Send + Sync>;

/// A deferred observer invocation: callback plus the event clone it
/// will receive. Owned by the receiver's inbox until invoked or
/// discarded.
#[derive(Clone)]
pub struct Command {
    callback: ObserverCallback,
    event: Event,
}

impl Command {
    pub(crate) fn new(callback: ObserverCallback, event: Event) -> Self {
        Self { callback, event }
    }

    /// Identity of the hub that emitted the wrapped event.
    #[must_use]
    pub fn sender(&self) -> HubId {
        self.event.sender()
    }

    /// The wrapped event.
    #[must_use]
    pub fn event(&self) -> &Event {
        &self.event
    }

    /// Runs the callback, consuming the command.
    pub fn invoke(self) {
        (self.callback)(self.event);
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("event", &self.event)
            .finish_non_exhaustive()
    }
}

/// Per-receiver FIFO of pending commands.
///
/// Callbacks always run with the inbox unlocked, so a draining
/// callback may itself emit (including back into this inbox).
#[derive(Default)]
pub struct Inbox {
    queue: Mutex<VecDeque<Command>>,
}

impl Inbox {
    /// Creates an empty inbox.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a command. Callable from any thread.
    pub fn push(&self, command: Command) {
        self.queue.lock().push_back(command);
    }

    /// Pops and executes exactly one command.
    ///
    /// Returns true if a command ran, false if the inbox was empty.
    pub fn drain_one(&self) -> bool {
        let next = self.queue.lock().pop_front();
        match next {
            Some(command) => {
                command.invoke();
                true
            }
            None => false,
        }
    }

    /// Pops and executes until the inbox is empty.
    ///
    /// Commands pushed by the executing callbacks are drained too.
    pub fn drain_all(&self) {
        while self.drain_one() {}
    }

    /// Discards everything but the most recent command, then executes
    /// only that one.
    ///
    /// "Most recent state" semantics for consumers (a render step)
    /// that do not want to replay every intermediate change.
    pub fn drain_latest(&self) {
        let latest = {
            let mut queue = self.queue.lock();
            let latest = queue.pop_back();
            queue.clear();
            latest
        };
        if let Some(command) = latest {
            command.invoke();
        }
    }

    /// Consumes the whole inbox but executes only the most recent
    /// command per distinct sender, in the order those senders last
    /// appeared.
    pub fn drain_latest_per_sender(&self) {
        let pending: Vec<Command> = {
            let mut queue = self.queue.lock();
            queue.drain(..).collect()
        };
        let mut kept: Vec<Command> = Vec::new();
        for command in pending {
            kept.retain(|c| c.sender() != command.sender());
            kept.push(command);
        }
        for command in kept {
            command.invoke();
        }
    }

    /// Visits every pending command, front to back, without consuming.
    ///
    /// The visitor runs with the inbox locked and must not push into
    /// or drain this inbox.
    pub fn for_each(&self, mut visitor: impl FnMut(&Command)) {
        for command in self.queue.lock().iter() {
            visitor(command);
        }
    }

    /// Visits every pending command, back to front, without consuming.
    ///
    /// Same locking contract as [`Inbox::for_each`].
    pub fn for_each_reverse(&self, mut visitor: impl FnMut(&Command)) {
        for command in self.queue.lock().iter().rev() {
            visitor(command);
        }
    }

    /// Discards all pending commands without invoking them.
    pub fn clear(&self) {
        self.queue.lock().clear();
    }

    /// Number of pending commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// True if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}
