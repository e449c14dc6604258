//! # Event Hub
//!
//! Per-instance publish/subscribe dispatcher. Each hub keeps, per
//! [`EventKind`], a list of *direct* observers (run synchronously on
//! the emitting thread) and a list of *queued* observers (a
//! [`Command`] is pushed into the **receiver's** own inbox, drained
//! later on the receiver's thread). The sender never touches the
//! receiver's processing, only its thread-safe inbox.
//!
//! ## Liveness
//!
//! Registrations are pruned lazily during emission:
//!
//! - a queued observer dies when its receiver's inbox is dropped
//!   (the `Weak` no longer upgrades);
//! - a direct observer dies when its [`Subscription`] guard drops;
//! - a channel bridge dies when its receiver end drops.
//!
//! There is no teardown notification; lifetime discipline is the
//! caller's job.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use crossbeam_channel::{bounded, Receiver, TrySendError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::event::{Event, EventKind};
use crate::id::{HubId, IdAllocator};
use crate::inbox::{Command, Inbox, ObserverCallback};
use crate::sink::LogSink;

/// Guard for a direct observer registration.
///
/// Dropping the guard disconnects the observer; it is pruned on the
/// next emission of its kind. Call [`Subscription::detach`] to keep
/// the observer alive for the lifetime of the hub instead.
#[must_use = "dropping a Subscription disconnects the observer"]
pub struct Subscription {
    alive: Arc<AtomicBool>,
    detached: bool,
}

impl Subscription {
    fn new(alive: Arc<AtomicBool>) -> Self {
        Self {
            alive,
            detached: false,
        }
    }

    /// Keeps the observer registered after the guard is gone.
    pub fn detach(mut self) {
        self.detached = true;
    }

    /// Disconnects the observer now. Equivalent to dropping the guard.
    pub fn cancel(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if !self.detached {
            self.alive.store(false, Ordering::Release);
        }
    }
}

struct DirectObserver {
    alive: Arc<AtomicBool>,
    callback: ObserverCallback,
}

struct QueuedObserver {
    receiver: HubId,
    inbox: Weak<Inbox>,
    callback: ObserverCallback,
}

#[derive(Default)]
struct KindSlots {
    direct: Vec<DirectObserver>,
    queued: Vec<QueuedObserver>,
}

/// Per-instance publish/subscribe hub.
///
/// Also the receiver half: the hub owns the [`Inbox`] that queued
/// commands addressed to it land in. The inbox must only be drained
/// from the owning thread; emission is safe from any thread.
pub struct EventHub {
    id: HubId,
    inbox: Arc<Inbox>,
    slots: Mutex<HashMap<EventKind, KindSlots>>,
    sink: Arc<dyn LogSink>,
}

impl EventHub {
    /// Creates a hub with an identity from `ids`, reporting through
    /// `sink`.
    #[must_use]
    pub fn new(ids: &IdAllocator, sink: Arc<dyn LogSink>) -> Self {
        Self {
            id: ids.allocate(),
            inbox: Arc::new(Inbox::new()),
            slots: Mutex::new(HashMap::new()),
            sink,
        }
    }

    /// This hub's identity.
    #[must_use]
    pub fn id(&self) -> HubId {
        self.id
    }

    /// The hub's own inbox. Drain only from the owning thread.
    #[must_use]
    pub fn inbox(&self) -> &Arc<Inbox> {
        &self.inbox
    }

    /// The sink this hub reports through.
    #[must_use]
    pub fn sink(&self) -> &Arc<dyn LogSink> {
        &self.sink
    }

    /// Registers a queued observer: emissions of `kind` from this hub
    /// place a command in `receiver`'s inbox, to be drained on the
    /// receiver's thread.
    pub fn connect(
        &self,
        kind: EventKind,
        receiver: &EventHub,
        callback: impl Fn(Event) + Send + Sync + 'static,
    ) {
        let mut slots = self.slots.lock();
        slots.entry(kind).or_default().queued.push(QueuedObserver {
            receiver: receiver.id,
            inbox: Arc::downgrade(&receiver.inbox),
            callback: Arc::new(callback),
        });
    }

    /// Registers a direct observer, invoked synchronously from
    /// whichever thread emits. The callback must be cheap and safe to
    /// run on an arbitrary thread.
    pub fn connect_direct(
        &self,
        kind: EventKind,
        callback: impl Fn(Event) + Send + Sync + 'static,
    ) -> Subscription {
        let alive = Arc::new(AtomicBool::new(true));
        let mut slots = self.slots.lock();
        slots.entry(kind).or_default().direct.push(DirectObserver {
            alive: Arc::clone(&alive),
            callback: Arc::new(callback),
        });
        Subscription::new(alive)
    }

    /// Bridges emissions of `kind` onto a bounded channel for
    /// consumers that poll from their own loop without owning an
    /// inbox. When the channel is full the event is dropped; when the
    /// receiver end is gone the bridge disconnects itself.
    #[must_use]
    pub fn connect_channel(&self, kind: EventKind, capacity: usize) -> Receiver<Event> {
        let (tx, rx) = bounded(capacity);
        let alive = Arc::new(AtomicBool::new(true));
        let alive_for_bridge = Arc::clone(&alive);
        let bridge = move |event: Event| {
            match tx.try_send(event) {
                // Full: drop the event, the consumer is behind.
                Ok(()) | Err(TrySendError::Full(_)) => {}
                Err(TrySendError::Disconnected(_)) => {
                    alive_for_bridge.store(false, Ordering::Release);
                }
            }
        };
        let mut slots = self.slots.lock();
        slots.entry(kind).or_default().direct.push(DirectObserver {
            alive,
            callback: Arc::new(bridge),
        });
        rx
    }

    /// Removes every queued observer of `kind` whose receiver is
    /// `receiver`. Removal is by receiver identity only: two different
    /// callbacks registered for the same (kind, receiver) pair cannot
    /// be told apart. Idempotent.
    pub fn disconnect(&self, receiver: HubId, kind: EventKind) {
        let mut slots = self.slots.lock();
        if let Some(kind_slots) = slots.get_mut(&kind) {
            kind_slots.queued.retain(|q| q.receiver != receiver);
        }
    }

    /// Publishes an event.
    ///
    /// The sender identity is stamped, then for the event's kind and
    /// for [`EventKind::Any`]: direct observers run synchronously in
    /// registration order, each on its own clone; queued observers
    /// each get a command pushed into their receiver's inbox, in
    /// emission order. Dead registrations are pruned during the pass.
    /// Callbacks run with the hub unlocked, so observers may connect
    /// or emit reentrantly.
    pub fn emit(&self, mut event: Event) {
        event.stamp_sender(self.id);

        let mut direct: Vec<ObserverCallback> = Vec::new();
        {
            let mut slots = self.slots.lock();
            dispatch_kind(&mut slots, event.kind, &event, &mut direct);
            if event.kind != EventKind::Any {
                dispatch_kind(&mut slots, EventKind::Any, &event, &mut direct);
            }
        }
        for callback in direct {
            callback(event.clone());
        }
    }
}

/// Collects live direct callbacks and pushes queued commands for one
/// kind slot, pruning dead entries.
fn dispatch_kind(
    slots: &mut HashMap<EventKind, KindSlots>,
    kind: EventKind,
    event: &Event,
    direct: &mut Vec<ObserverCallback>,
) {
    let Some(kind_slots) = slots.get_mut(&kind) else {
        return;
    };
    kind_slots
        .direct
        .retain(|d| d.alive.load(Ordering::Acquire));
    for observer in &kind_slots.direct {
        direct.push(Arc::clone(&observer.callback));
    }
    kind_slots.queued.retain(|q| match q.inbox.upgrade() {
        Some(inbox) => {
            inbox.push(Command::new(Arc::clone(&q.callback), event.clone()));
            true
        }
        None => false,
    });
}

impl std::fmt::Debug for EventHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHub")
            .field("id", &self.id)
            .field("pending", &self.inbox.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventPayload;
    use crate::sink::NullSink;

    fn hub(ids: &IdAllocator) -> EventHub {
        EventHub::new(ids, Arc::new(NullSink))
    }

    #[test]
    fn test_direct_delivery_is_synchronous_and_ordered() {
        let ids = IdAllocator::new();
        let sender = hub(&ids);
        let log = Arc::new(Mutex::new(Vec::new()));

        let log_a = Arc::clone(&log);
        let sub_a = sender.connect_direct(EventKind::Modified, move |_| {
            log_a.lock().push("a");
        });
        let log_b = Arc::clone(&log);
        let sub_b = sender.connect_direct(EventKind::Modified, move |_| {
            log_b.lock().push("b");
        });

        sender.emit(Event::new(EventKind::Modified));
        // Both ran, in registration order, before emit returned.
        assert_eq!(*log.lock(), vec!["a", "b"]);

        drop(sub_a);
        drop(sub_b);
    }

    #[test]
    fn test_queued_delivery_is_per_receiver_fifo() {
        let ids = IdAllocator::new();
        let sender = hub(&ids);
        let receiver = hub(&ids);
        let log = Arc::new(Mutex::new(Vec::new()));

        let log_cb = Arc::clone(&log);
        sender.connect(EventKind::Modified, &receiver, move |e| {
            if let EventPayload::Scalar(v) = e.payload {
                log_cb.lock().push(v);
            }
        });

        sender.emit(Event::new(EventKind::Modified).with_payload(EventPayload::Scalar(1.0)));
        sender.emit(Event::new(EventKind::Modified).with_payload(EventPayload::Scalar(2.0)));
        assert!(log.lock().is_empty());

        receiver.inbox().drain_all();
        assert_eq!(*log.lock(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_disconnect_is_effective_and_idempotent() {
        let ids = IdAllocator::new();
        let sender = hub(&ids);
        let receiver = hub(&ids);

        sender.connect(EventKind::Modified, &receiver, |_| {});
        sender.emit(Event::new(EventKind::Modified));
        assert_eq!(receiver.inbox().len(), 1);
        receiver.inbox().clear();

        sender.disconnect(receiver.id(), EventKind::Modified);
        sender.emit(Event::new(EventKind::Modified));
        assert!(receiver.inbox().is_empty());

        // Disconnecting an already-disconnected pair is a no-op.
        sender.disconnect(receiver.id(), EventKind::Modified);
    }

    #[test]
    fn test_dropped_receiver_is_pruned() {
        let ids = IdAllocator::new();
        let sender = hub(&ids);
        let receiver = hub(&ids);
        sender.connect(EventKind::Modified, &receiver, |_| {});
        drop(receiver);
        // Emission after the receiver is gone neither panics nor leaks
        // the registration.
        sender.emit(Event::new(EventKind::Modified));
        sender.emit(Event::new(EventKind::Modified));
    }

    #[test]
    fn test_dropped_subscription_stops_direct_delivery() {
        let ids = IdAllocator::new();
        let sender = hub(&ids);
        let count = Arc::new(Mutex::new(0u32));

        let count_cb = Arc::clone(&count);
        let sub = sender.connect_direct(EventKind::Modified, move |_| {
            *count_cb.lock() += 1;
        });
        sender.emit(Event::new(EventKind::Modified));
        drop(sub);
        sender.emit(Event::new(EventKind::Modified));
        assert_eq!(*count.lock(), 1);
    }

    #[test]
    fn test_any_kind_receives_every_emission() {
        let ids = IdAllocator::new();
        let sender = hub(&ids);
        let log = Arc::new(Mutex::new(Vec::new()));

        let log_cb = Arc::clone(&log);
        sender
            .connect_direct(EventKind::Any, move |e| {
                log_cb.lock().push(e.kind);
            })
            .detach();

        sender.emit(Event::new(EventKind::KeyPress));
        sender.emit(Event::new(EventKind::Modified));
        assert_eq!(*log.lock(), vec![EventKind::KeyPress, EventKind::Modified]);
    }

    #[test]
    fn test_sender_identity_is_stamped() {
        let ids = IdAllocator::new();
        let sender = hub(&ids);
        let receiver = hub(&ids);
        sender.connect(EventKind::Modified, &receiver, |_| {});
        sender.emit(Event::new(EventKind::Modified));

        let mut stamped = Vec::new();
        receiver.inbox().for_each(|c| stamped.push(c.sender()));
        assert_eq!(stamped, vec![sender.id()]);
    }

    #[test]
    fn test_channel_bridge_delivers_and_drops_when_full() {
        let ids = IdAllocator::new();
        let sender = hub(&ids);
        let rx = sender.connect_channel(EventKind::KeyPress, 2);

        for _ in 0..3 {
            sender.emit(Event::new(EventKind::KeyPress));
        }
        // Capacity 2: the third emission was dropped, not blocked on.
        assert_eq!(rx.try_iter().count(), 2);

        drop(rx);
        // Bridge disconnects itself once the receiver end is gone.
        sender.emit(Event::new(EventKind::KeyPress));
    }

    #[test]
    fn test_direct_observer_may_connect_reentrantly() {
        let ids = IdAllocator::new();
        let sender = Arc::new(hub(&ids));
        let sender_inner = Arc::clone(&sender);
        sender
            .connect_direct(EventKind::Configure, move |_| {
                sender_inner
                    .connect_direct(EventKind::Modified, |_| {})
                    .detach();
            })
            .detach();
        sender.emit(Event::new(EventKind::Configure));
        sender.emit(Event::new(EventKind::Configure));
    }
}
