//! # Thread Unit
//!
//! An event hub that owns a dedicated OS thread and a tri-state
//! lifecycle, arranged in a parent/child tree.
//!
//! ## Transition Table
//!
//! ```text
//! call          precondition        effect
//! ─────────────────────────────────────────────────────────────────────
//! start(sync)   Inactive            emit Start; Running; start children
//!                                   (async); spawn loop (inline if sync)
//! stop(sync)    not Inactive        stop children sync; emit End;
//!                                   request Inactive; wait + join if sync
//! pause(sync)   Running             emit Pause; request Paused; wait if sync
//! resume(sync)  not Inactive        emit Resume; request Running; wait if sync
//! ─────────────────────────────────────────────────────────────────────
//! ```
//!
//! An externally-requested synchronous stop therefore emits End twice:
//! once from the caller and once from the loop-exit path. Receivers
//! that must act exactly once key on the status, not the event count.
//!
//! ## Control Model
//!
//! `status` is written by the owning thread; `requested` is the
//! cross-thread control channel. The loop re-checks `requested` at
//! every iteration head - control is cooperative, a body blocked in a
//! long call cannot be stopped until it returns. Invalid transitions
//! warn through the sink and leave state untouched.

use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use pulse_core::{Event, EventHub, EventKind, HubId, IdAllocator, LogSink};

use crate::status::{StateCell, UnitStatus};

/// Behavior executed by a [`ThreadUnit`], one step per loop iteration.
///
/// Any `FnMut(&ThreadUnit) + Send + 'static` closure qualifies.
pub trait UnitBody: Send + 'static {
    /// One loop iteration, on the unit's own thread.
    fn step(&mut self, unit: &ThreadUnit);
}

impl<F> UnitBody for F
where
    F: FnMut(&ThreadUnit) + Send + 'static,
{
    fn step(&mut self, unit: &ThreadUnit) {
        self(unit);
    }
}

/// An event hub with a dedicated OS thread and a parent/child tree.
pub struct ThreadUnit {
    name: String,
    hub: EventHub,
    status: StateCell<UnitStatus>,
    requested: StateCell<UnitStatus>,
    children: Mutex<Vec<Arc<ThreadUnit>>>,
    parent: Mutex<Weak<ThreadUnit>>,
    body: Mutex<Option<Box<dyn UnitBody>>>,
    join: Mutex<Option<JoinHandle<()>>>,
    sink: Arc<dyn LogSink>,
}

impl ThreadUnit {
    /// Creates an inactive unit. The thread is created on
    /// [`ThreadUnit::start`], not here.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        body: impl UnitBody,
        ids: &IdAllocator,
        sink: Arc<dyn LogSink>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            hub: EventHub::new(ids, Arc::clone(&sink)),
            status: StateCell::new(UnitStatus::Inactive),
            requested: StateCell::new(UnitStatus::Inactive),
            children: Mutex::new(Vec::new()),
            parent: Mutex::new(Weak::new()),
            body: Mutex::new(Some(Box::new(body))),
            join: Mutex::new(None),
            sink,
        })
    }

    /// The unit's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The unit's event hub. Lifecycle transitions are emitted here.
    #[must_use]
    pub fn hub(&self) -> &EventHub {
        &self.hub
    }

    /// The unit's identity (same as its hub's).
    #[must_use]
    pub fn id(&self) -> HubId {
        self.hub.id()
    }

    /// Current lifecycle status.
    #[must_use]
    pub fn status(&self) -> UnitStatus {
        self.status.get()
    }

    /// Starts the unit: emits Start, marks it Running, starts all
    /// children (always asynchronously), then runs the loop: inline
    /// when `sync` is true (the call blocks until the whole run
    /// completes), on a freshly spawned OS thread otherwise.
    pub fn start(self: &Arc<Self>, sync: bool) {
        if self.status.get() != UnitStatus::Inactive {
            self.sink.warn(&format!(
                "unit '{}': start() ignored, already {}",
                self.name,
                self.status.get().as_str()
            ));
            return;
        }
        tracing::debug!(target: "pulse", unit = %self.name, sync, "starting");
        self.hub.emit(Event::new(EventKind::Start));
        self.requested.set(UnitStatus::Running);
        self.status.set(UnitStatus::Running);
        self.start_inactive_children();

        if sync {
            self.run_loop();
            return;
        }
        // A leftover handle from a previous run is detached; its loop
        // has already observed the Inactive request.
        let _previous = self.join.lock().take();
        let me = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || me.run_loop());
        match spawned {
            Ok(handle) => {
                *self.join.lock() = Some(handle);
            }
            Err(err) => {
                self.sink
                    .fatal(&format!("unit '{}': thread spawn failed: {err}", self.name));
                self.requested.set(UnitStatus::Inactive);
                self.status.set(UnitStatus::Inactive);
            }
        }
    }

    /// Stops the unit: stops all children synchronously first, emits
    /// End, then requests Inactive. When `sync` is true the call
    /// blocks until the loop has exited and the OS thread is joined.
    pub fn stop(&self, sync: bool) {
        if self.status.get() == UnitStatus::Inactive {
            self.sink.warn(&format!(
                "unit '{}': stop() ignored, already inactive",
                self.name
            ));
            return;
        }
        tracing::debug!(target: "pulse", unit = %self.name, sync, "stopping");
        self.stop_active_children();
        self.hub.emit(Event::new(EventKind::End));
        self.requested.set(UnitStatus::Inactive);
        if sync {
            self.status.wait_for(UnitStatus::Inactive);
            if let Some(handle) = self.join.lock().take() {
                if handle.join().is_err() {
                    self.sink
                        .warn(&format!("unit '{}': loop thread panicked", self.name));
                }
            }
        }
    }

    /// Pauses the unit: the current step (if any) completes, the next
    /// one does not begin. Blocks until the loop is parked when `sync`
    /// is true.
    pub fn pause(&self, sync: bool) {
        if self.status.get() != UnitStatus::Running {
            self.sink.warn(&format!(
                "unit '{}': pause() ignored, not running",
                self.name
            ));
            return;
        }
        tracing::debug!(target: "pulse", unit = %self.name, sync, "pausing");
        self.hub.emit(Event::new(EventKind::Pause));
        self.requested.set(UnitStatus::Paused);
        if sync {
            self.status.wait_for(UnitStatus::Paused);
        }
    }

    /// Resumes a paused unit. Blocks until the loop reports Running
    /// when `sync` is true.
    pub fn resume(&self, sync: bool) {
        if self.status.get() == UnitStatus::Inactive {
            self.sink.warn(&format!(
                "unit '{}': resume() ignored, inactive",
                self.name
            ));
            return;
        }
        tracing::debug!(target: "pulse", unit = %self.name, sync, "resuming");
        self.hub.emit(Event::new(EventKind::Resume));
        self.requested.set(UnitStatus::Running);
        if sync {
            self.status.wait_for(UnitStatus::Running);
        }
    }

    /// Adds `child` to this unit's subtree. A child already owned by
    /// another parent is synchronously detached from it first; a unit
    /// has at most one parent.
    pub fn add_child(self: &Arc<Self>, child: &Arc<ThreadUnit>) {
        // Take the upgrade out of the lock before detaching:
        // remove_child re-locks child.parent, and the guard of an
        // if-let scrutinee lives for the whole body.
        let old_parent = child.parent.lock().upgrade();
        if let Some(old_parent) = old_parent {
            old_parent.remove_child(child);
        }
        *child.parent.lock() = Arc::downgrade(self);
        self.children.lock().push(Arc::clone(child));
    }

    /// Synchronously stops `child` and detaches it from this unit.
    pub fn remove_child(&self, child: &Arc<ThreadUnit>) {
        if child.status.get() != UnitStatus::Inactive {
            child.stop(true);
        }
        self.children.lock().retain(|c| c.id() != child.id());
        *child.parent.lock() = Weak::new();
    }

    /// Identity of this unit's parent, if it has one.
    #[must_use]
    pub fn parent_id(&self) -> Option<HubId> {
        self.parent.lock().upgrade().map(|p| p.id())
    }

    /// Number of direct children.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.children.lock().len()
    }

    fn start_inactive_children(&self) {
        let children = self.children.lock().clone();
        for child in children {
            if child.status.get() == UnitStatus::Inactive {
                child.start(false);
            }
        }
    }

    fn stop_active_children(&self) {
        let children = self.children.lock().clone();
        for child in children {
            if child.status.get() != UnitStatus::Inactive {
                child.stop(true);
            }
        }
    }

    /// The owning thread's loop: observes `requested` at every
    /// iteration head, publishes `status` to match (Inactive wins over
    /// Paused, Paused over Running), and steps the body while Running.
    /// While Paused the loop parks on the control cell instead of
    /// spinning. On exit: status Inactive, children stopped
    /// synchronously, End emitted.
    fn run_loop(self: &Arc<Self>) {
        let mut body = self.body.lock().take();
        loop {
            match self.requested.get() {
                UnitStatus::Inactive => break,
                UnitStatus::Paused => {
                    self.status.set(UnitStatus::Paused);
                    self.requested.wait_until(|r| r != UnitStatus::Paused);
                }
                UnitStatus::Running => {
                    if self.status.get() != UnitStatus::Running {
                        self.status.set(UnitStatus::Running);
                    }
                    if let Some(active) = body.as_mut() {
                        active.step(self);
                    }
                }
            }
        }
        // Restore the body before publishing Inactive so a restart
        // never observes a missing body.
        *self.body.lock() = body;
        self.status.set(UnitStatus::Inactive);
        self.stop_active_children();
        self.hub.emit(Event::new(EventKind::End));
        tracing::debug!(target: "pulse", unit = %self.name, "loop exited");
    }
}

impl Drop for ThreadUnit {
    fn drop(&mut self) {
        // Safety net for inline (sync-start) runs; a spawned loop
        // holds its own Arc and keeps the unit alive until exit.
        if self.status.get() != UnitStatus::Inactive {
            self.stop(true);
        }
    }
}

impl std::fmt::Debug for ThreadUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadUnit")
            .field("name", &self.name)
            .field("id", &self.id())
            .field("status", &self.status.get())
            .finish_non_exhaustive()
    }
}
