//! # Module
//!
//! A driver-owned lifecycle object with no thread of its own: the
//! state machine advances on whatever thread calls
//! [`Module::start`], which blocks for the module's whole run.
//!
//! ## State Machine
//!
//! ```text
//! inactive ──> starting ──> running <──────> pausing ──> paused
//!                              │                            │
//!                              └────── terminating <────────┘
//!                                          │
//!                                       inactive
//! ```
//!
//! Unlike [`ThreadUnit`](crate::thread_unit::ThreadUnit) there is no
//! request/observe split: [`Module::pause`], [`Module::run`] and
//! [`Module::end`] write the status directly, and the blocking calls
//! park on the status cell until the loop acknowledges.
//!
//! [`ExecutionType`] is a declarative scheduling hint for whatever
//! driver owns the module; the module itself does not enforce it.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use pulse_core::{Event, EventHub, EventKind, HubId, IdAllocator, LogSink};

use crate::pacing::{idle_wait, remaining, step_due};
use crate::status::{AtomicState, StateCell};

/// States of a [`Module`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModuleStatus {
    /// Not started, or finished.
    Inactive,
    /// `init` is running.
    Starting,
    /// The update loop is executing steps.
    Running,
    /// Pause requested; the loop has not acknowledged yet.
    Pausing,
    /// The loop is parked between steps.
    Paused,
    /// Termination requested; the loop is unwinding.
    Terminating,
}

impl ModuleStatus {
    /// Human-readable name, for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ModuleStatus::Inactive => "inactive",
            ModuleStatus::Starting => "starting",
            ModuleStatus::Running => "running",
            ModuleStatus::Pausing => "pausing",
            ModuleStatus::Paused => "paused",
            ModuleStatus::Terminating => "terminating",
        }
    }
}

impl AtomicState for ModuleStatus {
    fn to_bits(self) -> u8 {
        match self {
            ModuleStatus::Inactive => 0,
            ModuleStatus::Starting => 1,
            ModuleStatus::Running => 2,
            ModuleStatus::Pausing => 3,
            ModuleStatus::Paused => 4,
            ModuleStatus::Terminating => 5,
        }
    }

    fn from_bits(bits: u8) -> Self {
        match bits {
            1 => ModuleStatus::Starting,
            2 => ModuleStatus::Running,
            3 => ModuleStatus::Pausing,
            4 => ModuleStatus::Paused,
            5 => ModuleStatus::Terminating,
            _ => ModuleStatus::Inactive,
        }
    }
}

/// How a module wants its driver to schedule it. A hint only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionType {
    /// Run interleaved with the other modules on one thread.
    Sequential,
    /// Run on a thread of its own.
    Parallel,
    /// The driver decides per load.
    Adaptive,
}

/// The simulation behavior a [`Module`] advances.
pub trait ModuleBehavior: Send {
    /// One-time setup, on the module's calling thread.
    fn init(&mut self);
    /// One rate-limited step. `dt` is the wall-clock time in seconds
    /// since the previous step (0 for the first).
    fn update(&mut self, dt: f64);
    /// Teardown, after termination is requested.
    fn uninit(&mut self);
}

/// Hook injected around each update by a driver. Plain callables, not
/// events.
pub type ModuleHook = Box<dyn FnMut() + Send>;

/// A driver-owned, threadless lifecycle object.
pub struct Module {
    name: String,
    hub: EventHub,
    status: StateCell<ModuleStatus>,
    initialized: StateCell<bool>,
    execution: ExecutionType,
    delay_ms: Mutex<f64>,
    dt: Mutex<f64>,
    behavior: Mutex<Option<Box<dyn ModuleBehavior>>>,
    pre_step: Mutex<Option<ModuleHook>>,
    post_step: Mutex<Option<ModuleHook>>,
    sink: Arc<dyn LogSink>,
}

impl Module {
    /// Creates an inactive module stepping `behavior` every
    /// `delay_ms` milliseconds (0 = as fast as possible).
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        execution: ExecutionType,
        behavior: impl ModuleBehavior + 'static,
        delay_ms: f64,
        ids: &IdAllocator,
        sink: Arc<dyn LogSink>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            hub: EventHub::new(ids, Arc::clone(&sink)),
            status: StateCell::new(ModuleStatus::Inactive),
            initialized: StateCell::new(false),
            execution,
            delay_ms: Mutex::new(delay_ms.max(0.0)),
            dt: Mutex::new(0.0),
            behavior: Mutex::new(Some(Box::new(behavior))),
            pre_step: Mutex::new(None),
            post_step: Mutex::new(None),
            sink,
        })
    }

    /// The module's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The module's event hub.
    #[must_use]
    pub fn hub(&self) -> &EventHub {
        &self.hub
    }

    /// The module's identity (same as its hub's).
    #[must_use]
    pub fn id(&self) -> HubId {
        self.hub.id()
    }

    /// Current state.
    #[must_use]
    pub fn status(&self) -> ModuleStatus {
        self.status.get()
    }

    /// The module's scheduling hint.
    #[must_use]
    pub fn execution_type(&self) -> ExecutionType {
        self.execution
    }

    /// True once `init` has completed and until `uninit` runs.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized.get()
    }

    /// Wall-clock seconds between the two most recent steps.
    #[must_use]
    pub fn dt(&self) -> f64 {
        *self.dt.lock()
    }

    /// Blocks until `init` has completed.
    pub fn wait_initialized(&self) {
        self.initialized.wait_for(true);
    }

    /// Installs a hook called before every update.
    pub fn set_pre_step_hook(&self, hook: ModuleHook) {
        *self.pre_step.lock() = Some(hook);
    }

    /// Installs a hook called after every update.
    pub fn set_post_step_hook(&self, hook: ModuleHook) {
        *self.post_step.lock() = Some(hook);
    }

    /// Runs the module on the calling thread, blocking until
    /// termination: `init`, publish `initialized`, then the
    /// rate-limited update loop until [`Module::end`] (or a driver
    /// stop request) flips the state to Terminating, then `uninit`.
    pub fn start(&self) {
        if self.status.get() != ModuleStatus::Inactive {
            self.sink.warn(&format!(
                "module '{}': start() ignored, already {}",
                self.name,
                self.status.get().as_str()
            ));
            return;
        }
        tracing::debug!(target: "pulse", module = %self.name, "starting");
        self.status.set(ModuleStatus::Starting);
        self.hub.emit(Event::new(EventKind::Start));

        let mut behavior = self.behavior.lock().take();
        if let Some(active) = behavior.as_mut() {
            active.init();
        }
        self.initialized.set(true);
        // compare_set: a Terminating requested during init must survive.
        let _ = self
            .status
            .compare_set(ModuleStatus::Starting, ModuleStatus::Running);

        let mut last_step: Option<Instant> = None;
        loop {
            match self.status.get() {
                ModuleStatus::Terminating | ModuleStatus::Inactive => break,
                ModuleStatus::Pausing => {
                    // compare_set so a concurrent end() is not overwritten.
                    let _ = self.status.compare_set(ModuleStatus::Pausing, ModuleStatus::Paused);
                }
                ModuleStatus::Paused => {
                    self.status.wait_until(|s| s != ModuleStatus::Paused);
                }
                ModuleStatus::Running => {
                    let delay_ms = *self.delay_ms.lock();
                    let now = Instant::now();
                    if !step_due(last_step, now, delay_ms) {
                        idle_wait(remaining(last_step, now, delay_ms));
                        continue;
                    }
                    let dt = match last_step {
                        Some(previous) => now.duration_since(previous).as_secs_f64(),
                        None => 0.0,
                    };
                    last_step = Some(now);
                    *self.dt.lock() = dt;

                    if let Some(hook) = self.pre_step.lock().as_mut() {
                        hook();
                    }
                    if let Some(active) = behavior.as_mut() {
                        active.update(dt);
                    }
                    if let Some(hook) = self.post_step.lock().as_mut() {
                        hook();
                    }
                }
                ModuleStatus::Starting => {
                    let _ = self.status.compare_set(ModuleStatus::Starting, ModuleStatus::Running);
                }
            }
        }

        if let Some(active) = behavior.as_mut() {
            active.uninit();
        }
        *self.behavior.lock() = behavior;
        self.initialized.set(false);
        self.status.set(ModuleStatus::Inactive);
        self.hub.emit(Event::new(EventKind::End));
        tracing::debug!(target: "pulse", module = %self.name, "ended");
    }

    /// Requests a pause and blocks until the loop is parked.
    pub fn pause(&self) {
        if self.status.get() != ModuleStatus::Running {
            self.sink.warn(&format!(
                "module '{}': pause() ignored, not running",
                self.name
            ));
            return;
        }
        self.hub.emit(Event::new(EventKind::Pause));
        self.status.set(ModuleStatus::Pausing);
        self.status
            .wait_until(|s| s == ModuleStatus::Paused || s == ModuleStatus::Inactive);
    }

    /// Resumes a paused module. Does not block: the loop picks the
    /// state change up at its next iteration.
    pub fn run(&self) {
        match self.status.get() {
            ModuleStatus::Paused | ModuleStatus::Pausing => {
                self.hub.emit(Event::new(EventKind::Resume));
                self.status.set(ModuleStatus::Running);
            }
            other => {
                self.sink.warn(&format!(
                    "module '{}': run() ignored while {}",
                    self.name,
                    other.as_str()
                ));
            }
        }
    }

    /// Requests termination and blocks until the loop has unwound and
    /// the module is Inactive again.
    pub fn end(&self) {
        if self.status.get() == ModuleStatus::Inactive {
            self.sink.warn(&format!(
                "module '{}': end() ignored, already inactive",
                self.name
            ));
            return;
        }
        self.status.set(ModuleStatus::Terminating);
        self.status.wait_for(ModuleStatus::Inactive);
    }

    /// Like [`Module::end`] but without blocking; used by drivers
    /// fanning a stop request out to many modules before waiting.
    pub fn request_end(&self) {
        if self.status.get() != ModuleStatus::Inactive {
            self.status.set(ModuleStatus::Terminating);
        }
    }
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("status", &self.status.get())
            .field("execution", &self.execution)
            .finish_non_exhaustive()
    }
}
