//! # Loop Unit
//!
//! A [`ThreadUnit`] whose body is a fixed-rate (or unthrottled) update
//! step with optional updates-per-second tracking.
//!
//! ## Step Bracketing
//!
//! Each executed step emits `PostUpdate` *before* the step body and
//! `PreUpdate` *after* it. The names read inverted; the ordering is
//! kept for compatibility with existing consumers, which treat
//! `PostUpdate` as "the previous state is complete" and `PreUpdate`
//! as "the next state is about to be computed".
//!
//! ## Throttling
//!
//! `loop_delay_ms == 0` means unthrottled: the step runs on every loop
//! iteration. Otherwise the step executes only when the delay has
//! elapsed since the previous executed step; in between the loop naps
//! in short bounded slices, so pause/stop requests are still observed
//! within about a millisecond.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use pulse_core::{Event, EventHub, EventKind, HubId, IdAllocator, LogSink, RateCounter};

use crate::pacing::{idle_wait, remaining, step_due, DELAY_EPSILON_MS};
use crate::status::UnitStatus;
use crate::thread_unit::{ThreadUnit, UnitBody};

/// Update step executed by a [`LoopUnit`].
///
/// Any `FnMut(&ThreadUnit) + Send + 'static` closure qualifies. The
/// unit reference gives the step access to its own hub and inbox.
pub trait LoopStep: Send + 'static {
    /// One rate-limited update, on the unit's own thread.
    fn update(&mut self, unit: &ThreadUnit);
}

impl<F> LoopStep for F
where
    F: FnMut(&ThreadUnit) + Send + 'static,
{
    fn update(&mut self, unit: &ThreadUnit) {
        self(unit);
    }
}

/// Shared throttle/rate state, adjustable while the loop runs.
struct LoopTiming {
    delay_ms: Mutex<f64>,
    track_rate: AtomicBool,
    counter: RateCounter,
}

/// The loop body installed into the underlying [`ThreadUnit`].
struct LoopBody<S: LoopStep> {
    timing: Arc<LoopTiming>,
    step: S,
    last_step: Option<Instant>,
}

impl<S: LoopStep> UnitBody for LoopBody<S> {
    fn step(&mut self, unit: &ThreadUnit) {
        let delay_ms = *self.timing.delay_ms.lock();
        let now = Instant::now();
        if !step_due(self.last_step, now, delay_ms) {
            // Not due yet: nap briefly and fall back to the loop head
            // so lifecycle requests are re-checked.
            idle_wait(remaining(self.last_step, now, delay_ms));
            return;
        }
        self.last_step = Some(now);

        let tracking = self.timing.track_rate.load(Ordering::Relaxed);
        unit.hub().emit(Event::new(EventKind::PostUpdate));
        if tracking {
            self.timing.counter.begin_step();
        }
        self.step.update(unit);
        if tracking {
            self.timing.counter.end_step();
        }
        unit.hub().emit(Event::new(EventKind::PreUpdate));
    }
}

/// A fixed-rate (or unthrottled) update loop on its own OS thread.
///
/// Thin wrapper around a [`ThreadUnit`]; lifecycle calls forward to
/// it, and the unit is reachable through [`LoopUnit::unit`] for tree
/// composition.
pub struct LoopUnit {
    unit: Arc<ThreadUnit>,
    timing: Arc<LoopTiming>,
    sink: Arc<dyn LogSink>,
}

impl LoopUnit {
    /// Creates an inactive loop unit stepping `step` every
    /// `loop_delay_ms` milliseconds (0 = unthrottled).
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        step: impl LoopStep,
        loop_delay_ms: f64,
        ids: &IdAllocator,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        let timing = Arc::new(LoopTiming {
            delay_ms: Mutex::new(loop_delay_ms.max(0.0)),
            track_rate: AtomicBool::new(false),
            counter: RateCounter::new(),
        });
        let body = LoopBody {
            timing: Arc::clone(&timing),
            step,
            last_step: None,
        };
        let unit = ThreadUnit::new(name, body, ids, Arc::clone(&sink));
        Self { unit, timing, sink }
    }

    /// The underlying thread unit, for tree composition
    /// (`parent.unit().add_child(child.unit())`).
    #[must_use]
    pub fn unit(&self) -> &Arc<ThreadUnit> {
        &self.unit
    }

    /// The unit's event hub.
    #[must_use]
    pub fn hub(&self) -> &EventHub {
        self.unit.hub()
    }

    /// The unit's identity.
    #[must_use]
    pub fn id(&self) -> HubId {
        self.unit.id()
    }

    /// Current lifecycle status.
    #[must_use]
    pub fn status(&self) -> UnitStatus {
        self.unit.status()
    }

    /// Starts the loop. See [`ThreadUnit::start`].
    pub fn start(&self, sync: bool) {
        self.unit.start(sync);
    }

    /// Stops the loop. See [`ThreadUnit::stop`].
    pub fn stop(&self, sync: bool) {
        self.unit.stop(sync);
    }

    /// Pauses the loop. See [`ThreadUnit::pause`].
    pub fn pause(&self, sync: bool) {
        self.unit.pause(sync);
    }

    /// Resumes the loop. See [`ThreadUnit::resume`].
    pub fn resume(&self, sync: bool) {
        self.unit.resume(sync);
    }

    /// Target delay between executed steps, in milliseconds.
    #[must_use]
    pub fn loop_delay_ms(&self) -> f64 {
        *self.timing.delay_ms.lock()
    }

    /// Sets the delay between executed steps. 0 means unthrottled.
    /// Takes effect at the next loop iteration.
    pub fn set_loop_delay_ms(&self, delay_ms: f64) {
        *self.timing.delay_ms.lock() = delay_ms.max(0.0);
    }

    /// Sets the target step frequency in Hz. A frequency of 0 or less
    /// warns and switches to unthrottled.
    pub fn set_frequency(&self, hz: f64) {
        if hz <= 0.0 {
            self.sink.warn(&format!(
                "unit '{}': set_frequency({hz}) invalid, running unthrottled",
                self.unit.name()
            ));
            self.set_loop_delay_ms(0.0);
            return;
        }
        self.set_loop_delay_ms(1000.0 / hz);
    }

    /// Target step frequency in Hz, derived from the delay. Reports 0
    /// and warns when the loop is unthrottled, since "unthrottled" has
    /// no meaningful frequency.
    #[must_use]
    pub fn frequency(&self) -> f64 {
        let delay_ms = self.loop_delay_ms();
        if delay_ms < DELAY_EPSILON_MS {
            self.sink.warn(&format!(
                "unit '{}': frequency undefined, loop is unthrottled",
                self.unit.name()
            ));
            return 0.0;
        }
        1000.0 / delay_ms
    }

    /// Enables or disables updates-per-second tracking. Enabling
    /// resets the measurement window.
    pub fn enable_rate_tracking(&self, enabled: bool) {
        if enabled {
            self.timing.counter.reset();
        }
        self.timing.track_rate.store(enabled, Ordering::Relaxed);
    }

    /// Measured throughput in updates per second; 0.0 when tracking is
    /// disabled or no step has run yet.
    #[must_use]
    pub fn rate(&self) -> f64 {
        self.timing.counter.rate()
    }
}

impl std::fmt::Debug for LoopUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopUnit")
            .field("unit", &self.unit)
            .field("delay_ms", &self.loop_delay_ms())
            .finish_non_exhaustive()
    }
}
