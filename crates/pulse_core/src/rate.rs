//! # Rate Counter
//!
//! Updates-per-second meter for loop units. Fed with begin/end marks
//! around each executed step; readable from any thread while the loop
//! runs.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

#[derive(Default)]
struct RateInner {
    tracking_since: Option<Instant>,
    step_started: Option<Instant>,
    steps: u64,
    busy: Duration,
}

/// Throughput meter: completed steps per wall-clock second.
#[derive(Default)]
pub struct RateCounter {
    inner: Mutex<RateInner>,
}

impl RateCounter {
    /// Creates a counter with no recorded steps.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the start of a step. The first mark starts the
    /// measurement window.
    pub fn begin_step(&self) {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        inner.tracking_since.get_or_insert(now);
        inner.step_started = Some(now);
    }

    /// Marks the end of a step. A mark without a matching
    /// [`RateCounter::begin_step`] is ignored.
    pub fn end_step(&self) {
        let mut inner = self.inner.lock();
        if let Some(started) = inner.step_started.take() {
            inner.busy += started.elapsed();
            inner.steps += 1;
        }
    }

    /// Completed steps per second since measurement started, or 0.0 if
    /// nothing has been recorded yet.
    #[must_use]
    pub fn rate(&self) -> f64 {
        let inner = self.inner.lock();
        match inner.tracking_since {
            Some(since) => {
                let elapsed = since.elapsed().as_secs_f64();
                if elapsed > f64::EPSILON {
                    inner.steps as f64 / elapsed
                } else {
                    0.0
                }
            }
            None => 0.0,
        }
    }

    /// Average time spent inside a step, in microseconds.
    #[must_use]
    pub fn average_step_us(&self) -> u64 {
        let inner = self.inner.lock();
        if inner.steps == 0 {
            return 0;
        }
        inner.busy.as_micros() as u64 / inner.steps
    }

    /// Completed steps since measurement started.
    #[must_use]
    pub fn steps(&self) -> u64 {
        self.inner.lock().steps
    }

    /// Clears all recorded state; the next begin mark restarts the
    /// window.
    pub fn reset(&self) {
        *self.inner.lock() = RateInner::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_unused_counter_reports_zero() {
        let counter = RateCounter::new();
        assert_eq!(counter.rate(), 0.0);
        assert_eq!(counter.steps(), 0);
        assert_eq!(counter.average_step_us(), 0);
    }

    #[test]
    fn test_counts_completed_steps() {
        let counter = RateCounter::new();
        for _ in 0..5 {
            counter.begin_step();
            thread::sleep(Duration::from_millis(2));
            counter.end_step();
        }
        assert_eq!(counter.steps(), 5);
        assert!(counter.rate() > 0.0);
        assert!(counter.average_step_us() >= 1_000);
    }

    #[test]
    fn test_end_without_begin_is_ignored() {
        let counter = RateCounter::new();
        counter.end_step();
        assert_eq!(counter.steps(), 0);
    }

    #[test]
    fn test_reset_clears_window() {
        let counter = RateCounter::new();
        counter.begin_step();
        counter.end_step();
        counter.reset();
        assert_eq!(counter.steps(), 0);
        assert_eq!(counter.rate(), 0.0);
    }
}
