//! Step pacing shared by LoopUnit and Module.
//!
//! A delay below [`DELAY_EPSILON_MS`] means unthrottled: the step runs
//! on every loop iteration. Otherwise a step executes only once the
//! configured delay has elapsed since the previous executed step; in
//! between, the loop idles in short bounded naps so the lifecycle
//! control state stays responsive.

use std::time::{Duration, Instant};

/// Delays below this are treated as "unthrottled".
pub(crate) const DELAY_EPSILON_MS: f64 = 1e-3;

/// Idle naps never exceed this, so stop/pause requests are observed
/// within roughly a millisecond.
const MAX_NAP: Duration = Duration::from_millis(1);

/// Below this remainder we spin instead of sleeping, for deadline
/// accuracy.
const SPIN_THRESHOLD: Duration = Duration::from_micros(200);

/// True if a step is due at `now`, given the previous executed step.
pub(crate) fn step_due(last: Option<Instant>, now: Instant, delay_ms: f64) -> bool {
    if delay_ms < DELAY_EPSILON_MS {
        return true;
    }
    match last {
        None => true,
        Some(last) => now.duration_since(last).as_secs_f64() * 1000.0 >= delay_ms,
    }
}

/// Time left until the next step is due. Zero when due or unthrottled.
pub(crate) fn remaining(last: Option<Instant>, now: Instant, delay_ms: f64) -> Duration {
    if delay_ms < DELAY_EPSILON_MS {
        return Duration::ZERO;
    }
    let Some(last) = last else {
        return Duration::ZERO;
    };
    let delay = Duration::from_secs_f64(delay_ms / 1000.0);
    delay.saturating_sub(now.duration_since(last))
}

/// Waits out (part of) the remainder before the next step: sleeps in
/// bounded naps, spins the final stretch.
pub(crate) fn idle_wait(remaining: Duration) {
    if remaining.is_zero() {
        return;
    }
    if remaining > SPIN_THRESHOLD {
        std::thread::sleep(remaining.saturating_sub(SPIN_THRESHOLD).min(MAX_NAP));
        return;
    }
    let deadline = Instant::now() + remaining;
    while Instant::now() < deadline {
        std::hint::spin_loop();
    }
}
