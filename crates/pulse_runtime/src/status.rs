//! # Status Cells
//!
//! Atomic state flags with condvar signalling. Readers poll cheaply
//! with an atomic load; synchronous lifecycle calls block in
//! [`StateCell::wait_until`] instead of spinning on the flag.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU8, Ordering};

use parking_lot::{Condvar, Mutex};

/// States storable in a [`StateCell`].
pub trait AtomicState: Copy + PartialEq {
    /// Packs the state into a byte.
    fn to_bits(self) -> u8;
    /// Unpacks a byte written by [`AtomicState::to_bits`].
    fn from_bits(bits: u8) -> Self;
}

impl AtomicState for bool {
    fn to_bits(self) -> u8 {
        u8::from(self)
    }

    fn from_bits(bits: u8) -> Self {
        bits != 0
    }
}

/// Tri-state lifecycle of a [`ThreadUnit`](crate::thread_unit::ThreadUnit).
///
/// `Inactive` is both the initial and the terminal state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitStatus {
    /// The unit's loop is executing steps.
    Running,
    /// The unit's loop is idle between steps.
    Paused,
    /// The unit has no live thread.
    Inactive,
}

impl UnitStatus {
    /// Human-readable name, for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            UnitStatus::Running => "running",
            UnitStatus::Paused => "paused",
            UnitStatus::Inactive => "inactive",
        }
    }
}

impl AtomicState for UnitStatus {
    fn to_bits(self) -> u8 {
        match self {
            UnitStatus::Running => 0,
            UnitStatus::Paused => 1,
            UnitStatus::Inactive => 2,
        }
    }

    fn from_bits(bits: u8) -> Self {
        match bits {
            0 => UnitStatus::Running,
            1 => UnitStatus::Paused,
            _ => UnitStatus::Inactive,
        }
    }
}

/// A shared state flag.
///
/// Writers publish with [`StateCell::set`]; every blocked
/// [`StateCell::wait_until`] re-checks its predicate on each publish.
pub struct StateCell<S: AtomicState> {
    bits: AtomicU8,
    lock: Mutex<()>,
    cond: Condvar,
    _marker: PhantomData<S>,
}

impl<S: AtomicState> StateCell<S> {
    /// Creates a cell holding `initial`.
    #[must_use]
    pub fn new(initial: S) -> Self {
        Self {
            bits: AtomicU8::new(initial.to_bits()),
            lock: Mutex::new(()),
            cond: Condvar::new(),
            _marker: PhantomData,
        }
    }

    /// Current state.
    #[must_use]
    pub fn get(&self) -> S {
        S::from_bits(self.bits.load(Ordering::Acquire))
    }

    /// Publishes `state` and wakes every waiter.
    pub fn set(&self, state: S) {
        let _guard = self.lock.lock();
        self.bits.store(state.to_bits(), Ordering::Release);
        self.cond.notify_all();
    }

    /// Publishes `new` only if the cell still holds `expected`.
    /// Returns true on success. Lets an acknowledging loop avoid
    /// overwriting a concurrent request (pause ack vs terminate).
    pub fn compare_set(&self, expected: S, new: S) -> bool {
        let _guard = self.lock.lock();
        if S::from_bits(self.bits.load(Ordering::Acquire)) != expected {
            return false;
        }
        self.bits.store(new.to_bits(), Ordering::Release);
        self.cond.notify_all();
        true
    }

    /// Blocks until `predicate` holds for the current state.
    pub fn wait_until(&self, predicate: impl Fn(S) -> bool) {
        let mut guard = self.lock.lock();
        while !predicate(S::from_bits(self.bits.load(Ordering::Acquire))) {
            self.cond.wait(&mut guard);
        }
    }

    /// Blocks until the cell holds exactly `target`.
    pub fn wait_for(&self, target: S) {
        self.wait_until(|s| s == target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_get_set_roundtrip() {
        let cell = StateCell::new(UnitStatus::Inactive);
        assert_eq!(cell.get(), UnitStatus::Inactive);
        cell.set(UnitStatus::Running);
        assert_eq!(cell.get(), UnitStatus::Running);
    }

    #[test]
    fn test_wait_until_observes_publish() {
        let cell = Arc::new(StateCell::new(false));
        let cell_writer = Arc::clone(&cell);
        let writer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            cell_writer.set(true);
        });
        cell.wait_for(true);
        assert!(cell.get());
        writer.join().unwrap();
    }

    #[test]
    fn test_wait_returns_immediately_when_satisfied() {
        let cell = StateCell::new(UnitStatus::Paused);
        cell.wait_for(UnitStatus::Paused);
    }

    #[test]
    fn test_compare_set_only_from_expected() {
        let cell = StateCell::new(UnitStatus::Running);
        assert!(!cell.compare_set(UnitStatus::Paused, UnitStatus::Inactive));
        assert_eq!(cell.get(), UnitStatus::Running);
        assert!(cell.compare_set(UnitStatus::Running, UnitStatus::Paused));
        assert_eq!(cell.get(), UnitStatus::Paused);
    }
}
