//! # Hub Identity
//!
//! Every [`EventHub`](crate::hub::EventHub) carries an opaque id used
//! for observer bookkeeping and for de-duplicating queued commands by
//! sender. Ids replace raw back-pointers: a stale id compares unequal
//! to every live hub instead of dangling.
//!
//! Ids come from an [`IdAllocator`] owned by the application, not from
//! a process-wide global. Two allocators produce overlapping ids, so
//! all hubs that exchange events must share one allocator.

use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque identity of an event hub.
///
/// Copyable, comparable, hashable. `HubId::NONE` marks "no sender"
/// on events that have not been emitted yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HubId(u64);

impl HubId {
    /// The null identity. No allocator ever hands this out.
    pub const NONE: HubId = HubId(0);

    /// Raw numeric value, for logging and diagnostics.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Returns true if this is the null identity.
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

/// Monotonic id source for hubs.
///
/// A plain atomic counter scoped to the allocator object. Cheap enough
/// to call from any thread.
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl IdAllocator {
    /// Creates an allocator whose first id is 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Hands out the next id. Never returns [`HubId::NONE`].
    #[must_use]
    pub fn allocate(&self) -> HubId {
        HubId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
