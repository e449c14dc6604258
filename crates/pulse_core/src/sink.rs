//! # Log Sink
//!
//! The core never performs I/O of its own. Invalid transitions and
//! misuse are reported through an injected [`LogSink`]; the default
//! implementation forwards to `tracing`.
//!
//! Two severities, matching the failure taxonomy:
//!
//! - `warn`: invalid transition (start on a running unit, stop on an
//!   inactive one). The operation is a no-op.
//! - `fatal`: misuse/logic error (duplicate registration). The
//!   operation aborts without mutating state. Nothing panics.

use parking_lot::Mutex;

/// Logging collaborator injected into hubs and lifecycle objects.
pub trait LogSink: Send + Sync {
    /// Reports an invalid state transition that was ignored.
    fn warn(&self, message: &str);
    /// Reports unrecoverable misuse; the offending operation aborted.
    fn fatal(&self, message: &str);
}

/// Default sink: forwards to the `tracing` macros.
#[derive(Debug, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn warn(&self, message: &str) {
        tracing::warn!(target: "pulse", "{message}");
    }

    fn fatal(&self, message: &str) {
        tracing::error!(target: "pulse", "{message}");
    }
}

/// Sink that discards everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl LogSink for NullSink {
    fn warn(&self, _message: &str) {}
    fn fatal(&self, _message: &str) {}
}

/// Sink that records messages in memory.
///
/// Used by the test suites to assert on warning behavior; also handy
/// for embedding hosts that surface diagnostics in their own UI.
#[derive(Debug, Default)]
pub struct MemorySink {
    warnings: Mutex<Vec<String>>,
    fatals: Mutex<Vec<String>>,
}

impl MemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded warnings.
    #[must_use]
    pub fn warnings(&self) -> Vec<String> {
        self.warnings.lock().clone()
    }

    /// Snapshot of recorded fatals.
    #[must_use]
    pub fn fatals(&self) -> Vec<String> {
        self.fatals.lock().clone()
    }
}

impl LogSink for MemorySink {
    fn warn(&self, message: &str) {
        self.warnings.lock().push(message.to_owned());
    }

    fn fatal(&self, message: &str) {
        self.fatals.lock().push(message.to_owned());
    }
}
