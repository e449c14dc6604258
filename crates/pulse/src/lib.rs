//! # PULSE
//!
//! Real-time simulation core: a per-instance publish/subscribe event
//! bus plus a thread/module lifecycle scheduler.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        APPLICATION                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐    │
//! │  │  Physics     │   │  Render      │   │  Devices     │    │
//! │  │  LoopUnit    │──>│  LoopUnit    │<──│  LoopUnit    │    │
//! │  │  (120 Hz)    │   │  (60 Hz)     │   │  (poll)      │    │
//! │  └──────┬───────┘   └──────────────┘   └──────────────┘    │
//! │         │  events: direct (inline) or queued (receiver's   │
//! │         │  inbox, drained on the receiver's own thread)    │
//! │         ▼                                                  │
//! │  ┌──────────────────────────────────────────────────────┐  │
//! │  │  pulse_core: EventHub / Inbox / Command              │  │
//! │  │  pulse_runtime: ThreadUnit tree, Module driver       │  │
//! │  └──────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Crates
//!
//! - [`pulse_core`]: events, hubs, inboxes, the log sink, UPS counter
//! - [`pulse_runtime`]: ThreadUnit/LoopUnit, Module/ModuleDriver,
//!   runtime configuration

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub use pulse_core as core;
pub use pulse_runtime as runtime;

// The commonly used surface, flattened.
pub use pulse_core::{
    Command, Event, EventHub, EventKind, EventPayload, HubId, IdAllocator, Inbox, LogSink,
    MemorySink, NullSink, RateCounter, Subscription, TracingSink,
};
pub use pulse_runtime::{
    ConfigError, DriverStatus, ExecutionType, LoopStep, LoopUnit, Module, ModuleBehavior,
    ModuleDriver, ModuleStatus, RuntimeConfig, ThreadUnit, UnitBody, UnitStatus,
};
