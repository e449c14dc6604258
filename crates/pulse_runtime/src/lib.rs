//! # PULSE Runtime - Thread & Module Lifecycle
//!
//! Lifecycle scheduling on top of the [`pulse_core`] event bus.
//!
//! ## Two Lifecycle Families
//!
//! ```text
//! ┌──────────────────────────────┐   ┌──────────────────────────────┐
//! │  ThreadUnit / LoopUnit       │   │  Module / ModuleDriver       │
//! │                              │   │                              │
//! │  owns an OS thread           │   │  no thread of its own        │
//! │  Running/Paused/Inactive     │   │  six-state machine           │
//! │  parent/child tree,          │   │  advanced by whatever        │
//! │  cascading synchronous stop  │   │  thread the caller provides  │
//! └──────────────────────────────┘   └──────────────────────────────┘
//! ```
//!
//! Both families own an [`EventHub`](pulse_core::EventHub), so the
//! lifecycle transitions themselves are observable events
//! (Start/End/Pause/Resume).
//!
//! ## Cooperative Control
//!
//! There is no preemption. Stop and pause requests take effect when
//! the target's loop re-checks its control state at the loop head; a
//! body blocked in a long synchronous call cannot be interrupted until
//! it returns. Synchronous callers block on a condvar, not a spin
//! loop.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod driver;
pub mod loop_unit;
pub mod module;
mod pacing;
pub mod status;
pub mod thread_unit;

pub use config::{ConfigError, RuntimeConfig};
pub use driver::{DriverStatus, ModuleDriver};
pub use loop_unit::{LoopStep, LoopUnit};
pub use module::{ExecutionType, Module, ModuleBehavior, ModuleStatus};
pub use status::UnitStatus;
pub use thread_unit::{ThreadUnit, UnitBody};
