//! # PULSE Core - Event/Observer Bus
//!
//! Per-instance publish/subscribe messaging for independently-rated
//! simulation components (physics, rendering, device polling, console).
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   emit    ┌─────────────────────────────┐
//! │  Physics    │──────────>│          EventHub           │
//! │  (sender)   │           │                             │
//! └─────────────┘           │  direct observers ──> run   │
//!                           │  on the SENDER's thread     │
//!                           │                             │
//!                           │  queued observers ──> push  │
//!                           │  Command into the           │
//!                           │  RECEIVER's own Inbox       │
//!                           └──────────────┬──────────────┘
//!                                          │ drain_*()
//!                                          ▼
//!                           ┌─────────────────────────────┐
//!                           │  Render (receiver thread)   │
//!                           └─────────────────────────────┘
//! ```
//!
//! ## Delivery Guarantees
//!
//! - Direct observers run synchronously, in registration order, before
//!   `emit` returns. They execute with the sender's call stack and must
//!   be cheap.
//! - Queued observers never block the sender: the sender only pushes
//!   into the receiver's thread-safe inbox. Within one inbox, commands
//!   drain in emission order (FIFO). Across inboxes there is no
//!   ordering guarantee.
//!
//! ## Failure Model
//!
//! Nothing in this crate returns a typed error. Misuse is reported
//! through the injected [`LogSink`] and the operation is a no-op;
//! callers wanting confirmation poll state.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod event;
pub mod hub;
pub mod id;
pub mod inbox;
pub mod rate;
pub mod sink;

pub use event::{Event, EventKind, EventPayload};
pub use hub::{EventHub, Subscription};
pub use id::{HubId, IdAllocator};
pub use inbox::{Command, Inbox};
pub use rate::RateCounter;
pub use sink::{LogSink, MemorySink, NullSink, TracingSink};
