//! Relay Collector - polls a monitoring platform's activity log and forwards
//! each new activity to a security-event webhook.
//!
//! # Architecture
//!
//! ```text
//!   Source API (OAuth client credentials)
//!          ↓
//! ┌─────────────────────────────────────────┐
//! │       Collector                          │
//! │  - Fetch activities since cursor         │
//! │  - Forward each in ascending id order    │
//! │  - Persist cursor, rearm wake            │
//! └─────────────────────────────────────────┘
//!          ↓
//!     Webhook sink
//! ```
//!
//! Durable state (cursor, initialized flag, pending wake) lives behind
//! [`activity_relay::DurableExecutionHost`].
//!
//! # Core Types
//!
//! - [`Collector`] - The collection cycle and its two entry points
//! - [`TokenProvider`] / [`ActivitySource`] / [`ActivitySink`] - Seams to the outside world
//! - [`Scheduler`] / [`AlarmDriver`] - Durable wake arming and firing
//! - [`CycleError`] / [`ForwardError`] - Error taxonomy

pub mod api;
pub mod collector;
pub mod error;
pub mod scheduler;
pub mod sink;
pub mod source;

pub use collector::{Collector, CycleMode, CycleReport, InitOutcome};
pub use error::{CycleError, ForwardError};
pub use scheduler::{AlarmDriver, Scheduler};
pub use sink::{ActivitySink, Forwarder};
pub use source::{ActivityClient, ActivitySource, FetchMode, TokenClient, TokenProvider};
