//! Durable single-instance execution host.
//!
//! The collector never talks to a storage engine directly. It depends on the
//! [`DurableExecutionHost`] capability, which bundles the three things a
//! singleton poller needs to survive restarts:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │       DurableExecutionHost               │
//! │  - get / put        (key-value state)    │
//! │  - schedule_wake    (one-shot alarm)     │
//! │  - take_due_wake    (fire at most once)  │
//! └─────────────────────────────────────────┘
//!          ↓                    ↓
//!    SqliteHost            MemoryHost
//!   (production)            (tests)
//! ```
//!
//! # Uniqueness contract
//!
//! Cursor monotonicity relies on there being exactly one writer. Hosts are
//! scoped to an instance name, and [`SqliteHost`] holds an exclusive lock on
//! its database file for as long as it is open, so a second process pointed
//! at the same state fails to start instead of racing the first.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;

mod memory;
mod sqlite;

pub use memory::MemoryHost;
pub use sqlite::SqliteHost;

/// Instance name used when none is configured.
pub const DEFAULT_INSTANCE: &str = "singleton";

/// Capability interface over the durable execution substrate.
///
/// Every write is durable once the call returns. At most one wake is pending
/// per host: scheduling a new one replaces the previous one.
pub trait DurableExecutionHost: Send + Sync {
    /// Reads a value, `None` if the key was never written.
    fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Writes a value, replacing any previous one.
    fn put(&self, key: &str, value: &Value) -> Result<()>;

    /// Arms the one-shot wake at `at`, overwriting any pending wake.
    fn schedule_wake(&self, at: DateTime<Utc>) -> Result<()>;

    /// Returns the pending wake without consuming it.
    fn pending_wake(&self) -> Result<Option<DateTime<Utc>>>;

    /// Atomically removes and returns the pending wake if it is due at `now`.
    ///
    /// A wake is handed out at most once; later calls return `None` until a
    /// new wake is scheduled.
    fn take_due_wake(&self, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>>;
}
