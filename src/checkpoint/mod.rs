//! Durable collection checkpoint.
//!
//! Holds the cursor (highest fully processed activity id) and the
//! initialization flag. Both live in the host's key-value store under
//! independent keys; neither write depends on the other.

use crate::host::DurableExecutionHost;
use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::sync::Arc;

/// Storage key of the initialization flag.
pub const INITIALIZED_KEY: &str = "initialized";

/// Storage key of the cursor.
pub const CURSOR_KEY: &str = "lastActivityId";

/// Snapshot of the durable collection state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Checkpoint {
    /// Highest activity id fully processed, `None` before the first batch
    pub last_processed_id: Option<i64>,
    /// Set once the first cold-start cycle completes
    pub initialized: bool,
}

/// Reads and writes the [`Checkpoint`] through a durable host.
///
/// The store assumes it is the only writer (see the host's uniqueness
/// contract); under that assumption the cursor never decreases.
#[derive(Clone)]
pub struct CheckpointStore {
    host: Arc<dyn DurableExecutionHost>,
}

impl CheckpointStore {
    pub fn new(host: Arc<dyn DurableExecutionHost>) -> Self {
        Self { host }
    }

    /// Loads the current checkpoint. Missing keys read as the initial state.
    pub fn read(&self) -> Result<Checkpoint> {
        let initialized = match self.host.get(INITIALIZED_KEY)? {
            None => false,
            Some(Value::Bool(b)) => b,
            Some(other) => {
                return Err(anyhow!(
                    "Stored {} is not a boolean: {}",
                    INITIALIZED_KEY,
                    other
                ))
            }
        };

        let last_processed_id = match self.host.get(CURSOR_KEY)? {
            None | Some(Value::Null) => None,
            Some(value) => Some(
                value
                    .as_i64()
                    .ok_or_else(|| anyhow!("Stored {} is not an integer: {}", CURSOR_KEY, value))?,
            ),
        };

        Ok(Checkpoint {
            last_processed_id,
            initialized,
        })
    }

    /// Persists the cursor after a batch, never lowering a stored value.
    ///
    /// Returns the cursor as stored after the call.
    pub fn write_cursor(&self, id: i64) -> Result<i64> {
        let current = self.read().context("Failed to read cursor before update")?;
        let next = match current.last_processed_id {
            Some(existing) if existing > id => {
                tracing::warn!(
                    stored = existing,
                    proposed = id,
                    "Refusing to move cursor backwards"
                );
                return Ok(existing);
            }
            _ => id,
        };

        self.host
            .put(CURSOR_KEY, &Value::from(next))
            .context("Failed to persist cursor")?;
        Ok(next)
    }

    /// Records that the cold-start cycle has run.
    pub fn mark_initialized(&self) -> Result<()> {
        self.host
            .put(INITIALIZED_KEY, &Value::Bool(true))
            .context("Failed to persist initialized flag")
    }
}
