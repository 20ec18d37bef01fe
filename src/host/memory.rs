use super::DurableExecutionHost;
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory host for tests and dry runs. Nothing survives the process.
#[derive(Default)]
pub struct MemoryHost {
    values: Mutex<HashMap<String, Value>>,
    wake: Mutex<Option<DateTime<Utc>>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DurableExecutionHost for MemoryHost {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let values = self.values.lock().map_err(|_| anyhow!("memory host poisoned"))?;
        Ok(values.get(key).cloned())
    }

    fn put(&self, key: &str, value: &Value) -> Result<()> {
        let mut values = self.values.lock().map_err(|_| anyhow!("memory host poisoned"))?;
        values.insert(key.to_string(), value.clone());
        Ok(())
    }

    fn schedule_wake(&self, at: DateTime<Utc>) -> Result<()> {
        let mut wake = self.wake.lock().map_err(|_| anyhow!("memory host poisoned"))?;
        *wake = Some(at);
        Ok(())
    }

    fn pending_wake(&self) -> Result<Option<DateTime<Utc>>> {
        let wake = self.wake.lock().map_err(|_| anyhow!("memory host poisoned"))?;
        Ok(*wake)
    }

    fn take_due_wake(&self, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
        let mut wake = self.wake.lock().map_err(|_| anyhow!("memory host poisoned"))?;
        if matches!(*wake, Some(at) if at <= now) {
            Ok(wake.take())
        } else {
            Ok(None)
        }
    }
}
