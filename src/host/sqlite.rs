//! SQLite-backed durable host.
//!
//! Key-value state and the pending wake live in one database file. Rows are
//! keyed by instance name, but only one process can hold the file at a time.

use super::DurableExecutionHost;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Durable host backed by SQLite.
///
/// # Schema
/// ```sql
/// CREATE TABLE kv (
///     instance TEXT NOT NULL,
///     key TEXT NOT NULL,
///     value TEXT NOT NULL,        -- JSON
///     updated_at TEXT NOT NULL,   -- ISO 8601 timestamp
///     PRIMARY KEY (instance, key)
/// );
/// CREATE TABLE alarms (
///     instance TEXT PRIMARY KEY,  -- one pending wake per instance
///     wake_at_ms INTEGER NOT NULL,
///     updated_at TEXT NOT NULL
/// );
/// ```
///
/// # Exclusivity
/// The connection runs in `locking_mode=EXCLUSIVE` and takes the write lock
/// on open, so the file stays locked until the host is dropped. Opening the
/// same file from another instance fails.
pub struct SqliteHost {
    conn: Mutex<Connection>,
    instance: String,
}

impl SqliteHost {
    /// Opens (or creates) the state database and takes the instance lock.
    ///
    /// # Arguments
    /// * `db_path` - Path to SQLite database file (`:memory:` for a scratch host)
    /// * `instance` - Logical instance name the state belongs to
    pub fn open<P: AsRef<Path>>(db_path: P, instance: &str) -> Result<Self> {
        let path = db_path.as_ref();
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open state database at {}", path.display()))?;

        conn.pragma_update_and_check(None, "locking_mode", "EXCLUSIVE", |row| {
            row.get::<_, String>(0)
        })
        .context("Failed to set exclusive locking mode")?;

        // The write lock acquired here is retained for the connection's lifetime
        conn.execute_batch("BEGIN EXCLUSIVE; COMMIT;")
            .with_context(|| {
                format!(
                    "State database {} is held by another collector instance",
                    path.display()
                )
            })?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                instance TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (instance, key)
            );
            CREATE TABLE IF NOT EXISTS alarms (
                instance TEXT PRIMARY KEY,
                wake_at_ms INTEGER NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .context("Failed to create state tables")?;

        Ok(Self {
            conn: Mutex::new(conn),
            instance: instance.to_string(),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("State database mutex poisoned"))
    }
}

impl DurableExecutionHost for SqliteHost {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let conn = self.conn()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT value FROM kv WHERE instance = ?1 AND key = ?2",
                params![self.instance, key],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("Failed to read key {}", key))?;

        raw.map(|s| serde_json::from_str(&s))
            .transpose()
            .with_context(|| format!("Failed to decode stored value for {}", key))
    }

    fn put(&self, key: &str, value: &Value) -> Result<()> {
        let encoded = serde_json::to_string(value).context("Failed to encode value")?;
        let now = Utc::now().to_rfc3339();

        self.conn()?
            .execute(
                r#"
                INSERT INTO kv (instance, key, value, updated_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(instance, key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at
                "#,
                params![self.instance, key, encoded, now],
            )
            .with_context(|| format!("Failed to write key {}", key))?;

        Ok(())
    }

    fn schedule_wake(&self, at: DateTime<Utc>) -> Result<()> {
        let now = Utc::now().to_rfc3339();

        self.conn()?
            .execute(
                r#"
                INSERT INTO alarms (instance, wake_at_ms, updated_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(instance) DO UPDATE SET
                    wake_at_ms = excluded.wake_at_ms,
                    updated_at = excluded.updated_at
                "#,
                params![self.instance, at.timestamp_millis(), now],
            )
            .context("Failed to schedule wake")?;

        Ok(())
    }

    fn pending_wake(&self) -> Result<Option<DateTime<Utc>>> {
        let conn = self.conn()?;
        let wake_at_ms: Option<i64> = conn
            .query_row(
                "SELECT wake_at_ms FROM alarms WHERE instance = ?1",
                params![self.instance],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to read pending wake")?;

        wake_at_ms.map(millis_to_datetime).transpose()
    }

    fn take_due_wake(&self, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().context("Failed to begin transaction")?;

        let wake_at_ms: Option<i64> = tx
            .query_row(
                "SELECT wake_at_ms FROM alarms WHERE instance = ?1 AND wake_at_ms <= ?2",
                params![self.instance, now.timestamp_millis()],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to read due wake")?;

        if wake_at_ms.is_some() {
            tx.execute(
                "DELETE FROM alarms WHERE instance = ?1",
                params![self.instance],
            )
            .context("Failed to clear fired wake")?;
        }
        tx.commit().context("Failed to commit wake removal")?;

        wake_at_ms.map(millis_to_datetime).transpose()
    }
}

fn millis_to_datetime(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| anyhow!("Stored wake time {} out of range", ms))
}
