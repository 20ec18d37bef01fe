//! Collector loop: the stateful collection cycle.
//!
//! ```text
//!   /init ──┐                    ┌── wake fired
//!           ↓                    ↓
//!   ┌──────────────────────────────────────────┐
//!   │ cycle (serialized, one at a time)        │
//!   │  1. fetch token                          │
//!   │  2. fetch activities (window or cursor)  │
//!   │  3. forward each, ascending id           │
//!   │  4. persist max id (non-empty batch)     │
//!   │  5. mark initialized (cold start)        │
//!   └──────────────────────────────────────────┘
//!           ↓  always, success or error
//!   6. rearm wake at now + delay
//! ```
//!
//! Errors from steps 1–5 abort the rest of the cycle but never the rearm.
//! Timer-driven cycles log and swallow them; the initialize entry point
//! returns them so the caller can report the failure.

use crate::error::CycleError;
use crate::scheduler::Scheduler;
use crate::sink::ActivitySink;
use crate::source::{ActivitySource, FetchMode, TokenProvider};
use activity_relay::activity::max_id;
use activity_relay::CheckpointStore;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Which kind of cycle runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleMode {
    /// First-ever cycle: fixed lookback window, then mark initialized
    ColdStart,
    /// Every later cycle: resume from the persisted cursor
    Incremental,
}

impl fmt::Display for CycleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleMode::ColdStart => f.write_str("cold_start"),
            CycleMode::Incremental => f.write_str("incremental"),
        }
    }
}

/// Outcome of a cycle body that completed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CycleReport {
    pub mode: CycleMode,
    /// Activities returned by the fetch
    pub fetched: usize,
    /// Activities the sink accepted
    pub forwarded: usize,
    /// Activities whose delivery failed (cursor still advanced past them)
    pub failed: usize,
    /// Cursor after the cycle
    pub cursor: Option<i64>,
}

/// Result of an initialize request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InitOutcome {
    /// A cold-start cycle ran
    Initialized(CycleReport),
    /// Already initialized; nothing ran
    AlreadyInitialized,
}

/// Orchestrates token → fetch → forward → checkpoint → rearm.
///
/// # Singleton
/// Correctness of the cursor assumes this is the only collector writing the
/// checkpoint. Within a process `cycle_lock` serializes cycles; across
/// processes the durable host enforces exclusivity.
pub struct Collector {
    tokens: Arc<dyn TokenProvider>,
    source: Arc<dyn ActivitySource>,
    sink: Arc<dyn ActivitySink>,
    checkpoints: CheckpointStore,
    scheduler: Scheduler,
    cycle_lock: Mutex<()>,
}

impl Collector {
    pub fn new(
        tokens: Arc<dyn TokenProvider>,
        source: Arc<dyn ActivitySource>,
        sink: Arc<dyn ActivitySink>,
        checkpoints: CheckpointStore,
        scheduler: Scheduler,
    ) -> Self {
        Self {
            tokens,
            source,
            sink,
            checkpoints,
            scheduler,
            cycle_lock: Mutex::new(()),
        }
    }

    /// Initialize entry point.
    ///
    /// Runs one cold-start cycle unless the checkpoint is already
    /// initialized. The next wake is armed either way a cycle ran; when it
    /// fails, `initialized` stays false and the error is returned.
    pub async fn initialize(&self) -> Result<InitOutcome, CycleError> {
        let _guard = self.cycle_lock.lock().await;

        let checkpoint = self.checkpoints.read()?;
        if checkpoint.initialized {
            info!("Collector already initialized, skipping cold start");
            return Ok(InitOutcome::AlreadyInitialized);
        }

        let report = self.run_cycle(CycleMode::ColdStart).await?;
        Ok(InitOutcome::Initialized(report))
    }

    /// Alarm entry point: runs one cycle and never fails.
    ///
    /// Uses the incremental mode once initialized; a wake that arrives
    /// before initialization runs a cold start instead.
    pub async fn alarm(&self) {
        let _guard = self.cycle_lock.lock().await;
        info!("Alarm triggered, polling for new activities");

        let mode = match self.checkpoints.read() {
            Ok(checkpoint) if checkpoint.initialized => CycleMode::Incremental,
            Ok(_) => CycleMode::ColdStart,
            Err(e) => {
                // Without a readable checkpoint there is no safe window; retry later
                error!(error = %e, "Failed to read checkpoint");
                self.rearm();
                return;
            }
        };

        // Errors are logged inside run_cycle; the wake is already rearmed.
        let _ = self.run_cycle(mode).await;
    }

    /// Arms a wake immediately if the collector is initialized but has no
    /// pending wake, e.g. after a crash between firing and rearming.
    ///
    /// Returns true if a wake was armed.
    pub fn resume(&self, pending_wake: Option<DateTime<Utc>>) -> anyhow::Result<bool> {
        let checkpoint = self.checkpoints.read()?;
        if !checkpoint.initialized || pending_wake.is_some() {
            return Ok(false);
        }
        let at = self.scheduler.arm_now()?;
        info!(wake_at = %at.to_rfc3339(), "No pending wake found, resuming polling");
        Ok(true)
    }

    /// Runs the cycle body, then always rearms.
    async fn run_cycle(&self, mode: CycleMode) -> Result<CycleReport, CycleError> {
        let span = info_span!("cycle", cycle_id = %Uuid::now_v7(), mode = %mode);

        async {
            info!("Starting collection cycle");
            let result = self.collect(mode).await;
            match &result {
                Ok(report) => info!(
                    fetched = report.fetched,
                    forwarded = report.forwarded,
                    failed = report.failed,
                    cursor = ?report.cursor,
                    "Collection cycle complete"
                ),
                Err(e) => error!(kind = e.kind(), error = %e, "Collection cycle failed"),
            }
            self.rearm();
            result
        }
        .instrument(span)
        .await
    }

    fn rearm(&self) {
        if let Err(e) = self.scheduler.rearm() {
            error!(error = %e, "Failed to schedule next wake");
        }
    }

    /// Steps 1–5 of the cycle.
    async fn collect(&self, mode: CycleMode) -> Result<CycleReport, CycleError> {
        let token = self.tokens.fetch_token().await?;

        let fetch_mode = match mode {
            CycleMode::ColdStart => FetchMode::ColdStart,
            CycleMode::Incremental => {
                FetchMode::Incremental(self.checkpoints.read()?.last_processed_id)
            }
        };

        let activities = self.source.fetch(&token, fetch_mode).await?;

        let mut forwarded = 0;
        let mut failed = 0;
        let cursor = match max_id(&activities) {
            Some(highest) => {
                for activity in &activities {
                    match self.sink.forward(activity).await {
                        Ok(()) => forwarded += 1,
                        Err(e) => {
                            warn!(
                                activity_id = activity.id,
                                error = %e,
                                "Failed to forward activity"
                            );
                            failed += 1;
                        }
                    }
                }
                let stored = self.checkpoints.write_cursor(highest)?;
                info!(cursor = stored, "Updated cursor");
                Some(stored)
            }
            None => {
                let cursor = self.checkpoints.read()?.last_processed_id;
                info!(cursor = ?cursor, "No new activities, cursor unchanged");
                cursor
            }
        };

        if mode == CycleMode::ColdStart {
            self.checkpoints.mark_initialized()?;
            info!("Collector initialized");
        }

        Ok(CycleReport {
            mode,
            fetched: activities.len(),
            forwarded,
            failed,
            cursor,
        })
    }
}
