//! Wake scheduling.
//!
//! [`Scheduler`] arms the durable one-shot wake after every cycle.
//! [`AlarmDriver`] is the runtime side of that timer: it watches the host
//! for a due wake and hands it to the collector exactly once.

use crate::collector::Collector;
use activity_relay::DurableExecutionHost;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

/// Arms the next wake a fixed delay after each cycle.
#[derive(Clone)]
pub struct Scheduler {
    host: Arc<dyn DurableExecutionHost>,
    delay: Duration,
}

impl Scheduler {
    pub fn new(host: Arc<dyn DurableExecutionHost>, delay: Duration) -> Self {
        Self { host, delay }
    }

    /// Replaces any pending wake with one at `now + delay`.
    pub fn rearm(&self) -> Result<DateTime<Utc>> {
        let delay = chrono::Duration::from_std(self.delay).context("Wake delay out of range")?;
        let at = Utc::now() + delay;
        self.host.schedule_wake(at)?;
        info!(wake_at = %at.to_rfc3339(), "Scheduled next wake");
        Ok(at)
    }

    /// Arms a wake for right now, used to resume polling after a restart.
    pub fn arm_now(&self) -> Result<DateTime<Utc>> {
        let at = Utc::now();
        self.host.schedule_wake(at)?;
        Ok(at)
    }
}

/// Fires due wakes into the collector.
///
/// Polls the host every `tick`; a wake is consumed with
/// [`DurableExecutionHost::take_due_wake`] before the cycle runs, so each
/// scheduled time triggers at most one cycle.
pub struct AlarmDriver {
    host: Arc<dyn DurableExecutionHost>,
    collector: Arc<Collector>,
    tick: Duration,
}

impl AlarmDriver {
    pub fn new(
        host: Arc<dyn DurableExecutionHost>,
        collector: Arc<Collector>,
        tick: Duration,
    ) -> Self {
        Self {
            host,
            collector,
            tick,
        }
    }

    /// Checks for a due wake once and runs the alarm cycle if there is one.
    ///
    /// Returns true if a cycle ran.
    pub async fn fire_if_due(&self) -> bool {
        match self.host.take_due_wake(Utc::now()) {
            Ok(Some(scheduled)) => {
                debug!(scheduled = %scheduled.to_rfc3339(), "Wake due");
                self.collector.alarm().await;
                true
            }
            Ok(None) => false,
            Err(e) => {
                error!(error = %e, "Failed to check for due wake");
                false
            }
        }
    }

    /// Starts the driver loop (non-blocking).
    ///
    /// Returns a JoinHandle that can be aborted for shutdown.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(tick_millis = self.tick.as_millis() as u64, "Starting alarm driver");

            let mut ticker = interval(self.tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                self.fire_if_due().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CycleError, ForwardError};
    use crate::sink::ActivitySink;
    use crate::source::{AccessToken, ActivitySource, FetchMode, TokenProvider};
    use activity_relay::{Activity, CheckpointStore, MemoryHost};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct StaticToken;

    #[async_trait]
    impl TokenProvider for StaticToken {
        async fn fetch_token(&self) -> Result<AccessToken, CycleError> {
            Ok(AccessToken::new("tok"))
        }
    }

    /// Counts fetches and always returns an empty page.
    #[derive(Default)]
    struct CountingSource {
        fetches: Mutex<Vec<FetchMode>>,
    }

    #[async_trait]
    impl ActivitySource for CountingSource {
        async fn fetch(
            &self,
            _: &AccessToken,
            mode: FetchMode,
        ) -> Result<Vec<Activity>, CycleError> {
            self.fetches.lock().unwrap().push(mode);
            Ok(vec![])
        }
    }

    struct NullSink;

    #[async_trait]
    impl ActivitySink for NullSink {
        async fn forward(&self, _: &Activity) -> Result<(), ForwardError> {
            Ok(())
        }
    }

    #[test]
    fn test_rearm_schedules_after_delay() {
        let host = Arc::new(MemoryHost::new());
        let scheduler = Scheduler::new(host.clone(), Duration::from_secs(60));

        let before = Utc::now();
        let at = scheduler.rearm().unwrap();
        let after = Utc::now();

        assert!(at >= before + chrono::Duration::seconds(60));
        assert!(at <= after + chrono::Duration::seconds(60));
        assert_eq!(host.pending_wake().unwrap(), Some(at));
    }

    #[test]
    fn test_rearm_overwrites_pending_wake() {
        let host = Arc::new(MemoryHost::new());
        let scheduler = Scheduler::new(host.clone(), Duration::from_secs(60));

        let stale = Utc::now() + chrono::Duration::seconds(5);
        host.schedule_wake(stale).unwrap();

        let at = scheduler.rearm().unwrap();
        assert_eq!(host.pending_wake().unwrap(), Some(at));
        assert_ne!(at, stale);
    }

    #[test]
    fn test_arm_now_is_immediately_due() {
        let host = Arc::new(MemoryHost::new());
        let scheduler = Scheduler::new(host.clone(), Duration::from_secs(60));

        scheduler.arm_now().unwrap();
        assert!(host.take_due_wake(Utc::now()).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_due_wake_fires_one_cycle() {
        let host = Arc::new(MemoryHost::new());
        let source = Arc::new(CountingSource::default());
        let checkpoints = CheckpointStore::new(host.clone());
        checkpoints.write_cursor(102).unwrap();
        checkpoints.mark_initialized().unwrap();

        let collector = Arc::new(Collector::new(
            Arc::new(StaticToken),
            source.clone(),
            Arc::new(NullSink),
            checkpoints,
            Scheduler::new(host.clone(), Duration::from_secs(60)),
        ));
        let driver = AlarmDriver::new(host.clone(), collector, Duration::from_millis(10));

        host.schedule_wake(Utc::now() - chrono::Duration::seconds(1)).unwrap();
        let before = Utc::now();

        assert!(driver.fire_if_due().await);
        assert!(!driver.fire_if_due().await);

        assert_eq!(
            *source.fetches.lock().unwrap(),
            vec![FetchMode::Incremental(Some(102))]
        );
        let next = host.pending_wake().unwrap().expect("cycle must rearm");
        assert!(next >= before + chrono::Duration::seconds(60));
        assert!(next <= Utc::now() + chrono::Duration::seconds(60));
    }

    #[tokio::test]
    async fn test_no_wake_runs_nothing() {
        let host = Arc::new(MemoryHost::new());
        let source = Arc::new(CountingSource::default());
        let collector = Arc::new(Collector::new(
            Arc::new(StaticToken),
            source.clone(),
            Arc::new(NullSink),
            CheckpointStore::new(host.clone()),
            Scheduler::new(host.clone(), Duration::from_secs(60)),
        ));
        let driver = AlarmDriver::new(host.clone(), collector, Duration::from_millis(10));

        host.schedule_wake(Utc::now() + chrono::Duration::seconds(30)).unwrap();

        assert!(!driver.fire_if_due().await);
        assert!(source.fetches.lock().unwrap().is_empty());
        assert!(host.pending_wake().unwrap().is_some());
    }
}
