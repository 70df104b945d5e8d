//! Fixed-interval scheduler for ingestion, drift-scan and reconcile cycles.
//!
//! One background task owns the schedule. It sleeps until the earliest due
//! kind (racing the cancellation token), runs that cycle to completion and
//! reschedules it at `now + interval`, so a kind never overlaps itself. A
//! cycle that outlives `job_timeout` has its child token cancelled and is
//! then awaited, which lets the in-flight mutation finish.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use calrecon_core::CycleRunner;
//! use calrecon_domain::Config;
//! use calrecon_infra::scheduling::{CycleScheduler, CycleSchedulerConfig};
//!
//! # async fn example(engine: Arc<dyn CycleRunner>) -> Result<(), String> {
//! let config = Config::default();
//! let mut scheduler = CycleScheduler::new(engine, CycleSchedulerConfig::from_config(&config));
//!
//! scheduler.start().await.map_err(|e| e.to_string())?;
//! // ... application runs ...
//! scheduler.stop().await.map_err(|e| e.to_string())?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use calrecon_core::CycleRunner;
use calrecon_domain::{Config, CycleKind};
use chrono::{DateTime, Utc};
use parking_lot::Mutex as SyncMutex;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::scheduling::error::{SchedulerError, SchedulerResult};

/// Type alias for task handle to avoid complexity warnings
type TaskHandle = Arc<Mutex<Option<JoinHandle<()>>>>;

/// Next wall-clock run per enabled kind, published for `status()`
type NextRuns = Arc<SyncMutex<Vec<(CycleKind, DateTime<Utc>)>>>;

const KINDS: [CycleKind; 3] = [CycleKind::Ingestion, CycleKind::DriftScan, CycleKind::Reconcile];

/// Configuration for the cycle scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleSchedulerConfig {
    /// Zero disables ingestion cycles
    pub ingest_interval: Duration,
    /// Zero disables drift scans
    pub scan_interval: Duration,
    /// Zero disables merged reconcile cycles
    pub reconcile_interval: Duration,
    pub job_timeout: Duration,
    pub stop_timeout: Duration,
}

impl CycleSchedulerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            ingest_interval: Duration::from_secs(config.reconcile.ingest_interval_secs),
            scan_interval: Duration::from_secs(config.reconcile.scan_interval_secs),
            reconcile_interval: Duration::from_secs(config.reconcile.reconcile_interval_secs),
            job_timeout: Duration::from_secs(config.scheduler.job_timeout_secs),
            stop_timeout: Duration::from_secs(config.scheduler.stop_timeout_secs),
        }
    }

    /// Interval for a kind, `None` when disabled.
    pub fn interval(&self, kind: CycleKind) -> Option<Duration> {
        let interval = match kind {
            CycleKind::Ingestion => self.ingest_interval,
            CycleKind::DriftScan => self.scan_interval,
            CycleKind::Reconcile => self.reconcile_interval,
        };
        (!interval.is_zero()).then_some(interval)
    }
}

/// Snapshot of the scheduler for operators
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerStatus {
    pub running: bool,
    /// Enabled kinds only, in schedule order
    pub next_runs: Vec<(CycleKind, DateTime<Utc>)>,
}

/// Drives the engine's cycles on fixed intervals
pub struct CycleScheduler {
    runner: Arc<dyn CycleRunner>,
    config: CycleSchedulerConfig,
    cancellation_token: CancellationToken,
    task_handle: TaskHandle,
    next_runs: NextRuns,
}

impl CycleScheduler {
    pub fn new(runner: Arc<dyn CycleRunner>, config: CycleSchedulerConfig) -> Self {
        Self {
            runner,
            config,
            cancellation_token: CancellationToken::new(),
            task_handle: Arc::new(Mutex::new(None)),
            next_runs: Arc::new(SyncMutex::new(Vec::new())),
        }
    }

    /// Start the scheduler
    ///
    /// Every enabled kind is due immediately; afterwards each runs on its own
    /// interval.
    ///
    /// # Errors
    ///
    /// Returns error if scheduler is already running
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        info!("Starting cycle scheduler");

        // Fresh token so the scheduler can be restarted after stop
        self.cancellation_token = CancellationToken::new();

        let runner = Arc::clone(&self.runner);
        let config = self.config.clone();
        let cancel = self.cancellation_token.clone();
        let next_runs = Arc::clone(&self.next_runs);

        let handle = tokio::spawn(async move {
            Self::run_loop(runner, config, cancel, next_runs).await;
        });

        *self.task_handle.lock().await = Some(handle);

        info!("Cycle scheduler started");
        Ok(())
    }

    /// Stop the scheduler gracefully
    ///
    /// Cancels the loop and waits at most `stop_timeout` for the running
    /// cycle to wind down.
    ///
    /// # Errors
    ///
    /// Returns error if scheduler is not running or does not stop in time
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        info!("Stopping cycle scheduler");
        self.cancellation_token.cancel();

        if let Some(handle) = self.task_handle.lock().await.take() {
            let join_timeout = self.config.stop_timeout;
            tokio::time::timeout(join_timeout, handle)
                .await
                .map_err(|_| SchedulerError::Timeout { seconds: join_timeout.as_secs() })?
                .map_err(|e| SchedulerError::TaskJoinFailed(e.to_string()))?;
        }
        self.next_runs.lock().clear();

        info!("Cycle scheduler stopped");
        Ok(())
    }

    /// A scheduler is running while its task handle exists and has not
    /// finished.
    pub fn is_running(&self) -> bool {
        self.task_handle
            .try_lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus { running: self.is_running(), next_runs: self.next_runs.lock().clone() }
    }

    async fn run_loop(
        runner: Arc<dyn CycleRunner>,
        config: CycleSchedulerConfig,
        cancel: CancellationToken,
        next_runs: NextRuns,
    ) {
        let now = Instant::now();
        let mut schedule: Vec<(CycleKind, Instant)> = KINDS
            .into_iter()
            .filter(|kind| config.interval(*kind).is_some())
            .map(|kind| (kind, now))
            .collect();

        if schedule.is_empty() {
            warn!("every cycle kind is disabled; scheduler idle");
            cancel.cancelled().await;
            return;
        }

        loop {
            publish(&next_runs, &schedule);

            // Earliest due wins; ties go to the kind listed first.
            let Some((slot, due)) = schedule
                .iter()
                .enumerate()
                .min_by_key(|(_, (_, at))| *at)
                .map(|(slot, (_, at))| (slot, *at))
            else {
                break;
            };

            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!("Cycle loop cancelled");
                    break;
                }
                () = tokio::time::sleep_until(due) => {}
            }

            let kind = schedule[slot].0;
            Self::run_job(runner.as_ref(), kind, config.job_timeout, &cancel).await;

            if let Some(interval) = config.interval(kind) {
                schedule[slot].1 = Instant::now() + interval;
            }
        }
    }

    #[instrument(skip(runner, cancel))]
    async fn run_job(
        runner: &dyn CycleRunner,
        kind: CycleKind,
        job_timeout: Duration,
        cancel: &CancellationToken,
    ) {
        let child = cancel.child_token();
        let started = Instant::now();
        let mut job = runner.run_cycle(kind, child.clone());

        let summary = match tokio::time::timeout(job_timeout, &mut job).await {
            Ok(summary) => summary,
            Err(_) => {
                warn!(timeout_secs = job_timeout.as_secs(), "cycle timed out; cancelling");
                child.cancel();
                job.await
            }
        };

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        if summary.aborted.is_some() {
            warn!(elapsed_ms, %summary, "cycle aborted");
        } else {
            info!(elapsed_ms, %summary, "cycle finished");
        }
    }
}

impl Drop for CycleScheduler {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
    }
}

fn publish(next_runs: &NextRuns, schedule: &[(CycleKind, Instant)]) {
    let now = Instant::now();
    let wall_now = Utc::now();
    let mut published = next_runs.lock();
    published.clear();
    published.extend(schedule.iter().map(|(kind, at)| {
        let wait = at.saturating_duration_since(now);
        let wait = chrono::Duration::from_std(wait).unwrap_or_else(|_| chrono::Duration::zero());
        (*kind, wall_now + wait)
    }));
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use calrecon_domain::CycleSummary;

    use super::*;

    #[derive(Default)]
    struct RecordingRunner {
        runs: StdMutex<Vec<CycleKind>>,
        /// When set, ingestion blocks until its token is cancelled
        hang_ingestion: bool,
        saw_cancel: AtomicBool,
    }

    impl RecordingRunner {
        fn runs(&self) -> Vec<CycleKind> {
            self.runs.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CycleRunner for RecordingRunner {
        async fn run_cycle(&self, kind: CycleKind, cancel: CancellationToken) -> CycleSummary {
            self.runs.lock().unwrap().push(kind);
            let mut summary = CycleSummary::new(kind, Utc::now());
            if self.hang_ingestion && kind == CycleKind::Ingestion {
                cancel.cancelled().await;
                self.saw_cancel.store(true, Ordering::SeqCst);
                summary.cancelled = true;
            }
            summary
        }
    }

    fn config(ingest: u64, scan: u64, reconcile: u64) -> CycleSchedulerConfig {
        CycleSchedulerConfig {
            ingest_interval: Duration::from_secs(ingest),
            scan_interval: Duration::from_secs(scan),
            reconcile_interval: Duration::from_secs(reconcile),
            job_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn kinds_run_on_their_own_intervals() {
        let runner = Arc::new(RecordingRunner::default());
        let mut scheduler = CycleScheduler::new(runner.clone(), config(30, 10, 0));

        scheduler.start().await.unwrap();
        tokio::time::sleep(Duration::from_secs(25)).await;
        scheduler.stop().await.unwrap();

        assert_eq!(
            runner.runs(),
            vec![
                CycleKind::Ingestion,
                CycleKind::DriftScan,
                CycleKind::DriftScan,
                CycleKind::DriftScan
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn lifecycle_errors() {
        let runner = Arc::new(RecordingRunner::default());
        let mut scheduler = CycleScheduler::new(runner, config(60, 60, 0));

        assert!(matches!(scheduler.stop().await, Err(SchedulerError::NotRunning)));
        scheduler.start().await.unwrap();
        assert!(matches!(scheduler.start().await, Err(SchedulerError::AlreadyRunning)));
        scheduler.stop().await.unwrap();
        assert!(!scheduler.is_running());

        // Restart after stop is allowed.
        scheduler.start().await.unwrap();
        assert!(scheduler.is_running());
        scheduler.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn overrunning_cycle_is_cancelled_and_awaited() {
        let runner = Arc::new(RecordingRunner { hang_ingestion: true, ..Default::default() });
        let mut scheduler = CycleScheduler::new(runner.clone(), config(60, 3, 0));

        scheduler.start().await.unwrap();
        tokio::time::sleep(Duration::from_secs(6)).await;

        assert!(runner.saw_cancel.load(Ordering::SeqCst));
        // The scan that was due during the hung ingestion ran afterwards.
        assert_eq!(runner.runs(), vec![CycleKind::Ingestion, CycleKind::DriftScan]);
        scheduler.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn status_lists_enabled_kinds_only() {
        let runner = Arc::new(RecordingRunner::default());
        let mut scheduler = CycleScheduler::new(runner, config(0, 900, 1800));
        assert!(!scheduler.status().running);

        scheduler.start().await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        let status = scheduler.status();
        assert!(status.running);
        let kinds: Vec<CycleKind> = status.next_runs.iter().map(|(kind, _)| *kind).collect();
        assert_eq!(kinds, vec![CycleKind::DriftScan, CycleKind::Reconcile]);
        scheduler.stop().await.unwrap();
    }
}
