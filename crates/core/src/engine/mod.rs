//! Cycle orchestration: wires ingestion, drift detection, reconciliation
//! and writing into the three cycle kinds the scheduler runs.

mod operator;

use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use calrecon_common::time::Clock;
use calrecon_domain::{
    Config, CycleKind, CycleSummary, DateRange, EventRecord, FeedQuery, ReconError, Result,
    TimeWindow,
};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::drift::{Drift, DriftDetector, DriftReport};
use crate::ingestion::{IngestItem, IngestionAdapter};
use crate::ports::{CalendarService, CanonicalStore, FeedSource, SuppressionList};
use crate::reconcile::{Plan, ReconcilePolicy, Reconciler};
use crate::remote::{executor, retry_config, RemoteCaller};
use crate::writer::Writer;

/// Something the scheduler can run.
#[async_trait]
pub trait CycleRunner: Send + Sync {
    /// Always returns a summary, even when the cycle fails or is cancelled.
    async fn run_cycle(&self, kind: CycleKind, cancel: CancellationToken) -> CycleSummary;
}

/// Adapters the engine is built from
#[derive(Clone)]
pub struct EnginePorts {
    pub store: Arc<dyn CanonicalStore>,
    pub suppressions: Arc<dyn SuppressionList>,
    pub feed: Arc<dyn FeedSource>,
    pub calendar: Arc<dyn CalendarService>,
}

/// Reconciliation engine
pub struct ReconciliationEngine {
    config: Config,
    store: Arc<dyn CanonicalStore>,
    suppressions: Arc<dyn SuppressionList>,
    calendar: Arc<dyn CalendarService>,
    ingestion: IngestionAdapter,
    detector: DriftDetector,
    reconciler: Reconciler,
    writer: Writer,
    scanner: RemoteCaller,
    clock: Arc<dyn Clock>,
}

fn record_failure(summary: &mut CycleSummary, stage: &str, err: &ReconError) {
    if err.aborts_cycle() {
        error!(stage, error = %err, "cycle aborted");
        summary.aborted = Some(err.to_string());
    } else {
        warn!(stage, error = %err, "cycle step failed");
        summary.failed += 1;
        summary.warn(format!("{stage}: {err}"));
    }
}

impl ReconciliationEngine {
    pub fn new(config: Config, ports: EnginePorts, clock: Arc<dyn Clock>) -> Self {
        let retry = retry_config(&config.writer);
        let ingestion = IngestionAdapter::new(
            Arc::clone(&ports.feed),
            Arc::clone(&ports.suppressions),
            config.feed.clone(),
            executor(retry.clone()),
            Arc::clone(&clock),
        );
        let reconciler = Reconciler::new(
            Arc::clone(&ports.store),
            Arc::clone(&ports.suppressions),
            ReconcilePolicy::from_config(&config.reconcile),
            Arc::clone(&clock),
        );
        let writer = Writer::new(
            Arc::clone(&ports.store),
            Arc::clone(&ports.suppressions),
            Arc::clone(&ports.calendar),
            RemoteCaller::from_config(&config.writer),
            Arc::clone(&clock),
        );
        let scanner = RemoteCaller::new(
            retry,
            Duration::ZERO,
            Duration::from_secs(config.calendar.request_timeout_secs),
        );

        Self {
            detector: DriftDetector::new(config.feed.class_categories.clone()),
            store: ports.store,
            suppressions: ports.suppressions,
            calendar: ports.calendar,
            config,
            ingestion,
            reconciler,
            writer,
            scanner,
            clock,
        }
    }

    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Date range an ingestion cycle covers, relative to today.
    pub fn ingest_range(&self) -> DateRange {
        let feed = &self.config.feed;
        DateRange::around(self.clock.now().date_naive(), feed.lookback_days, feed.lookahead_days)
    }

    /// Instant window a drift scan lists, relative to today.
    pub fn scan_window(&self) -> TimeWindow {
        let calendar = &self.config.calendar;
        DateRange::around(
            self.clock.now().date_naive(),
            calendar.scan_lookback_days,
            calendar.scan_lookahead_days,
        )
        .to_window()
    }

    /// Pull every configured feed query and write the results.
    pub async fn run_ingestion(&self, cancel: &CancellationToken) -> CycleSummary {
        let mut summary = CycleSummary::new(CycleKind::Ingestion, self.clock.now());
        self.purge_suppressions(&mut summary).await;

        let range = self.ingest_range();
        for query in &self.config.feed.queries {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            let part = self.ingest(query, range, cancel).await;
            summary.absorb(&part);
            if part.aborted.is_some() {
                break;
            }
        }

        summary.finish(self.clock.now());
        summary
    }

    /// Ingest one query over an explicit date range.
    #[instrument(
        skip(self, query, cancel),
        fields(query = %query.name, location = %query.target_location)
    )]
    pub async fn ingest(
        &self,
        query: &FeedQuery,
        range: DateRange,
        cancel: &CancellationToken,
    ) -> CycleSummary {
        let mut summary = CycleSummary::new(CycleKind::Ingestion, self.clock.now())
            .for_location(&query.target_location);

        if let Some(records) = self.collect_feed(query, range, &mut summary).await {
            match self.reconciler.plan_ingestion(&query.target_location, records).await {
                Ok(plan) => self.writer.apply(plan, &mut summary, cancel).await,
                Err(err) => record_failure(&mut summary, "plan ingestion", &err),
            }
        }

        summary.finish(self.clock.now());
        summary
    }

    /// Drain the ingestion stream. `None` when the cycle has to stop.
    async fn collect_feed(
        &self,
        query: &FeedQuery,
        range: DateRange,
        summary: &mut CycleSummary,
    ) -> Option<Vec<EventRecord>> {
        let mut records = Vec::new();
        let mut stream = pin!(self.ingestion.stream(query, range));

        while let Some(item) = stream.next().await {
            match item {
                Ok(IngestItem::Record(record)) => records.push(*record),
                Ok(IngestItem::Filtered { .. } | IngestItem::Suppressed { .. }) => {
                    summary.skipped += 1;
                }
                Ok(IngestItem::Invalid { reason }) => {
                    summary.skipped += 1;
                    summary.warn(format!("invalid feed event: {reason}"));
                }
                Err(err) => {
                    record_failure(summary, "feed window", &err);
                    if err.aborts_cycle() {
                        return None;
                    }
                }
            }
        }
        Some(records)
    }

    /// Scan every target location for drift.
    pub async fn run_drift_scan(&self, cancel: &CancellationToken) -> CycleSummary {
        let mut summary = CycleSummary::new(CycleKind::DriftScan, self.clock.now());
        for location in self.config.target_locations() {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            let part = self.scan_location(&location, cancel).await;
            summary.absorb(&part);
            if part.aborted.is_some() {
                break;
            }
        }
        summary.finish(self.clock.now());
        summary
    }

    /// Scan one location and apply what the scan calls for.
    #[instrument(skip(self, cancel))]
    pub async fn scan_location(&self, location: &str, cancel: &CancellationToken) -> CycleSummary {
        let mut summary =
            CycleSummary::new(CycleKind::DriftScan, self.clock.now()).for_location(location);

        match self.drift_plan(location).await {
            Ok(plan) => self.writer.apply(plan, &mut summary, cancel).await,
            Err(err) => record_failure(&mut summary, "drift scan", &err),
        }

        summary.finish(self.clock.now());
        summary
    }

    /// List the calendar and compare it with the store.
    pub async fn detect(&self, location: &str) -> Result<DriftReport> {
        let window = self.scan_window();
        let live = self.scanner.call("list", || self.calendar.list(location, &window)).await?;
        let records = self.store.list_active(location).await?;
        let report = self.detector.detect(location, window, &live, &records, self.clock.now());
        info!(
            location,
            live = live.len(),
            stored = records.len(),
            drifts = report.drifts.len(),
            missing = report.count(|d| matches!(d, Drift::Missing { .. })),
            "drift detected"
        );
        Ok(report)
    }

    async fn drift_plan(&self, location: &str) -> Result<Plan> {
        let report = self.detect(location).await?;
        self.reconciler.plan_drift(&report).await
    }

    /// Full cycle: ingestion and drift merged into one plan per location,
    /// with drift-detected deletions taking precedence.
    pub async fn run_reconcile(&self, cancel: &CancellationToken) -> CycleSummary {
        let mut summary = CycleSummary::new(CycleKind::Reconcile, self.clock.now());
        self.purge_suppressions(&mut summary).await;
        let range = self.ingest_range();

        for location in self.config.target_locations() {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            let part = self.reconcile_location(&location, range, cancel).await;
            summary.absorb(&part);
            if part.aborted.is_some() {
                break;
            }
        }

        summary.finish(self.clock.now());
        summary
    }

    async fn reconcile_location(
        &self,
        location: &str,
        range: DateRange,
        cancel: &CancellationToken,
    ) -> CycleSummary {
        let mut summary =
            CycleSummary::new(CycleKind::Reconcile, self.clock.now()).for_location(location);

        let mut records = Vec::new();
        for query in self.config.feed.queries.iter().filter(|q| q.target_location == location) {
            match self.collect_feed(query, range, &mut summary).await {
                Some(batch) => records.extend(batch),
                None => {
                    summary.finish(self.clock.now());
                    return summary;
                }
            }
        }

        let plans = async {
            let drift = self.drift_plan(location).await?;
            let ingestion = self.reconciler.plan_ingestion(location, records).await?;
            Ok::<_, ReconError>(Plan::merge(ingestion, drift))
        };
        match plans.await {
            Ok(plan) => self.writer.apply(plan, &mut summary, cancel).await,
            Err(err) => record_failure(&mut summary, "reconcile", &err),
        }

        summary.finish(self.clock.now());
        summary
    }

    /// Non-deleted records for a location ordered by start; the source of
    /// the derived output feed.
    pub async fn derived_feed(&self, location: &str) -> Result<Vec<EventRecord>> {
        let mut records = self.store.list_active(location).await?;
        records.retain(EventRecord::is_active);
        records.sort_by_key(|r| r.fields.start);
        Ok(records)
    }

    async fn purge_suppressions(&self, summary: &mut CycleSummary) {
        match self.suppressions.purge_expired(self.clock.now()).await {
            Ok(0) => {}
            Ok(purged) => info!(purged, "expired suppressions purged"),
            Err(err) => record_failure(summary, "purge suppressions", &err),
        }
    }
}

#[async_trait]
impl CycleRunner for ReconciliationEngine {
    async fn run_cycle(&self, kind: CycleKind, cancel: CancellationToken) -> CycleSummary {
        match kind {
            CycleKind::Ingestion => self.run_ingestion(&cancel).await,
            CycleKind::DriftScan => self.run_drift_scan(&cancel).await,
            CycleKind::Reconcile => self.run_reconcile(&cancel).await,
        }
    }
}
