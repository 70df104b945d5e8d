//! Decision rules for ingestion output and drift reports

use std::sync::Arc;

use calrecon_common::time::Clock;
use calrecon_domain::{EventRecord, ReconcileConfig, RecordKey, Result};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, instrument};

use super::plan::{Action, DeleteCause, Plan};
use crate::drift::{Drift, DriftReport};
use crate::identity::{Admission, BatchGuard};
use crate::ports::{CanonicalStore, SuppressionList};

const ABSENT_REASON: &str = "confirmed absent from calendar";

/// Thresholds the reconciler applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilePolicy {
    /// Consecutive missed scans before a record is deleted
    pub required_misses: u32,
    /// Lifetime of suppressions created by confirmed deletions; `None` keeps them forever
    pub suppression_ttl: Option<Duration>,
}

impl ReconcilePolicy {
    pub fn from_config(config: &ReconcileConfig) -> Self {
        Self {
            required_misses: config.required_misses(),
            suppression_ttl: config.suppression_ttl_days.map(|d| Duration::days(i64::from(d))),
        }
    }

    fn expiry(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.suppression_ttl.map(|ttl| now + ttl)
    }
}

/// Reads the canonical store and suppression list to decide what each
/// observation means. Never writes; the writer executes the plan.
pub struct Reconciler {
    store: Arc<dyn CanonicalStore>,
    suppressions: Arc<dyn SuppressionList>,
    policy: ReconcilePolicy,
    clock: Arc<dyn Clock>,
}

/// `existing` with the content of `incoming`, keeping its external ref and status.
fn merge_content(existing: &EventRecord, incoming: &EventRecord) -> EventRecord {
    let mut merged = existing.clone();
    merged.fields = incoming.fields.clone();
    merged.attributes = incoming.attributes.clone();
    merged.source_kind = incoming.source_kind;
    merged
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn CanonicalStore>,
        suppressions: Arc<dyn SuppressionList>,
        policy: ReconcilePolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { store, suppressions, policy, clock }
    }

    /// Plan the writes for feed records bound for `target_location`.
    #[instrument(skip(self, records), fields(records = records.len()))]
    pub async fn plan_ingestion(
        &self,
        target_location: &str,
        records: Vec<EventRecord>,
    ) -> Result<Plan> {
        let mut plan = Plan::new(target_location);
        let mut guard = BatchGuard::new();

        for record in records {
            let key = record.key();
            match guard.admit(&key, &record.fields.summary) {
                Admission::First => {}
                Admission::Duplicate => {
                    plan.skipped += 1;
                    continue;
                }
                Admission::SignatureCollision => {
                    plan.warnings.push(BatchGuard::collision_message(&key, &record.fields.summary));
                    plan.skipped += 1;
                    continue;
                }
            }

            let Some(existing) = self.store.find(&key).await? else {
                plan.push(Action::Create { record: Box::new(record), remote: true });
                continue;
            };

            if existing.consecutive_misses > 0 {
                let misses = existing.consecutive_misses;
                debug!(key = %key, misses, "record missing from calendar; ingestion deferred");
                plan.skipped += 1;
            } else if existing.external_ref.is_none() {
                let mut retry = merge_content(&existing, &record);
                retry.external_ref = None;
                plan.push(Action::Create { record: Box::new(retry), remote: true });
            } else if existing.content_differs(&record) {
                let merged = merge_content(&existing, &record);
                plan.push(Action::Update { record: Box::new(merged), remote: true });
            } else {
                plan.unchanged += 1;
            }
        }

        Ok(plan.ordered())
    }

    /// Plan the bookkeeping and writes a drift scan calls for.
    #[instrument(
        skip(self, report),
        fields(location = %report.target_location, drifts = report.drifts.len())
    )]
    pub async fn plan_drift(&self, report: &DriftReport) -> Result<Plan> {
        let now = self.clock.now();
        let mut plan = Plan::new(&report.target_location);
        plan.skipped = report.ignored;
        plan.warnings.clone_from(&report.warnings);

        for drift in &report.drifts {
            match drift {
                Drift::Added { record } => self.plan_added(&mut plan, record, now).await?,
                Drift::Missing { record } => self.plan_missing(&mut plan, record, now),
                Drift::Stale { stored, live } => plan.push(Self::plan_stale(stored, live, now)),
                Drift::Moved { stored, external_ref } => plan.push(Action::Move {
                    key: stored.key(),
                    to_location: stored.target_location.clone(),
                    external_ref: external_ref.clone(),
                }),
                Drift::Unchanged { key } => plan.push(Action::Touch { key: key.clone() }),
                Drift::Duplicate { key, external_ref } => plan.push(Action::Delete {
                    key: key.clone(),
                    external_ref: Some(external_ref.clone()),
                    cause: DeleteCause::Duplicate,
                }),
            }
        }

        Ok(plan.ordered())
    }

    async fn plan_added(
        &self,
        plan: &mut Plan,
        record: &EventRecord,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let key = record.key();
        if let Some(hit) = self.suppressions.matches(&key, &record.fields.summary, now).await? {
            debug!(key = %key, reason = hit.reason(), "suppressed event seen in calendar");
            plan.skipped += 1;
            return Ok(());
        }

        let active = self.store.find_active_by_identity(&record.identity).await?;
        if active.iter().any(|r| r.target_location == record.target_location) {
            // Stored outside the scanned window but listed inside it.
            plan.push(Action::Touch { key });
        } else if let Some(origin) = active.iter().find(|r| r.consecutive_misses > 0) {
            // Only an origin already missing from its own location has moved;
            // a copy still live there is a second, independent event.
            let to = record.target_location.as_str();
            info!(key = %origin.key(), to, "event moved between locations");
            plan.push(Action::Move {
                key: origin.key(),
                to_location: record.target_location.clone(),
                external_ref: record.external_ref.clone().unwrap_or_default(),
            });
        } else {
            plan.push(Action::Create { record: Box::new(record.clone()), remote: false });
        }
        Ok(())
    }

    fn plan_missing(&self, plan: &mut Plan, record: &EventRecord, now: DateTime<Utc>) {
        let key = record.key();
        let misses = record.consecutive_misses.saturating_add(1);
        if misses < self.policy.required_misses {
            let required = self.policy.required_misses;
            debug!(key = %key, misses, required, "record missing; cooling down");
            plan.push(Action::MarkMissing { key });
            return;
        }

        info!(key = %key, misses, "record confirmed absent; deleting and suppressing");
        plan.push(Action::Delete {
            key: key.clone(),
            external_ref: record.external_ref.clone(),
            cause: DeleteCause::ConfirmedAbsent,
        });
        plan.push(Action::Suppress {
            key,
            summary: Some(record.fields.summary.clone()),
            reason: ABSENT_REASON.to_string(),
            expires_at: self.policy.expiry(now),
        });
    }

    /// Fed records follow the feed, so calendar edits are overwritten.
    /// Everything else follows the calendar.
    fn plan_stale(stored: &EventRecord, live: &EventRecord, now: DateTime<Utc>) -> Action {
        let fields_changed = stored.fields != live.fields;
        let mut record = if stored.source_kind.is_fed() {
            let mut canonical = stored.clone();
            canonical.lifecycle_status = live.lifecycle_status;
            canonical
        } else {
            let mut mirrored = merge_content(stored, live);
            mirrored.lifecycle_status = live.lifecycle_status;
            mirrored.source_kind = stored.source_kind;
            mirrored
        };
        record.observe(now);

        let remote = stored.source_kind.is_fed() && fields_changed;
        Action::Update { record: Box::new(record), remote }
    }

    /// Operator suppression: remove from both sides and block re-creation.
    pub fn plan_suppress(
        &self,
        record: &EventRecord,
        reason: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Plan {
        let key: RecordKey = record.key();
        let mut plan = Plan::new(&record.target_location);
        plan.push(Action::Delete {
            key: key.clone(),
            external_ref: record.external_ref.clone(),
            cause: DeleteCause::Operator,
        });
        plan.push(Action::Suppress {
            key,
            summary: Some(record.fields.summary.clone()),
            reason: reason.to_string(),
            expires_at,
        });
        plan
    }
}
