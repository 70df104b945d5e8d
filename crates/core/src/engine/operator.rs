//! Administrative operations on top of the cycle machinery

use calrecon_domain::{
    CycleKind, CycleSummary, EventRecord, ReconError, RecordKey, Result, SuppressionEntry,
    SuppressionPattern,
};
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::ReconciliationEngine;
use crate::reconcile::{Action, Plan};

impl ReconciliationEngine {
    /// Remove an event from the calendar and the store and keep it out.
    ///
    /// A key with no active record is suppressed ahead of time, which stops
    /// a future ingestion from creating it.
    pub async fn suppress(
        &self,
        key: &RecordKey,
        reason: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<CycleSummary> {
        let now = self.clock.now();
        let mut summary =
            CycleSummary::new(CycleKind::Reconcile, now).for_location(&key.target_location);

        match self.store.find(key).await? {
            Some(record) => {
                let plan = self.reconciler.plan_suppress(&record, reason, expires_at);
                self.writer.apply(plan, &mut summary, &CancellationToken::new()).await;
            }
            None => {
                let entry = SuppressionEntry::new(key.clone(), reason, now, expires_at);
                self.suppressions.add(entry).await?;
                summary.suppressed += 1;
            }
        }

        info!(key = %key, reason, "operator suppression");
        summary.finish(self.clock.now());
        Ok(summary)
    }

    /// Bring back a deleted record, lift its suppression and recreate the
    /// calendar event.
    ///
    /// The old calendar event is gone, so its reference is cleared in the
    /// store before the create. If the create fails the record is left
    /// without one and the next ingestion retries it.
    pub async fn restore(&self, key: &RecordKey) -> Result<CycleSummary> {
        let mut record: EventRecord = self.store.restore(key, self.clock.now()).await?;
        record.external_ref = None;
        record.updated_at = self.clock.now();
        let record = self.store.upsert(record).await?.record;
        self.suppressions.remove(key).await?;
        info!(key = %key, "record restored");

        let mut plan = Plan::new(&key.target_location);
        plan.push(Action::Create { record: Box::new(record), remote: true });

        let mut summary = CycleSummary::new(CycleKind::Reconcile, self.clock.now())
            .for_location(&key.target_location);
        self.writer.apply(plan, &mut summary, &CancellationToken::new()).await;
        summary.finish(self.clock.now());
        match summary.aborted.take() {
            Some(reason) => {
                Err(ReconError::Internal(format!("restore of {key} aborted: {reason}")))
            }
            None => Ok(summary),
        }
    }

    /// Lift a suppression without touching the record.
    pub async fn unsuppress(&self, key: &RecordKey) -> Result<bool> {
        let removed = self.suppressions.remove(key).await?;
        info!(key = %key, removed, "suppression lifted");
        Ok(removed)
    }

    pub async fn add_pattern(&self, pattern: SuppressionPattern) -> Result<i64> {
        let id = self.suppressions.add_pattern(pattern).await?;
        info!(id, "suppression pattern added");
        Ok(id)
    }

    pub async fn remove_pattern(&self, id: i64) -> Result<bool> {
        self.suppressions.remove_pattern(id).await
    }

    pub async fn active_suppressions(&self) -> Result<Vec<SuppressionEntry>> {
        self.suppressions.list_active(self.clock.now()).await
    }
}
