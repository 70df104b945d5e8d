//! Plan execution against the calendar service and the canonical store

pub mod locks;

use std::sync::Arc;

use calrecon_common::time::Clock;
use calrecon_domain::{
    CycleSummary, EventDraft, EventRecord, LastAction, ReconError, RecordKey, Result,
    SuppressionEntry,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

pub use locks::LocationLocks;

use crate::ports::{CalendarService, CanonicalStore, SuppressionList};
use crate::reconcile::{Action, DeleteCause, Plan};
use crate::remote::RemoteCaller;

/// What one action did, for the cycle counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Created,
    Updated,
    Deleted,
    Suppressed,
    Skipped,
    Unchanged,
    /// Miss counter advanced; not a mutation of content
    Recorded,
}

impl Applied {
    fn tally(self, summary: &mut CycleSummary) {
        match self {
            Self::Created => summary.created += 1,
            Self::Updated => summary.updated += 1,
            Self::Deleted => summary.deleted += 1,
            Self::Suppressed => summary.suppressed += 1,
            Self::Skipped => summary.skipped += 1,
            Self::Unchanged => summary.unchanged += 1,
            Self::Recorded => {}
        }
    }
}

/// Executes plans one action at a time, isolating per-action failures.
pub struct Writer {
    store: Arc<dyn CanonicalStore>,
    suppressions: Arc<dyn SuppressionList>,
    calendar: Arc<dyn CalendarService>,
    remote: RemoteCaller,
    locks: LocationLocks,
    clock: Arc<dyn Clock>,
}

impl Writer {
    pub fn new(
        store: Arc<dyn CanonicalStore>,
        suppressions: Arc<dyn SuppressionList>,
        calendar: Arc<dyn CalendarService>,
        remote: RemoteCaller,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { store, suppressions, calendar, remote, locks: LocationLocks::new(), clock }
    }

    /// Apply `plan`, folding the results into `summary`.
    ///
    /// Cancellation is checked between actions, never during one. Auth and
    /// store failures stop the rest of the plan; anything else only fails
    /// the action it happened in.
    #[instrument(skip_all, fields(location = %plan.target_location, actions = plan.actions.len()))]
    pub async fn apply(&self, plan: Plan, summary: &mut CycleSummary, cancel: &CancellationToken) {
        summary.skipped += plan.skipped;
        summary.unchanged += plan.unchanged;
        summary.warnings.extend(plan.warnings);
        if plan.actions.is_empty() {
            return;
        }

        let _guard = self.locks.lock(&plan.target_location).await;
        let total = plan.actions.len();

        for (index, action) in plan.actions.into_iter().enumerate() {
            if cancel.is_cancelled() {
                info!(remaining = total - index, "cancelled; leaving remaining actions");
                summary.cancelled = true;
                break;
            }

            let name = action.name();
            let key = action.key();
            match self.apply_action(action).await {
                Ok(applied) => {
                    debug!(action = name, key = %key, ?applied, "action applied");
                    applied.tally(summary);
                }
                Err(err) if err.aborts_cycle() => {
                    error!(action = name, key = %key, error = %err, "aborting plan");
                    summary.aborted = Some(err.to_string());
                    break;
                }
                Err(ReconError::Validation(reason)) => {
                    warn!(action = name, key = %key, %reason, "action skipped");
                    summary.skipped += 1;
                }
                Err(err) => {
                    warn!(action = name, key = %key, error = %err, "action failed");
                    summary.failed += 1;
                }
            }
        }
    }

    async fn apply_action(&self, action: Action) -> Result<Applied> {
        let now = self.clock.now();
        match action {
            Action::Create { record, remote } => self.create(*record, remote).await,
            Action::Update { record, remote } => self.update(*record, remote).await,
            Action::Delete { key, external_ref, cause } => {
                self.delete(&key, external_ref.as_deref(), cause).await
            }
            Action::Suppress { key, summary, reason, expires_at } => {
                let mut entry = SuppressionEntry::new(key, reason, now, expires_at);
                if let Some(summary) = summary {
                    entry = entry.with_summary(summary);
                }
                self.suppressions.add(entry).await?;
                Ok(Applied::Suppressed)
            }
            Action::Move { key, to_location, external_ref } => {
                self.store.relocate(&key, &to_location, &external_ref, now).await?;
                info!(key = %key, to = %to_location, %external_ref, "record moved");
                Ok(Applied::Updated)
            }
            Action::Touch { key } => {
                self.store.touch_observed(&key, now).await?;
                Ok(Applied::Unchanged)
            }
            Action::MarkMissing { key } => {
                let misses = self.store.record_miss(&key, now).await?;
                debug!(key = %key, misses, "miss recorded");
                Ok(Applied::Recorded)
            }
        }
    }

    async fn create(&self, mut record: EventRecord, remote: bool) -> Result<Applied> {
        record.updated_at = self.clock.now();
        let location = record.target_location.clone();
        let mut created_ref = None;
        if remote {
            let draft = EventDraft::from_record(&record);
            let external_ref =
                self.remote.call("create", || self.calendar.create(&location, &draft)).await?;
            record.external_ref = Some(external_ref.clone());
            created_ref = Some(external_ref);
        }

        match self.store.upsert(record.clone()).await {
            Ok(outcome) if outcome.action == LastAction::Created || created_ref.is_some() => {
                Ok(Applied::Created)
            }
            Ok(_) => Ok(Applied::Updated),
            Err(ReconError::ConflictOnUpsert(reason)) => {
                warn!(key = %record.key(), %reason, "upsert conflict; re-reading");
                self.resolve_conflict(record, created_ref.as_deref()).await
            }
            Err(err) => Err(err),
        }
    }

    /// Another writer got there first. Fold our content into the row that
    /// won, or retry once if that row is already gone.
    async fn resolve_conflict(
        &self,
        record: EventRecord,
        created_ref: Option<&str>,
    ) -> Result<Applied> {
        let key = record.key();
        let Some(existing) = self.store.find(&key).await? else {
            return match self.store.upsert(record).await?.action {
                LastAction::Created => Ok(Applied::Created),
                _ => Ok(Applied::Updated),
            };
        };

        let mut merged = existing.clone();
        merged.fields = record.fields;
        merged.attributes = record.attributes;
        merged.source_kind = record.source_kind;
        merged.updated_at = record.updated_at;

        match (existing.external_ref.as_deref(), created_ref) {
            (Some(kept), Some(ours)) if kept != ours => {
                let location = key.target_location.as_str();
                let removed =
                    self.remote.call("delete", || self.calendar.delete(location, ours)).await;
                match removed {
                    Ok(()) => debug!(key = %key, external_ref = ours, "duplicate event removed"),
                    Err(err) if err.is_not_found() => {}
                    Err(err) => {
                        warn!(key = %key, external_ref = ours, error = %err, "duplicate kept");
                    }
                }
            }
            (None, Some(ours)) => merged.external_ref = Some(ours.to_string()),
            _ => {}
        }

        self.store.upsert(merged).await?;
        Ok(Applied::Updated)
    }

    async fn update(&self, mut record: EventRecord, remote: bool) -> Result<Applied> {
        record.updated_at = self.clock.now();
        if remote {
            let Some(external_ref) = record.external_ref.as_deref() else {
                return Err(ReconError::Validation(format!(
                    "cannot update {} without an external ref",
                    record.key()
                )));
            };
            let draft = EventDraft::from_record(&record);
            let location = record.target_location.as_str();
            let pushed = self
                .remote
                .call("update", || self.calendar.update(location, external_ref, &draft))
                .await;
            match pushed {
                Ok(()) => {}
                Err(err) if err.is_not_found() => {
                    // The next drift scan sees it missing; never recreate here.
                    info!(key = %record.key(), "calendar event gone before update");
                    return Ok(Applied::Skipped);
                }
                Err(err) => return Err(err),
            }
        }

        self.store.upsert(record).await?;
        Ok(Applied::Updated)
    }

    async fn delete(
        &self,
        key: &RecordKey,
        external_ref: Option<&str>,
        cause: DeleteCause,
    ) -> Result<Applied> {
        if cause.touches_remote() {
            if let Some(external_ref) = external_ref {
                let removed = self
                    .remote
                    .call("delete", || self.calendar.delete(&key.target_location, external_ref))
                    .await;
                match removed {
                    Ok(()) => {}
                    Err(err) if err.is_not_found() => {
                        debug!(key = %key, external_ref, "calendar event already gone");
                    }
                    Err(err) => return Err(err),
                }
            }
        }

        if !cause.touches_store() {
            info!(key = %key, ?external_ref, "duplicate calendar event removed");
            return Ok(Applied::Deleted);
        }

        if self.store.soft_delete(key, self.clock.now()).await? {
            info!(key = %key, ?cause, "record deleted");
            Ok(Applied::Deleted)
        } else {
            Ok(Applied::Skipped)
        }
    }
}
