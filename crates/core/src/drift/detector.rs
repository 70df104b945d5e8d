//! Pure comparison of stored records against a live calendar snapshot

use std::collections::HashMap;

use calrecon_domain::{
    EventRecord, Identity, IdentityKind, LifecycleStatus, LiveEvent, RecordKey, TimeWindow,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use super::live_record::record_from_live;
use crate::identity::{resolve, BatchGuard, IdentityInputs};

/// How one identity differs between the store and the calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "drift", rename_all = "snake_case")]
pub enum Drift {
    /// Live only; `record` is built from the live event
    Added { record: Box<EventRecord> },
    /// Stored only
    Missing { record: Box<EventRecord> },
    /// Same event, different content or response status
    Stale { stored: Box<EventRecord>, live: Box<EventRecord> },
    /// Same identity under another external ref
    Moved { stored: Box<EventRecord>, external_ref: String },
    Unchanged { key: RecordKey },
    /// Extra live copy of a system-written event
    Duplicate { key: RecordKey, external_ref: String },
}

/// Everything one scan of one location found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriftReport {
    pub target_location: String,
    pub window: TimeWindow,
    pub scanned_at: DateTime<Utc>,
    pub drifts: Vec<Drift>,
    /// Live events left out: cancelled, or colliding with an earlier one
    pub ignored: u32,
    pub warnings: Vec<String>,
}

impl DriftReport {
    pub fn count(&self, predicate: impl Fn(&Drift) -> bool) -> usize {
        self.drifts.iter().filter(|d| predicate(d)).count()
    }
}

/// Stateless scanner; `class_categories` decides how fed events are labelled.
#[derive(Debug, Clone, Default)]
pub struct DriftDetector {
    class_categories: Vec<String>,
}

impl DriftDetector {
    pub const fn new(class_categories: Vec<String>) -> Self {
        Self { class_categories }
    }

    /// Compare `live` with `records` for one location.
    ///
    /// Records that start outside `window` are not part of the comparison,
    /// since the calendar listing could not have returned them.
    pub fn detect(
        &self,
        target_location: &str,
        window: TimeWindow,
        live: &[LiveEvent],
        records: &[EventRecord],
        now: DateTime<Utc>,
    ) -> DriftReport {
        let mut report = DriftReport {
            target_location: target_location.to_string(),
            window,
            scanned_at: now,
            drifts: Vec::new(),
            ignored: 0,
            warnings: Vec::new(),
        };

        let stored: HashMap<&Identity, &EventRecord> = records
            .iter()
            .filter(|r| r.is_active() && window.contains(r.fields.start))
            .map(|r| (&r.identity, r))
            .collect();

        // Group live events by identity, keeping first-seen order.
        let mut order: Vec<Identity> = Vec::new();
        let mut groups: HashMap<Identity, Vec<&LiveEvent>> = HashMap::new();
        for event in live {
            if event.cancelled {
                report.ignored += 1;
                continue;
            }
            let identity = resolve(&IdentityInputs::from(event));
            let group = groups.entry(identity.clone()).or_default();
            if group.is_empty() {
                order.push(identity);
            }
            group.push(event);
        }

        for identity in &order {
            let Some(group) = groups.get(identity) else { continue };
            let existing = stored.get(identity).copied();
            let primary_index = existing
                .and_then(|r| r.external_ref.as_deref())
                .and_then(|ext| group.iter().position(|e| e.external_ref == ext))
                .unwrap_or(0);
            let Some(primary) = group.get(primary_index).copied() else { continue };
            let key = RecordKey::new(identity.clone(), target_location);

            for (index, extra) in group.iter().enumerate().filter(|(i, _)| *i != primary_index) {
                Self::report_extra(&mut report, &key, extra, index);
            }

            report.drifts.push(match existing {
                None => Drift::Added {
                    record: Box::new(record_from_live(
                        primary,
                        identity.clone(),
                        target_location,
                        &self.class_categories,
                        now,
                    )),
                },
                Some(record) => self.compare(record, primary, now),
            });
        }

        for record in records.iter().filter(|r| r.is_active() && window.contains(r.fields.start)) {
            if !groups.contains_key(&record.identity) {
                report.drifts.push(Drift::Missing { record: Box::new(record.clone()) });
            }
        }

        debug!(
            location = target_location,
            live = live.len(),
            stored = stored.len(),
            drifts = report.drifts.len(),
            "drift scan compared"
        );
        report
    }

    fn report_extra(
        report: &mut DriftReport,
        key: &RecordKey,
        extra: &LiveEvent,
        index: usize,
    ) {
        match key.identity.kind() {
            IdentityKind::Reservation => report.drifts.push(Drift::Duplicate {
                key: key.clone(),
                external_ref: extra.external_ref.clone(),
            }),
            IdentityKind::Signature => {
                let summary = extra.fields.summary.as_str();
                warn!(key = %key, summary, "signature collision in listing");
                report.warnings.push(BatchGuard::collision_message(key, summary));
                report.ignored += 1;
            }
            IdentityKind::Uid => {
                warn!(key = %key, index, external_ref = %extra.external_ref, "repeated uid");
                report.ignored += 1;
            }
        }
    }

    fn compare(&self, stored: &EventRecord, live: &LiveEvent, now: DateTime<Utc>) -> Drift {
        if stored.external_ref.as_deref() != Some(live.external_ref.as_str()) {
            return Drift::Moved {
                stored: Box::new(stored.clone()),
                external_ref: live.external_ref.clone(),
            };
        }

        let declined_changed =
            (stored.lifecycle_status == LifecycleStatus::Declined) != live.declined;
        if stored.fields == live.fields && !declined_changed {
            return Drift::Unchanged { key: stored.key() };
        }

        let mirrored = record_from_live(
            live,
            stored.identity.clone(),
            &stored.target_location,
            &self.class_categories,
            now,
        );
        Drift::Stale { stored: Box::new(stored.clone()), live: Box::new(mirrored) }
    }
}
