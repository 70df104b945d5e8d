//! Actions and the ordered plan the writer executes

use std::collections::HashSet;

use calrecon_domain::{EventRecord, RecordKey};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Why a record is being deleted; decides which side is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeleteCause {
    /// Gone from the calendar past the cooldown; the store catches up
    ConfirmedAbsent,
    /// Explicit suppression; removed from both sides
    Operator,
    /// Extra calendar copy; the stored record is kept
    Duplicate,
}

impl DeleteCause {
    pub const fn touches_remote(self) -> bool {
        !matches!(self, Self::ConfirmedAbsent)
    }

    pub const fn touches_store(self) -> bool {
        !matches!(self, Self::Duplicate)
    }
}

/// A single step of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// `remote` creates the calendar event first
    Create { record: Box<EventRecord>, remote: bool },
    /// `remote` pushes the fields to the calendar first
    Update { record: Box<EventRecord>, remote: bool },
    Delete { key: RecordKey, external_ref: Option<String>, cause: DeleteCause },
    Suppress {
        key: RecordKey,
        summary: Option<String>,
        reason: String,
        expires_at: Option<DateTime<Utc>>,
    },
    Move { key: RecordKey, to_location: String, external_ref: String },
    Touch { key: RecordKey },
    MarkMissing { key: RecordKey },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Phase {
    Bookkeeping,
    Delete,
    Update,
    Create,
}

impl Action {
    pub fn key(&self) -> RecordKey {
        match self {
            Self::Create { record, .. } | Self::Update { record, .. } => record.key(),
            Self::Delete { key, .. }
            | Self::Suppress { key, .. }
            | Self::Move { key, .. }
            | Self::Touch { key }
            | Self::MarkMissing { key } => key.clone(),
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
            Self::Suppress { .. } => "suppress",
            Self::Move { .. } => "move",
            Self::Touch { .. } => "touch",
            Self::MarkMissing { .. } => "mark_missing",
        }
    }

    const fn phase(&self) -> Phase {
        match self {
            Self::Touch { .. } | Self::MarkMissing { .. } | Self::Move { .. } => Phase::Bookkeeping,
            Self::Delete { .. } | Self::Suppress { .. } => Phase::Delete,
            Self::Update { .. } => Phase::Update,
            Self::Create { .. } => Phase::Create,
        }
    }

    /// Whether this action wins over ingestion for its key. Removing a
    /// duplicate calendar event leaves the record itself in place.
    const fn blocks_ingestion(&self) -> bool {
        matches!(
            self,
            Self::MarkMissing { .. }
                | Self::Delete { cause: DeleteCause::ConfirmedAbsent | DeleteCause::Operator, .. }
        )
    }
}

/// Ordered actions for one location plus the counts that never become actions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Plan {
    pub target_location: String,
    pub actions: Vec<Action>,
    pub skipped: u32,
    pub unchanged: u32,
    pub warnings: Vec<String>,
}

impl Plan {
    pub fn new(target_location: impl Into<String>) -> Self {
        Self { target_location: target_location.into(), ..Self::default() }
    }

    pub fn push(&mut self, action: Action) {
        self.actions.push(action);
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Sort into execution order: bookkeeping, deletes (each followed by its
    /// suppression), updates, creates. Order within a phase is kept.
    #[must_use]
    pub fn ordered(mut self) -> Self {
        self.actions.sort_by_key(Action::phase);
        self
    }

    /// Combine an ingestion plan with a drift plan for the same location.
    ///
    /// Ingestion creates and updates for keys the scan just found missing or
    /// deleted are dropped and counted as skipped.
    #[must_use]
    pub fn merge(ingestion: Self, drift: Self) -> Self {
        let blocked: HashSet<RecordKey> = drift
            .actions
            .iter()
            .filter(|a| a.blocks_ingestion())
            .map(Action::key)
            .collect();

        let mut merged = Self {
            target_location: drift.target_location,
            actions: drift.actions,
            skipped: drift.skipped + ingestion.skipped,
            unchanged: drift.unchanged + ingestion.unchanged,
            warnings: drift.warnings,
        };
        merged.warnings.extend(ingestion.warnings);

        for action in ingestion.actions {
            if blocked.contains(&action.key()) {
                merged.skipped += 1;
            } else {
                merged.actions.push(action);
            }
        }
        merged.ordered()
    }
}
