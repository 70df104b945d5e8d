//! Cycle kinds and the summary every cycle reports

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::impl_status_conversions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CycleKind {
    /// Pull the feed and push changes to the calendar
    Ingestion,
    /// Compare the live calendar with the canonical store
    DriftScan,
    /// Drift scan and ingestion merged into one plan per location
    Reconcile,
}

impl_status_conversions!(CycleKind {
    Ingestion => "ingestion",
    DriftScan => "drift-scan",
    Reconcile => "reconcile",
});

/// Counts produced by one cycle, reported even on partial failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleSummary {
    pub id: Uuid,
    pub kind: CycleKind,
    pub target_location: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub created: u32,
    pub updated: u32,
    pub deleted: u32,
    pub suppressed: u32,
    pub skipped: u32,
    pub failed: u32,
    pub unchanged: u32,
    pub warnings: Vec<String>,
    /// Set when an auth or store failure stopped the cycle early
    pub aborted: Option<String>,
    pub cancelled: bool,
}

impl CycleSummary {
    pub fn new(kind: CycleKind, started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            kind,
            target_location: None,
            started_at,
            finished_at: None,
            created: 0,
            updated: 0,
            deleted: 0,
            suppressed: 0,
            skipped: 0,
            failed: 0,
            unchanged: 0,
            warnings: Vec::new(),
            aborted: None,
            cancelled: false,
        }
    }

    #[must_use]
    pub fn for_location(mut self, target_location: impl Into<String>) -> Self {
        self.target_location = Some(target_location.into());
        self
    }

    /// Fold a per-location summary into a cycle-wide one.
    pub fn absorb(&mut self, other: &Self) {
        self.created += other.created;
        self.updated += other.updated;
        self.deleted += other.deleted;
        self.suppressed += other.suppressed;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.unchanged += other.unchanged;
        self.warnings.extend(other.warnings.iter().cloned());
        if self.aborted.is_none() {
            self.aborted.clone_from(&other.aborted);
        }
        self.cancelled |= other.cancelled;
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn finish(&mut self, at: DateTime<Utc>) {
        self.finished_at = Some(at);
    }

    /// Mutations applied to the calendar or the store.
    pub const fn net_mutations(&self) -> u32 {
        self.created + self.updated + self.deleted + self.suppressed
    }

    pub const fn is_clean(&self) -> bool {
        self.failed == 0 && self.aborted.is_none() && !self.cancelled
    }
}

impl fmt::Display for CycleSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cycle: created={} updated={} deleted={} suppressed={} skipped={} failed={} \
             unchanged={}",
            self.kind,
            self.created,
            self.updated,
            self.deleted,
            self.suppressed,
            self.skipped,
            self.failed,
            self.unchanged
        )?;
        if let Some(reason) = &self.aborted {
            write!(f, " aborted=\"{reason}\"")?;
        }
        if self.cancelled {
            f.write_str(" cancelled")?;
        }
        Ok(())
    }
}
