//! Port interfaces for the reconciliation engine
//!
//! These traits define the boundaries between core business logic
//! and infrastructure implementations.

use async_trait::async_trait;
use calrecon_domain::{
    EventDraft, EventRecord, FeedEvent, FeedQuery, Identity, LiveEvent, RecordKey, Result,
    SuppressionEntry, SuppressionMatch, SuppressionPattern, TimeWindow, UpsertOutcome,
};
use chrono::{DateTime, Utc};

/// Persistence for canonical event records
#[async_trait]
pub trait CanonicalStore: Send + Sync {
    /// Insert or update the active row for the record's key.
    ///
    /// `record.updated_at` is taken as the time of the write. Fails with
    /// `ConflictOnUpsert` when the uniqueness guarantee is violated and with
    /// `Validation` for deleted records.
    async fn upsert(&self, record: EventRecord) -> Result<UpsertOutcome>;

    /// Mark the active row deleted. Returns `false` when nothing changed.
    async fn soft_delete(&self, key: &RecordKey, at: DateTime<Utc>) -> Result<bool>;

    /// The non-deleted row for a key
    async fn find(&self, key: &RecordKey) -> Result<Option<EventRecord>>;

    /// Active rows holding an identity in any location
    async fn find_active_by_identity(&self, identity: &Identity) -> Result<Vec<EventRecord>>;

    /// Active rows for a location ordered by start time
    async fn list_active(&self, target_location: &str) -> Result<Vec<EventRecord>>;

    /// Record a confirmed sighting; never moves `last_observed_at` backwards.
    async fn touch_observed(&self, key: &RecordKey, at: DateTime<Utc>) -> Result<()>;

    /// Count one more missed scan, returning the new streak length.
    async fn record_miss(&self, key: &RecordKey, at: DateTime<Utc>) -> Result<u32>;

    /// Move the active row to another location under a new external ref.
    async fn relocate(
        &self,
        key: &RecordKey,
        to_location: &str,
        external_ref: &str,
        at: DateTime<Utc>,
    ) -> Result<EventRecord>;

    /// Reactivate the most recently deleted row for a key.
    async fn restore(&self, key: &RecordKey, at: DateTime<Utc>) -> Result<EventRecord>;
}

/// Durable record of events that must not come back
#[async_trait]
pub trait SuppressionList: Send + Sync {
    /// Create or refresh an entry
    async fn add(&self, entry: SuppressionEntry) -> Result<()>;

    async fn is_suppressed(&self, key: &RecordKey, now: DateTime<Utc>) -> Result<bool>;

    /// Exact entry first, then summary patterns.
    async fn matches(
        &self,
        key: &RecordKey,
        summary: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SuppressionMatch>>;

    /// Returns whether an entry existed
    async fn remove(&self, key: &RecordKey) -> Result<bool>;

    /// Store a pattern after checking it compiles; returns its id.
    async fn add_pattern(&self, pattern: SuppressionPattern) -> Result<i64>;

    async fn remove_pattern(&self, id: i64) -> Result<bool>;

    async fn list_active(&self, now: DateTime<Utc>) -> Result<Vec<SuppressionEntry>>;

    /// Drop expired entries and patterns, returning how many went.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize>;
}

/// Read-only external schedule feed
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch one window; the window must respect the feed's span limit.
    async fn fetch_window(&self, query: &FeedQuery, window: &TimeWindow) -> Result<Vec<FeedEvent>>;
}

/// User-editable calendar service
#[async_trait]
pub trait CalendarService: Send + Sync {
    /// Expanded instances overlapping `window`, cancelled ones included
    async fn list(&self, target_location: &str, window: &TimeWindow) -> Result<Vec<LiveEvent>>;

    /// Returns the new external ref
    async fn create(&self, target_location: &str, draft: &EventDraft) -> Result<String>;

    async fn update(
        &self,
        target_location: &str,
        external_ref: &str,
        draft: &EventDraft,
    ) -> Result<()>;

    /// `NotFound` when the event is already gone
    async fn delete(&self, target_location: &str, external_ref: &str) -> Result<()>;
}
