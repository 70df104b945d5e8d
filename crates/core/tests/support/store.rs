use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use calrecon_core::ports::CanonicalStore;
use calrecon_domain::{
    EventRecord, Identity, LastAction, LifecycleStatus, ReconError, RecordKey,
    Result as DomainResult, UpsertOutcome,
};
use chrono::{DateTime, Utc};

/// In-memory `CanonicalStore`.
///
/// Rows are never removed, so deleted records stay around for assertions
/// the same way they do in the database.
#[derive(Default, Clone)]
pub struct MemoryStore {
    rows: Arc<Mutex<Vec<EventRecord>>>,
    /// Inserted just before the next upsert, which then reports a conflict
    racing_insert: Arc<Mutex<Option<EventRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a row directly, bypassing upsert bookkeeping.
    pub fn seed(&self, record: EventRecord) {
        self.rows.lock().unwrap().push(record);
    }

    /// Simulate another writer committing `record` between our read and write.
    pub fn race_next_upsert(&self, record: EventRecord) {
        *self.racing_insert.lock().unwrap() = Some(record);
    }

    pub fn all(&self) -> Vec<EventRecord> {
        self.rows.lock().unwrap().clone()
    }

    pub fn active(&self, location: &str) -> Vec<EventRecord> {
        self.all().into_iter().filter(|r| r.is_active() && r.target_location == location).collect()
    }

    pub fn get(&self, key: &RecordKey) -> Option<EventRecord> {
        self.all().into_iter().find(|r| r.is_active() && r.key() == *key)
    }

    fn position(rows: &[EventRecord], key: &RecordKey) -> Option<usize> {
        rows.iter().position(|r| r.is_active() && r.key() == *key)
    }

    fn with_active<T>(
        &self,
        key: &RecordKey,
        f: impl FnOnce(&mut EventRecord) -> T,
    ) -> DomainResult<T> {
        let mut rows = self.rows.lock().unwrap();
        let index = Self::position(&rows, key)
            .ok_or_else(|| ReconError::NotFound(format!("no active record for {key}")))?;
        Ok(f(&mut rows[index]))
    }
}

#[async_trait]
impl CanonicalStore for MemoryStore {
    async fn upsert(&self, record: EventRecord) -> DomainResult<UpsertOutcome> {
        if record.lifecycle_status == LifecycleStatus::Deleted {
            return Err(ReconError::Validation("cannot upsert a deleted record".into()));
        }
        record.validate()?;

        let mut rows = self.rows.lock().unwrap();
        if let Some(racer) = self.racing_insert.lock().unwrap().take() {
            rows.push(racer);
            return Err(ReconError::ConflictOnUpsert(format!("{} already exists", record.key())));
        }

        let at = record.updated_at;
        let key = record.key();
        match Self::position(&rows, &key) {
            Some(index) => {
                let existing = &mut rows[index];
                let observed = existing.last_observed_at.max(record.last_observed_at);
                let created_at = existing.created_at;
                *existing = record;
                existing.created_at = created_at;
                existing.last_observed_at = observed;
                existing.last_action = LastAction::Updated;
                existing.last_action_at = at;
                Ok(UpsertOutcome { action: LastAction::Updated, record: existing.clone() })
            }
            None => {
                let mut inserted = record;
                inserted.last_action = LastAction::Created;
                inserted.last_action_at = at;
                rows.push(inserted.clone());
                Ok(UpsertOutcome { action: LastAction::Created, record: inserted })
            }
        }
    }

    async fn soft_delete(&self, key: &RecordKey, at: DateTime<Utc>) -> DomainResult<bool> {
        let mut rows = self.rows.lock().unwrap();
        let Some(index) = Self::position(&rows, key) else { return Ok(false) };
        let row = &mut rows[index];
        row.lifecycle_status = LifecycleStatus::Deleted;
        row.deleted_at = Some(at);
        row.last_action = LastAction::Deleted;
        row.last_action_at = at;
        row.updated_at = at;
        Ok(true)
    }

    async fn find(&self, key: &RecordKey) -> DomainResult<Option<EventRecord>> {
        Ok(self.get(key))
    }

    async fn find_active_by_identity(&self, identity: &Identity) -> DomainResult<Vec<EventRecord>> {
        Ok(self.all().into_iter().filter(|r| r.is_active() && r.identity == *identity).collect())
    }

    async fn list_active(&self, target_location: &str) -> DomainResult<Vec<EventRecord>> {
        let mut rows = self.active(target_location);
        rows.sort_by_key(|r| r.fields.start);
        Ok(rows)
    }

    async fn touch_observed(&self, key: &RecordKey, at: DateTime<Utc>) -> DomainResult<()> {
        self.with_active(key, |row| {
            row.observe(at);
            row.updated_at = at;
        })
    }

    async fn record_miss(&self, key: &RecordKey, at: DateTime<Utc>) -> DomainResult<u32> {
        self.with_active(key, |row| {
            row.consecutive_misses += 1;
            row.missing_since.get_or_insert(at);
            row.updated_at = at;
            row.consecutive_misses
        })
    }

    async fn relocate(
        &self,
        key: &RecordKey,
        to_location: &str,
        external_ref: &str,
        at: DateTime<Utc>,
    ) -> DomainResult<EventRecord> {
        let destination = RecordKey::new(key.identity.clone(), to_location);
        if to_location != key.target_location && self.get(&destination).is_some() {
            return Err(ReconError::ConflictOnUpsert(format!("{destination} already exists")));
        }
        self.with_active(key, |row| {
            row.target_location = to_location.to_string();
            row.external_ref = Some(external_ref.to_string());
            row.lifecycle_status = LifecycleStatus::Moved;
            row.last_action = LastAction::Moved;
            row.last_action_at = at;
            row.observe(at);
            row.updated_at = at;
            row.clone()
        })
    }

    async fn restore(&self, key: &RecordKey, at: DateTime<Utc>) -> DomainResult<EventRecord> {
        let mut rows = self.rows.lock().unwrap();
        if Self::position(&rows, key).is_some() {
            return Err(ReconError::ConflictOnUpsert(format!("{key} is already active")));
        }
        let row = rows
            .iter_mut()
            .filter(|r| !r.is_active() && r.key() == *key)
            .max_by_key(|r| r.deleted_at)
            .ok_or_else(|| ReconError::NotFound(format!("no deleted record for {key}")))?;
        row.lifecycle_status = LifecycleStatus::Active;
        row.deleted_at = None;
        row.last_action = LastAction::Restored;
        row.last_action_at = at;
        row.consecutive_misses = 0;
        row.missing_since = None;
        row.updated_at = at;
        Ok(row.clone())
    }
}
