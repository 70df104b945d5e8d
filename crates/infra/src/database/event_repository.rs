//! SQLite implementation of the `CanonicalStore` port.
//!
//! Rows are never physically deleted: a soft delete sets `deleted_at` and the
//! partial unique index on `(identity, target_location) WHERE deleted_at IS
//! NULL` keeps at most one live row per key while history accumulates.

use async_trait::async_trait;
use calrecon_core::ports::CanonicalStore;
use calrecon_domain::{
    Attributes, EventFields, EventRecord, Identity, LastAction, ReconError, RecordKey, Result,
    UpsertOutcome,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row, Transaction, TransactionBehavior};
use tracing::{debug, instrument};

use super::columns::{from_ms, identity, opt_from_ms, opt_to_ms, parsed, to_ms};
use super::manager::{SqliteConnection, SqlitePool};
use crate::errors::InfraError;

const COLUMNS: &str = "identity, target_location, external_ref, source_kind, summary, location, \
     description, start_ms, end_ms, all_day, lifecycle_status, last_action, last_action_at, \
     last_observed_at, deleted_at, attributes, consecutive_misses, missing_since, created_at, \
     updated_at";

/// Canonical record store over the `event_records` table
#[derive(Clone)]
pub struct SqliteEventStore {
    pool: SqlitePool,
}

impl SqliteEventStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> Result<SqliteConnection> {
        Ok(self.pool.get().map_err(InfraError::from)?)
    }

    /// Every row for a key, deleted history included, newest first.
    pub async fn history(&self, key: &RecordKey) -> Result<Vec<EventRecord>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {COLUMNS} FROM event_records
             WHERE identity = ?1 AND target_location = ?2
             ORDER BY id DESC"
        );
        let mut stmt = conn.prepare(&sql).map_err(InfraError::from)?;
        let rows = stmt
            .query_map(params![key.identity.as_str(), key.target_location], row_to_record)
            .map_err(InfraError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(InfraError::from)?;
        Ok(rows)
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<EventRecord> {
    let attributes: String = row.get(15)?;
    let attributes: Attributes = serde_json::from_str(&attributes).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(15, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let misses: i64 = row.get(16)?;

    Ok(EventRecord {
        identity: identity(0, &row.get::<_, String>(0)?)?,
        target_location: row.get(1)?,
        external_ref: row.get(2)?,
        source_kind: parsed(3, &row.get::<_, String>(3)?)?,
        fields: EventFields {
            summary: row.get(4)?,
            location: row.get(5)?,
            description: row.get(6)?,
            start: from_ms(7, row.get(7)?)?,
            end: from_ms(8, row.get(8)?)?,
            all_day: row.get(9)?,
        },
        lifecycle_status: parsed(10, &row.get::<_, String>(10)?)?,
        last_action: parsed(11, &row.get::<_, String>(11)?)?,
        last_action_at: from_ms(12, row.get(12)?)?,
        last_observed_at: opt_from_ms(13, row.get(13)?)?,
        deleted_at: opt_from_ms(14, row.get(14)?)?,
        attributes,
        consecutive_misses: u32::try_from(misses).unwrap_or(u32::MAX),
        missing_since: opt_from_ms(17, row.get(17)?)?,
        created_at: from_ms(18, row.get(18)?)?,
        updated_at: from_ms(19, row.get(19)?)?,
    })
}

fn find_active(conn: &rusqlite::Connection, key: &RecordKey) -> Result<Option<EventRecord>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM event_records
         WHERE identity = ?1 AND target_location = ?2 AND deleted_at IS NULL"
    );
    let record = conn
        .query_row(&sql, params![key.identity.as_str(), key.target_location], row_to_record)
        .optional()
        .map_err(InfraError::from)?;
    Ok(record)
}

fn not_found(key: &RecordKey) -> ReconError {
    ReconError::NotFound(format!("no active record for {key}"))
}

fn begin(conn: &mut SqliteConnection) -> Result<Transaction<'_>> {
    Ok(conn.transaction_with_behavior(TransactionBehavior::Immediate).map_err(InfraError::from)?)
}

fn insert(tx: &Transaction<'_>, record: &EventRecord, attributes: &str) -> Result<()> {
    tx.execute(
        "INSERT INTO event_records (
            identity, target_location, external_ref, source_kind, summary, location,
            description, start_ms, end_ms, all_day, lifecycle_status, last_action,
            last_action_at, last_observed_at, deleted_at, attributes, consecutive_misses,
            missing_since, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, NULL, ?15, ?16,
                  ?17, ?18, ?19)",
        params![
            record.identity.as_str(),
            record.target_location,
            record.external_ref,
            record.source_kind.as_str(),
            record.fields.summary,
            record.fields.location,
            record.fields.description,
            to_ms(record.fields.start),
            to_ms(record.fields.end),
            record.fields.all_day,
            record.lifecycle_status.as_str(),
            LastAction::Created.as_str(),
            to_ms(record.updated_at),
            opt_to_ms(record.last_observed_at),
            attributes,
            record.consecutive_misses,
            opt_to_ms(record.missing_since),
            to_ms(record.created_at),
            to_ms(record.updated_at),
        ],
    )
    .map_err(InfraError::from)?;
    Ok(())
}

fn update(
    tx: &Transaction<'_>,
    record: &EventRecord,
    last_observed_at: Option<DateTime<Utc>>,
    attributes: &str,
) -> Result<()> {
    tx.execute(
        "UPDATE event_records SET
            external_ref = ?3, source_kind = ?4, summary = ?5, location = ?6, description = ?7,
            start_ms = ?8, end_ms = ?9, all_day = ?10, lifecycle_status = ?11,
            last_action = ?12, last_action_at = ?13, last_observed_at = ?14, attributes = ?15,
            consecutive_misses = ?16, missing_since = ?17, updated_at = ?13
         WHERE identity = ?1 AND target_location = ?2 AND deleted_at IS NULL",
        params![
            record.identity.as_str(),
            record.target_location,
            record.external_ref,
            record.source_kind.as_str(),
            record.fields.summary,
            record.fields.location,
            record.fields.description,
            to_ms(record.fields.start),
            to_ms(record.fields.end),
            record.fields.all_day,
            record.lifecycle_status.as_str(),
            LastAction::Updated.as_str(),
            to_ms(record.updated_at),
            opt_to_ms(last_observed_at),
            attributes,
            record.consecutive_misses,
            opt_to_ms(record.missing_since),
        ],
    )
    .map_err(InfraError::from)?;
    Ok(())
}

#[async_trait]
impl CanonicalStore for SqliteEventStore {
    #[instrument(skip(self, record), fields(key = %record.key()))]
    async fn upsert(&self, record: EventRecord) -> Result<UpsertOutcome> {
        if record.lifecycle_status.is_deleted() {
            return Err(ReconError::Validation(format!(
                "refusing to upsert deleted record {}",
                record.key()
            )));
        }
        record.validate()?;
        let attributes = serde_json::to_string(&record.attributes)
            .map_err(|e| ReconError::Internal(format!("attributes not serialisable: {e}")))?;

        let mut conn = self.conn()?;
        let tx = begin(&mut conn)?;
        let key = record.key();
        let action = match find_active(&tx, &key)? {
            Some(existing) => {
                let observed = existing.last_observed_at.max(record.last_observed_at);
                update(&tx, &record, observed, &attributes)?;
                LastAction::Updated
            }
            None => {
                insert(&tx, &record, &attributes)?;
                LastAction::Created
            }
        };
        let stored = find_active(&tx, &key)?.ok_or_else(|| not_found(&key))?;
        tx.commit().map_err(InfraError::from)?;

        debug!(action = %action, "record upserted");
        Ok(UpsertOutcome { action, record: stored })
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn soft_delete(&self, key: &RecordKey, at: DateTime<Utc>) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE event_records SET
                    lifecycle_status = 'deleted', deleted_at = ?3, last_action = 'deleted',
                    last_action_at = ?3, updated_at = ?3
                 WHERE identity = ?1 AND target_location = ?2 AND deleted_at IS NULL",
                params![key.identity.as_str(), key.target_location, to_ms(at)],
            )
            .map_err(InfraError::from)?;
        Ok(changed > 0)
    }

    async fn find(&self, key: &RecordKey) -> Result<Option<EventRecord>> {
        let conn = self.conn()?;
        find_active(&conn, key)
    }

    async fn find_active_by_identity(&self, identity: &Identity) -> Result<Vec<EventRecord>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {COLUMNS} FROM event_records
             WHERE identity = ?1 AND deleted_at IS NULL
             ORDER BY target_location"
        );
        let mut stmt = conn.prepare(&sql).map_err(InfraError::from)?;
        let rows = stmt
            .query_map(params![identity.as_str()], row_to_record)
            .map_err(InfraError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(InfraError::from)?;
        Ok(rows)
    }

    async fn list_active(&self, target_location: &str) -> Result<Vec<EventRecord>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {COLUMNS} FROM event_records
             WHERE target_location = ?1 AND deleted_at IS NULL
             ORDER BY start_ms, identity"
        );
        let mut stmt = conn.prepare(&sql).map_err(InfraError::from)?;
        let rows = stmt
            .query_map(params![target_location], row_to_record)
            .map_err(InfraError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(InfraError::from)?;
        Ok(rows)
    }

    async fn touch_observed(&self, key: &RecordKey, at: DateTime<Utc>) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE event_records SET
                    last_observed_at = MAX(COALESCE(last_observed_at, ?3), ?3),
                    consecutive_misses = 0, missing_since = NULL, updated_at = ?3
                 WHERE identity = ?1 AND target_location = ?2 AND deleted_at IS NULL",
                params![key.identity.as_str(), key.target_location, to_ms(at)],
            )
            .map_err(InfraError::from)?;
        if changed == 0 {
            return Err(not_found(key));
        }
        Ok(())
    }

    async fn record_miss(&self, key: &RecordKey, at: DateTime<Utc>) -> Result<u32> {
        let conn = self.conn()?;
        let misses: Option<i64> = conn
            .query_row(
                "UPDATE event_records SET
                    consecutive_misses = consecutive_misses + 1,
                    missing_since = COALESCE(missing_since, ?3), updated_at = ?3
                 WHERE identity = ?1 AND target_location = ?2 AND deleted_at IS NULL
                 RETURNING consecutive_misses",
                params![key.identity.as_str(), key.target_location, to_ms(at)],
                |row| row.get(0),
            )
            .optional()
            .map_err(InfraError::from)?;
        let misses = misses.ok_or_else(|| not_found(key))?;
        Ok(u32::try_from(misses).unwrap_or(u32::MAX))
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn relocate(
        &self,
        key: &RecordKey,
        to_location: &str,
        external_ref: &str,
        at: DateTime<Utc>,
    ) -> Result<EventRecord> {
        let mut conn = self.conn()?;
        let tx = begin(&mut conn)?;
        let destination = RecordKey::new(key.identity.clone(), to_location);
        if to_location != key.target_location && find_active(&tx, &destination)?.is_some() {
            return Err(ReconError::ConflictOnUpsert(format!(
                "{destination} already has an active record"
            )));
        }
        let sql = format!(
            "UPDATE event_records SET
                target_location = ?3, external_ref = ?4, lifecycle_status = 'moved',
                last_action = 'moved', last_action_at = ?5,
                last_observed_at = MAX(COALESCE(last_observed_at, ?5), ?5),
                consecutive_misses = 0, missing_since = NULL, updated_at = ?5
             WHERE identity = ?1 AND target_location = ?2 AND deleted_at IS NULL
             RETURNING {COLUMNS}"
        );
        let moved = tx
            .query_row(
                &sql,
                params![
                    key.identity.as_str(),
                    key.target_location,
                    to_location,
                    external_ref,
                    to_ms(at)
                ],
                row_to_record,
            )
            .optional()
            .map_err(InfraError::from)?
            .ok_or_else(|| not_found(key))?;
        tx.commit().map_err(InfraError::from)?;
        debug!(to = to_location, "record relocated");
        Ok(moved)
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn restore(&self, key: &RecordKey, at: DateTime<Utc>) -> Result<EventRecord> {
        let mut conn = self.conn()?;
        let tx = begin(&mut conn)?;
        if find_active(&tx, key)?.is_some() {
            return Err(ReconError::ConflictOnUpsert(format!("{key} is already active")));
        }
        let row_id: i64 = tx
            .query_row(
                "SELECT id FROM event_records
                 WHERE identity = ?1 AND target_location = ?2 AND deleted_at IS NOT NULL
                 ORDER BY deleted_at DESC, id DESC LIMIT 1",
                params![key.identity.as_str(), key.target_location],
                |row| row.get(0),
            )
            .optional()
            .map_err(InfraError::from)?
            .ok_or_else(|| ReconError::NotFound(format!("no deleted record for {key}")))?;
        let sql = format!(
            "UPDATE event_records SET
                lifecycle_status = 'active', deleted_at = NULL, last_action = 'restored',
                last_action_at = ?2, consecutive_misses = 0, missing_since = NULL,
                updated_at = ?2
             WHERE id = ?1
             RETURNING {COLUMNS}"
        );
        let restored = tx
            .query_row(&sql, params![row_id, to_ms(at)], row_to_record)
            .map_err(InfraError::from)?;
        tx.commit().map_err(InfraError::from)?;
        debug!("record restored");
        Ok(restored)
    }
}
