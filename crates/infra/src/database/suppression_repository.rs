//! SQLite implementation of the `SuppressionList` port.

use std::sync::Arc;

use async_trait::async_trait;
use calrecon_core::ports::SuppressionList;
use calrecon_domain::{
    ReconError, RecordKey, Result, SuppressionEntry, SuppressionMatch, SuppressionPattern,
};
use chrono::{DateTime, Utc};
use moka::sync::Cache;
use regex::Regex;
use rusqlite::{params, OptionalExtension, Row};
use tracing::{debug, instrument, warn};

use super::columns::{from_ms, identity, opt_from_ms, opt_to_ms, to_ms};
use super::manager::{SqliteConnection, SqlitePool};
use crate::errors::InfraError;

const PATTERN_CACHE_CAPACITY: u64 = 256;

/// Exact entries and summary patterns over the `suppressions` and
/// `suppression_patterns` tables.
///
/// Compiled patterns are cached by their source text, so edits to a pattern
/// row simply miss the cache.
#[derive(Clone)]
pub struct SqliteSuppressionList {
    pool: SqlitePool,
    compiled: Cache<String, Arc<Regex>>,
}

impl SqliteSuppressionList {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool, compiled: Cache::new(PATTERN_CACHE_CAPACITY) }
    }

    fn conn(&self) -> Result<SqliteConnection> {
        Ok(self.pool.get().map_err(InfraError::from)?)
    }

    fn compile(&self, pattern: &str) -> Result<Arc<Regex>> {
        self.compiled
            .try_get_with(pattern.to_string(), || Regex::new(pattern).map(Arc::new))
            .map_err(|e| ReconError::Validation(format!("invalid suppression pattern: {e}")))
    }

    /// Active patterns, oldest first.
    pub async fn list_patterns(&self, now: DateTime<Utc>) -> Result<Vec<SuppressionPattern>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, target_location, pattern, reason, created_at, expires_at
                 FROM suppression_patterns
                 WHERE expires_at IS NULL OR expires_at > ?1
                 ORDER BY id",
            )
            .map_err(InfraError::from)?;
        let patterns = stmt
            .query_map(params![to_ms(now)], row_to_pattern)
            .map_err(InfraError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(InfraError::from)?;
        Ok(patterns)
    }

    fn find_entry(
        conn: &rusqlite::Connection,
        key: &RecordKey,
        now: DateTime<Utc>,
    ) -> Result<Option<SuppressionEntry>> {
        let entry = conn
            .query_row(
                "SELECT identity, target_location, reason, summary, created_at, expires_at
                 FROM suppressions
                 WHERE identity = ?1 AND target_location = ?2
                   AND (expires_at IS NULL OR expires_at > ?3)",
                params![key.identity.as_str(), key.target_location, to_ms(now)],
                row_to_entry,
            )
            .optional()
            .map_err(InfraError::from)?;
        Ok(entry)
    }
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<SuppressionEntry> {
    Ok(SuppressionEntry {
        key: RecordKey::new(identity(0, &row.get::<_, String>(0)?)?, row.get::<_, String>(1)?),
        reason: row.get(2)?,
        summary: row.get(3)?,
        created_at: from_ms(4, row.get(4)?)?,
        expires_at: opt_from_ms(5, row.get(5)?)?,
    })
}

fn row_to_pattern(row: &Row<'_>) -> rusqlite::Result<SuppressionPattern> {
    Ok(SuppressionPattern {
        id: Some(row.get(0)?),
        target_location: row.get(1)?,
        pattern: row.get(2)?,
        reason: row.get(3)?,
        created_at: from_ms(4, row.get(4)?)?,
        expires_at: opt_from_ms(5, row.get(5)?)?,
    })
}

#[async_trait]
impl SuppressionList for SqliteSuppressionList {
    #[instrument(skip(self, entry), fields(key = %entry.key, reason = %entry.reason))]
    async fn add(&self, entry: SuppressionEntry) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO suppressions
                (identity, target_location, reason, summary, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(identity, target_location) DO UPDATE SET
                reason = excluded.reason,
                summary = COALESCE(excluded.summary, suppressions.summary),
                created_at = excluded.created_at,
                expires_at = excluded.expires_at",
            params![
                entry.key.identity.as_str(),
                entry.key.target_location,
                entry.reason,
                entry.summary,
                to_ms(entry.created_at),
                opt_to_ms(entry.expires_at),
            ],
        )
        .map_err(InfraError::from)?;
        debug!("suppression recorded");
        Ok(())
    }

    async fn is_suppressed(&self, key: &RecordKey, now: DateTime<Utc>) -> Result<bool> {
        let conn = self.conn()?;
        Ok(Self::find_entry(&conn, key, now)?.is_some())
    }

    async fn matches(
        &self,
        key: &RecordKey,
        summary: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SuppressionMatch>> {
        {
            let conn = self.conn()?;
            if let Some(entry) = Self::find_entry(&conn, key, now)? {
                return Ok(Some(SuppressionMatch::Exact(entry)));
            }
        }

        for pattern in self.list_patterns(now).await? {
            if !pattern.applies_to(&key.target_location) {
                continue;
            }
            match self.compile(&pattern.pattern) {
                Ok(re) if re.is_match(summary) => {
                    return Ok(Some(SuppressionMatch::Pattern(pattern)));
                }
                Ok(_) => {}
                Err(e) => warn!(pattern_id = ?pattern.id, error = %e, "skipping stored pattern"),
            }
        }
        Ok(None)
    }

    async fn remove(&self, key: &RecordKey) -> Result<bool> {
        let conn = self.conn()?;
        let removed = conn
            .execute(
                "DELETE FROM suppressions WHERE identity = ?1 AND target_location = ?2",
                params![key.identity.as_str(), key.target_location],
            )
            .map_err(InfraError::from)?;
        Ok(removed > 0)
    }

    #[instrument(skip(self, pattern), fields(pattern = %pattern.pattern))]
    async fn add_pattern(&self, pattern: SuppressionPattern) -> Result<i64> {
        self.compile(&pattern.pattern)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO suppression_patterns
                (target_location, pattern, reason, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                pattern.target_location,
                pattern.pattern,
                pattern.reason,
                to_ms(pattern.created_at),
                opt_to_ms(pattern.expires_at),
            ],
        )
        .map_err(InfraError::from)?;
        Ok(conn.last_insert_rowid())
    }

    async fn remove_pattern(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let removed = conn
            .execute("DELETE FROM suppression_patterns WHERE id = ?1", params![id])
            .map_err(InfraError::from)?;
        Ok(removed > 0)
    }

    async fn list_active(&self, now: DateTime<Utc>) -> Result<Vec<SuppressionEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT identity, target_location, reason, summary, created_at, expires_at
                 FROM suppressions
                 WHERE expires_at IS NULL OR expires_at > ?1
                 ORDER BY created_at, identity",
            )
            .map_err(InfraError::from)?;
        let entries = stmt
            .query_map(params![to_ms(now)], row_to_entry)
            .map_err(InfraError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(InfraError::from)?;
        Ok(entries)
    }

    #[instrument(skip(self))]
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(InfraError::from)?;
        let entries = tx
            .execute(
                "DELETE FROM suppressions WHERE expires_at IS NOT NULL AND expires_at <= ?1",
                params![to_ms(now)],
            )
            .map_err(InfraError::from)?;
        let patterns = tx
            .execute(
                "DELETE FROM suppression_patterns
                 WHERE expires_at IS NOT NULL AND expires_at <= ?1",
                params![to_ms(now)],
            )
            .map_err(InfraError::from)?;
        tx.commit().map_err(InfraError::from)?;
        if entries + patterns > 0 {
            debug!(entries, patterns, "expired suppressions purged");
        }
        Ok(entries + patterns)
    }
}
