#![allow(dead_code)]

use std::sync::Arc;

use calrecon_domain::{EventFields, EventRecord, Identity, RecordKey, SourceKind};
use calrecon_infra::database::{DbManager, SqliteEventStore, SqliteSuppressionList};
use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::TempDir;

pub const LOCATION: &str = "work";

/// Temporary migrated database that lives as long as the value.
pub struct TestDatabase {
    pub manager: Arc<DbManager>,
    _temp_dir: TempDir,
}

impl TestDatabase {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let manager = DbManager::new(temp_dir.path().join("calrecon.db"), 4)
            .expect("db manager should be created");
        manager.run_migrations().expect("migrations should run");
        Self { manager: Arc::new(manager), _temp_dir: temp_dir }
    }

    pub fn store(&self) -> SqliteEventStore {
        SqliteEventStore::new(self.manager.pool())
    }

    pub fn suppressions(&self) -> SqliteSuppressionList {
        SqliteSuppressionList::new(self.manager.pool())
    }

    /// Execute raw SQL, returning the rusqlite error untouched.
    pub fn execute(&self, sql: &str) -> rusqlite::Result<usize> {
        let conn = self.manager.get_connection().expect("connection should be available");
        conn.execute(sql, [])
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

pub fn at(month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, month, day, hour, 0, 0).unwrap()
}

pub fn key(id: &str) -> RecordKey {
    RecordKey::new(Identity::reservation(id), LOCATION)
}

/// Fed record with a one-hour event on Jan 10.
pub fn record(id: &str, now: DateTime<Utc>) -> EventRecord {
    let start = at(1, 10, 9);
    let fields = EventFields {
        summary: format!("Event {id}"),
        location: "Hoover 105".into(),
        description: String::new(),
        start,
        end: start + Duration::hours(1),
        all_day: false,
    };
    let identity = Identity::reservation(id);
    let mut record =
        EventRecord::new(identity, LOCATION, SourceKind::FedCampusEvent, fields, now);
    record.external_ref = Some(format!("g-{id}"));
    record
}
