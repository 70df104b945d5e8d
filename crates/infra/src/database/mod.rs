//! SQLite persistence: pool management, schema and the store implementations

mod columns;
pub mod event_repository;
pub mod manager;
pub mod suppression_repository;

pub use event_repository::SqliteEventStore;
pub use manager::{DbManager, SqliteConnection, SqlitePool};
pub use suppression_repository::SqliteSuppressionList;
