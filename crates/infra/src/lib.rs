//! # calrecon Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - SQLite persistence for canonical records and suppressions
//! - HTTP adapters for the schedule feed and Google Calendar
//! - Configuration loading and logging setup
//! - The cycle scheduler
//!
//! ## Architecture
//! - Implements traits defined in `calrecon-core`
//! - Contains all "impure" code (I/O, network, clocks that sleep)

pub mod config;
pub mod database;
pub mod errors;
pub mod integrations;
pub mod observability;
pub mod scheduling;

// Re-export commonly used items
pub use database::{DbManager, SqliteEventStore, SqliteSuppressionList};
pub use errors::InfraError;
pub use integrations::{GoogleCalendarService, HttpFeedSource};
pub use scheduling::{CycleScheduler, CycleSchedulerConfig, SchedulerError};
