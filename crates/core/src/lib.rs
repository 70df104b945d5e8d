//! # calrecon core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port interfaces (traits) for the store, suppression list, feed and calendar
//! - Identity resolution and feed ingestion
//! - Drift detection, reconciliation planning and plan execution
//! - The engine that runs ingestion, drift-scan and reconcile cycles
//!
//! ## Architecture Principles
//! - Only depends on `calrecon-common` and `calrecon-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits

pub mod drift;
pub mod engine;
pub mod identity;
pub mod ingestion;
pub mod ports;
pub mod reconcile;
pub mod remote;
pub mod writer;

pub use drift::{Drift, DriftDetector, DriftReport};
pub use engine::{CycleRunner, EnginePorts, ReconciliationEngine};
pub use ingestion::{IngestItem, IngestionAdapter};
pub use ports::{CalendarService, CanonicalStore, FeedSource, SuppressionList};
pub use reconcile::{Action, DeleteCause, Plan, ReconcilePolicy, Reconciler};
pub use remote::RemoteCaller;
pub use writer::{LocationLocks, Writer};
