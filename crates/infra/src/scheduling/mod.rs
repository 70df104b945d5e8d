//! Scheduling infrastructure for the reconciliation cycles
//!
//! A single background task drives every cycle kind on its own fixed
//! interval, with explicit start/stop, a join handle and a cancellation
//! token threaded into each run.

pub mod cycle_scheduler;
pub mod error;

pub use cycle_scheduler::{CycleScheduler, CycleSchedulerConfig, SchedulerStatus};
pub use error::{SchedulerError, SchedulerResult};
