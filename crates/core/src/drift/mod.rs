//! Drift detection between the canonical store and the live calendar

pub mod detector;
pub mod live_record;

pub use detector::{Drift, DriftDetector, DriftReport};
pub use live_record::{classify_source, record_from_live};
