//! Common utilities shared across calrecon crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: clock abstraction (system and mock clocks)
//! - `runtime`: async resilience helpers (retry executor, call pacing)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod time;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod resilience;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "runtime")]
pub use resilience::{Pacer, RetryConfig, RetryDecision, RetryError, RetryExecutor, RetryPolicy};
#[cfg(feature = "foundation")]
pub use time::{Clock, MockClock, SystemClock};
