//! Resilience helpers for outbound calls: retry with backoff and pacing.

pub mod pacer;
pub mod retry;

pub use pacer::Pacer;
pub use retry::{
    BackoffStrategy, RetryConfig, RetryConfigBuilder, RetryDecision, RetryError, RetryExecutor,
    RetryPolicy, RetryResult,
};
