//! Generic retry executor with pluggable backoff and retry policy
//!
//! The executor owns the loop: it asks the [`RetryPolicy`] whether a failure
//! is worth another attempt, sleeps for the computed (or server-provided)
//! delay, and gives up after `max_attempts` or `max_total_time`. The last
//! error is always handed back so callers can classify the final failure.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

/// Errors that can occur during retry operations
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Every attempt failed with a retryable error
    #[error("All retry attempts exhausted after {attempts} tries: {last:?}")]
    AttemptsExhausted { attempts: u32, last: E },

    /// The policy refused to retry this error
    #[error("Operation failed with non-retryable error: {source:?}")]
    NonRetryable { source: E },

    /// The overall time budget ran out before the next attempt
    #[error("Retry timeout exceeded after {elapsed:?}: {last:?}")]
    TimeoutExceeded { elapsed: Duration, last: E },

    #[error("Invalid retry configuration: {message}")]
    InvalidConfiguration { message: String },
}

impl<E> RetryError<E> {
    /// The underlying operation error, if one was recorded.
    pub fn into_source(self) -> Option<E> {
        match self {
            Self::AttemptsExhausted { last, .. } | Self::TimeoutExceeded { last, .. } => Some(last),
            Self::NonRetryable { source } => Some(source),
            Self::InvalidConfiguration { .. } => None,
        }
    }
}

/// Result type for retry operations
pub type RetryResult<T, E> = Result<T, RetryError<E>>;

/// Decision for whether to retry an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the configured backoff delay
    Retry,
    /// Retry after a specific delay, e.g. from a `Retry-After` header
    RetryAfter(Duration),
    Stop,
}

/// Trait for determining whether an error should be retried
pub trait RetryPolicy<E> {
    /// `attempt` is zero-based: 0 after the first failure.
    fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision;
}

impl<E, F> RetryPolicy<E> for F
where
    F: Fn(&E, u32) -> RetryDecision,
{
    fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision {
        self(error, attempt)
    }
}

/// Backoff strategy for calculating retry delays
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffStrategy {
    Fixed(Duration),
    /// `initial_delay * base^attempt`, capped at `max_delay`
    Exponential { initial_delay: Duration, base: f64, max_delay: Duration },
}

impl BackoffStrategy {
    /// Doubling backoff starting at `initial_delay`.
    pub const fn doubling(initial_delay: Duration, max_delay: Duration) -> Self {
        Self::Exponential { initial_delay, base: 2.0, max_delay }
    }

    /// Delay before the retry that follows failure number `attempt` (zero-based).
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        match self {
            Self::Fixed(delay) => *delay,
            Self::Exponential { initial_delay, base, max_delay } => {
                let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
                let millis = initial_delay.as_secs_f64() * 1_000.0 * base.powi(exponent);
                let capped = millis.min(max_delay.as_secs_f64() * 1_000.0).max(0.0);
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                Duration::from_millis(capped as u64)
            }
        }
    }
}

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub backoff: BackoffStrategy,
    /// Upper bound on time spent across all attempts and delays
    pub max_total_time: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffStrategy::doubling(Duration::from_millis(100), Duration::from_secs(30)),
            max_total_time: Some(Duration::from_secs(300)),
        }
    }
}

impl RetryConfig {
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), RetryError<()>> {
        if self.max_attempts == 0 {
            return Err(RetryError::InvalidConfiguration {
                message: "max_attempts must be greater than 0".to_string(),
            });
        }
        if let BackoffStrategy::Exponential { base, .. } = &self.backoff {
            if *base <= 0.0 {
                return Err(RetryError::InvalidConfiguration {
                    message: "exponential base must be greater than 0".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Builder for RetryConfig with fluent API
#[derive(Debug, Default)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl RetryConfigBuilder {
    #[must_use]
    pub const fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    #[must_use]
    pub const fn fixed_backoff(mut self, delay: Duration) -> Self {
        self.config.backoff = BackoffStrategy::Fixed(delay);
        self
    }

    #[must_use]
    pub const fn exponential_backoff(
        mut self,
        initial_delay: Duration,
        base: f64,
        max_delay: Duration,
    ) -> Self {
        self.config.backoff = BackoffStrategy::Exponential { initial_delay, base, max_delay };
        self
    }

    #[must_use]
    pub const fn max_total_time(mut self, duration: Duration) -> Self {
        self.config.max_total_time = Some(duration);
        self
    }

    #[must_use]
    pub const fn unlimited_time(mut self) -> Self {
        self.config.max_total_time = None;
        self
    }

    pub fn build(self) -> Result<RetryConfig, RetryError<()>> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// The main retry executor
#[derive(Debug, Clone)]
pub struct RetryExecutor<P> {
    config: RetryConfig,
    policy: P,
}

impl<P> RetryExecutor<P> {
    pub const fn new(config: RetryConfig, policy: P) -> Self {
        Self { config, policy }
    }

    pub const fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `operation` until it succeeds, the policy stops, or the limits are hit.
    #[instrument(skip(self, operation), fields(max_attempts = self.config.max_attempts))]
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> RetryResult<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Debug,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            debug!(attempt = attempt + 1, "executing operation");

            let error = match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(retries = attempt, "operation succeeded after retries");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            let delay = match self.policy.should_retry(&error, attempt) {
                RetryDecision::Stop => {
                    debug!(?error, "retry policy declined to retry");
                    return Err(RetryError::NonRetryable { source: error });
                }
                RetryDecision::Retry => self.config.backoff.calculate_delay(attempt),
                RetryDecision::RetryAfter(delay) => delay,
            };

            if attempt + 1 >= self.config.max_attempts {
                warn!(attempts = attempt + 1, ?error, "all retry attempts exhausted");
                return Err(RetryError::AttemptsExhausted { attempts: attempt + 1, last: error });
            }

            if let Some(budget) = self.config.max_total_time {
                let elapsed = started.elapsed();
                if elapsed + delay > budget {
                    warn!(?elapsed, ?error, "retry time budget exceeded");
                    return Err(RetryError::TimeoutExceeded { elapsed, last: error });
                }
            }

            warn!(attempt = attempt + 1, ?delay, ?error, "operation failed, retrying");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Transient,
        Fatal,
        Throttled(Duration),
    }

    fn policy(error: &TestError, _attempt: u32) -> RetryDecision {
        match error {
            TestError::Transient => RetryDecision::Retry,
            TestError::Throttled(delay) => RetryDecision::RetryAfter(*delay),
            TestError::Fatal => RetryDecision::Stop,
        }
    }

    fn config(max_attempts: u32) -> RetryConfig {
        RetryConfig::builder()
            .max_attempts(max_attempts)
            .exponential_backoff(Duration::from_secs(2), 2.0, Duration::from_secs(60))
            .unlimited_time()
            .build()
            .unwrap()
    }

    #[test]
    fn exponential_backoff_doubles_and_caps() {
        let strategy = BackoffStrategy::doubling(Duration::from_secs(2), Duration::from_secs(10));
        assert_eq!(strategy.calculate_delay(0), Duration::from_secs(2));
        assert_eq!(strategy.calculate_delay(1), Duration::from_secs(4));
        assert_eq!(strategy.calculate_delay(2), Duration::from_secs(8));
        assert_eq!(strategy.calculate_delay(3), Duration::from_secs(10));
    }

    #[test]
    fn zero_attempts_rejected() {
        assert!(RetryConfig::builder().max_attempts(0).build().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let executor = RetryExecutor::new(config(3), policy);
        let started = tokio::time::Instant::now();

        let counter = Arc::clone(&calls);
        let result = executor
            .execute(|| {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(TestError::Transient)
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 2s + 4s of backoff
        assert_eq!(started.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_stops_immediately() {
        let calls = AtomicU32::new(0);
        let executor = RetryExecutor::new(config(5), policy);

        let result: RetryResult<(), TestError> = executor
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError::Fatal) }
            })
            .await;

        assert!(matches!(result, Err(RetryError::NonRetryable { source: TestError::Fatal })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_returns_last_error() {
        let executor = RetryExecutor::new(config(3), policy);
        let result: RetryResult<(), TestError> =
            executor.execute(|| async { Err(TestError::Transient) }).await;

        match result {
            Err(RetryError::AttemptsExhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert_eq!(last, TestError::Transient);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn server_delay_overrides_backoff() {
        let calls = AtomicU32::new(0);
        let executor = RetryExecutor::new(config(2), policy);
        let started = tokio::time::Instant::now();

        let result = executor
            .execute(|| {
                let first = calls.fetch_add(1, Ordering::SeqCst) == 0;
                async move {
                    if first {
                        Err(TestError::Throttled(Duration::from_secs(7)))
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(started.elapsed(), Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn time_budget_is_enforced() {
        let config = RetryConfig::builder()
            .max_attempts(10)
            .fixed_backoff(Duration::from_secs(5))
            .max_total_time(Duration::from_secs(8))
            .build()
            .unwrap();
        let executor = RetryExecutor::new(config, policy);

        let result: RetryResult<(), TestError> =
            executor.execute(|| async { Err(TestError::Transient) }).await;
        assert!(matches!(result, Err(RetryError::TimeoutExceeded { .. })));
    }
}
