//! Shared handling for calls to the feed and calendar services

use std::future::Future;
use std::time::Duration;

use calrecon_common::resilience::{
    BackoffStrategy, Pacer, RetryConfig, RetryDecision, RetryError, RetryExecutor,
};
use calrecon_domain::{ReconError, Result, WriterConfig};

/// Upper bound for a single backoff delay.
const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Retry transient failures with backoff and rate limits after the delay
/// the server asked for. Everything else is final.
pub fn retry_policy(error: &ReconError, _attempt: u32) -> RetryDecision {
    match error {
        ReconError::RateLimited { .. } => {
            error.retry_after().map_or(RetryDecision::Retry, RetryDecision::RetryAfter)
        }
        ReconError::TransientRemote(_) => RetryDecision::Retry,
        _ => RetryDecision::Stop,
    }
}

/// Retry executor driven by [`retry_policy`].
pub type RemoteRetry = RetryExecutor<fn(&ReconError, u32) -> RetryDecision>;

pub fn executor(config: RetryConfig) -> RemoteRetry {
    RetryExecutor::new(config, retry_policy)
}

/// Doubling backoff from `backoff_base_ms`, `max_retries` retries after the
/// first attempt.
pub fn retry_config(config: &WriterConfig) -> RetryConfig {
    RetryConfig {
        max_attempts: config.max_retries.saturating_add(1),
        backoff: BackoffStrategy::doubling(
            config.backoff_base(),
            MAX_BACKOFF.max(config.backoff_base()),
        ),
        max_total_time: None,
    }
}

/// Collapse a retry failure back into the error that caused it.
pub fn flatten(error: RetryError<ReconError>) -> ReconError {
    match error {
        RetryError::InvalidConfiguration { message } => ReconError::Config(message),
        other => other
            .into_source()
            .unwrap_or_else(|| ReconError::Internal("retry failed without an error".into())),
    }
}

/// Bound a remote call; running out of time counts as a transient failure.
pub async fn with_timeout<T, F>(limit: Duration, operation: &str, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(limit, call).await.unwrap_or_else(|_| {
        Err(ReconError::TransientRemote(format!("{operation} timed out after {limit:?}")))
    })
}

/// Paced, bounded, retried calls to the calendar service.
#[derive(Debug)]
pub struct RemoteCaller {
    retry: RemoteRetry,
    pacer: Pacer,
    timeout: Duration,
}

impl RemoteCaller {
    pub fn new(retry: RetryConfig, pacing: Duration, timeout: Duration) -> Self {
        Self { retry: executor(retry), pacer: Pacer::new(pacing), timeout }
    }

    pub fn from_config(config: &WriterConfig) -> Self {
        Self::new(retry_config(config), config.pacing(), config.call_timeout())
    }

    /// Run `call` under the pacer and timeout, retrying per [`retry_policy`].
    pub async fn call<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.retry
            .execute(|| {
                let attempt = call();
                async move {
                    self.pacer.wait().await;
                    with_timeout(self.timeout, operation, attempt).await
                }
            })
            .await
            .map_err(flatten)
    }
}
