//! Error types used throughout the reconciliation engine
//!
//! The variants form the failure taxonomy every layer agrees on. Retry,
//! skip and abort decisions are made from the variant alone, so adapters
//! must map their transport errors onto the closest variant rather than
//! inventing new ones.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for calrecon
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum ReconError {
    /// Network failure, 5xx or timeout. Retried with backoff.
    #[error("Transient remote error: {0}")]
    TransientRemote(String),

    /// Remote quota exceeded. Retried after backoff or the server hint.
    #[error("Rate limited: {message}")]
    RateLimited { message: String, retry_after_ms: Option<u64> },

    /// Remote object is absent. Success for deletes.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Credentials rejected. Fatal for the current cycle.
    #[error("Authentication failure: {0}")]
    AuthFailure(String),

    /// Another non-deleted row already holds the key.
    #[error("Conflict on upsert: {0}")]
    ConflictOnUpsert(String),

    /// Malformed source record. Skipped and logged.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ReconError {
    /// Build a rate-limit error with an optional server-provided delay.
    pub fn rate_limited(message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self::RateLimited {
            message: message.into(),
            retry_after_ms: retry_after.map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
        }
    }

    /// Whether retrying the same call may succeed.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientRemote(_) | Self::RateLimited { .. })
    }

    /// Whether this error must stop the whole cycle instead of one record.
    pub const fn aborts_cycle(&self) -> bool {
        matches!(self, Self::AuthFailure(_) | Self::Database(_))
    }

    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Server-suggested delay before the next attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after_ms: Some(ms), .. } => Some(Duration::from_millis(*ms)),
            _ => None,
        }
    }
}

/// Result type alias for calrecon operations
pub type Result<T> = std::result::Result<T, ReconError>;
