//! Configuration structures
//!
//! A single [`Config`] value is built at startup and handed to each
//! component at construction. Every section deserializes with defaults so a
//! partial TOML or JSON file is enough.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BACKOFF_BASE_MS, DEFAULT_CALENDAR_TIMEOUT_SECS, DEFAULT_CALL_TIMEOUT_SECS,
    DEFAULT_DB_PATH, DEFAULT_DB_POOL_SIZE, DEFAULT_FEED_TIMEOUT_SECS,
    DEFAULT_INGEST_INTERVAL_SECS, DEFAULT_JOB_TIMEOUT_SECS, DEFAULT_LOOKAHEAD_DAYS,
    DEFAULT_LOOKBACK_DAYS, DEFAULT_MAX_RETRIES, DEFAULT_MAX_WINDOW_DAYS, DEFAULT_PACING_MS,
    DEFAULT_RECONCILE_INTERVAL_SECS, DEFAULT_SCAN_INTERVAL_SECS, DEFAULT_SCAN_LOOKAHEAD_DAYS,
    DEFAULT_SCAN_LOOKBACK_DAYS, DEFAULT_STOP_TIMEOUT_SECS, MIN_REQUIRED_MISSES,
};
use crate::types::FeedQuery;
use crate::{ReconError, Result};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub feed: FeedConfig,
    pub calendar: CalendarConfig,
    pub reconcile: ReconcileConfig,
    pub writer: WriterConfig,
    pub scheduler: SchedulerConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Reject values that would make a component misbehave at runtime.
    pub fn validate(&self) -> Result<()> {
        if self.database.path.trim().is_empty() {
            return Err(ReconError::Config("database.path must not be empty".into()));
        }
        if self.database.pool_size == 0 {
            return Err(ReconError::Config("database.pool_size must be at least 1".into()));
        }
        if self.feed.max_window_days == 0 {
            return Err(ReconError::Config("feed.max_window_days must be at least 1".into()));
        }
        if self.reconcile.scan_interval_secs == 0 {
            return Err(ReconError::Config("reconcile.scan_interval_secs must be positive".into()));
        }
        for query in &self.feed.queries {
            if query.target_location.trim().is_empty() {
                return Err(ReconError::Config(format!(
                    "feed query '{}' has no target_location",
                    query.name
                )));
            }
        }
        Ok(())
    }

    /// Every location that is scanned or written to, without duplicates.
    pub fn target_locations(&self) -> Vec<String> {
        let mut locations = self.calendar.target_locations.clone();
        for query in &self.feed.queries {
            if !locations.contains(&query.target_location) {
                locations.push(query.target_location.clone());
            }
        }
        locations
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: DEFAULT_DB_PATH.to_string(), pool_size: DEFAULT_DB_POOL_SIZE }
    }
}

/// External schedule feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub base_url: String,
    /// Longest span a single feed request may cover, inclusive days
    pub max_window_days: u32,
    pub lookback_days: u32,
    pub lookahead_days: u32,
    pub request_timeout_secs: u64,
    /// Titles that are never ingested (exact match)
    pub filter_titles: Vec<String>,
    /// Feed categories whose records are classes rather than campus events
    pub class_categories: Vec<String>,
    pub queries: Vec<FeedQuery>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            max_window_days: DEFAULT_MAX_WINDOW_DAYS,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            lookahead_days: DEFAULT_LOOKAHEAD_DAYS,
            request_timeout_secs: DEFAULT_FEED_TIMEOUT_SECS,
            filter_titles: Vec::new(),
            class_categories: vec!["Classes".to_string()],
            queries: Vec::new(),
        }
    }
}

impl FeedConfig {
    pub fn is_class_category(&self, category: &str) -> bool {
        self.class_categories.iter().any(|c| c.eq_ignore_ascii_case(category))
    }
}

/// Target calendar service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    pub api_base: String,
    /// Bearer token; usually supplied through the environment
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    pub request_timeout_secs: u64,
    pub scan_lookback_days: u32,
    pub scan_lookahead_days: u32,
    pub target_locations: Vec<String>,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            api_base: "https://www.googleapis.com/calendar/v3".to_string(),
            access_token: None,
            request_timeout_secs: DEFAULT_CALENDAR_TIMEOUT_SECS,
            scan_lookback_days: DEFAULT_SCAN_LOOKBACK_DAYS,
            scan_lookahead_days: DEFAULT_SCAN_LOOKAHEAD_DAYS,
            target_locations: Vec::new(),
        }
    }
}

/// Cycle cadence and deletion policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    pub scan_interval_secs: u64,
    pub ingest_interval_secs: u64,
    /// Full merged cycle; 0 disables it
    pub reconcile_interval_secs: u64,
    /// How long an event must stay missing before deletion.
    /// Defaults to two scan intervals.
    pub deletion_cooldown_secs: Option<u64>,
    /// Lifetime of suppressions created by confirmed deletions; `None` is permanent
    pub suppression_ttl_days: Option<u32>,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: DEFAULT_SCAN_INTERVAL_SECS,
            ingest_interval_secs: DEFAULT_INGEST_INTERVAL_SECS,
            reconcile_interval_secs: DEFAULT_RECONCILE_INTERVAL_SECS,
            deletion_cooldown_secs: None,
            suppression_ttl_days: None,
        }
    }
}

impl ReconcileConfig {
    pub fn deletion_cooldown(&self) -> Duration {
        Duration::from_secs(
            self.deletion_cooldown_secs.unwrap_or(self.scan_interval_secs.saturating_mul(2)),
        )
    }

    /// Consecutive missed scans that confirm a deletion. Never below two, so
    /// a single missed scan cannot delete anything.
    pub fn required_misses(&self) -> u32 {
        let interval = self.scan_interval_secs.max(1);
        let cooldown = self.deletion_cooldown().as_secs();
        let scans = cooldown.div_ceil(interval);
        u32::try_from(scans).unwrap_or(u32::MAX).max(MIN_REQUIRED_MISSES)
    }
}

/// Calendar write behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Minimum delay between remote calls
    pub pacing_ms: u64,
    /// Retries per remote call after the first attempt
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub call_timeout_secs: u64,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            pacing_ms: DEFAULT_PACING_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            call_timeout_secs: DEFAULT_CALL_TIMEOUT_SECS,
        }
    }
}

impl WriterConfig {
    pub const fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    pub const fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub const fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub job_timeout_secs: u64,
    pub stop_timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            job_timeout_secs: DEFAULT_JOB_TIMEOUT_SECS,
            stop_timeout_secs: DEFAULT_STOP_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}
