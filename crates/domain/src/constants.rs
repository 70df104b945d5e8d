//! Domain constants
//!
//! Default values for configuration plus the marker keys this system stamps
//! on the calendar events it writes.

// Feed windowing
pub const DEFAULT_MAX_WINDOW_DAYS: u32 = 130; // feed rejects spans over 20 weeks
pub const DEFAULT_LOOKBACK_DAYS: u32 = 30;
pub const DEFAULT_LOOKAHEAD_DAYS: u32 = 365;
pub const DEFAULT_FEED_TIMEOUT_SECS: u64 = 30;

// Scan windowing
pub const DEFAULT_SCAN_LOOKBACK_DAYS: u32 = 30;
pub const DEFAULT_SCAN_LOOKAHEAD_DAYS: u32 = 365;
pub const DEFAULT_CALENDAR_TIMEOUT_SECS: u64 = 30;

// Cycle intervals
pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 15 * 60;
pub const DEFAULT_INGEST_INTERVAL_SECS: u64 = 30 * 60;
pub const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 0; // disabled unless configured
pub const MIN_REQUIRED_MISSES: u32 = 2;

// Writer
pub const DEFAULT_PACING_MS: u64 = 100;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 2_000;
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 30;

// Scheduler
pub const DEFAULT_JOB_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_STOP_TIMEOUT_SECS: u64 = 5;

// Database
pub const DEFAULT_DB_PATH: &str = "calrecon.db";
pub const DEFAULT_DB_POOL_SIZE: u32 = 4;

// Private property keys written on calendar events
pub const PROP_IDENTITY: &str = "calrecon_identity";
pub const PROP_SOURCE: &str = "source";
pub const PROP_CATEGORY: &str = "calendar_type";
pub const PROP_RESERVATION_ID: &str = "reservation_id";
pub const PROP_EVENT_ID: &str = "event_id";
pub const FEED_SOURCE_MARKER: &str = "feed";
pub const LEGACY_FEED_SOURCE_MARKER: &str = "25live";
