//! Records as delivered by the external schedule feed

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One reservation from the feed, already decoded from the wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEvent {
    pub reservation_id: Option<String>,
    pub event_id: Option<String>,
    /// Booking profile, e.g. `Rsrv_12345` or a class schedule pattern
    pub profile_name: Option<String>,
    pub event_name: String,
    pub event_title: String,
    pub organization: Option<String>,
    pub locator: Option<String>,
    pub location: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub all_day: bool,
}

/// What to ask the feed for and where the results belong.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedQuery {
    pub name: String,
    /// Feed-side category, e.g. `Classes` or `Events`
    pub category: String,
    /// Opaque query parameters passed through to the feed
    #[serde(default)]
    pub descriptor: String,
    pub target_location: String,
}
