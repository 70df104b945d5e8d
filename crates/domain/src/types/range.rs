//! Date and time ranges used to bound feed queries and calendar scans

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ReconError, Result};

/// Inclusive calendar-date range, the unit the feed is queried in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(ReconError::Validation(format!(
                "date range ends before it starts: {start} > {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Range of `lookback` days before and `lookahead` days after `today`.
    pub fn around(today: NaiveDate, lookback: u32, lookahead: u32) -> Self {
        Self {
            start: today - Duration::days(i64::from(lookback)),
            end: today + Duration::days(i64::from(lookahead)),
        }
    }

    /// Number of days covered, counting both ends.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Half-open UTC instant window covering every day of the range.
    pub fn to_window(&self) -> TimeWindow {
        TimeWindow {
            start: self.start.and_time(NaiveTime::MIN).and_utc(),
            end: (self.end + Duration::days(1)).and_time(NaiveTime::MIN).and_utc(),
        }
    }
}

/// Half-open instant window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }
}
