//! Splitting a date range into feed-sized windows

use calrecon_domain::DateRange;
use chrono::Duration;

/// Split `range` into consecutive windows of at most `max_days` inclusive
/// days. Each window starts the day after the previous one ends.
pub fn split_windows(range: DateRange, max_days: u32) -> Vec<DateRange> {
    let span = Duration::days(i64::from(max_days.max(1)));
    let mut windows = Vec::new();
    let mut start = range.start;

    while start <= range.end {
        let end = (start + span - Duration::days(1)).min(range.end);
        windows.push(DateRange { start, end });
        start = end + Duration::days(1);
    }
    windows
}
