//! External service integrations: the schedule feed and the target calendar

pub mod feed;
pub mod google_calendar;
mod http;

pub use feed::HttpFeedSource;
pub use google_calendar::GoogleCalendarService;
