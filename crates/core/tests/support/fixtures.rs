use std::sync::Arc;

use calrecon_common::time::MockClock;
use calrecon_core::{EnginePorts, ReconciliationEngine};
use calrecon_domain::{
    Attributes, Config, EventFields, EventRecord, FeedEvent, FeedQuery, Identity, LiveEvent,
    SourceKind,
};
use chrono::{DateTime, Duration, TimeZone, Utc};

use super::calendar::MockCalendar;
use super::feed::MockFeed;
use super::store::MemoryStore;
use super::suppressions::MemorySuppressions;

pub const LOCATION: &str = "work";

pub fn at(month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, month, day, hour, 0, 0).unwrap()
}

pub fn query() -> FeedQuery {
    FeedQuery {
        name: "campus".into(),
        category: "Events".into(),
        descriptor: "spaces_query_id=1".into(),
        target_location: LOCATION.into(),
    }
}

pub fn feed_event(reservation_id: &str, name: &str, start: DateTime<Utc>) -> FeedEvent {
    FeedEvent {
        reservation_id: Some(reservation_id.into()),
        event_id: Some(format!("2024-{reservation_id}")),
        profile_name: None,
        event_name: name.into(),
        event_title: String::new(),
        organization: Some("Facilities".into()),
        locator: Some(format!("2024-{reservation_id}")),
        location: "Hoover 105".into(),
        start,
        end: start + Duration::hours(1),
        all_day: false,
    }
}

pub fn fields(summary: &str, start: DateTime<Utc>) -> EventFields {
    EventFields {
        summary: summary.into(),
        location: String::new(),
        description: String::new(),
        start,
        end: start + Duration::minutes(30),
        all_day: false,
    }
}

/// Stored fed record for reservation `id`, optionally already in the calendar.
pub fn record(id: &str, external_ref: Option<&str>) -> EventRecord {
    let start = at(1, 10, 9);
    let mut record = EventRecord::new(
        Identity::reservation(id),
        LOCATION,
        SourceKind::FedCampusEvent,
        fields(id, start),
        start,
    );
    record.external_ref = external_ref.map(str::to_string);
    record
}

/// A calendar event the user made themselves.
pub fn live_event(external_ref: &str, summary: &str, start: DateTime<Utc>) -> LiveEvent {
    LiveEvent {
        external_ref: external_ref.into(),
        uid: Some(format!("{external_ref}@google.com")),
        instance_start: None,
        recurrence: None,
        fields: fields(summary, start),
        private_properties: Attributes::new(),
        declined: false,
        cancelled: false,
        organizer_self: true,
    }
}

/// Config with no pacing or backoff delays and one query into `LOCATION`.
pub fn config() -> Config {
    let mut config = Config::default();
    config.feed.queries = vec![query()];
    config.calendar.target_locations = vec![LOCATION.into()];
    config.writer.pacing_ms = 0;
    config.writer.backoff_base_ms = 10;
    config
}

pub struct Harness {
    pub store: MemoryStore,
    pub suppressions: MemorySuppressions,
    pub feed: MockFeed,
    pub calendar: MockCalendar,
    pub clock: MockClock,
    pub engine: ReconciliationEngine,
}

impl Harness {
    pub fn new(config: Config, events: Vec<FeedEvent>) -> Self {
        let store = MemoryStore::new();
        let suppressions = MemorySuppressions::new();
        let feed = MockFeed::new(events);
        let calendar = MockCalendar::new();
        let clock = MockClock::new(at(1, 15, 8));
        let ports = EnginePorts {
            store: Arc::new(store.clone()),
            suppressions: Arc::new(suppressions.clone()),
            feed: Arc::new(feed.clone()),
            calendar: Arc::new(calendar.clone()),
        };
        let engine = ReconciliationEngine::new(config, ports, Arc::new(clock.clone()));
        Self { store, suppressions, feed, calendar, clock, engine }
    }
}
