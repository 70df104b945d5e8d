//! Canonical records built from live calendar events

use calrecon_domain::constants::{
    FEED_SOURCE_MARKER, LEGACY_FEED_SOURCE_MARKER, PROP_CATEGORY, PROP_EVENT_ID,
    PROP_RESERVATION_ID, PROP_SOURCE,
};
use calrecon_domain::{EventRecord, Identity, LifecycleStatus, LiveEvent, SourceKind};
use chrono::{DateTime, Utc};

const BOOKING_PREFIX: &str = "Meet with";
const BOOKING_MARKER: &str = "Booked by";

/// Work out where a live event came from.
pub fn classify_source(event: &LiveEvent, class_categories: &[String]) -> SourceKind {
    let props = &event.private_properties;
    let fed = props
        .get(PROP_SOURCE)
        .is_some_and(|s| s == FEED_SOURCE_MARKER || s == LEGACY_FEED_SOURCE_MARKER);
    if fed {
        let is_class = props
            .get(PROP_CATEGORY)
            .is_some_and(|c| class_categories.iter().any(|k| k.eq_ignore_ascii_case(c)));
        return if is_class { SourceKind::FedClass } else { SourceKind::FedCampusEvent };
    }
    if event.fields.summary.starts_with(BOOKING_PREFIX)
        && event.fields.description.contains(BOOKING_MARKER)
    {
        return SourceKind::Booking;
    }
    if event.organizer_self {
        SourceKind::UserAuthored
    } else {
        SourceKind::Other
    }
}

const fn live_status(event: &LiveEvent) -> LifecycleStatus {
    if event.declined {
        LifecycleStatus::Declined
    } else {
        LifecycleStatus::Active
    }
}

/// A record mirroring `event` as it stands in `target_location` right now.
pub fn record_from_live(
    event: &LiveEvent,
    identity: Identity,
    target_location: &str,
    class_categories: &[String],
    now: DateTime<Utc>,
) -> EventRecord {
    let source_kind = classify_source(event, class_categories);
    let mut record =
        EventRecord::new(identity, target_location, source_kind, event.fields.clone(), now);
    record.external_ref = Some(event.external_ref.clone());
    record.lifecycle_status = live_status(event);
    record.last_observed_at = Some(now);
    for key in [PROP_SOURCE, PROP_CATEGORY, PROP_EVENT_ID, PROP_RESERVATION_ID] {
        if let Some(value) = event.private_properties.get(key) {
            record.attributes.insert(key.to_string(), value.clone());
        }
    }
    record
}
