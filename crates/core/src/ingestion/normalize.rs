//! Turning raw feed events into canonical records

use calrecon_domain::constants::{
    FEED_SOURCE_MARKER, PROP_CATEGORY, PROP_EVENT_ID, PROP_RESERVATION_ID, PROP_SOURCE,
};
use calrecon_domain::utils::description_parser::reservation_footer;
use calrecon_domain::{
    EventFields, EventRecord, FeedConfig, FeedEvent, FeedQuery, IdentityKind, Result, SourceKind,
};
use chrono::{DateTime, Utc};

use crate::identity::{resolve, IdentityInputs};

const PRIVATE_ORGANIZATION: &str = "(Private)";

/// Result of normalizing one feed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    Record(Box<EventRecord>),
    /// Dropped by the title filters
    Filtered { title: String },
}

fn is_untitled(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value.eq_ignore_ascii_case("no title")
}

fn pick_title<'a>(event: &'a FeedEvent, prefer_title: bool) -> &'a str {
    let (first, second) = if prefer_title {
        (event.event_title.trim(), event.event_name.trim())
    } else {
        (event.event_name.trim(), event.event_title.trim())
    };
    if is_untitled(first) {
        second
    } else {
        first
    }
}

fn is_filtered(event: &FeedEvent, config: &FeedConfig) -> bool {
    if is_untitled(&event.event_name) && is_untitled(&event.event_title) {
        return true;
    }
    config
        .filter_titles
        .iter()
        .any(|t| t == event.event_name.trim() || t == event.event_title.trim())
}

fn build_description(event: &FeedEvent, category: &str, footer: Option<String>) -> String {
    let mut lines = vec![format!("Source: Feed {category}")];
    if let Some(profile) = event.profile_name.as_deref().filter(|p| !p.trim().is_empty()) {
        lines.push(format!("Profile: {}", profile.trim()));
    }
    if let Some(org) = event
        .organization
        .as_deref()
        .map(str::trim)
        .filter(|o| !o.is_empty() && *o != PRIVATE_ORGANIZATION)
    {
        lines.push(format!("Organization: {org}"));
    }
    if let Some(locator) = event.locator.as_deref().filter(|l| !l.trim().is_empty()) {
        lines.push(format!("Event ID: {}", locator.trim()));
    }
    lines.extend(footer);
    lines.join("\n")
}

/// Normalize a feed event for `query`.
///
/// Filtered events are reported rather than dropped so the caller can count
/// them. Malformed events come back as `Validation` errors.
pub fn normalize(
    event: &FeedEvent,
    query: &FeedQuery,
    config: &FeedConfig,
    now: DateTime<Utc>,
) -> Result<Normalized> {
    let is_class = config.is_class_category(&query.category);
    let title = pick_title(event, is_class).to_string();

    if is_filtered(event, config) {
        return Ok(Normalized::Filtered { title });
    }

    let identity = resolve(&IdentityInputs::from_feed(event, &title));
    let reservation_id =
        (identity.kind() == IdentityKind::Reservation).then(|| identity.value().to_string());

    let fields = EventFields {
        summary: title,
        location: event.location.trim().to_string(),
        description: build_description(
            event,
            &query.category,
            reservation_id.as_deref().map(reservation_footer),
        ),
        start: event.start,
        end: event.end,
        all_day: event.all_day,
    };
    fields.validate()?;

    let source_kind = if is_class { SourceKind::FedClass } else { SourceKind::FedCampusEvent };
    let mut record = EventRecord::new(identity, &query.target_location, source_kind, fields, now);
    record.attributes.insert(PROP_SOURCE.to_string(), FEED_SOURCE_MARKER.to_string());
    record.attributes.insert(PROP_CATEGORY.to_string(), query.category.clone());
    if let Some(event_id) = event.event_id.as_deref().filter(|id| !id.trim().is_empty()) {
        record.attributes.insert(PROP_EVENT_ID.to_string(), event_id.trim().to_string());
    }
    if let Some(reservation_id) = reservation_id {
        record.attributes.insert(PROP_RESERVATION_ID.to_string(), reservation_id);
    }

    Ok(Normalized::Record(Box::new(record)))
}
