//! Precedence rules that turn raw event data into an identity

use calrecon_domain::constants::{PROP_IDENTITY, PROP_RESERVATION_ID};
use calrecon_domain::utils::description_parser::{is_reservation_profile, parse_reservation_id};
use calrecon_domain::{FeedEvent, Identity, LiveEvent};
use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};

const SIGNATURE_HEX_LEN: usize = 32;

/// The subset of an event the resolver looks at.
///
/// Built from either side with `From`, so feed and calendar events go
/// through exactly the same precedence rules.
#[derive(Debug, Clone, Copy)]
pub struct IdentityInputs<'a> {
    /// Identity stamped on a calendar event by an earlier write
    pub stamped: Option<&'a str>,
    pub reservation_id: Option<&'a str>,
    pub profile_name: Option<&'a str>,
    pub uid: Option<&'a str>,
    /// Original start of a recurring instance
    pub instance_start: Option<DateTime<Utc>>,
    pub summary: &'a str,
    pub start: DateTime<Utc>,
    pub recurrence: Option<&'a str>,
    pub description: Option<&'a str>,
}

impl<'a> IdentityInputs<'a> {
    /// Feed events have no UID and no description of their own; `summary`
    /// is the title chosen during normalization.
    pub fn from_feed(event: &'a FeedEvent, summary: &'a str) -> Self {
        Self {
            stamped: None,
            reservation_id: event.reservation_id.as_deref(),
            profile_name: event.profile_name.as_deref(),
            uid: None,
            instance_start: None,
            summary,
            start: event.start,
            recurrence: None,
            description: None,
        }
    }
}

impl<'a> From<&'a LiveEvent> for IdentityInputs<'a> {
    fn from(event: &'a LiveEvent) -> Self {
        Self {
            stamped: event.private_properties.get(PROP_IDENTITY).map(String::as_str),
            reservation_id: event.private_properties.get(PROP_RESERVATION_ID).map(String::as_str),
            profile_name: None,
            uid: event.uid.as_deref(),
            instance_start: event.instance_start,
            summary: &event.fields.summary,
            start: event.fields.start,
            recurrence: event.recurrence.as_deref(),
            description: Some(&event.fields.description),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Resolve an identity, highest precedence first:
///
/// 1. an identity this system stamped on the event
/// 2. a reservation id (explicit, valid profile name, or parsed description)
/// 3. the UID, qualified with the instance start for recurring instances
/// 4. a signature over summary, start and recurrence
pub fn resolve(inputs: &IdentityInputs<'_>) -> Identity {
    if let Some(stamped) = non_empty(inputs.stamped).and_then(|raw| Identity::parse(raw).ok()) {
        return stamped;
    }

    if let Some(id) = non_empty(inputs.reservation_id) {
        return Identity::reservation(id);
    }
    if let Some(profile) = non_empty(inputs.profile_name).filter(|p| is_reservation_profile(p)) {
        return Identity::reservation(profile);
    }
    if let Some(parsed) = inputs.description.and_then(parse_reservation_id) {
        return parsed;
    }

    if let Some(uid) = non_empty(inputs.uid) {
        return match inputs.instance_start {
            Some(instance) => Identity::uid(&format!(
                "{uid}@{}",
                instance.to_rfc3339_opts(SecondsFormat::Secs, true)
            )),
            None => Identity::uid(uid),
        };
    }

    Identity::signature(&signature(inputs.summary, inputs.start, inputs.recurrence))
}

fn normalize_summary(summary: &str) -> String {
    summary.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Truncated SHA-256 over the normalized summary, start and recurrence.
pub fn signature(summary: &str, start: DateTime<Utc>, recurrence: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_summary(summary).as_bytes());
    hasher.update(b"|");
    hasher.update(start.to_rfc3339_opts(SecondsFormat::Secs, true).as_bytes());
    hasher.update(b"|");
    hasher.update(recurrence.unwrap_or_default().as_bytes());
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(SIGNATURE_HEX_LEN);
    digest
}
