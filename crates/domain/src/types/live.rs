//! Events as seen in, and written to, the target calendar

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::event::{Attributes, EventFields, EventRecord};
use crate::constants::{
    FEED_SOURCE_MARKER, PROP_CATEGORY, PROP_EVENT_ID, PROP_IDENTITY, PROP_RESERVATION_ID,
    PROP_SOURCE,
};

/// An event from a live listing of a target calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveEvent {
    pub external_ref: String,
    pub uid: Option<String>,
    /// Original start of a recurring-series instance
    pub instance_start: Option<DateTime<Utc>>,
    pub recurrence: Option<String>,
    pub fields: EventFields,
    #[serde(default)]
    pub private_properties: Attributes,
    #[serde(default)]
    pub declined: bool,
    #[serde(default)]
    pub cancelled: bool,
    #[serde(default)]
    pub organizer_self: bool,
}

/// Payload for a calendar create or update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDraft {
    pub fields: EventFields,
    pub private_properties: Attributes,
}

impl EventDraft {
    /// Build the calendar payload for a record, stamping the markers that let
    /// a later scan resolve the same identity.
    pub fn from_record(record: &EventRecord) -> Self {
        let mut props = Attributes::new();
        props.insert(PROP_IDENTITY.to_string(), record.identity.to_string());
        if record.source_kind.is_fed() {
            props.insert(PROP_SOURCE.to_string(), FEED_SOURCE_MARKER.to_string());
            for key in [PROP_CATEGORY, PROP_RESERVATION_ID, PROP_EVENT_ID] {
                if let Some(value) = record.attributes.get(key) {
                    props.insert(key.to_string(), value.clone());
                }
            }
        }
        Self { fields: record.fields.clone(), private_properties: props }
    }
}
