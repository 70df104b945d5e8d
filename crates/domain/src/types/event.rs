//! Canonical event record and the value types it is built from

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::PROP_RESERVATION_ID;
use crate::{impl_status_conversions, ReconError, Result};

/// Free-form source-specific side payload.
pub type Attributes = BTreeMap<String, String>;

/// Which precedence rule produced an [`Identity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityKind {
    /// Feed-issued reservation or session identifier
    Reservation,
    /// Universal calendar identifier, stable across moves
    Uid,
    /// Hash of summary, start and recurrence; may collide
    Signature,
}

impl IdentityKind {
    const fn prefix(self) -> &'static str {
        match self {
            Self::Reservation => "rsv",
            Self::Uid => "uid",
            Self::Signature => "sig",
        }
    }
}

/// Stable logical key for an event across systems.
///
/// The string form is `<kind>:<value>` so the precedence rule that produced
/// it survives a round trip through storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    pub fn new(kind: IdentityKind, value: &str) -> Self {
        Self(format!("{}:{}", kind.prefix(), value.trim()))
    }

    pub fn reservation(id: &str) -> Self {
        Self::new(IdentityKind::Reservation, id)
    }

    pub fn uid(uid: &str) -> Self {
        Self::new(IdentityKind::Uid, uid)
    }

    pub fn signature(digest: &str) -> Self {
        Self::new(IdentityKind::Signature, digest)
    }

    /// Parse a stored identity, rejecting unknown prefixes and empty values.
    pub fn parse(raw: &str) -> Result<Self> {
        let (prefix, value) = raw
            .split_once(':')
            .ok_or_else(|| ReconError::Validation(format!("identity without kind: {raw}")))?;
        if value.trim().is_empty() {
            return Err(ReconError::Validation(format!("empty identity value: {raw}")));
        }
        match prefix {
            "rsv" | "uid" | "sig" => Ok(Self(raw.to_string())),
            other => Err(ReconError::Validation(format!("unknown identity kind: {other}"))),
        }
    }

    pub fn kind(&self) -> IdentityKind {
        match self.0.split_once(':').map(|(prefix, _)| prefix) {
            Some("rsv") => IdentityKind::Reservation,
            Some("uid") => IdentityKind::Uid,
            _ => IdentityKind::Signature,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part after the kind prefix.
    pub fn value(&self) -> &str {
        self.0.split_once(':').map_or(self.0.as_str(), |(_, value)| value)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Identity {
    type Error = ReconError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Identity> for String {
    fn from(value: Identity) -> Self {
        value.0
    }
}

/// Uniqueness key of the canonical store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    pub identity: Identity,
    pub target_location: String,
}

impl RecordKey {
    pub fn new(identity: Identity, target_location: impl Into<String>) -> Self {
        Self { identity, target_location: target_location.into() }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.identity, self.target_location)
    }
}

/// Where an event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    FedClass,
    FedCampusEvent,
    Booking,
    UserAuthored,
    Other,
}

impl_status_conversions!(SourceKind {
    FedClass => "fed-class",
    FedCampusEvent => "fed-campus-event",
    Booking => "booking",
    UserAuthored => "user-authored",
    Other => "other",
});

impl SourceKind {
    /// Fed records take their field values from the feed; every other kind
    /// takes them from the live calendar.
    pub const fn is_fed(self) -> bool {
        matches!(self, Self::FedClass | Self::FedCampusEvent)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    Active,
    Declined,
    Deleted,
    Moved,
}

impl_status_conversions!(LifecycleStatus {
    Active => "active",
    Declined => "declined",
    Deleted => "deleted",
    Moved => "moved",
});

impl LifecycleStatus {
    pub const fn is_deleted(self) -> bool {
        matches!(self, Self::Deleted)
    }
}

/// Most recent lifecycle transition of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LastAction {
    Created,
    Updated,
    Moved,
    Deleted,
    Restored,
}

impl_status_conversions!(LastAction {
    Created => "created",
    Updated => "updated",
    Moved => "moved",
    Deleted => "deleted",
    Restored => "restored",
});

/// User-visible content of an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFields {
    pub summary: String,
    pub location: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub all_day: bool,
}

impl EventFields {
    pub fn validate(&self) -> Result<()> {
        if self.summary.trim().is_empty() {
            return Err(ReconError::Validation("event summary is empty".into()));
        }
        if self.end < self.start {
            return Err(ReconError::Validation(format!(
                "event '{}' ends before it starts ({} < {})",
                self.summary, self.end, self.start
            )));
        }
        Ok(())
    }
}

/// The canonical unit of the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub identity: Identity,
    pub external_ref: Option<String>,
    pub source_kind: SourceKind,
    pub fields: EventFields,
    pub target_location: String,
    pub lifecycle_status: LifecycleStatus,
    pub last_action: LastAction,
    pub last_action_at: DateTime<Utc>,
    pub last_observed_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub attributes: Attributes,
    /// Consecutive scans that did not find the event
    pub consecutive_misses: u32,
    pub missing_since: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EventRecord {
    /// A fresh active record that has not been written anywhere yet.
    pub fn new(
        identity: Identity,
        target_location: impl Into<String>,
        source_kind: SourceKind,
        fields: EventFields,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            identity,
            external_ref: None,
            source_kind,
            fields,
            target_location: target_location.into(),
            lifecycle_status: LifecycleStatus::Active,
            last_action: LastAction::Created,
            last_action_at: now,
            last_observed_at: None,
            deleted_at: None,
            attributes: Attributes::new(),
            consecutive_misses: 0,
            missing_since: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.identity.clone(), self.target_location.clone())
    }

    pub const fn is_active(&self) -> bool {
        !self.lifecycle_status.is_deleted()
    }

    /// Check the record-level invariants: `deleted_at` is set exactly when
    /// the status is `deleted`, and the fields are well formed.
    pub fn validate(&self) -> Result<()> {
        if self.lifecycle_status.is_deleted() != self.deleted_at.is_some() {
            return Err(ReconError::Validation(format!(
                "record {} has status {} but deleted_at {:?}",
                self.key(),
                self.lifecycle_status,
                self.deleted_at
            )));
        }
        self.fields.validate()
    }

    /// Whether the feed-controlled content differs from `other`.
    pub fn content_differs(&self, other: &Self) -> bool {
        self.fields != other.fields
            || self.attributes != other.attributes
            || self.source_kind != other.source_kind
    }

    pub fn reservation_id(&self) -> Option<&str> {
        self.attributes.get(PROP_RESERVATION_ID).map(String::as_str)
    }

    /// Advance `last_observed_at`, never moving it backwards.
    pub fn observe(&mut self, at: DateTime<Utc>) {
        self.last_observed_at = Some(self.last_observed_at.map_or(at, |prev| prev.max(at)));
        self.consecutive_misses = 0;
        self.missing_since = None;
    }
}

/// Result of a canonical store upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub action: LastAction,
    pub record: EventRecord,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn fields() -> EventFields {
        EventFields {
            summary: "Chem 101".into(),
            location: "Hoover 105".into(),
            description: String::new(),
            start: Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 1, 10, 10, 0, 0).unwrap(),
            all_day: false,
        }
    }

    #[test]
    fn identity_keeps_kind_through_parse() {
        let id = Identity::reservation(" Rsrv_123 ");
        assert_eq!(id.as_str(), "rsv:Rsrv_123");
        let parsed = Identity::parse(id.as_str()).unwrap();
        assert_eq!(parsed.kind(), IdentityKind::Reservation);
        assert_eq!(Identity::uid("abc@google.com").kind(), IdentityKind::Uid);
    }

    #[test]
    fn identity_parse_rejects_garbage() {
        assert!(Identity::parse("no-prefix").is_err());
        assert!(Identity::parse("zzz:value").is_err());
        assert!(Identity::parse("uid:  ").is_err());
    }

    #[test]
    fn deleted_at_must_match_status() {
        let now = Utc::now();
        let mut record =
            EventRecord::new(Identity::uid("a"), "work", SourceKind::UserAuthored, fields(), now);
        assert!(record.validate().is_ok());

        record.deleted_at = Some(now);
        assert!(record.validate().is_err());

        record.lifecycle_status = LifecycleStatus::Deleted;
        assert!(record.validate().is_ok());

        record.deleted_at = None;
        assert!(record.validate().is_err());
    }

    #[test]
    fn fields_reject_inverted_times() {
        let mut f = fields();
        f.end = f.start - chrono::Duration::minutes(1);
        assert!(matches!(f.validate(), Err(ReconError::Validation(_))));
    }

    #[test]
    fn observe_never_moves_backwards() {
        let now = Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap();
        let mut record =
            EventRecord::new(Identity::uid("a"), "work", SourceKind::Other, fields(), now);
        record.consecutive_misses = 1;
        record.observe(now);
        record.observe(now - chrono::Duration::hours(1));
        assert_eq!(record.last_observed_at, Some(now));
        assert_eq!(record.consecutive_misses, 0);
    }

    #[test]
    fn source_kind_wire_strings() {
        assert_eq!(SourceKind::FedCampusEvent.as_str(), "fed-campus-event");
        assert_eq!("user-authored".parse::<SourceKind>().unwrap(), SourceKind::UserAuthored);
        assert!(SourceKind::FedClass.is_fed());
        assert!(!SourceKind::Booking.is_fed());
    }
}
