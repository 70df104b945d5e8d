//! Suppression entries: standing instructions never to (re)create an event

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::event::RecordKey;

/// Exact suppression of one `(identity, target_location)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuppressionEntry {
    pub key: RecordKey,
    pub reason: String,
    /// Summary of the event when it was suppressed, kept for audit
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
    /// `None` means permanent
    pub expires_at: Option<DateTime<Utc>>,
}

impl SuppressionEntry {
    pub fn new(
        key: RecordKey,
        reason: impl Into<String>,
        created_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self { key, reason: reason.into(), summary: None, created_at, expires_at }
    }

    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |expires| expires > now)
    }
}

/// Regex suppression against event summaries, for blocking a whole series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuppressionPattern {
    /// Assigned by the store
    pub id: Option<i64>,
    /// `None` applies the pattern to every location
    pub target_location: Option<String>,
    pub pattern: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl SuppressionPattern {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |expires| expires > now)
    }

    pub fn applies_to(&self, target_location: &str) -> bool {
        self.target_location.as_deref().map_or(true, |loc| loc == target_location)
    }
}

/// Why an event is suppressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuppressionMatch {
    Exact(SuppressionEntry),
    Pattern(SuppressionPattern),
}

impl SuppressionMatch {
    pub fn reason(&self) -> &str {
        match self {
            Self::Exact(entry) => &entry.reason,
            Self::Pattern(pattern) => &pattern.reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::types::event::Identity;

    #[test]
    fn expiry_is_exclusive() {
        let now = Utc::now();
        let key = RecordKey::new(Identity::reservation("R1"), "work");
        let permanent = SuppressionEntry::new(key.clone(), "user_deleted", now, None);
        assert!(permanent.is_active_at(now + Duration::days(3650)));

        let expires = Some(now + Duration::days(1));
        let expiring = SuppressionEntry::new(key, "user_deleted", now, expires);
        assert!(expiring.is_active_at(now));
        assert!(!expiring.is_active_at(now + Duration::days(1)));
    }

    #[test]
    fn pattern_scope() {
        let pattern = SuppressionPattern {
            id: None,
            target_location: Some("work".into()),
            pattern: "^Chapel".into(),
            reason: "series".into(),
            created_at: Utc::now(),
            expires_at: None,
        };
        assert!(pattern.applies_to("work"));
        assert!(!pattern.applies_to("personal"));
        let global = SuppressionPattern { target_location: None, ..pattern };
        assert!(global.applies_to("personal"));
    }
}
