//! Per-batch duplicate and collision tracking

use std::collections::HashSet;

use calrecon_domain::{IdentityKind, RecordKey};
use tracing::warn;

/// Verdict for a key seen while processing one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// First time this key appears in the batch
    First,
    /// Repeat of an explicit identity; the copy is dropped quietly
    Duplicate,
    /// Two different events hashed to the same signature
    SignatureCollision,
}

/// Remembers every key admitted in a batch so later copies are skipped.
///
/// Signature identities are an approximation, so a repeat there is more
/// likely two distinct events than one event listed twice. Those repeats
/// are reported as collisions and never merged.
#[derive(Debug, Default)]
pub struct BatchGuard {
    seen: HashSet<RecordKey>,
}

impl BatchGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn admit(&mut self, key: &RecordKey, summary: &str) -> Admission {
        if self.seen.insert(key.clone()) {
            return Admission::First;
        }
        if key.identity.kind() == IdentityKind::Signature {
            warn!(key = %key, summary, "signature collision within batch; later event skipped");
            Admission::SignatureCollision
        } else {
            Admission::Duplicate
        }
    }

    /// Warning text for the cycle summary.
    pub fn collision_message(key: &RecordKey, summary: &str) -> String {
        format!("signature collision on {key} ('{summary}'); later event skipped")
    }
}
