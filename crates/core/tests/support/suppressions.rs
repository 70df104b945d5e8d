use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use calrecon_core::ports::SuppressionList;
use calrecon_domain::{
    ReconError, RecordKey, Result as DomainResult, SuppressionEntry, SuppressionMatch,
    SuppressionPattern,
};
use chrono::{DateTime, Utc};
use regex::Regex;

/// In-memory `SuppressionList` with real regex matching.
#[derive(Default, Clone)]
pub struct MemorySuppressions {
    entries: Arc<Mutex<HashMap<RecordKey, SuppressionEntry>>>,
    patterns: Arc<Mutex<Vec<SuppressionPattern>>>,
}

impl MemorySuppressions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&self, key: &RecordKey) -> Option<SuppressionEntry> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

#[async_trait]
impl SuppressionList for MemorySuppressions {
    async fn add(&self, entry: SuppressionEntry) -> DomainResult<()> {
        self.entries.lock().unwrap().insert(entry.key.clone(), entry);
        Ok(())
    }

    async fn is_suppressed(&self, key: &RecordKey, now: DateTime<Utc>) -> DomainResult<bool> {
        Ok(self.entry(key).is_some_and(|e| e.is_active_at(now)))
    }

    async fn matches(
        &self,
        key: &RecordKey,
        summary: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<Option<SuppressionMatch>> {
        if let Some(entry) = self.entry(key).filter(|e| e.is_active_at(now)) {
            return Ok(Some(SuppressionMatch::Exact(entry)));
        }
        let patterns = self.patterns.lock().unwrap();
        Ok(patterns
            .iter()
            .filter(|p| p.is_active_at(now) && p.applies_to(&key.target_location))
            .find(|p| Regex::new(&p.pattern).is_ok_and(|re| re.is_match(summary)))
            .cloned()
            .map(SuppressionMatch::Pattern))
    }

    async fn remove(&self, key: &RecordKey) -> DomainResult<bool> {
        Ok(self.entries.lock().unwrap().remove(key).is_some())
    }

    async fn add_pattern(&self, mut pattern: SuppressionPattern) -> DomainResult<i64> {
        Regex::new(&pattern.pattern)
            .map_err(|e| ReconError::Validation(format!("invalid pattern: {e}")))?;
        let mut patterns = self.patterns.lock().unwrap();
        let id = i64::try_from(patterns.len()).unwrap() + 1;
        pattern.id = Some(id);
        patterns.push(pattern);
        Ok(id)
    }

    async fn remove_pattern(&self, id: i64) -> DomainResult<bool> {
        let mut patterns = self.patterns.lock().unwrap();
        let before = patterns.len();
        patterns.retain(|p| p.id != Some(id));
        Ok(patterns.len() != before)
    }

    async fn list_active(&self, now: DateTime<Utc>) -> DomainResult<Vec<SuppressionEntry>> {
        Ok(self.entries.lock().unwrap().values().filter(|e| e.is_active_at(now)).cloned().collect())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> DomainResult<usize> {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|_, e| e.is_active_at(now));
        let mut patterns = self.patterns.lock().unwrap();
        let patterns_before = patterns.len();
        patterns.retain(|p| p.is_active_at(now));
        Ok(before - entries.len() + patterns_before - patterns.len())
    }
}
