use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use calrecon_core::ports::CalendarService;
use calrecon_domain::{
    EventDraft, LiveEvent, ReconError, Result as DomainResult, TimeWindow,
};

/// In-memory calendar with scripted failures.
///
/// Failures queued with [`MockCalendar::fail_next`] are returned by the next
/// calls, whatever the operation. Every call is logged as `op:location`.
#[derive(Default, Clone)]
pub struct MockCalendar {
    events: Arc<Mutex<HashMap<String, Vec<LiveEvent>>>>,
    failures: Arc<Mutex<VecDeque<ReconError>>>,
    calls: Arc<Mutex<Vec<String>>>,
    next_id: Arc<AtomicU64>,
}

impl MockCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, location: &str, event: LiveEvent) {
        self.events.lock().unwrap().entry(location.to_string()).or_default().push(event);
    }

    /// Manual deletion by the user.
    pub fn remove(&self, location: &str, external_ref: &str) -> bool {
        let mut events = self.events.lock().unwrap();
        let Some(list) = events.get_mut(location) else { return false };
        let before = list.len();
        list.retain(|e| e.external_ref != external_ref);
        list.len() != before
    }

    pub fn edit(&self, location: &str, external_ref: &str, f: impl FnOnce(&mut LiveEvent)) {
        let mut events = self.events.lock().unwrap();
        if let Some(event) = events
            .get_mut(location)
            .and_then(|list| list.iter_mut().find(|e| e.external_ref == external_ref))
        {
            f(event);
        }
    }

    pub fn events(&self, location: &str) -> Vec<LiveEvent> {
        self.events.lock().unwrap().get(location).cloned().unwrap_or_default()
    }

    pub fn fail_next(&self, error: ReconError) {
        self.failures.lock().unwrap().push_back(error);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, op: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(&format!("{op}:"))).count()
    }

    fn enter(&self, op: &str, location: &str) -> DomainResult<()> {
        self.calls.lock().unwrap().push(format!("{op}:{location}"));
        match self.failures.lock().unwrap().pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CalendarService for MockCalendar {
    async fn list(&self, location: &str, window: &TimeWindow) -> DomainResult<Vec<LiveEvent>> {
        self.enter("list", location)?;
        Ok(self
            .events(location)
            .into_iter()
            .filter(|e| e.fields.end > window.start && e.fields.start < window.end)
            .collect())
    }

    async fn create(&self, location: &str, draft: &EventDraft) -> DomainResult<String> {
        self.enter("create", location)?;
        let external_ref = format!("evt-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.insert(location, LiveEvent {
            external_ref: external_ref.clone(),
            uid: Some(format!("{external_ref}@mock")),
            instance_start: None,
            recurrence: None,
            fields: draft.fields.clone(),
            private_properties: draft.private_properties.clone(),
            declined: false,
            cancelled: false,
            organizer_self: true,
        });
        Ok(external_ref)
    }

    async fn update(
        &self,
        location: &str,
        external_ref: &str,
        draft: &EventDraft,
    ) -> DomainResult<()> {
        self.enter("update", location)?;
        let mut events = self.events.lock().unwrap();
        let event = events
            .get_mut(location)
            .and_then(|list| list.iter_mut().find(|e| e.external_ref == external_ref))
            .ok_or_else(|| ReconError::NotFound(external_ref.to_string()))?;
        event.fields = draft.fields.clone();
        event.private_properties = draft.private_properties.clone();
        Ok(())
    }

    async fn delete(&self, location: &str, external_ref: &str) -> DomainResult<()> {
        self.enter("delete", location)?;
        if self.remove(location, external_ref) {
            Ok(())
        } else {
            Err(ReconError::NotFound(external_ref.to_string()))
        }
    }
}
