use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use calrecon_core::ports::FeedSource;
use calrecon_domain::{FeedEvent, FeedQuery, ReconError, Result as DomainResult, TimeWindow};

/// Feed that serves a fixed event list, filtered to each requested window.
#[derive(Default, Clone)]
pub struct MockFeed {
    events: Arc<Mutex<Vec<FeedEvent>>>,
    failures: Arc<Mutex<VecDeque<ReconError>>>,
    windows: Arc<Mutex<Vec<TimeWindow>>>,
}

impl MockFeed {
    pub fn new(events: Vec<FeedEvent>) -> Self {
        Self { events: Arc::new(Mutex::new(events)), ..Self::default() }
    }

    pub fn set_events(&self, events: Vec<FeedEvent>) {
        *self.events.lock().unwrap() = events;
    }

    pub fn fail_next(&self, error: ReconError) {
        self.failures.lock().unwrap().push_back(error);
    }

    /// Windows requested so far, in order.
    pub fn windows(&self) -> Vec<TimeWindow> {
        self.windows.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeedSource for MockFeed {
    async fn fetch_window(
        &self,
        _query: &FeedQuery,
        window: &TimeWindow,
    ) -> DomainResult<Vec<FeedEvent>> {
        self.windows.lock().unwrap().push(*window);
        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| window.contains(e.start))
            .cloned()
            .collect())
    }
}
