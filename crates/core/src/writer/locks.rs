//! In-process mutual exclusion per target location

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per location, created on first use.
///
/// Plans for the same location run one after another; plans for different
/// locations proceed in parallel.
#[derive(Debug, Clone, Default)]
pub struct LocationLocks {
    inner: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl LocationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, target_location: &str) -> OwnedMutexGuard<()> {
        let mutex = Arc::clone(self.inner.entry(target_location.to_string()).or_default().value());
        mutex.lock_owned().await
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
