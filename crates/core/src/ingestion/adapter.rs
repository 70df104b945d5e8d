//! Lazy stream of normalized feed records

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use calrecon_common::time::Clock;
use calrecon_domain::{
    DateRange, EventRecord, FeedConfig, FeedEvent, FeedQuery, ReconError, RecordKey, Result,
};
use futures::stream::{self, Stream};
use tracing::{debug, info, instrument, warn};

use super::normalize::{normalize, Normalized};
use super::windows::split_windows;
use crate::ports::{FeedSource, SuppressionList};
use crate::remote::{flatten, with_timeout, RemoteRetry};

/// One element of an ingestion pass.
///
/// Only `Record` moves on to the reconciler; the rest are counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestItem {
    Record(Box<EventRecord>),
    Filtered { title: String },
    Suppressed { key: RecordKey, reason: String },
    Invalid { reason: String },
}

/// Pulls a date range from the feed window by window and classifies each
/// event before it reaches the reconciler.
pub struct IngestionAdapter {
    feed: Arc<dyn FeedSource>,
    suppressions: Arc<dyn SuppressionList>,
    config: FeedConfig,
    retry: RemoteRetry,
    clock: Arc<dyn Clock>,
}

struct StreamState {
    windows: VecDeque<DateRange>,
    pending: VecDeque<Result<IngestItem>>,
    halted: bool,
}

impl IngestionAdapter {
    pub fn new(
        feed: Arc<dyn FeedSource>,
        suppressions: Arc<dyn SuppressionList>,
        config: FeedConfig,
        retry: RemoteRetry,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { feed, suppressions, config, retry, clock }
    }

    /// Stream every event of `query` within `range`.
    ///
    /// Nothing is fetched until the stream is polled, and calling this again
    /// starts over from the first window. A window that still fails after
    /// retries yields one `Err` item and the next window is tried; an error
    /// that aborts the cycle ends the stream after being yielded.
    pub fn stream<'a>(
        &'a self,
        query: &'a FeedQuery,
        range: DateRange,
    ) -> impl Stream<Item = Result<IngestItem>> + Send + 'a {
        let windows: VecDeque<_> = split_windows(range, self.config.max_window_days).into();
        debug!(query = %query.name, windows = windows.len(), "starting feed ingestion");
        let state = StreamState { windows, pending: VecDeque::new(), halted: false };

        stream::unfold(state, move |mut state| async move {
            loop {
                if let Some(item) = state.pending.pop_front() {
                    return Some((item, state));
                }
                if state.halted {
                    return None;
                }
                let window = state.windows.pop_front()?;

                match self.fetch(query, window).await {
                    Ok(events) => {
                        for event in &events {
                            state.pending.push_back(self.classify(event, query).await);
                        }
                    }
                    Err(error) => {
                        if error.aborts_cycle() {
                            state.halted = true;
                        }
                        state.pending.push_back(Err(error));
                    }
                }
            }
        })
    }

    #[instrument(
        skip(self, query),
        fields(query = %query.name, start = %window.start, end = %window.end)
    )]
    async fn fetch(&self, query: &FeedQuery, window: DateRange) -> Result<Vec<FeedEvent>> {
        let bounds = window.to_window();
        let limit = Duration::from_secs(self.config.request_timeout_secs);

        let events = self
            .retry
            .execute(|| with_timeout(limit, "feed fetch", self.feed.fetch_window(query, &bounds)))
            .await
            .map_err(flatten);

        match &events {
            Ok(events) => info!(count = events.len(), "fetched feed window"),
            Err(error) => warn!(%error, "feed window failed"),
        }
        events
    }

    async fn classify(&self, event: &FeedEvent, query: &FeedQuery) -> Result<IngestItem> {
        let now = self.clock.now();
        let record = match normalize(event, query, &self.config, now) {
            Ok(Normalized::Record(record)) => record,
            Ok(Normalized::Filtered { title }) => {
                debug!(%title, "feed event filtered by title");
                return Ok(IngestItem::Filtered { title });
            }
            Err(ReconError::Validation(reason)) => {
                warn!(%reason, event = %event.event_name, "skipping invalid feed event");
                return Ok(IngestItem::Invalid { reason });
            }
            Err(other) => return Err(other),
        };

        let key = record.key();
        if let Some(hit) = self.suppressions.matches(&key, &record.fields.summary, now).await? {
            debug!(key = %key, reason = hit.reason(), "feed event suppressed");
            return Ok(IngestItem::Suppressed { key, reason: hit.reason().to_string() });
        }
        Ok(IngestItem::Record(record))
    }
}
