//! HTTP adapter for the external schedule feed.
//!
//! The feed answers `GET <base_url>?start_dt=YYYY-MM-DD&end_dt=YYYY-MM-DD&...`
//! with `{"reservations":{"reservation":[...]}}`. Text fields arrive either as
//! plain strings or as `{"value": ..}` / `{"nil": true}` objects, and a
//! single reservation is sometimes sent as an object instead of an array.

use std::time::Duration;

use async_trait::async_trait;
use calrecon_core::ports::FeedSource;
use calrecon_domain::{FeedConfig, FeedEvent, FeedQuery, ReconError, Result, TimeWindow};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use reqwest::{Client, Url};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::http::ensure_success;
use crate::errors::InfraError;

/// Room lists longer than this are summarised as "first (+ n other locations)"
const MAX_LISTED_ROOMS: usize = 3;

/// `FeedSource` over the schedule feed's JSON calendar endpoint
pub struct HttpFeedSource {
    client: Client,
    base_url: Url,
}

impl HttpFeedSource {
    pub fn new(config: &FeedConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            ReconError::Config(format!("invalid feed.base_url '{}': {e}", config.base_url))
        })?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(InfraError::from)?;
        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    #[instrument(skip(self, query), fields(query = %query.name))]
    async fn fetch_window(&self, query: &FeedQuery, window: &TimeWindow) -> Result<Vec<FeedEvent>> {
        let first_day = window.start.date_naive();
        // Window end is exclusive, the feed's end_dt is inclusive.
        let last_day = (window.end - chrono::Duration::milliseconds(1)).date_naive().max(first_day);

        let mut params = vec![
            ("start_dt".to_string(), first_day.format("%Y-%m-%d").to_string()),
            ("end_dt".to_string(), last_day.format("%Y-%m-%d").to_string()),
        ];
        params.extend(descriptor_params(&query.descriptor));

        let response = self
            .client
            .get(self.base_url.clone())
            .query(&params)
            .send()
            .await
            .map_err(InfraError::from)?;
        let payload: Value =
            ensure_success(response).await?.json().await.map_err(InfraError::from)?;

        let events: Vec<FeedEvent> = reservations(&payload).filter_map(to_feed_event).collect();
        debug!(count = events.len(), "parsed feed reservations");
        Ok(events)
    }
}

/// `a=1&b=2` pairs from a query descriptor; segments without `=` are dropped.
fn descriptor_params(descriptor: &str) -> Vec<(String, String)> {
    descriptor
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .filter(|(key, _)| !key.trim().is_empty())
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect()
}

fn reservations(payload: &Value) -> impl Iterator<Item = &Value> {
    let items: Vec<&Value> = match payload.pointer("/reservations/reservation") {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(item @ Value::Object(_)) => vec![item],
        _ => Vec::new(),
    };
    items.into_iter()
}

fn to_feed_event(item: &Value) -> Option<FeedEvent> {
    if !item.is_object() {
        warn!("skipping non-object reservation");
        return None;
    }
    let event_name = text(item.get("event_name")).unwrap_or_default();
    let Some((start, all_day)) = text(item.get("event_start_dt")).as_deref().and_then(instant)
    else {
        warn!(event = %event_name, "skipping reservation without a usable start");
        return None;
    };
    let end = text(item.get("event_end_dt"))
        .as_deref()
        .and_then(instant)
        .map_or(start, |(end, _)| end);

    Some(FeedEvent {
        reservation_id: text(item.get("reservation_id")),
        event_id: text(item.get("event_id")),
        profile_name: text(item.get("profile_name")),
        event_title: text(item.get("event_title")).unwrap_or_default(),
        event_name,
        organization: text(item.get("organization_name")),
        locator: text(item.get("event_locator")),
        location: location(item.get("space_reservation")),
        start,
        end,
        all_day,
    })
}

/// Flatten a feed text value; `nil` markers and blanks become `None`.
fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => {
            if map.get("nil").and_then(Value::as_bool).unwrap_or(false) {
                return None;
            }
            text(map.get("value").or_else(|| map.get("text")))
        }
        _ => None,
    }
}

fn location(value: Option<&Value>) -> String {
    match value {
        Some(Value::Array(rooms)) => {
            let names: Vec<String> = rooms.iter().filter_map(room_name).collect();
            match names.as_slice() {
                [] => String::new(),
                [first, rest @ ..] if names.len() > MAX_LISTED_ROOMS => {
                    format!("{first} (+ {} other locations)", rest.len())
                }
                _ => names.join(", "),
            }
        }
        Some(room) => room_name(room).unwrap_or_default(),
        None => String::new(),
    }
}

fn room_name(room: &Value) -> Option<String> {
    if let Value::String(s) = room {
        return Some(s.trim().to_string()).filter(|s| !s.is_empty());
    }
    let building = text(room.get("building_name"));
    let space = text(room.get("space_name")).or_else(|| text(room.get("formal_name")));
    match (building, space) {
        (Some(building), Some(space)) => {
            let prefix = building.split_whitespace().next().unwrap_or_default();
            if space.contains(prefix) {
                Some(space)
            } else {
                Some(format!("{building} {space}"))
            }
        }
        (building, space) => space.or(building),
    }
}

/// Parse a feed timestamp; a bare date means an all-day event.
fn instant(raw: &str) -> Option<(DateTime<Utc>, bool)> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some((at.with_timezone(&Utc), false));
    }
    if let Ok(at) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some((at.and_utc(), false));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|day| (day.and_time(chrono::NaiveTime::MIN).and_utc(), true))
}
