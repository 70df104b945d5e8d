//! Google Calendar v3 adapter for the `CalendarService` port.
//!
//! A target location is the calendar id. Listings expand recurring series
//! (`singleEvents=true`), include cancelled instances and follow
//! `nextPageToken` until exhausted. System markers live in
//! `extendedProperties.private`.

use std::time::Duration;

use async_trait::async_trait;
use calrecon_core::ports::CalendarService;
use calrecon_domain::{
    Attributes, CalendarConfig, EventDraft, EventFields, LiveEvent, ReconError, Result,
    TimeWindow,
};
use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Utc};
use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::http::ensure_success;
use crate::errors::InfraError;

const PAGE_SIZE: &str = "250";

/// `CalendarService` over the Google Calendar REST API
pub struct GoogleCalendarService {
    client: Client,
    api_base: Url,
    access_token: Option<String>,
}

impl GoogleCalendarService {
    pub fn new(config: &CalendarConfig) -> Result<Self> {
        let api_base = Url::parse(&config.api_base).map_err(|e| {
            ReconError::Config(format!("invalid calendar.api_base '{}': {e}", config.api_base))
        })?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(InfraError::from)?;
        Ok(Self { client, api_base, access_token: config.access_token.clone() })
    }

    /// `<api_base>/calendars/<calendar>/events[/<event>]` with each segment
    /// percent-encoded.
    fn events_url(&self, calendar: &str, event: Option<&str>) -> Result<Url> {
        let mut url = self.api_base.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                ReconError::Config(format!("calendar.api_base cannot be a base: {}", self.api_base))
            })?;
            segments.pop_if_empty().extend(["calendars", calendar, "events"]);
            if let Some(event) = event {
                segments.push(event);
            }
        }
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl CalendarService for GoogleCalendarService {
    #[instrument(skip(self), fields(calendar = target_location))]
    async fn list(&self, target_location: &str, window: &TimeWindow) -> Result<Vec<LiveEvent>> {
        let url = self.events_url(target_location, None)?;
        let time_min = window.start.to_rfc3339_opts(SecondsFormat::Secs, true);
        let time_max = window.end.to_rfc3339_opts(SecondsFormat::Secs, true);

        let mut events = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut query = vec![
                ("singleEvents", "true"),
                ("showDeleted", "true"),
                ("orderBy", "startTime"),
                ("maxResults", PAGE_SIZE),
                ("timeMin", time_min.as_str()),
                ("timeMax", time_max.as_str()),
            ];
            if let Some(token) = page_token.as_deref() {
                query.push(("pageToken", token));
            }

            let request = self.authorized(self.client.get(url.clone()).query(&query));
            let response = request.send().await.map_err(InfraError::from)?;
            let page: EventsPage =
                ensure_success(response).await?.json().await.map_err(InfraError::from)?;

            events.extend(page.items.into_iter().filter_map(GoogleEvent::into_live));
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!(count = events.len(), "listed calendar events");
        Ok(events)
    }

    #[instrument(skip(self, draft), fields(calendar = target_location))]
    async fn create(&self, target_location: &str, draft: &EventDraft) -> Result<String> {
        let url = self.events_url(target_location, None)?;
        let request = self.authorized(self.client.post(url).json(&EventBody::from(draft)));
        let response = request.send().await.map_err(InfraError::from)?;
        let created: CreatedEvent =
            ensure_success(response).await?.json().await.map_err(InfraError::from)?;
        Ok(created.id)
    }

    #[instrument(skip(self, draft), fields(calendar = target_location))]
    async fn update(
        &self,
        target_location: &str,
        external_ref: &str,
        draft: &EventDraft,
    ) -> Result<()> {
        let url = self.events_url(target_location, Some(external_ref))?;
        let request = self.authorized(self.client.patch(url).json(&EventBody::from(draft)));
        let response = request.send().await.map_err(InfraError::from)?;
        ensure_success(response).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(calendar = target_location))]
    async fn delete(&self, target_location: &str, external_ref: &str) -> Result<()> {
        let url = self.events_url(target_location, Some(external_ref))?;
        let response =
            self.authorized(self.client.delete(url)).send().await.map_err(InfraError::from)?;
        ensure_success(response).await?;
        Ok(())
    }
}

/* -------------------------------------------------------------------------- */
/* Wire types */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventsPage {
    #[serde(default)]
    items: Vec<GoogleEvent>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedEvent {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct GoogleEvent {
    id: String,
    status: Option<String>,
    #[serde(rename = "iCalUID")]
    ical_uid: Option<String>,
    summary: Option<String>,
    location: Option<String>,
    description: Option<String>,
    start: Option<EventTime>,
    end: Option<EventTime>,
    original_start_time: Option<EventTime>,
    recurring_event_id: Option<String>,
    organizer: Option<Person>,
    attendees: Vec<Person>,
    extended_properties: Option<ExtendedProperties>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventTime {
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date_time: Option<DateTime<Utc>>,
}

impl EventTime {
    fn instant(&self) -> Option<(DateTime<Utc>, bool)> {
        match (self.date_time, self.date) {
            (Some(at), _) => Some((at, false)),
            (None, Some(day)) => Some((day.and_time(NaiveTime::MIN).and_utc(), true)),
            (None, None) => None,
        }
    }

    fn at(at: DateTime<Utc>, all_day: bool) -> Self {
        if all_day {
            Self { date: Some(at.date_naive()), date_time: None }
        } else {
            Self { date: None, date_time: Some(at) }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Person {
    #[serde(rename = "self")]
    is_self: bool,
    response_status: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct ExtendedProperties {
    private: Attributes,
}

impl GoogleEvent {
    fn into_live(self) -> Option<LiveEvent> {
        let cancelled = self.status.as_deref() == Some("cancelled");
        let instance_start = self.original_start_time.as_ref().and_then(EventTime::instant);
        // Cancelled instances often carry only their original start.
        let scheduled = self.start.as_ref().and_then(EventTime::instant);
        let Some((start, all_day)) = scheduled.or(instance_start) else {
            debug!(id = %self.id, "skipping event without a start");
            return None;
        };
        let end = self.end.as_ref().and_then(EventTime::instant).map_or(start, |(end, _)| end);
        let declined = self
            .attendees
            .iter()
            .any(|a| a.is_self && a.response_status.as_deref() == Some("declined"));

        Some(LiveEvent {
            external_ref: self.id,
            uid: self.ical_uid,
            instance_start: instance_start.map(|(at, _)| at),
            recurrence: self.recurring_event_id,
            fields: EventFields {
                summary: self.summary.unwrap_or_default(),
                location: self.location.unwrap_or_default(),
                description: self.description.unwrap_or_default(),
                start,
                end: end.max(start),
                all_day,
            },
            private_properties: self.extended_properties.map(|p| p.private).unwrap_or_default(),
            declined,
            cancelled,
            organizer_self: self.organizer.is_some_and(|o| o.is_self),
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventBody<'a> {
    summary: &'a str,
    location: &'a str,
    description: &'a str,
    start: EventTime,
    end: EventTime,
    extended_properties: ExtendedProperties,
}

impl<'a> From<&'a EventDraft> for EventBody<'a> {
    fn from(draft: &'a EventDraft) -> Self {
        let fields = &draft.fields;
        // All-day end dates are exclusive and must follow the start date.
        let end = if fields.all_day && fields.end.date_naive() <= fields.start.date_naive() {
            fields.start + chrono::Duration::days(1)
        } else {
            fields.end
        };
        Self {
            summary: &fields.summary,
            location: &fields.location,
            description: &fields.description,
            start: EventTime::at(fields.start, fields.all_day),
            end: EventTime::at(end, fields.all_day),
            extended_properties: ExtendedProperties { private: draft.private_properties.clone() },
        }
    }
}
