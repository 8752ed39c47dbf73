use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::config::CalendarConfig;
use crate::google::{fetch_access_token, GoogleCredentials};
use crate::section::{CalendarEvent, EventsData, Section, SectionData};

const CALENDAR_LIST_URL: &str =
    "https://www.googleapis.com/calendar/v3/users/me/calendarList";

#[derive(Debug, Deserialize)]
struct CalendarListResponse {
    #[serde(default)]
    items: Vec<CalendarEntry>,
}

#[derive(Debug, Deserialize)]
struct CalendarEntry {
    id: String,
    summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventsResponse {
    #[serde(default)]
    items: Vec<RawEvent>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    summary: Option<String>,
    start: Option<EventTime>,
    end: Option<EventTime>,
    location: Option<String>,
    #[serde(rename = "htmlLink")]
    html_link: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct EventTime {
    #[serde(rename = "dateTime")]
    date_time: Option<String>,
    date: Option<String>,
}

impl EventTime {
    // All-day events carry a date, timed events a dateTime.
    fn as_string(&self) -> String {
        self.date_time
            .clone()
            .or_else(|| self.date.clone())
            .unwrap_or_default()
    }
}

pub struct GoogleCalendarClient {
    client: Client,
    creds: GoogleCredentials,
}

impl GoogleCalendarClient {
    pub fn new(creds: GoogleCredentials) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, creds })
    }

    /// Merge upcoming events across every calendar on the account. A single
    /// calendar failing to list is logged and skipped; the section still
    /// carries the rest.
    pub async fn build_section(&self, cfg: &CalendarConfig, now: DateTime<Utc>) -> Result<Section> {
        let token = fetch_access_token(&self.client, &self.creds).await?;

        let time_min = now.to_rfc3339();
        let time_max = (now + chrono::Duration::days(i64::from(cfg.days_ahead))).to_rfc3339();

        let calendars = self.list_calendars(&token).await?;
        let mut events: Vec<CalendarEvent> = Vec::new();

        for calendar in calendars {
            let name = calendar.summary.unwrap_or_else(|| calendar.id.clone());
            match self
                .list_events(&token, &calendar.id, &time_min, &time_max)
                .await
            {
                Ok(raw_events) => {
                    for e in raw_events {
                        events.push(CalendarEvent {
                            calendar: name.clone(),
                            summary: e.summary.unwrap_or_else(|| "(No title)".to_string()),
                            start: e.start.unwrap_or_default().as_string(),
                            end: e.end.unwrap_or_default().as_string(),
                            location: e.location,
                            html_link: e.html_link,
                        });
                    }
                }
                Err(err) => {
                    eprintln!("Warning: calendar '{}' fetch failed: {}", name, err);
                }
            }
        }

        events.sort_by(|a, b| a.start.cmp(&b.start));

        Ok(Section {
            id: "events".to_string(),
            title: format!(
                "Events (Next {} Days — All Google Calendars)",
                cfg.days_ahead
            ),
            data: SectionData::Events(EventsData {
                events,
                days_ahead: cfg.days_ahead,
            }),
        })
    }

    async fn list_calendars(&self, token: &str) -> Result<Vec<CalendarEntry>> {
        let response = self
            .client
            .get(CALENDAR_LIST_URL)
            .bearer_auth(token)
            .send()
            .await
            .context("Failed to list calendars")?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("unknown error"));
            anyhow::bail!("Calendar list failed: {} - {}", status, body);
        }

        let list = response
            .json::<CalendarListResponse>()
            .await
            .context("Failed to parse calendar list response")?;
        Ok(list.items)
    }

    async fn list_events(
        &self,
        token: &str,
        calendar_id: &str,
        time_min: &str,
        time_max: &str,
    ) -> Result<Vec<RawEvent>> {
        let url = format!(
            "https://www.googleapis.com/calendar/v3/calendars/{}/events?timeMin={}&timeMax={}&singleEvents=true&orderBy=startTime&maxResults=2500",
            urlencoding::encode(calendar_id),
            urlencoding::encode(time_min),
            urlencoding::encode(time_max),
        );

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .context("Failed to list events")?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("unknown error"));
            anyhow::bail!("Event list failed: {} - {}", status, body);
        }

        let events = response
            .json::<EventsResponse>()
            .await
            .context("Failed to parse event list response")?;
        Ok(events.items)
    }
}

/// Placeholder until the Microsoft Graph integration lands.
pub fn outlook_placeholder_section(cfg: &CalendarConfig) -> Section {
    Section {
        id: "events_outlook".to_string(),
        title: format!(
            "Events (Outlook) — Not configured yet (Next {} Days)",
            cfg.days_ahead
        ),
        data: SectionData::Events(EventsData {
            events: Vec::new(),
            days_ahead: cfg.days_ahead,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_time_prefers_date_time_over_date() {
        let timed = EventTime {
            date_time: Some("2026-08-05T09:00:00-05:00".to_string()),
            date: Some("2026-08-05".to_string()),
        };
        assert_eq!(timed.as_string(), "2026-08-05T09:00:00-05:00");

        let all_day = EventTime {
            date_time: None,
            date: Some("2026-08-05".to_string()),
        };
        assert_eq!(all_day.as_string(), "2026-08-05");

        assert_eq!(EventTime::default().as_string(), "");
    }

    #[test]
    fn parses_event_payload() {
        let body = r#"{
            "items": [
                {
                    "summary": "Standup",
                    "start": {"dateTime": "2026-08-05T09:00:00Z"},
                    "end": {"dateTime": "2026-08-05T09:15:00Z"},
                    "htmlLink": "https://calendar.google.com/event?eid=abc"
                },
                {"start": {"date": "2026-08-06"}}
            ]
        }"#;
        let parsed: EventsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.items.len(), 2);
        assert_eq!(parsed.items[0].summary.as_deref(), Some("Standup"));
        assert!(parsed.items[1].summary.is_none());
    }
}
