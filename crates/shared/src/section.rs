use serde::{Deserialize, Serialize};

use crate::gdelt::Article;

/// One renderable unit of the digest. Every builder yields at least one
/// Section, substituting an error payload when its data source fails, so the
/// digest always carries a card per configured component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub title: String,
    #[serde(flatten)]
    pub data: SectionData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum SectionData {
    Weather(WeatherData),
    News(NewsData),
    Events(EventsData),
    Inbox(InboxData),
    Error { error: String },
}

impl Section {
    pub fn error(
        id: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            data: SectionData::Error {
                error: message.into(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherData {
    pub cards: Vec<WeatherCard>,
}

/// Forecast for one configured zip code. A failed lookup keeps its card with
/// an error message so the remaining zips still render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherCard {
    pub zip: String,
    pub place: String,
    pub table: Vec<DayForecast>,
    pub alerts: Vec<WeatherAlert>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayForecast {
    pub date: String,
    pub high: f64,
    pub low: f64,
    pub rain_chance: Option<f64>,
}

// Not every forecast provider exposes alerts; the renderer only shows the
// table when at least one is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherAlert {
    pub event: String,
    pub severity: String,
    pub headline: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsData {
    pub items: Vec<Article>,
    pub count: u32,
    pub lookback_hours: u32,
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsData {
    pub events: Vec<CalendarEvent>,
    pub days_ahead: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub calendar: String,
    pub summary: String,
    pub start: String,
    pub end: String,
    pub location: Option<String>,
    pub html_link: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxData {
    pub needs_response: Vec<InboxMessage>,
    pub items: Vec<InboxMessage>,
    pub query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxMessage {
    pub date: String,
    pub from: String,
    pub subject: String,
    pub snippet: String,
}
