use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;

use crate::config::WeatherConfig;
use crate::section::{DayForecast, Section, SectionData, WeatherCard, WeatherData};

const GEOCODE_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
const REVERSE_GEOCODE_URL: &str = "https://geocoding-api.open-meteo.com/v1/reverse";
const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

#[derive(Debug, Deserialize)]
struct GeoResponse {
    #[serde(default)]
    results: Vec<GeoResult>,
}

#[derive(Debug, Deserialize)]
struct GeoResult {
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    admin1: String,
    #[serde(default)]
    country: String,
}

impl GeoResult {
    fn place_name(&self) -> String {
        join_place_parts(&[&self.name, &self.admin1, &self.country])
    }
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    daily: DailyBlock,
}

#[derive(Debug, Deserialize, Default)]
struct DailyBlock {
    #[serde(default)]
    time: Vec<String>,
    #[serde(default)]
    temperature_2m_max: Vec<f64>,
    #[serde(default)]
    temperature_2m_min: Vec<f64>,
    #[serde(default)]
    precipitation_probability_max: Vec<Option<f64>>,
}

pub struct WeatherClient {
    client: Client,
}

impl WeatherClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Build the weather section: one card per configured zip. A zip that
    /// fails to geocode or fetch keeps an error card; only a missing config
    /// block downgrades the whole section.
    pub async fn build_section(&self, cfg: &WeatherConfig) -> Section {
        if cfg.zips.is_empty() {
            return Section::error(
                "weather_error",
                "Weather (Error)",
                "Missing config: weather.zips (add a top-level [weather] block with zips)",
            );
        }

        let mut cards = Vec::with_capacity(cfg.zips.len());
        for zip in &cfg.zips {
            match self.build_card(zip, cfg.forecast_days).await {
                Ok(card) => cards.push(card),
                Err(e) => {
                    eprintln!("Warning: weather for zip {} failed: {}", zip, e);
                    cards.push(WeatherCard {
                        zip: zip.clone(),
                        place: String::new(),
                        table: Vec::new(),
                        alerts: Vec::new(),
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        Section {
            id: "weather".to_string(),
            title: "Weather".to_string(),
            data: SectionData::Weather(WeatherData { cards }),
        }
    }

    async fn build_card(&self, zip: &str, days: u32) -> Result<WeatherCard> {
        let geo = self.geocode_zip(zip).await?;

        let mut place = geo.place_name();
        if place.is_empty() {
            place = self.reverse_place_name(geo.latitude, geo.longitude).await;
        }

        let forecast = self
            .fetch_forecast(geo.latitude, geo.longitude, days)
            .await?;

        Ok(WeatherCard {
            zip: zip.to_string(),
            place,
            table: daily_table(&forecast.daily),
            // The forecast provider doesn't expose alerts in all regions.
            alerts: Vec::new(),
            error: None,
        })
    }

    async fn geocode_zip(&self, zip: &str) -> Result<GeoResult> {
        let url = format!(
            "{}?name={}&count=1&language=en&format=json",
            GEOCODE_URL,
            urlencoding::encode(zip)
        );
        let response: GeoResponse = self.get_json(&url).await?;
        response
            .results
            .into_iter()
            .next()
            .with_context(|| format!("Unable to geocode zip {}", zip))
    }

    /// Best-effort reverse geocode; an empty string on any failure.
    async fn reverse_place_name(&self, lat: f64, lon: f64) -> String {
        let url = format!(
            "{}?latitude={}&longitude={}&language=en",
            REVERSE_GEOCODE_URL, lat, lon
        );
        match self.get_json::<GeoResponse>(&url).await {
            Ok(response) => response
                .results
                .first()
                .map(GeoResult::place_name)
                .unwrap_or_default(),
            Err(_) => String::new(),
        }
    }

    async fn fetch_forecast(&self, lat: f64, lon: f64, days: u32) -> Result<ForecastResponse> {
        let url = format!(
            "{}?latitude={}&longitude={}&daily=temperature_2m_max,temperature_2m_min,precipitation_probability_max&forecast_days={}&timezone=auto",
            FORECAST_URL, lat, lon, days
        );
        self.get_json(&url).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send weather request")?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("unknown error"));
            anyhow::bail!("Weather API returned error: {} - {}", status, body);
        }

        response
            .json::<T>()
            .await
            .context("Failed to parse weather API response")
    }
}

/// Zip the parallel daily arrays into rows, stopping at the shortest.
fn daily_table(daily: &DailyBlock) -> Vec<DayForecast> {
    let len = daily
        .time
        .len()
        .min(daily.temperature_2m_max.len())
        .min(daily.temperature_2m_min.len())
        .min(daily.precipitation_probability_max.len());

    (0..len)
        .map(|i| DayForecast {
            date: daily.time[i].clone(),
            high: daily.temperature_2m_max[i],
            low: daily.temperature_2m_min[i],
            rain_chance: daily.precipitation_probability_max[i],
        })
        .collect()
}

fn join_place_parts(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn place_name_skips_empty_parts() {
        assert_eq!(join_place_parts(&["Austin", "", "United States"]), "Austin, United States");
        assert_eq!(join_place_parts(&["", "", ""]), "");
    }

    #[test]
    fn daily_table_stops_at_shortest_array() {
        let daily = DailyBlock {
            time: vec!["2026-08-05".to_string(), "2026-08-06".to_string()],
            temperature_2m_max: vec![31.2, 29.8],
            temperature_2m_min: vec![21.0],
            precipitation_probability_max: vec![Some(40.0), None],
        };
        let table = daily_table(&daily);
        assert_eq!(table.len(), 1);
        assert_eq!(table[0].date, "2026-08-05");
        assert_eq!(table[0].rain_chance, Some(40.0));
    }

    #[test]
    fn forecast_parses_with_missing_daily_block() {
        let parsed: ForecastResponse = serde_json::from_str("{}").unwrap();
        assert!(daily_table(&parsed.daily).is_empty());
    }
}
