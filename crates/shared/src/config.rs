use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

static ENV_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Z0-9_]+)\}").expect("env placeholder pattern is valid")
});

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_send_time")]
    pub send_time_local: String,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub inbox_summary: InboxConfig,
    #[serde(default)]
    pub news: NewsConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct EmailConfig {
    #[serde(default)]
    pub to: Vec<String>,
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_site_dir")]
    pub site_dir: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WeatherConfig {
    #[serde(default)]
    pub zips: Vec<String>,
    #[serde(default = "default_forecast_days")]
    pub forecast_days: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalendarConfig {
    #[serde(default = "default_calendar_provider")]
    pub provider: String,
    #[serde(default = "default_days_ahead")]
    pub days_ahead: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InboxConfig {
    #[serde(default = "default_inbox_provider")]
    pub provider: String,
    #[serde(default = "default_inbox_max_items")]
    pub max_items: u32,
    #[serde(default)]
    pub needs_response_phrases: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct NewsConfig {
    #[serde(default)]
    pub defaults: NewsDefaults,
    #[serde(default)]
    pub watchlists: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub topics: Vec<TopicConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewsDefaults {
    #[serde(default = "default_news_count")]
    pub count: u32,
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: u32,
    #[serde(default)]
    pub global_and: Option<String>,
    #[serde(default)]
    pub exclude_domains: Vec<String>,
    #[serde(default = "default_throttle_seconds")]
    pub throttle_seconds: u64,
    #[serde(default = "default_min_gap_seconds")]
    pub min_gap_seconds: u64,
}

/// One configured news topic. Exactly one output section is produced per
/// topic, whether its fetch succeeds or not.
#[derive(Debug, Clone, Deserialize)]
pub struct TopicConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TopicKind,
    pub count: Option<u32>,
    pub lookback_hours: Option<u32>,
    /// Literal query string, used by `plain` topics.
    pub query: Option<String>,
    #[serde(default)]
    pub template: TopicTemplate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicKind {
    Plain,
    Templated,
}

/// Declarative query template for `templated` topics. Either list (or both)
/// may be empty; an entirely empty template compiles to an empty query.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TopicTemplate {
    #[serde(default)]
    pub or: Vec<String>,
    #[serde(default)]
    pub and: Vec<String>,
}

impl Config {
    /// Load TOML config from disk, substituting `${ENV_VAR}` placeholders in
    /// every string value before deserializing into typed structs.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut value: toml::Value = raw
            .parse()
            .with_context(|| format!("Failed to parse TOML in {}", path.display()))?;
        resolve_env_vars(&mut value)?;
        let config = value
            .try_into()
            .with_context(|| format!("Invalid config structure in {}", path.display()))?;
        Ok(config)
    }
}

/// Recursively replace `${ENV_VAR}` placeholders with environment variables.
/// A placeholder naming an unset variable is a hard error.
fn resolve_env_vars(value: &mut toml::Value) -> Result<()> {
    match value {
        toml::Value::String(s) => {
            *s = interpolate(s)?;
        }
        toml::Value::Array(items) => {
            for item in items {
                resolve_env_vars(item)?;
            }
        }
        toml::Value::Table(table) => {
            for (_, item) in table.iter_mut() {
                resolve_env_vars(item)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn interpolate(s: &str) -> Result<String> {
    let mut out = String::with_capacity(s.len());
    let mut last = 0;
    for caps in ENV_PATTERN.captures_iter(s) {
        let Some(m) = caps.get(0) else { continue };
        let key = &caps[1];
        let val = env::var(key)
            .with_context(|| format!("Missing required environment variable: {}", key))?;
        out.push_str(&s[last..m.start()]);
        out.push_str(&val);
        last = m.end();
    }
    out.push_str(&s[last..]);
    Ok(out)
}

/// Load a `.env` file if one exists. Tries locations in order of preference;
/// it's fine if none is found, since secrets may be set system-wide.
pub fn load_dotenv() {
    // 1. Current directory (for development)
    if dotenvy::dotenv().is_ok() {
        return;
    }

    // 2. ~/.config/daily-digest/.env (standard config location)
    if let Some(config_dir) = dirs::config_dir() {
        let config_path = config_dir.join("daily-digest").join(".env");
        if config_path.exists() && dotenvy::from_path(&config_path).is_ok() {
            return;
        }
    }

    // 3. ~/.env (home directory)
    if let Some(home_dir) = dirs::home_dir() {
        let home_path = home_dir.join(".env");
        if home_path.exists() {
            let _ = dotenvy::from_path(&home_path);
        }
    }
}

fn default_send_time() -> String {
    "08:00".to_string()
}

fn default_subject_prefix() -> String {
    "Daily Digest".to_string()
}

fn default_true() -> bool {
    true
}

fn default_site_dir() -> String {
    "docs".to_string()
}

fn default_forecast_days() -> u32 {
    7
}

fn default_calendar_provider() -> String {
    "google".to_string()
}

fn default_days_ahead() -> u32 {
    21
}

fn default_inbox_provider() -> String {
    "gmail".to_string()
}

fn default_inbox_max_items() -> u32 {
    100
}

fn default_news_count() -> u32 {
    10
}

fn default_lookback_hours() -> u32 {
    24
}

fn default_throttle_seconds() -> u64 {
    2
}

fn default_min_gap_seconds() -> u64 {
    5
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            site_dir: default_site_dir(),
        }
    }
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            provider: default_calendar_provider(),
            days_ahead: default_days_ahead(),
        }
    }
}

impl Default for InboxConfig {
    fn default() -> Self {
        Self {
            provider: default_inbox_provider(),
            max_items: default_inbox_max_items(),
            needs_response_phrases: Vec::new(),
        }
    }
}

impl Default for NewsDefaults {
    fn default() -> Self {
        Self {
            count: default_news_count(),
            lookback_hours: default_lookback_hours(),
            global_and: None,
            exclude_domains: Vec::new(),
            throttle_seconds: default_throttle_seconds(),
            min_gap_seconds: default_min_gap_seconds(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolate_replaces_placeholders() {
        env::set_var("DIGEST_TEST_TOKEN", "s3cret");
        let out = interpolate("Bearer ${DIGEST_TEST_TOKEN} end").unwrap();
        assert_eq!(out, "Bearer s3cret end");
    }

    #[test]
    fn interpolate_errors_on_missing_variable() {
        env::remove_var("DIGEST_TEST_MISSING");
        let err = interpolate("${DIGEST_TEST_MISSING}").unwrap_err();
        assert!(err.to_string().contains("DIGEST_TEST_MISSING"));
    }

    #[test]
    fn interpolate_leaves_plain_strings_alone() {
        assert_eq!(interpolate("no placeholders here").unwrap(), "no placeholders here");
    }

    #[test]
    fn parse_full_config_with_defaults() {
        let raw = r#"
            send_time_local = "07:30"

            [email]
            to = ["me@example.com"]

            [news.defaults]
            count = 5
            exclude_domains = ["example.org"]

            [news.watchlists]
            competitors = ["Acme", "Beta Corp"]

            [[news.topics]]
            name = "US (Top)"
            type = "plain"
            query = "top stories"

            [[news.topics]]
            name = "Industry"
            type = "templated"
            lookback_hours = 48
            [news.topics.template]
            and = ["{{watchlist:competitors}}"]
        "#;
        let config: Config = toml::from_str(raw).unwrap();

        assert_eq!(config.send_time_local, "07:30");
        assert_eq!(config.email.subject_prefix, "Daily Digest");
        assert!(config.archive.enabled);
        assert_eq!(config.news.defaults.count, 5);
        assert_eq!(config.news.defaults.lookback_hours, 24);
        assert_eq!(config.news.defaults.min_gap_seconds, 5);
        assert_eq!(config.news.watchlists["competitors"].len(), 2);

        assert_eq!(config.news.topics.len(), 2);
        assert_eq!(config.news.topics[0].kind, TopicKind::Plain);
        assert_eq!(config.news.topics[0].query.as_deref(), Some("top stories"));
        assert_eq!(config.news.topics[1].kind, TopicKind::Templated);
        assert_eq!(config.news.topics[1].lookback_hours, Some(48));
        assert_eq!(config.news.topics[1].template.and.len(), 1);
    }

    #[test]
    fn topic_kind_rejects_unknown_values() {
        let raw = r#"
            [[news.topics]]
            name = "Bad"
            type = "rss"
        "#;
        assert!(toml::from_str::<Config>(raw).is_err());
    }
}
