//! News section assembly: resolves each configured topic to a query, fetches
//! articles from the search backend under a process-wide request spacing with
//! bounded retries, and emits exactly one section per topic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

use crate::config::{NewsConfig, TopicConfig, TopicKind};
use crate::gdelt::Article;
use crate::query::compile_query;
use crate::section::{NewsData, Section, SectionData};

/// Escalating pre-attempt waits; index 0 is the first attempt with no wait.
/// The schedule length bounds the number of attempts per topic.
pub const BACKOFF_SCHEDULE_SECS: [u64; 5] = [0, 5, 5, 10, 15];

#[derive(Debug, Error)]
pub enum NewsError {
    /// Broken topic configuration (unknown watchlist, blank compiled query).
    /// Fatal to the topic, never retried.
    #[error("configuration error: {0}")]
    Config(String),

    /// Retryable response from the search endpoint (rate limit or 5xx).
    #[error("HTTP {status} from search endpoint: {body}")]
    Transient { status: u16, body: String },

    /// Socket-level failure (connect, timeout). Worth retrying.
    #[error("search request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-retryable response: unexpected status or malformed body.
    #[error("search endpoint rejected the request: {0}")]
    Fatal(String),

    #[error("retries exhausted after {attempts} attempts: {last}")]
    Exhausted { attempts: usize, last: String },
}

impl NewsError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, NewsError::Transient { .. } | NewsError::Network(_))
    }
}

/// The external search endpoint, abstracted so the retry and spacing logic
/// can be exercised against a scripted backend in tests.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(
        &self,
        query: &str,
        max_records: u32,
        start: DateTime<Utc>,
    ) -> Result<Vec<Article>, NewsError>;
}

/// Timestamp of the last outbound call to the search endpoint. One value
/// lives for the whole run and is consulted before every attempt, including
/// retries, because the endpoint's usage policy applies per process, not per
/// topic.
#[derive(Debug)]
pub struct RateLimiter {
    min_gap: Duration,
    last_call: Option<Instant>,
}

impl RateLimiter {
    pub fn new(min_gap: Duration) -> Self {
        Self {
            min_gap,
            last_call: None,
        }
    }

    /// Sleep until at least the minimum gap has passed since the previous
    /// call. Read before every send.
    pub async fn wait(&self) {
        if let Some(last) = self.last_call {
            let elapsed = last.elapsed();
            if elapsed < self.min_gap {
                tokio::time::sleep(self.min_gap - elapsed).await;
            }
        }
    }

    /// Record that a call was just made. Written after every send.
    pub fn stamp(&mut self) {
        self.last_call = Some(Instant::now());
    }
}

/// Fetches articles for one compiled query at a time, enforcing the request
/// spacing and the bounded retry schedule.
pub struct NewsFetcher<B> {
    backend: B,
    limiter: RateLimiter,
    backoff: Vec<Duration>,
}

impl<B: SearchBackend> NewsFetcher<B> {
    pub fn new(backend: B, min_gap: Duration) -> Self {
        Self {
            backend,
            limiter: RateLimiter::new(min_gap),
            backoff: BACKOFF_SCHEDULE_SECS
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect(),
        }
    }

    /// Fetch one topic's articles. Transient failures consume retry slots
    /// with the schedule's escalating waits; fatal failures short-circuit.
    /// The backoff wait and the rate limiter's gap compose: the actual
    /// spacing is at least the larger of the two.
    pub async fn fetch(
        &mut self,
        query: &str,
        max_records: u32,
        lookback_hours: u32,
    ) -> Result<Vec<Article>, NewsError> {
        let mut last_error: Option<NewsError> = None;

        for (attempt, wait) in self.backoff.iter().enumerate() {
            if attempt > 0 {
                tokio::time::sleep(*wait).await;
            }

            self.limiter.wait().await;
            let start = Utc::now() - chrono::Duration::hours(i64::from(lookback_hours));
            let result = self.backend.search(query, max_records, start).await;
            self.limiter.stamp();

            match result {
                Ok(articles) => return Ok(articles),
                Err(e) if e.is_retryable() => {
                    eprintln!("Warning: search attempt {} failed: {}", attempt + 1, e);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(NewsError::Exhausted {
            attempts: self.backoff.len(),
            last: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown error".to_string()),
        })
    }
}

/// Build one section per configured topic, in configuration order. A failed
/// topic yields an error section; it never aborts or skips the rest of the
/// batch. Between topics (not before the first), an inter-topic courtesy
/// delay applies on top of the fetcher's own pacing.
pub async fn build_news_sections<B: SearchBackend>(
    cfg: &NewsConfig,
    fetcher: &mut NewsFetcher<B>,
) -> Vec<Section> {
    let mut sections = Vec::with_capacity(cfg.topics.len());

    for (i, topic) in cfg.topics.iter().enumerate() {
        if i > 0 && cfg.defaults.throttle_seconds > 0 {
            tokio::time::sleep(Duration::from_secs(cfg.defaults.throttle_seconds)).await;
        }
        sections.push(build_topic_section(topic, cfg, fetcher).await);
    }

    sections
}

async fn build_topic_section<B: SearchBackend>(
    topic: &TopicConfig,
    cfg: &NewsConfig,
    fetcher: &mut NewsFetcher<B>,
) -> Section {
    let count = topic.count.unwrap_or(cfg.defaults.count);
    let lookback_hours = topic.lookback_hours.unwrap_or(cfg.defaults.lookback_hours);
    let id = format!("news_{}", slug(&topic.name));
    let title = format!("News — {}", topic.name);

    let query = match resolve_query(topic, cfg) {
        Ok(q) => q,
        Err(e) => {
            eprintln!("Warning: topic '{}' failed: {}", topic.name, e);
            return error_section(id, title, count, lookback_hours, String::new(), e.to_string());
        }
    };

    if query.trim().is_empty() {
        return error_section(
            id,
            title,
            count,
            lookback_hours,
            query,
            "Topic produced an empty query; add terms to its template or set a literal query."
                .to_string(),
        );
    }

    match fetcher.fetch(&query, count, lookback_hours).await {
        Ok(items) => Section {
            id,
            title,
            data: SectionData::News(NewsData {
                items,
                count,
                lookback_hours,
                query,
                error: None,
            }),
        },
        Err(e) => {
            eprintln!("Warning: topic '{}' failed: {}", topic.name, e);
            error_section(id, title, count, lookback_hours, query, e.to_string())
        }
    }
}

fn resolve_query(topic: &TopicConfig, cfg: &NewsConfig) -> Result<String, NewsError> {
    match topic.kind {
        TopicKind::Plain => Ok(topic.query.clone().unwrap_or_default()),
        TopicKind::Templated => compile_query(
            &topic.template,
            &cfg.watchlists,
            cfg.defaults.global_and.as_deref(),
            &cfg.defaults.exclude_domains,
        ),
    }
}

fn error_section(
    id: String,
    title: String,
    count: u32,
    lookback_hours: u32,
    query: String,
    error: String,
) -> Section {
    Section {
        id,
        title,
        data: SectionData::News(NewsData {
            items: Vec::new(),
            count,
            lookback_hours,
            query,
            error: Some(error),
        }),
    }
}

fn slug(name: &str) -> String {
    name.to_lowercase().replace([' ', '/'], "_")
}
