use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::news::{NewsError, SearchBackend};

const DOC_ENDPOINT: &str = "https://api.gdeltproject.org/api/v2/doc/doc";

// Statuses worth retrying: rate limiting and transient server-side failures.
const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

const ERROR_BODY_LIMIT: usize = 200;

/// One article as projected for the digest. Fields the endpoint omits
/// default to empty strings rather than failing the whole response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub seendate: String,
}

#[derive(Debug, Deserialize)]
struct DocResponse {
    #[serde(default)]
    articles: Vec<Article>,
}

/// Client for the GDELT DOC 2.0 article-list endpoint.
pub struct GdeltClient {
    client: Client,
}

impl GdeltClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("daily-digest/0.1")
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    async fn search_articles(
        &self,
        query: &str,
        max_records: u32,
        start: DateTime<Utc>,
    ) -> Result<Vec<Article>, NewsError> {
        let url = format!(
            "{}?query={}&mode=artlist&format=json&maxrecords={}&startdatetime={}&sort=hybridrel",
            DOC_ENDPOINT,
            urlencoding::encode(query),
            max_records,
            start.format("%Y%m%d%H%M%S"),
        );

        let response = self.client.get(&url).send().await?;
        let status = response.status();

        if RETRYABLE_STATUSES.contains(&status.as_u16()) {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("unknown error"));
            return Err(NewsError::Transient {
                status: status.as_u16(),
                body: truncate_body(&body, ERROR_BODY_LIMIT),
            });
        }

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("unknown error"));
            return Err(NewsError::Fatal(format!(
                "HTTP {}: {}",
                status,
                truncate_body(&body, ERROR_BODY_LIMIT)
            )));
        }

        let body = response.text().await?;
        let parsed: DocResponse = serde_json::from_str(&body)
            .map_err(|e| NewsError::Fatal(format!("unexpected response body: {}", e)))?;

        let mut articles = parsed.articles;
        articles.truncate(max_records as usize);
        fill_missing_domains(&mut articles);
        Ok(articles)
    }
}

#[async_trait]
impl SearchBackend for GdeltClient {
    async fn search(
        &self,
        query: &str,
        max_records: u32,
        start: DateTime<Utc>,
    ) -> Result<Vec<Article>, NewsError> {
        self.search_articles(query, max_records, start).await
    }
}

/// Fall back to the article URL's host when the endpoint omits the domain.
fn fill_missing_domains(articles: &mut [Article]) {
    for article in articles {
        if article.domain.is_empty() {
            article.domain = Url::parse(&article.url)
                .ok()
                .and_then(|u| u.host_str().map(str::to_string))
                .unwrap_or_default();
        }
    }
}

/// Truncate to at most `max` bytes, respecting UTF-8 boundaries.
fn truncate_body(body: &str, max: usize) -> String {
    if body.len() <= max {
        return body.to_string();
    }
    let mut end = max;
    while end > 0 && !body.is_char_boundary(end) {
        end -= 1;
    }
    body[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_articles_with_missing_fields() {
        let body = r#"{
            "articles": [
                {"title": "First", "url": "https://example.com/a", "domain": "example.com", "seendate": "20260804T120000Z"},
                {"url": "https://other.net/path"}
            ]
        }"#;
        let parsed: DocResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.articles.len(), 2);
        assert_eq!(parsed.articles[0].title, "First");
        assert_eq!(parsed.articles[1].title, "");
        assert_eq!(parsed.articles[1].seendate, "");
    }

    #[test]
    fn parses_empty_response() {
        let parsed: DocResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.articles.is_empty());
    }

    #[test]
    fn fills_domain_from_url_when_missing() {
        let mut articles = vec![Article {
            title: String::new(),
            domain: String::new(),
            url: "https://news.example.org/story/42".to_string(),
            seendate: String::new(),
        }];
        fill_missing_domains(&mut articles);
        assert_eq!(articles[0].domain, "news.example.org");
    }

    #[test]
    fn keeps_unparseable_urls_domainless() {
        let mut articles = vec![Article {
            title: String::new(),
            domain: String::new(),
            url: "not a url".to_string(),
            seendate: String::new(),
        }];
        fill_missing_domains(&mut articles);
        assert_eq!(articles[0].domain, "");
    }

    #[test]
    fn truncates_on_char_boundary() {
        let body = "héllo wörld";
        let out = truncate_body(body, 2);
        assert!(body.starts_with(&out));
        assert!(out.len() <= 2);
    }

    #[test]
    fn short_bodies_pass_through() {
        assert_eq!(truncate_body("ok", 200), "ok");
    }
}
