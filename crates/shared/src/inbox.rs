use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;

use crate::config::InboxConfig;
use crate::google::{fetch_access_token, GoogleCredentials};
use crate::section::{InboxData, InboxMessage, Section, SectionData};

// Inbox only, last 48h.
const GMAIL_QUERY: &str = "in:inbox newer_than:2d";

const MESSAGES_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me/messages";

#[derive(Debug, Deserialize)]
struct MessageListResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MessageDetail {
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    payload: MessagePayload,
}

#[derive(Debug, Deserialize, Default)]
struct MessagePayload {
    #[serde(default)]
    headers: Vec<Header>,
}

#[derive(Debug, Deserialize)]
struct Header {
    #[serde(default)]
    name: String,
    #[serde(default)]
    value: String,
}

pub struct GmailClient {
    client: Client,
    creds: GoogleCredentials,
}

impl GmailClient {
    pub fn new(creds: GoogleCredentials) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, creds })
    }

    /// Summarize the recent inbox: every message from the last two days plus
    /// a "needs response" subset picked out by a question heuristic.
    pub async fn build_section(&self, cfg: &InboxConfig) -> Result<Section> {
        let token = fetch_access_token(&self.client, &self.creds).await?;
        let refs = self.list_message_refs(&token, cfg.max_items).await?;

        let mut items = Vec::with_capacity(refs.len());
        for msg_ref in &refs {
            match self.fetch_message(&token, &msg_ref.id).await {
                Ok(message) => items.push(message),
                Err(e) => {
                    eprintln!("Warning: could not load message {}: {}", msg_ref.id, e);
                }
            }
        }

        let needs_response: Vec<InboxMessage> = items
            .iter()
            .filter(|m| {
                has_question(&m.subject, &cfg.needs_response_phrases)
                    || has_question(&m.snippet, &cfg.needs_response_phrases)
            })
            .cloned()
            .collect();

        Ok(Section {
            id: "inbox".to_string(),
            title: "Inbox Summary (Gmail)".to_string(),
            data: SectionData::Inbox(InboxData {
                needs_response,
                items,
                query: GMAIL_QUERY.to_string(),
            }),
        })
    }

    async fn list_message_refs(&self, token: &str, max_items: u32) -> Result<Vec<MessageRef>> {
        let url = format!(
            "{}?q={}&maxResults={}",
            MESSAGES_URL,
            urlencoding::encode(GMAIL_QUERY),
            max_items
        );

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .context("Failed to list inbox messages")?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("unknown error"));
            anyhow::bail!("Message list failed: {} - {}", status, body);
        }

        let list = response
            .json::<MessageListResponse>()
            .await
            .context("Failed to parse message list response")?;
        Ok(list.messages)
    }

    async fn fetch_message(&self, token: &str, id: &str) -> Result<InboxMessage> {
        let url = format!(
            "{}/{}?format=metadata&metadataHeaders=From&metadataHeaders=Subject&metadataHeaders=Date",
            MESSAGES_URL, id
        );

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .context("Failed to fetch message metadata")?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("unknown error"));
            anyhow::bail!("Message fetch failed: {} - {}", status, body);
        }

        let detail = response
            .json::<MessageDetail>()
            .await
            .context("Failed to parse message metadata")?;

        Ok(InboxMessage {
            date: header_value(&detail.payload.headers, "Date"),
            from: header_value(&detail.payload.headers, "From"),
            subject: header_value(&detail.payload.headers, "Subject"),
            snippet: detail.snippet,
        })
    }
}

fn header_value(headers: &[Header], name: &str) -> String {
    let target = name.to_lowercase();
    headers
        .iter()
        .find(|h| h.name.to_lowercase() == target)
        .map(|h| h.value.clone())
        .unwrap_or_default()
}

/// A message "needs a response" if it asks a question outright or contains
/// one of the configured trigger phrases.
fn has_question(text: &str, extra_phrases: &[String]) -> bool {
    if text.contains('?') {
        return true;
    }
    let lowered = text.to_lowercase();
    extra_phrases
        .iter()
        .filter(|p| !p.is_empty())
        .any(|p| lowered.contains(&p.to_lowercase()))
}

/// Placeholder until the Microsoft Graph integration lands.
pub fn outlook_placeholder_section() -> Section {
    Section {
        id: "inbox_outlook".to_string(),
        title: "Inbox Summary (Outlook) — Not configured yet".to_string(),
        data: SectionData::Inbox(InboxData {
            needs_response: Vec::new(),
            items: Vec::new(),
            query: String::new(),
        }),
    }
}
