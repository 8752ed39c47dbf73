use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;

const RESEND_URL: &str = "https://api.resend.com/emails";

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    html: &'a str,
}

/// Minimal Resend API client for outbound digest delivery.
pub struct ResendMailer {
    client: Client,
    api_key: String,
}

impl ResendMailer {
    pub fn new(api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, api_key })
    }

    pub async fn send(
        &self,
        from: &str,
        to: &[String],
        subject: &str,
        html: &str,
    ) -> Result<()> {
        let request = SendRequest {
            from,
            to,
            subject,
            html,
        };

        let response = self
            .client
            .post(RESEND_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Resend")?;

        let status = response.status();
        if status.as_u16() >= 400 {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("unknown error"));
            anyhow::bail!("Resend error {}: {}", status, body);
        }

        Ok(())
    }
}
