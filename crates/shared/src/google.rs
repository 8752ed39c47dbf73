use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::env;

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// OAuth client credentials plus a long-lived refresh token, read from the
/// environment. The refresh token is minted once out-of-band.
#[derive(Debug, Clone)]
pub struct GoogleCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl GoogleCredentials {
    pub fn from_env() -> Result<Self> {
        let client_id = env::var("GOOGLE_CLIENT_ID")
            .context("GOOGLE_CLIENT_ID not found. Set it in the environment or a .env file.")?;
        let client_secret = env::var("GOOGLE_CLIENT_SECRET")
            .context("GOOGLE_CLIENT_SECRET not found. Set it in the environment or a .env file.")?;
        let refresh_token = env::var("GOOGLE_REFRESH_TOKEN")
            .context("GOOGLE_REFRESH_TOKEN not found. Set it in the environment or a .env file.")?;

        Ok(Self {
            client_id,
            client_secret,
            refresh_token,
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Exchange the refresh token for a short-lived bearer token.
pub async fn fetch_access_token(client: &Client, creds: &GoogleCredentials) -> Result<String> {
    let response = client
        .post(TOKEN_URL)
        .form(&[
            ("grant_type", "refresh_token"),
            ("client_id", creds.client_id.as_str()),
            ("client_secret", creds.client_secret.as_str()),
            ("refresh_token", creds.refresh_token.as_str()),
        ])
        .send()
        .await
        .context("Failed to reach the Google token endpoint")?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("unknown error"));
        anyhow::bail!("Google token refresh failed: {} - {}", status, body);
    }

    let token = response
        .json::<TokenResponse>()
        .await
        .context("Failed to parse Google token response")?;

    Ok(token.access_token)
}
