//! Client for the nRF Cloud REST message listing.
//!
//! Fetches every message received within a [`PollWindow`], following
//! `pageNextToken` up to a configured page limit.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::config::{NrfCloudConfig, PollConfig, USER_AGENT};

/// Error type for nRF Cloud API calls
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("NRF_CLOUD_API_KEY is not configured")]
    MissingApiKey,

    #[error("nRF Cloud request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("nRF Cloud returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Failed to decode nRF Cloud response: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("Failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Half-open time range `[start, end)` queried from the API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl PollWindow {
    /// The window of length `span` ending at `end`
    pub fn trailing(end: DateTime<Utc>, span: Duration) -> Self {
        let span = chrono::Duration::from_std(span).unwrap_or(chrono::Duration::MAX);
        let start = end.checked_sub_signed(span).unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self { start, end }
    }

    /// `inclusiveStart` query value
    pub fn inclusive_start(&self) -> String {
        self.start.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// `exclusiveEnd` query value
    pub fn exclusive_end(&self) -> String {
        self.end.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// One page of `GET /messages`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessagesPage {
    #[serde(default)]
    items: Option<Vec<Value>>,
    #[serde(default)]
    page_next_token: Option<String>,
}

#[derive(Clone)]
pub struct NrfCloudClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    page_limit: Option<u32>,
    max_pages: usize,
}

impl NrfCloudClient {
    pub fn new(config: &NrfCloudConfig, poll: &PollConfig) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(UpstreamError::Client)?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            page_limit: poll.page_limit,
            max_pages: poll.max_pages.max(1),
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Fetch all message items received within `window`.
    ///
    /// The raw items are returned untouched so callers can keep them for audit.
    #[tracing::instrument(
        name = "nrf_cloud::fetch_messages",
        skip(self),
        fields(start = %window.inclusive_start(), end = %window.exclusive_end())
    )]
    pub async fn fetch_messages(&self, window: &PollWindow) -> Result<Vec<Value>, UpstreamError> {
        let api_key = self.api_key.as_deref().ok_or(UpstreamError::MissingApiKey)?;
        let url = format!("{}/messages", self.base_url);

        let mut items = Vec::new();
        let mut next_token: Option<String> = None;

        for page in 1..=self.max_pages {
            let mut query = vec![
                ("inclusiveStart", window.inclusive_start()),
                ("exclusiveEnd", window.exclusive_end()),
            ];
            if let Some(limit) = self.page_limit {
                query.push(("pageLimit", limit.to_string()));
            }
            if let Some(token) = next_token.take() {
                query.push(("pageNextToken", token));
            }

            let response = self
                .http
                .get(&url)
                .query(&query)
                .bearer_auth(api_key)
                .send()
                .await
                .map_err(UpstreamError::Request)?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(UpstreamError::Status { status, body });
            }

            let page_body: MessagesPage = response.json().await.map_err(UpstreamError::Decode)?;
            let page_items = page_body.items.unwrap_or_default();
            tracing::debug!(page, items = page_items.len(), "Fetched message page");
            items.extend(page_items);

            match page_body.page_next_token.filter(|t| !t.is_empty()) {
                Some(token) if page < self.max_pages => next_token = Some(token),
                Some(_) => {
                    tracing::warn!(
                        max_pages = self.max_pages,
                        "Page limit reached; remaining messages left for the next poll"
                    );
                    break;
                }
                None => break,
            }
        }

        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(text: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(text).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_trailing_window_is_five_minutes() {
        let window = PollWindow::trailing(at("2024-05-01T12:00:00Z"), Duration::from_secs(300));
        assert_eq!(window.start, at("2024-05-01T11:55:00Z"));
        assert_eq!(window.end, at("2024-05-01T12:00:00Z"));
    }

    #[test]
    fn test_window_query_format_matches_iso_millis() {
        let window = PollWindow::trailing(at("2024-05-01T12:00:00.5Z"), Duration::from_secs(60));
        assert_eq!(window.inclusive_start(), "2024-05-01T11:59:00.500Z");
        assert_eq!(window.exclusive_end(), "2024-05-01T12:00:00.500Z");
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_before_request() {
        let client = NrfCloudClient::new(
            &NrfCloudConfig {
                base_url: "http://127.0.0.1:1".to_string(),
                api_key: None,
            },
            &PollConfig::default(),
        )
        .unwrap();

        assert!(!client.has_api_key());
        let window = PollWindow::trailing(Utc::now(), Duration::from_secs(300));
        assert!(matches!(
            client.fetch_messages(&window).await,
            Err(UpstreamError::MissingApiKey)
        ));
    }
}
