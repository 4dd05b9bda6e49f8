// src/slack_client.rs

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

pub const CONVERSATIONS_HISTORY: &str = "conversations.history";
pub const USERS_INFO: &str = "users.info";

// --- Slack API Data Structures ---

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryMessage {
    pub user: Option<String>,
    pub ts: String,
    pub text: Option<String>,
    pub subtype: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseMetadata {
    pub next_cursor: Option<String>,
}

/// Envelope returned by `conversations.history`.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryResponse {
    pub ok: bool,
    pub error: Option<String>,
    #[serde(default)]
    pub messages: Vec<HistoryMessage>,
    pub response_metadata: Option<ResponseMetadata>,
}

impl HistoryResponse {
    /// The continuation cursor, if Slack handed back a non-empty one.
    pub fn next_cursor(&self) -> Option<String> {
        self.response_metadata
            .as_ref()
            .and_then(|meta| meta.next_cursor.clone())
            .filter(|cursor| !cursor.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlackUser {
    pub id: Option<String>,
    pub real_name: Option<String>,
}

/// Envelope returned by `users.info`.
#[derive(Debug, Clone, Deserialize)]
pub struct UserInfoResponse {
    pub ok: bool,
    pub error: Option<String>,
    pub user: Option<SlackUser>,
}

impl UserInfoResponse {
    pub fn real_name(&self) -> Option<&str> {
        if !self.ok {
            return None;
        }
        self.user
            .as_ref()
            .and_then(|user| user.real_name.as_deref())
            .filter(|name| !name.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryQuery {
    pub channel: String,
    pub limit: u32,
    pub cursor: Option<String>,
    pub oldest: i64,
}

impl HistoryQuery {
    fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("channel", self.channel.clone()),
            ("limit", self.limit.to_string()),
            ("oldest", self.oldest.to_string()),
        ];
        if let Some(cursor) = &self.cursor {
            params.push(("cursor", cursor.clone()));
        }
        params
    }
}

// --- Slack Error Type ---
#[derive(Error, Debug)]
pub enum SlackError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Slack API error ({method}): {message}")]
    ApiError { method: String, message: String },

    #[error("Slack rate limit exceeded (Status 429)")]
    RateLimitExceeded,

    #[error("Slack HTTP error: Status={status}, Message='{message}'")]
    HttpStatus { status: StatusCode, message: String },

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("JSON processing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Invalid message timestamp: '{0}'")]
    InvalidTimestamp(String),
}

impl SlackError {
    /// Maps a non-ok envelope onto an error carrying the upstream error string.
    pub fn from_envelope(method: &str, error: Option<String>) -> Self {
        SlackError::ApiError {
            method: method.to_string(),
            message: error.unwrap_or_else(|| "Unknown error".to_string()),
        }
    }
}

/// The two Slack Web API calls the report needs.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn conversations_history(
        &self,
        token: &str,
        query: &HistoryQuery,
    ) -> Result<HistoryResponse, SlackError>;

    async fn users_info(&self, token: &str, user_id: &str)
        -> Result<UserInfoResponse, SlackError>;
}

#[derive(Clone)]
pub struct SlackClient {
    http_client: Client,
    base_url: Url,
}

impl SlackClient {
    pub fn new(base_url: &str) -> Result<Self, SlackError> {
        let http_client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        // Url::join replaces the last path segment unless the base ends in '/'
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url = Url::parse(&normalized)?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    pub fn method_url(&self, method: &str) -> Result<Url, SlackError> {
        Ok(self.base_url.join(method)?)
    }

    async fn get_method<T: DeserializeOwned>(
        &self,
        method: &str,
        token: &str,
        params: &[(&str, String)],
    ) -> Result<T, SlackError> {
        let url = self.method_url(method)?;
        debug!(method, url = %url, "Sending Slack API request");

        let response = self
            .http_client
            .get(url)
            .bearer_auth(token)
            .header(ACCEPT, "application/json")
            .query(params)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            error!(method, "Slack API rate limit hit");
            return Err(SlackError::RateLimitExceeded);
        }
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            error!(method, %status, "Slack API request failed");
            return Err(SlackError::HttpStatus { status, message });
        }

        let bytes = response.bytes().await?;
        let body = serde_json::from_slice::<T>(&bytes)?;
        Ok(body)
    }
}

#[async_trait]
impl ChatApi for SlackClient {
    async fn conversations_history(
        &self,
        token: &str,
        query: &HistoryQuery,
    ) -> Result<HistoryResponse, SlackError> {
        info!(
            channel = %query.channel,
            has_cursor = query.cursor.is_some(),
            "Fetching channel history page"
        );
        self.get_method(CONVERSATIONS_HISTORY, token, &query.to_params())
            .await
    }

    async fn users_info(
        &self,
        token: &str,
        user_id: &str,
    ) -> Result<UserInfoResponse, SlackError> {
        debug!(user_id, "Looking up Slack user");
        self.get_method(USERS_INFO, token, &[("user", user_id.to_string())])
            .await
    }
}
