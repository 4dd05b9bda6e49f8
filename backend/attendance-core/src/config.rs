// src/config.rs

use chrono_tz::Tz;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::slack_client::SlackError;

// Attendance policy constants
pub const TARGET_TIMEZONE: Tz = chrono_tz::Africa::Cairo;
pub const STANDARD_WORK_SECONDS: i64 = 8 * 3600;
pub const CHECK_OUT_HOUR_THRESHOLD: u32 = 16;
pub const NOT_AVAILABLE: &str = "N/A";

// Slack paging and rate limiting
pub const DEFAULT_SLACK_API_BASE_URL: &str = "https://slack.com/api/";
pub const HISTORY_PAGE_SIZE: u32 = 200;
pub const HISTORY_MAX_PAGES: u32 = 5;
pub const HISTORY_PAGE_DELAY: Duration = Duration::from_millis(500);
pub const USER_LOOKUP_DELAY: Duration = Duration::from_millis(200);

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_REPORT_TIMEOUT_SECS: u64 = 120;

/// Server settings, read from the environment (`BIND_ADDR`, `CERT_PATH`, ...).
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
    #[serde(default = "default_report_timeout_secs")]
    pub report_timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env::<AppConfig>()
    }

    /// TLS is only enabled when both the certificate and the key are configured.
    pub fn tls_paths(&self) -> Option<(&PathBuf, &PathBuf)> {
        match (&self.cert_path, &self.key_path) {
            (Some(cert), Some(key)) => Some((cert, key)),
            _ => None,
        }
    }

    pub fn report_timeout(&self) -> Duration {
        Duration::from_secs(self.report_timeout_secs)
    }
}

fn default_bind_addr() -> String {
    DEFAULT_BIND_ADDR.to_string()
}

fn default_report_timeout_secs() -> u64 {
    DEFAULT_REPORT_TIMEOUT_SECS
}

/// Slack settings. Token and channel stay optional here so the server can boot
/// without them; a report request fails with a configuration error instead.
#[derive(Debug, Clone, Deserialize)]
pub struct SlackConfig {
    pub slack_bot_token: Option<String>,
    pub slack_channel_id: Option<String>,
    #[serde(default = "default_slack_api_base_url")]
    pub slack_api_base_url: String,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            slack_bot_token: None,
            slack_channel_id: None,
            slack_api_base_url: default_slack_api_base_url(),
        }
    }
}

fn default_slack_api_base_url() -> String {
    DEFAULT_SLACK_API_BASE_URL.to_string()
}

/// Credentials validated for one report run.
#[derive(Debug, Clone)]
pub struct SlackCredentials {
    pub bot_token: String,
    pub channel_id: String,
}

impl SlackConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env::<SlackConfig>()
    }

    pub fn is_configured(&self) -> bool {
        self.credentials().is_ok()
    }

    pub fn credentials(&self) -> Result<SlackCredentials, SlackError> {
        let bot_token = non_blank(&self.slack_bot_token)
            .ok_or_else(|| SlackError::ConfigError("SLACK_BOT_TOKEN is not set".to_string()))?;
        let channel_id = non_blank(&self.slack_channel_id)
            .ok_or_else(|| SlackError::ConfigError("SLACK_CHANNEL_ID is not set".to_string()))?;

        Ok(SlackCredentials {
            bot_token,
            channel_id,
        })
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_require_token_and_channel() {
        let config = SlackConfig {
            slack_bot_token: Some("xoxb-test".to_string()),
            slack_channel_id: None,
            ..SlackConfig::default()
        };
        match config.credentials() {
            Err(SlackError::ConfigError(msg)) => assert!(msg.contains("SLACK_CHANNEL_ID")),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn blank_token_counts_as_missing() {
        let config = SlackConfig {
            slack_bot_token: Some("   ".to_string()),
            slack_channel_id: Some("C123".to_string()),
            ..SlackConfig::default()
        };
        assert!(!config.is_configured());
    }

    #[test]
    fn credentials_are_trimmed() {
        let config = SlackConfig {
            slack_bot_token: Some(" xoxb-test ".to_string()),
            slack_channel_id: Some("C123\n".to_string()),
            ..SlackConfig::default()
        };
        let creds = config.credentials().unwrap();
        assert_eq!(creds.bot_token, "xoxb-test");
        assert_eq!(creds.channel_id, "C123");
    }

    #[test]
    fn tls_needs_both_paths() {
        let mut config = AppConfig {
            bind_addr: default_bind_addr(),
            cert_path: Some(PathBuf::from("cert.pem")),
            key_path: None,
            report_timeout_secs: DEFAULT_REPORT_TIMEOUT_SECS,
        };
        assert!(config.tls_paths().is_none());
        config.key_path = Some(PathBuf::from("key.pem"));
        assert!(config.tls_paths().is_some());
    }
}
