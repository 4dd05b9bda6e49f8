// src/message_fetcher.rs
use chrono::DateTime;
use chrono_tz::Tz;
use tracing::{debug, info};

use crate::attendance::RawMessage;
use crate::config::{SlackCredentials, HISTORY_MAX_PAGES, HISTORY_PAGE_SIZE};
use crate::monthly::month_start;
use crate::rate_limit::RateLimiter;
use crate::slack_client::{ChatApi, HistoryQuery, SlackError, CONVERSATIONS_HISTORY};

/// Pages through a channel's history from the start of the current month.
pub struct MessageFetcher<'a> {
    api: &'a dyn ChatApi,
    limiter: &'a dyn RateLimiter,
}

impl<'a> MessageFetcher<'a> {
    pub fn new(api: &'a dyn ChatApi, limiter: &'a dyn RateLimiter) -> Self {
        Self { api, limiter }
    }

    pub async fn fetch_month(
        &self,
        credentials: &SlackCredentials,
        cursor: Option<String>,
        now: &DateTime<Tz>,
    ) -> Result<Vec<RawMessage>, SlackError> {
        let oldest = month_start(now).timestamp();
        let mut next_cursor = cursor.filter(|c| !c.is_empty());
        let mut pages_left = HISTORY_MAX_PAGES;
        let mut raw_messages = Vec::new();

        loop {
            let query = HistoryQuery {
                channel: credentials.channel_id.clone(),
                limit: HISTORY_PAGE_SIZE,
                cursor: next_cursor.take(),
                oldest,
            };
            let page = self
                .api
                .conversations_history(&credentials.bot_token, &query)
                .await?;

            if !page.ok {
                return Err(SlackError::from_envelope(CONVERSATIONS_HISTORY, page.error));
            }

            next_cursor = page.next_cursor();
            let fetched = page.messages.len();
            for message in page.messages {
                if let Some(raw) = RawMessage::from_history(message)? {
                    raw_messages.push(raw);
                }
            }
            pages_left -= 1;
            debug!(fetched, kept = raw_messages.len(), pages_left, "Processed history page");

            if next_cursor.is_none() || pages_left == 0 {
                break;
            }
            self.limiter.wait().await;
        }

        info!(
            messages = raw_messages.len(),
            oldest,
            "Fetched channel history for the current month"
        );
        Ok(raw_messages)
    }
}
