// src/report_service.rs
use chrono::DateTime;
use chrono_tz::Tz;
use std::sync::Arc;
use tracing::info;

use crate::attendance::{classify_all, group_by_user_and_day};
use crate::config::{SlackConfig, HISTORY_PAGE_DELAY, USER_LOOKUP_DELAY};
use crate::message_fetcher::MessageFetcher;
use crate::monthly::{fill_month, MonthlyReport};
use crate::name_resolver::{key_by_display_name, NameResolver};
use crate::rate_limit::{FixedDelay, RateLimiter};
use crate::slack_client::{ChatApi, SlackError};

/// Runs fetch -> group -> classify -> resolve names -> fill for one request.
pub struct AttendanceReportService {
    api: Arc<dyn ChatApi>,
    config: SlackConfig,
    page_limiter: Arc<dyn RateLimiter>,
    lookup_limiter: Arc<dyn RateLimiter>,
}

impl AttendanceReportService {
    pub fn new(api: Arc<dyn ChatApi>, config: SlackConfig) -> Self {
        Self::with_limiters(
            api,
            config,
            Arc::new(FixedDelay::new(HISTORY_PAGE_DELAY)),
            Arc::new(FixedDelay::new(USER_LOOKUP_DELAY)),
        )
    }

    pub fn with_limiters(
        api: Arc<dyn ChatApi>,
        config: SlackConfig,
        page_limiter: Arc<dyn RateLimiter>,
        lookup_limiter: Arc<dyn RateLimiter>,
    ) -> Self {
        Self {
            api,
            config,
            page_limiter,
            lookup_limiter,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    pub async fn generate(
        &self,
        cursor: Option<String>,
        now: DateTime<Tz>,
    ) -> Result<MonthlyReport, SlackError> {
        // Fails before any network call when token or channel is missing
        let credentials = self.config.credentials()?;

        let fetcher = MessageFetcher::new(self.api.as_ref(), self.page_limiter.as_ref());
        let raw_messages = fetcher.fetch_month(&credentials, cursor, &now).await?;

        let buckets = group_by_user_and_day(raw_messages);
        let records_by_user = classify_all(buckets);

        let resolver = NameResolver::new(
            self.api.as_ref(),
            self.lookup_limiter.as_ref(),
            &credentials.bot_token,
        );
        let names = resolver
            .resolve_all(records_by_user.keys().map(String::as_str))
            .await;
        let records_by_name = key_by_display_name(records_by_user, &names);

        let report = fill_month(records_by_name, &now);
        info!(
            users = report.len(),
            month = %now.format("%Y-%m"),
            "Monthly attendance report assembled"
        );
        Ok(report)
    }
}
