// src/rate_limit.rs

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Backpressure between consecutive upstream calls.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn wait(&self);
}

/// Sleeps for a fixed delay on every call.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl RateLimiter for FixedDelay {
    async fn wait(&self) {
        debug!("Rate limiter sleeping for {}ms", self.delay.as_millis());
        sleep(self.delay).await;
    }
}

/// Never waits.
#[cfg(test)]
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

#[cfg(test)]
#[async_trait]
impl RateLimiter for NoDelay {
    async fn wait(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn fixed_delay_waits_for_configured_duration() {
        let limiter = FixedDelay::new(Duration::from_millis(500));
        let started = Instant::now();
        limiter.wait().await;
        assert!(started.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn no_delay_does_not_advance_the_clock() {
        let started = Instant::now();
        NoDelay.wait().await;
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
