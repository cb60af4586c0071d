//! Bounded retry with exponential backoff for rate-limited calls.
//!
//! A request moves ISSUED -> DONE on success, ISSUED -> WAIT -> ISSUED on a
//! 429 while attempts remain, and ISSUED -> DONE-WITH-ERROR otherwise.

use backon::{BackoffBuilder, ExponentialBuilder};
use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::providers::ProviderError;

/// Retry policy applied to 429 responses only.
#[derive(Debug, Clone)]
pub struct RateLimitRetry {
    config: RetryConfig,
}

impl RateLimitRetry {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Exponential schedule: base, 2*base, ... capped at `max_delay`.
    pub fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.config.base_delay)
            .with_max_delay(self.config.max_delay)
            .with_factor(2.0)
            .with_max_times(self.config.max_retries)
    }

    /// Delay before the next attempt: the server's `Retry-After` (floored)
    /// wins over the scheduled backoff.
    pub fn delay_for(&self, error: &ProviderError, scheduled: Duration) -> Duration {
        error
            .retry_after()
            .map(|after| after.max(self.config.min_retry_after))
            .unwrap_or(scheduled)
    }

    /// Run `op`, retrying while it reports a rate limit and attempts remain.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut schedule = self.backoff().build();
        let mut attempt = 1usize;

        loop {
            match op().await {
                Err(e) if e.is_rate_limited() => match schedule.next() {
                    Some(scheduled) => {
                        let delay = self.delay_for(&e, scheduled);
                        tracing::warn!(
                            attempt,
                            max_attempts = self.config.max_retries + 1,
                            delay = ?delay,
                            error = %e,
                            "Rate limited, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => return Err(e),
                },
                other => return other,
            }
        }
    }
}

impl Default for RateLimitRetry {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}
