//! Explicit retry policy for upstream requests

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, warn};

use crate::shared::config::{BackoffKind, RequestCfg};
use crate::shared::errors::FetchError;

/// How many times to try a request and how long to wait in between
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff: BackoffKind,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RequestCfg::default())
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, backoff: BackoffKind) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            backoff,
        }
    }

    pub fn from_config(config: &RequestCfg) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.retry_delay_ms),
            config.backoff,
        )
    }

    /// Single attempt
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, BackoffKind::None)
    }

    /// Retries without sleeping
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, BackoffKind::None)
    }

    /// Delay after the failed attempt number `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            BackoffKind::Linear => self.base_delay.saturating_mul(attempt.saturating_add(1)),
            BackoffKind::Fixed => self.base_delay,
            BackoffKind::None => Duration::ZERO,
        }
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or runs out of attempts.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut attempt = 0;
        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            attempt += 1;

            if !err.is_retryable() {
                error!("{} failed with a non-retryable error: {}", label, err);
                return Err(err);
            }
            if attempt >= self.max_attempts {
                error!("❌ {} failed after {} attempts: {}", label, attempt, err);
                return Err(FetchError::Exhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            let delay = self.delay_for(attempt - 1);
            warn!(
                "⚠️ {} attempt {}/{} failed: {}, retrying in {:?}",
                label, attempt, self.max_attempts, err, delay
            );
            if !delay.is_zero() {
                sleep(delay).await;
            }
        }
    }
}
