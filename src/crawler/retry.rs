//! Bounded retry with exponential backoff
//!
//! | Condition | Action |
//! |-----------|--------|
//! | Timeout, connection or request failure | Retry up to `max_retries` times |
//! | Malformed body, redirect limit | Immediate failure |
//!
//! Sleeping only suspends the calling worker; the rest of the pool keeps
//! running.

use crate::config::CrawlerConfig;
use crate::crawler::transport::TransportError;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Errors that know whether another attempt could succeed
pub trait Retryable {
    fn is_transient(&self) -> bool;
}

impl Retryable for TransportError {
    fn is_transient(&self) -> bool {
        TransportError::is_transient(self)
    }
}

/// Delay schedule between attempts
///
/// The delay before retry `n` (0-based) is `initial * multiplier^n`, capped at
/// `max`. With `multiplier >= 1` the schedule never decreases.
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    initial: Duration,
    multiplier: f64,
    max: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, multiplier: f64, max: Duration) -> Self {
        let multiplier = if multiplier.is_finite() {
            multiplier.max(1.0)
        } else {
            1.0
        };
        Self {
            initial,
            multiplier,
            max: max.max(initial),
        }
    }

    /// The same delay before every retry
    pub fn fixed(delay: Duration) -> Self {
        Self::new(delay, 1.0, delay)
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(
            Duration::from_millis(config.backoff_initial_ms),
            config.backoff_multiplier,
            Duration::from_millis(config.backoff_max_ms),
        )
    }

    /// Delay to wait before retry number `retry` (0-based)
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = self.multiplier.powi(retry.min(i32::MAX as u32) as i32);
        let secs = (self.initial.as_secs_f64() * factor).min(self.max.as_secs_f64());
        Duration::from_secs_f64(secs)
    }
}

/// Retries transient failures a bounded number of times
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: Backoff) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(config.max_retries, Backoff::from_config(config))
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Runs `attempt` until it succeeds, fails permanently, or retries run out
    ///
    /// At most `max_retries + 1` attempts are made. The last error is returned
    /// once the budget is spent.
    ///
    /// # Arguments
    ///
    /// * `label` - What is being attempted, used in log lines
    /// * `attempt` - Produces a fresh future for every attempt
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut attempt: F) -> Result<T, E>
    where
        E: Retryable + Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut retry = 0;
        loop {
            match attempt().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) if retry >= self.max_retries => {
                    tracing::warn!(
                        task = label,
                        attempts = retry + 1,
                        error = %e,
                        "Retries exhausted"
                    );
                    return Err(e);
                }
                Err(e) => {
                    let delay = self.backoff.delay(retry);
                    retry += 1;
                    tracing::warn!(
                        task = label,
                        attempt = retry,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
