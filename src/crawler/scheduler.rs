//! Request pacing and retry backoff
//!
//! This module handles:
//! - A fixed inter-dispatch delay, applied at submission time
//! - Exponential backoff schedules for retried requests

use crate::config::{IndexerConfig, ScraperConfig};
use std::time::Duration;
use tokio::time::Instant;

/// Exponential backoff schedule with a cap and a bounded attempt count
///
/// `max_attempts` counts every attempt, including the first one, so a policy
/// with `max_attempts = 4` allows 3 retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base: Duration,
    pub max: Duration,
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(base: Duration, max: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            max,
            max_attempts,
        }
    }

    /// Backoff for transient page-fetch failures
    pub fn transient(config: &ScraperConfig) -> Self {
        Self::new(
            Duration::from_millis(config.retry_base_ms),
            Duration::from_millis(config.retry_max_ms),
            config.max_retries + 1,
        )
    }

    /// Backoff for HTTP 429 on page fetches
    pub fn rate_limited(config: &ScraperConfig) -> Self {
        Self::new(
            Duration::from_millis(config.rate_limit_base_ms),
            Duration::from_millis(config.retry_max_ms),
            config.max_retries + 1,
        )
    }

    /// Backoff for HTTP 429 from the corpus import endpoint
    pub fn import_rate_limited(config: &IndexerConfig) -> Self {
        Self::new(
            Duration::from_millis(config.rate_limit_base_ms),
            Duration::from_millis(config.max_backoff_ms),
            config.max_attempts,
        )
    }

    /// Backoff for "corpus busy" responses; longer base than rate limits
    pub fn import_busy(config: &IndexerConfig) -> Self {
        Self::new(
            Duration::from_millis(config.busy_base_ms),
            Duration::from_millis(config.max_backoff_ms),
            config.max_attempts,
        )
    }

    /// Delay before retry number `retry` (0-based): `base * 2^retry`, capped
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.base.saturating_mul(factor).min(self.max)
    }

    /// Returns true if another attempt is allowed after `attempts` have been made
    pub fn allows_another(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

/// Spaces out dispatches by a fixed delay
///
/// The delay is measured between submissions, not completions, so total
/// throughput stays under the source's limit however fast workers finish.
#[derive(Debug)]
pub struct Pacer {
    delay: Duration,
    next_slot: Option<Instant>,
}

impl Pacer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            next_slot: None,
        }
    }

    /// Waits until the next dispatch slot is open, then reserves the one after
    pub async fn wait_turn(&mut self) {
        if let Some(slot) = self.next_slot {
            tokio::time::sleep_until(slot).await;
        }
        self.next_slot = Some(Instant::now() + self.delay);
    }
}
