/*!
 * Retry timing for the HTTP client: capped exponential backoff with jitter.
 */

use rand::Rng;
use std::time::Duration;

use crate::app_config::NetworkConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one
    pub max_retries: u32,
    /// Base backoff time in milliseconds, doubled on each retry
    pub backoff_base_ms: u64,
    /// Upper bound for a single backoff
    pub max_backoff_ms: u64,
    /// Add up to 10% random jitter to each delay
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base_ms: 1000,
            max_backoff_ms: 30_000,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn from_network(network: &NetworkConfig) -> Self {
        Self {
            max_retries: network.retry_count,
            backoff_base_ms: network.retry_backoff_ms,
            max_backoff_ms: network.max_backoff_ms,
            jitter: true,
        }
    }

    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Backoff before retry number `attempt` (1-based), without jitter
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(20);
        let backoff_ms = self
            .backoff_base_ms
            .saturating_mul(1u64 << shift)
            .min(self.max_backoff_ms);
        Duration::from_millis(backoff_ms)
    }

    /// Delay before retry number `attempt`, honoring a server-requested wait
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let mut delay = self.base_delay(attempt);
        if self.jitter && delay.as_millis() > 0 {
            let cap = (delay.as_millis() as u64 / 10).max(1);
            delay += Duration::from_millis(rand::rng().random_range(0..=cap));
        }
        match retry_after {
            Some(wait) if wait > delay => wait,
            _ => delay,
        }
    }
}
