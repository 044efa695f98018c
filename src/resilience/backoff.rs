//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;

/// Calculate exponential backoff delay with jitter.
///
/// `attempt` is the number of attempts already made; 0 yields no delay.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64, jitter_ratio: f64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    // Apply jitter (0 to jitter_ratio of the delay)
    let jitter_range = (capped_delay as f64 * jitter_ratio.clamp(0.0, 1.0)) as u64;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..=jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}

/// Backoff settings taken from [`RetryConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub base_ms: u64,
    pub max_ms: u64,
    pub jitter_ratio: f64,
}

impl BackoffPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            base_ms: config.base_delay_ms,
            max_ms: config.max_delay_ms,
            jitter_ratio: config.jitter_ratio,
        }
    }

    /// No delay between attempts.
    pub fn none() -> Self {
        Self {
            base_ms: 0,
            max_ms: 0,
            jitter_ratio: 0.0,
        }
    }

    pub fn delay(&self, attempts_made: u32) -> Duration {
        calculate_backoff(attempts_made, self.base_ms, self.max_ms, self.jitter_ratio)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
