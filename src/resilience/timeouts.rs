//! Timeout enforcement.
//!
//! A [`Deadline`] is created once per guarded call and bounds every attempt
//! and backoff sleep inside it. Timeouts are a race between the call future
//! and the deadline via `tokio::time::timeout`; the losing call future is
//! dropped, so its eventual result can never be observed.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    /// Time limit for the next attempt: the per-attempt timeout, cut to what is left.
    pub fn attempt_limit(&self, per_attempt: Duration) -> Duration {
        per_attempt.min(self.remaining())
    }
}

/// Run `fut` for at most `limit`. `None` means the limit fired first.
pub async fn run_with_timeout<F: Future>(limit: Duration, fut: F) -> Option<F::Output> {
    tokio::time::timeout(limit, fut).await.ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_counts_down() {
        let deadline = Deadline::after(Duration::from_secs(5));
        assert_eq!(deadline.remaining(), Duration::from_secs(5));

        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(deadline.attempt_limit(Duration::from_secs(2)), Duration::from_secs(1));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(deadline.remaining(), Duration::ZERO);
        assert_eq!(deadline.attempt_limit(Duration::from_secs(2)), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_with_timeout() {
        let fast = run_with_timeout(Duration::from_millis(100), async { 7 }).await;
        assert_eq!(fast, Some(7));

        let slow = run_with_timeout(Duration::from_millis(100), async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            7
        })
        .await;
        assert_eq!(slow, None);
    }
}
