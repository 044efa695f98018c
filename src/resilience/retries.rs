//! Retry/timeout executor.
//!
//! # Responsibilities
//! - Run one logical call as up to `max_attempts` attempts inside a total budget
//! - Race each attempt against `min(attempt_timeout, remaining budget)`
//! - Sleep a jittered exponential backoff between attempts, never past the budget
//! - Report every finished attempt to the circuit breaker exactly once
//!
//! # Design Decisions
//! - The first attempt runs under the caller's permit; later attempts ask
//!   the breaker again so a breaker that opened mid-call stops the retries
//! - A denied permit is not an attempt and is never reported
//! - Each attempt owns its permit, so dropping `execute` mid-attempt releases
//!   the permit instead of reporting it
//! - Errors and timeouts are retried; any success short-circuits

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::{RetryConfig, TimeoutConfig};
use crate::observability::metrics;
use crate::resilience::backoff::BackoffPolicy;
use crate::resilience::circuit_breaker::{CircuitBreaker, Permit};
use crate::resilience::events::{EventBus, ResilienceEvent};
use crate::resilience::timeouts::{run_with_timeout, Deadline};
use crate::resilience::types::{AttemptOutcome, CallAttempt, CallError, DependencyError};

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
    pub total_budget: Duration,
    pub backoff: BackoffPolicy,
}

impl RetryPolicy {
    pub fn from_config(retries: &RetryConfig, timeouts: &TimeoutConfig) -> Self {
        Self {
            max_attempts: retries.max_attempts.max(1),
            attempt_timeout: timeouts.attempt(),
            total_budget: timeouts.total_budget(),
            backoff: BackoffPolicy::from_config(retries),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default(), &TimeoutConfig::default())
    }
}

/// Everything one `execute` call did.
#[derive(Debug)]
pub struct Execution<T> {
    pub attempts: Vec<CallAttempt>,
    pub result: Result<T, CallError>,
}

impl<T> Execution<T> {
    pub fn attempt_count(&self) -> u32 {
        self.attempts.len() as u32
    }
}

#[derive(Debug)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    breaker: Arc<CircuitBreaker>,
    events: EventBus,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy, breaker: Arc<CircuitBreaker>, events: EventBus) -> Self {
        Self {
            policy,
            breaker,
            events,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute `call` with retries. `first` admits the first attempt and must
    /// come from this executor's breaker.
    ///
    /// `call` receives the 1-based attempt number.
    pub async fn execute<T, F, Fut>(&self, first: Permit<'_>, mut call: F) -> Execution<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, DependencyError>>,
    {
        let deadline = Deadline::after(self.policy.total_budget);
        let mut attempts = Vec::with_capacity(self.policy.max_attempts as usize);
        let mut last_error = CallError::DependencyTimeout(self.policy.total_budget);
        let mut first = Some(first);

        for number in 1..=self.policy.max_attempts {
            let permit = if let Some(permit) = first.take() {
                permit
            } else {
                let delay = self.policy.backoff.delay(number - 1);
                if delay >= deadline.remaining() {
                    tracing::debug!(
                        breaker = %self.breaker.name(),
                        attempt = number,
                        delay = ?delay,
                        "Budget exhausted before next attempt"
                    );
                    last_error = CallError::DependencyTimeout(self.policy.total_budget);
                    break;
                }
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                match self.breaker.permit() {
                    Some(permit) => permit,
                    None => {
                        tracing::debug!(
                            breaker = %self.breaker.name(),
                            attempt = number,
                            "Breaker denied retry"
                        );
                        last_error = CallError::CircuitOpen;
                        break;
                    }
                }
            };

            let limit = deadline.attempt_limit(self.policy.attempt_timeout);
            let started = Instant::now();
            let outcome = run_with_timeout(limit, call(number)).await;
            let elapsed = started.elapsed();

            match outcome {
                Some(Ok(value)) => {
                    let outcome = if elapsed > self.breaker.slow_call_threshold() {
                        AttemptOutcome::Slow
                    } else {
                        AttemptOutcome::Success
                    };
                    attempts.push(self.finish_attempt(permit, number, elapsed, outcome));
                    return Execution {
                        attempts,
                        result: Ok(value),
                    };
                }
                Some(Err(err)) => {
                    attempts.push(self.finish_attempt(
                        permit,
                        number,
                        elapsed,
                        AttemptOutcome::Error(err.clone()),
                    ));
                    last_error = CallError::Dependency(err);
                }
                None => {
                    attempts.push(self.finish_attempt(
                        permit,
                        number,
                        elapsed,
                        AttemptOutcome::TimedOut,
                    ));
                    last_error = CallError::DependencyTimeout(limit);
                }
            }
        }

        Execution {
            attempts,
            result: Err(last_error),
        }
    }

    fn finish_attempt(
        &self,
        permit: Permit<'_>,
        number: u32,
        elapsed: Duration,
        outcome: AttemptOutcome,
    ) -> CallAttempt {
        match &outcome {
            AttemptOutcome::Success => permit.on_success(),
            AttemptOutcome::Slow => permit.on_slow(),
            AttemptOutcome::Error(_) | AttemptOutcome::TimedOut => permit.on_failure(),
        }

        match &outcome {
            AttemptOutcome::Success => {
                tracing::debug!(breaker = %self.breaker.name(), attempt = number, elapsed = ?elapsed, "Successful call")
            }
            AttemptOutcome::Slow => {
                tracing::warn!(breaker = %self.breaker.name(), attempt = number, elapsed = ?elapsed, "Slow call")
            }
            AttemptOutcome::Error(err) => {
                tracing::warn!(breaker = %self.breaker.name(), attempt = number, error = %err, "Failed call")
            }
            AttemptOutcome::TimedOut => {
                tracing::warn!(breaker = %self.breaker.name(), attempt = number, elapsed = ?elapsed, "Call timed out")
            }
        }
        metrics::record_attempt(self.breaker.name(), outcome.as_str(), elapsed);

        let attempt = CallAttempt {
            number,
            elapsed,
            outcome,
        };
        self.events.publish(ResilienceEvent::AttemptCompleted {
            dependency: self.breaker.name().to_string(),
            attempt: attempt.clone(),
        });
        attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CircuitBreakerConfig;
    use crate::resilience::circuit_breaker::BreakerState;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(2),
            total_budget: Duration::from_secs(5),
            backoff: BackoffPolicy {
                base_ms: 100,
                max_ms: 1000,
                jitter_ratio: 0.1,
            },
        }
    }

    fn breaker_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_rate_threshold: 0.5,
            window_size: 10,
            minimum_calls: 5,
            open_duration_ms: 1000,
            half_open_probes: 2,
            slow_call_threshold_ms: 1500,
        }
    }

    fn executor(policy: RetryPolicy) -> (RetryExecutor, Arc<CircuitBreaker>) {
        let events = EventBus::default();
        let breaker = Arc::new(CircuitBreaker::new("users", breaker_config(), events.clone()));
        (RetryExecutor::new(policy, breaker.clone(), events), breaker)
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_second_attempt() {
        let (executor, breaker) = executor(policy());
        let calls = AtomicU32::new(0);

        let execution = executor
            .execute(breaker.permit().unwrap(), |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(DependencyError::Status(503))
                    } else {
                        Ok("alice")
                    }
                }
            })
            .await;

        assert_eq!(execution.result, Ok("alice"));
        assert_eq!(execution.attempt_count(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(execution.attempts[1].outcome, AttemptOutcome::Success);

        let stats = breaker.snapshot().stats;
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.successes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_attempts_return_last_error() {
        let (executor, breaker) = executor(policy());
        let execution: Execution<()> = executor
            .execute(breaker.permit().unwrap(), |n| async move {
                Err(DependencyError::Status(500 + n as u16))
            })
            .await;

        assert_eq!(execution.attempt_count(), 3);
        assert_eq!(
            execution.result,
            Err(CallError::Dependency(DependencyError::Status(503)))
        );
        assert_eq!(breaker.snapshot().stats.failures, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_timing_out_stays_within_budget() {
        let (executor, breaker) = executor(policy());
        let started = Instant::now();

        let execution: Execution<()> = executor
            .execute(breaker.permit().unwrap(), |_| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .await;

        // Timer wheel granularity is 1ms.
        assert!(started.elapsed() <= Duration::from_millis(5_010));
        assert!(matches!(execution.result, Err(CallError::DependencyTimeout(_))));
        assert!(execution
            .attempts
            .iter()
            .all(|a| a.outcome == AttemptOutcome::TimedOut));
        assert_eq!(
            breaker.snapshot().stats.failures,
            u64::from(execution.attempt_count())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_cuts_attempt_timeout() {
        let mut policy = policy();
        policy.total_budget = Duration::from_millis(2500);
        let (executor, breaker) = executor(policy);
        let started = Instant::now();

        let execution: Execution<()> = executor
            .execute(breaker.permit().unwrap(), |_| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .await;

        // 2s attempt, ~100ms backoff, then the remaining ~400ms for attempt two.
        assert_eq!(execution.attempt_count(), 2);
        assert!(started.elapsed() <= Duration::from_millis(2_510));
        assert!(execution.attempts[1].elapsed < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_success_reported_as_slow() {
        let (executor, breaker) = executor(policy());
        let execution = executor
            .execute(breaker.permit().unwrap(), |_| async {
                tokio::time::sleep(Duration::from_millis(1600)).await;
                Ok::<_, DependencyError>(1)
            })
            .await;

        assert_eq!(execution.result, Ok(1));
        assert_eq!(execution.attempts[0].outcome, AttemptOutcome::Slow);
        assert_eq!(breaker.snapshot().stats.slow, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_breaker_stops_retries() {
        let (executor, breaker) = executor(policy());
        for _ in 0..4 {
            breaker.permit().unwrap().on_failure();
        }
        let calls = AtomicU32::new(0);

        let execution: Execution<()> = executor
            .execute(breaker.permit().unwrap(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(DependencyError::Transport("connection refused".into())) }
            })
            .await;

        // Fifth failure trips the breaker, so no second attempt is made.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(execution.result, Err(CallError::CircuitOpen));
        assert_eq!(breaker.state(), BreakerState::Open);
        assert_eq!(breaker.snapshot().stats.total_reports(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_events_published() {
        let (executor, breaker) = executor(policy());
        let mut rx = executor.events.subscribe();
        let _ = executor
            .execute(breaker.permit().unwrap(), |n| async move {
                if n < 2 {
                    Err(DependencyError::Status(502))
                } else {
                    Ok(())
                }
            })
            .await;

        let mut outcomes = Vec::new();
        while let Ok(ResilienceEvent::AttemptCompleted { attempt, .. }) = rx.try_recv() {
            outcomes.push(attempt.outcome.as_str());
        }
        assert_eq!(outcomes, vec!["error", "success"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_attempt_is_released_not_reported() {
        let (executor, breaker) = executor(policy());

        let cancelled = tokio::time::timeout(
            Duration::from_millis(100),
            executor.execute(breaker.permit().unwrap(), |_| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<_, DependencyError>(())
            }),
        )
        .await;

        assert!(cancelled.is_err());
        let stats = breaker.snapshot().stats;
        assert_eq!(stats.total_reports(), 0);
        assert_eq!(stats.cancelled, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reports_match_attempts_randomized() {
        let (executor, breaker) = executor(policy());
        let mut rng = StdRng::seed_from_u64(0x5EED);
        let mut total_attempts = 0u64;

        for _ in 0..1000 {
            let Some(permit) = breaker.permit() else {
                // Let the cool-down elapse now and then so half-open gets exercised.
                if rng.gen_bool(0.3) {
                    tokio::time::advance(Duration::from_millis(1000)).await;
                }
                continue;
            };
            let script: Vec<u8> = (0..3).map(|_| rng.gen_range(0..3)).collect();
            let execution: Execution<u8> = executor
                .execute(permit, |n| {
                    let step = script[(n - 1) as usize];
                    async move {
                        match step {
                            0 => Ok(step),
                            1 => Err(DependencyError::Status(500)),
                            _ => {
                                tokio::time::sleep(Duration::from_secs(3)).await;
                                Ok(step)
                            }
                        }
                    }
                })
                .await;
            total_attempts += u64::from(execution.attempt_count());
        }

        assert!(total_attempts > 0);
        assert_eq!(breaker.snapshot().stats.total_reports(), total_attempts);
    }
}
