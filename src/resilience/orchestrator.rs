//! Call orchestrator: the single entry point for guarded dependency calls.
//!
//! # Data Flow
//! ```text
//! fetch(id)
//!     → breaker.permit()          denied  → fallback(CircuitOpen)
//!                                 granted → Permit held by the attempt
//!     → executor.execute(call)    success → RemoteResult::ok
//!                                 failure → fallback(terminal reason)
//! ```
//!
//! `fetch` never returns an error: dependency failures become `DEGRADED`
//! results, and only a fallback that cannot produce a substitute yields
//! `UNAVAILABLE`.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::config::ServiceConfig;
use crate::observability::metrics;
use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::resilience::events::{EventBus, ResilienceEvent};
use crate::resilience::fallback::FallbackResolver;
use crate::resilience::retries::{RetryExecutor, RetryPolicy};
use crate::resilience::types::{CallError, DependencyError, RemoteResult};

/// A remote dependency reachable by id.
pub trait Dependency: Send + Sync {
    type Id: fmt::Display + Send + Sync;
    type Output: Send;

    /// One attempt. Must not retry or time out on its own.
    fn call(&self, id: &Self::Id) -> impl Future<Output = Result<Self::Output, DependencyError>> + Send;
}

pub struct CallOrchestrator<D, F> {
    dependency: D,
    fallback: F,
    breaker: Arc<CircuitBreaker>,
    executor: RetryExecutor,
    events: EventBus,
}

impl<D, F> CallOrchestrator<D, F>
where
    D: Dependency,
    F: FallbackResolver<D::Id, D::Output>,
{
    pub fn new(
        dependency: D,
        fallback: F,
        breaker: Arc<CircuitBreaker>,
        policy: RetryPolicy,
        events: EventBus,
    ) -> Self {
        let executor = RetryExecutor::new(policy, breaker.clone(), events.clone());
        Self {
            dependency,
            fallback,
            breaker,
            executor,
            events,
        }
    }

    /// Build the breaker and retry policy for `name` from service configuration.
    pub fn from_config(name: &str, dependency: D, fallback: F, config: &ServiceConfig, events: EventBus) -> Self {
        let breaker = Arc::new(CircuitBreaker::new(
            name,
            config.circuit_breaker.clone(),
            events.clone(),
        ));
        let policy = RetryPolicy::from_config(&config.retries, &config.timeouts);
        Self::new(dependency, fallback, breaker, policy, events)
    }

    pub async fn fetch(&self, id: D::Id) -> RemoteResult<D::Output> {
        let Some(permit) = self.breaker.permit() else {
            return self.fall_back(&id, CallError::CircuitOpen, 0);
        };

        let dependency = &self.dependency;
        let id_ref = &id;
        let execution = self
            .executor
            .execute(permit, move |_| dependency.call(id_ref))
            .await;
        let attempts = execution.attempt_count();

        match execution.result {
            Ok(payload) => RemoteResult::ok(payload, attempts),
            Err(reason) => self.fall_back(&id, reason, attempts),
        }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ResilienceEvent> {
        self.events.subscribe()
    }

    fn fall_back(&self, id: &D::Id, reason: CallError, attempts: u32) -> RemoteResult<D::Output> {
        tracing::warn!(
            breaker = %self.breaker.name(),
            id = %id,
            reason = reason.reason(),
            error = %reason,
            attempts,
            "Fallback activated"
        );

        let result = self.fallback.resolve(id, reason.clone()).with_attempts(attempts);

        if result.is_unavailable() {
            tracing::error!(breaker = %self.breaker.name(), id = %id, "Fallback could not produce a substitute");
        }
        metrics::record_fallback(self.breaker.name(), result.level.as_str());
        self.events.publish(ResilienceEvent::FallbackActivated {
            dependency: self.breaker.name().to_string(),
            id: id.to_string(),
            reason,
            level: result.level,
        });
        result
    }
}

impl<D, F> fmt::Debug for CallOrchestrator<D, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallOrchestrator")
            .field("breaker", &self.breaker.name())
            .field("policy", self.executor.policy())
            .finish()
    }
}
