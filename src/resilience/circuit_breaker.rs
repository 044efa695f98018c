//! Circuit breaker for the downstream dependency.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls are rejected without contacting it
//! - Half-Open: a limited quota of probe calls tests recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: window holds >= minimum_calls and (failures + slow) / len >= threshold
//! Open → Half-Open: on the first permit() after open_duration has elapsed
//! Half-Open → Closed: half_open_probes consecutive successful probes
//! Half-Open → Open: any failed or slow probe
//! ```
//!
//! State only changes in response to `permit()` and outcome reports; there is
//! no setter. All state sits behind one mutex so transitions are linearizable,
//! and the lock is never held across an await point.
//!
//! Every admitted call holds a [`Permit`]. Outcomes are reported through it,
//! and a permit dropped without a report (a cancelled call) hands its probe
//! slot back, so an abandoned probe can never leave Half-Open without quota.
//! Only permits admitted as probes of the current Half-Open period count
//! towards closing or reopening.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime};

use serde::Serialize;
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;
use crate::resilience::events::{EventBus, ResilienceEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        }
    }
}

/// Outcome kinds kept in the window. Slow calls count as failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Success,
    Failure,
    Slow,
}

impl Outcome {
    fn is_failure(self) -> bool {
        !matches!(self, Outcome::Success)
    }
}

/// Count-based ring of the most recent outcomes.
#[derive(Debug)]
struct OutcomeWindow {
    outcomes: VecDeque<Outcome>,
    capacity: usize,
    failures: usize,
}

impl OutcomeWindow {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            outcomes: VecDeque::with_capacity(capacity),
            capacity,
            failures: 0,
        }
    }

    fn push(&mut self, outcome: Outcome) {
        if self.outcomes.len() == self.capacity {
            if let Some(evicted) = self.outcomes.pop_front() {
                if evicted.is_failure() {
                    self.failures -= 1;
                }
            }
        }
        if outcome.is_failure() {
            self.failures += 1;
        }
        self.outcomes.push_back(outcome);
    }

    fn len(&self) -> usize {
        self.outcomes.len()
    }

    fn failure_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        self.failures as f64 / self.outcomes.len() as f64
    }

    fn clear(&mut self) {
        self.outcomes.clear();
        self.failures = 0;
    }
}

/// Counters of every report and rejection since creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportStats {
    pub successes: u64,
    pub failures: u64,
    pub slow: u64,
    /// `permit()` calls that returned no permit.
    pub rejected: u64,
    /// Permits dropped without an outcome.
    pub cancelled: u64,
}

impl ReportStats {
    /// Outcome reports received (successes, failures and slow calls).
    pub fn total_reports(&self) -> u64 {
        self.successes + self.failures + self.slow
    }
}

/// Point-in-time view for status endpoints and tests.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: BreakerState,
    pub failure_rate: f64,
    pub buffered_calls: usize,
    pub window_size: usize,
    pub probes_remaining: u32,
    pub stats: ReportStats,
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    window: OutcomeWindow,
    opened_at: Instant,
    probes_remaining: u32,
    probe_successes: u32,
    /// Bumped on every transition; ties a permit to the period that admitted it.
    generation: u64,
    stats: ReportStats,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
    events: EventBus,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig, events: EventBus) -> Self {
        let name = name.into();
        metrics::record_breaker_state(&name, BreakerState::Closed.as_str());
        Self {
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                window: OutcomeWindow::new(config.window_size),
                opened_at: Instant::now(),
                probes_remaining: 0,
                probe_successes: 0,
                generation: 0,
                stats: ReportStats::default(),
            }),
            name,
            config,
            events,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Latency above which a successful call is reported as slow.
    pub fn slow_call_threshold(&self) -> Duration {
        self.config.slow_call_threshold()
    }

    pub fn state(&self) -> BreakerState {
        self.lock().state
    }

    /// Ask whether a call may be attempted now.
    ///
    /// In Half-Open each granted permit consumes one unit of the probe quota.
    pub fn permit(&self) -> Option<Permit<'_>> {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::Closed => Some(Permit::new(self, inner.generation, false)),
            BreakerState::Open => {
                if inner.opened_at.elapsed() >= self.config.open_duration() {
                    self.transition(&mut inner, BreakerState::HalfOpen);
                    self.take_probe(&mut inner)
                } else {
                    inner.stats.rejected += 1;
                    None
                }
            }
            BreakerState::HalfOpen => self.take_probe(&mut inner),
        }
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        BreakerSnapshot {
            name: self.name.clone(),
            state: inner.state,
            failure_rate: inner.window.failure_rate(),
            buffered_calls: inner.window.len(),
            window_size: inner.window.capacity,
            probes_remaining: inner.probes_remaining,
            stats: inner.stats,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Every critical section leaves Inner consistent, so a poisoned lock is still usable.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn take_probe(&self, inner: &mut Inner) -> Option<Permit<'_>> {
        if inner.probes_remaining > 0 {
            inner.probes_remaining -= 1;
            Some(Permit::new(self, inner.generation, true))
        } else {
            inner.stats.rejected += 1;
            None
        }
    }

    fn record(&self, outcome: Outcome, generation: u64, probe: bool) {
        let mut inner = self.lock();
        match outcome {
            Outcome::Success => inner.stats.successes += 1,
            Outcome::Failure => inner.stats.failures += 1,
            Outcome::Slow => inner.stats.slow += 1,
        }

        match inner.state {
            BreakerState::Closed => {
                inner.window.push(outcome);
                if inner.window.len() >= self.config.minimum_calls
                    && inner.window.failure_rate() >= self.config.failure_rate_threshold
                {
                    self.transition(&mut inner, BreakerState::Open);
                }
            }
            BreakerState::HalfOpen if probe && generation == inner.generation => {
                if outcome.is_failure() {
                    self.transition(&mut inner, BreakerState::Open);
                } else {
                    inner.probe_successes += 1;
                    if inner.probe_successes >= self.config.half_open_probes {
                        self.transition(&mut inner, BreakerState::Closed);
                    }
                }
            }
            BreakerState::HalfOpen | BreakerState::Open => {
                tracing::debug!(
                    breaker = %self.name,
                    state = inner.state.as_str(),
                    outcome = ?outcome,
                    "Outcome of a call admitted before this period, state unchanged"
                );
            }
        }
    }

    fn release(&self, generation: u64, probe: bool) {
        let mut inner = self.lock();
        inner.stats.cancelled += 1;
        if probe && inner.state == BreakerState::HalfOpen && generation == inner.generation {
            inner.probes_remaining += 1;
            tracing::debug!(
                breaker = %self.name,
                probes_remaining = inner.probes_remaining,
                "Probe cancelled, slot returned"
            );
        }
    }

    fn transition(&self, inner: &mut Inner, to: BreakerState) {
        let from = inner.state;
        inner.state = to;
        inner.generation += 1;
        match to {
            BreakerState::Open => {
                inner.opened_at = Instant::now();
                inner.probes_remaining = 0;
            }
            BreakerState::HalfOpen => {
                inner.probes_remaining = self.config.half_open_probes;
                inner.probe_successes = 0;
            }
            BreakerState::Closed => {
                inner.window.clear();
                inner.probes_remaining = 0;
            }
        }

        tracing::warn!(
            breaker = %self.name,
            from = from.as_str(),
            to = to.as_str(),
            failure_rate = inner.window.failure_rate(),
            "Circuit breaker state transition"
        );
        metrics::record_breaker_state(&self.name, to.as_str());
        metrics::record_breaker_transition(&self.name, from.as_str(), to.as_str());
        self.events.publish(ResilienceEvent::BreakerTransition {
            dependency: self.name.clone(),
            from,
            to,
            at: SystemTime::now(),
        });
    }
}

/// Admission of one call. Report its outcome with [`Permit::on_success`],
/// [`Permit::on_failure`] or [`Permit::on_slow`]; dropping it unreported
/// releases a probe slot instead.
#[must_use = "an unreported permit counts as a cancelled call"]
#[derive(Debug)]
pub struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    probe: bool,
    reported: bool,
}

impl<'a> Permit<'a> {
    fn new(breaker: &'a CircuitBreaker, generation: u64, probe: bool) -> Self {
        Self {
            breaker,
            generation,
            probe,
            reported: false,
        }
    }

    /// Whether this call was admitted as a Half-Open probe.
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    pub fn on_success(self) {
        self.report(Outcome::Success);
    }

    pub fn on_failure(self) {
        self.report(Outcome::Failure);
    }

    pub fn on_slow(self) {
        self.report(Outcome::Slow);
    }

    fn report(mut self, outcome: Outcome) {
        self.reported = true;
        self.breaker.record(outcome, self.generation, self.probe);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.reported {
            self.breaker.release(self.generation, self.probe);
        }
    }
}
