//! Result types and error taxonomy for guarded remote calls.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Failure reported by a dependency for a single attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DependencyError {
    /// The dependency answered with a non-success status.
    #[error("dependency responded with status {0}")]
    Status(u16),

    /// Connection or transport failure before a response arrived.
    #[error("transport error: {0}")]
    Transport(String),

    /// A response arrived but its body could not be decoded.
    #[error("malformed response: {0}")]
    Decode(String),
}

/// Terminal reason a guarded call did not produce a genuine result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// The dependency responded with a failure on the last attempt.
    #[error("dependency error: {0}")]
    Dependency(#[from] DependencyError),

    /// No response arrived before the deadline.
    #[error("dependency timed out after {0:?}")]
    DependencyTimeout(Duration),

    /// The circuit breaker rejected the call before it was attempted.
    #[error("circuit open")]
    CircuitOpen,

    /// The fallback could not produce a placeholder either.
    #[error("fallback unavailable: {0}")]
    FallbackUnavailable(String),
}

impl CallError {
    /// Stable label for logs, metrics and events.
    pub fn reason(&self) -> &'static str {
        match self {
            CallError::Dependency(_) => "dependency-error",
            CallError::DependencyTimeout(_) => "timed-out",
            CallError::CircuitOpen => "circuit-open",
            CallError::FallbackUnavailable(_) => "fallback-unavailable",
        }
    }
}

/// How trustworthy a [`RemoteResult`] payload is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DegradationLevel {
    /// Genuine response from the dependency.
    Ok,
    /// Fallback substitute; the dependency was rejected or failed.
    Degraded,
    /// Neither a genuine response nor a substitute exists.
    Unavailable,
}

impl DegradationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DegradationLevel::Ok => "ok",
            DegradationLevel::Degraded => "degraded",
            DegradationLevel::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for DegradationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value handed back to callers of the orchestrator.
///
/// Callers branch on [`level`](Self::level), never on payload contents.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteResult<T> {
    pub payload: Option<T>,
    pub level: DegradationLevel,
    /// Why the genuine result is missing; `None` when `level` is `Ok`.
    pub reason: Option<CallError>,
    /// Dependency attempts made while producing this result.
    pub attempts: u32,
}

impl<T> RemoteResult<T> {
    pub fn ok(payload: T, attempts: u32) -> Self {
        Self {
            payload: Some(payload),
            level: DegradationLevel::Ok,
            reason: None,
            attempts,
        }
    }

    pub fn degraded(payload: T, reason: CallError) -> Self {
        Self {
            payload: Some(payload),
            level: DegradationLevel::Degraded,
            reason: Some(reason),
            attempts: 0,
        }
    }

    pub fn unavailable(reason: CallError) -> Self {
        Self {
            payload: None,
            level: DegradationLevel::Unavailable,
            reason: Some(reason),
            attempts: 0,
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn is_ok(&self) -> bool {
        self.level == DegradationLevel::Ok
    }

    pub fn is_degraded(&self) -> bool {
        self.level == DegradationLevel::Degraded
    }

    pub fn is_unavailable(&self) -> bool {
        self.level == DegradationLevel::Unavailable
    }
}

/// Classification of one finished attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    /// Succeeded, but slower than the breaker's slow-call threshold.
    Slow,
    Error(DependencyError),
    TimedOut,
}

impl AttemptOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptOutcome::Success => "success",
            AttemptOutcome::Slow => "slow",
            AttemptOutcome::Error(_) => "error",
            AttemptOutcome::TimedOut => "timed-out",
        }
    }

    /// Whether the payload was obtained.
    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Success | AttemptOutcome::Slow)
    }
}

/// One execution against the dependency. Lives only for one orchestrated call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallAttempt {
    /// 1-based attempt number.
    pub number: u32,
    pub elapsed: Duration,
    pub outcome: AttemptOutcome,
}
