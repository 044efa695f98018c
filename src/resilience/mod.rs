//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to a dependency:
//!     → orchestrator.rs (single entry point, never fails)
//!     → circuit_breaker.rs (permit check, outcome window, state transitions)
//!     → retries.rs (attempt loop, reports each attempt to the breaker)
//!         → timeouts.rs (per-attempt limit inside the total budget)
//!         → backoff.rs (jittered delay between attempts)
//!     → fallback.rs (substitute result when no genuine one exists)
//!     → events.rs (transition / attempt / fallback notifications)
//! ```
//!
//! # Design Decisions
//! - Composition is explicit: permit → execute → report → fallback
//! - Degradation is a tag on the result, never inferred from payload contents
//! - Timeouts are non-negotiable; every attempt has a deadline
//! - A breaker rejection is never reported back as a failure

pub mod backoff;
pub mod circuit_breaker;
pub mod events;
pub mod fallback;
pub mod orchestrator;
pub mod retries;
pub mod timeouts;
pub mod types;

pub use circuit_breaker::{BreakerSnapshot, BreakerState, CircuitBreaker, Permit, ReportStats};
pub use events::{EventBus, ResilienceEvent};
pub use fallback::{FallbackResolver, PlaceholderUserFallback};
pub use orchestrator::{CallOrchestrator, Dependency};
pub use retries::{Execution, RetryExecutor, RetryPolicy};
pub use types::{
    AttemptOutcome, CallAttempt, CallError, DegradationLevel, DependencyError, RemoteResult,
};
