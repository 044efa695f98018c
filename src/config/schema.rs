//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the order service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Downstream user service.
    pub user_service: UserServiceConfig,

    /// Circuit breaker guarding the user service.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Retry configuration.
    pub retries: RetryConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Fallback placeholder settings.
    pub fallback: FallbackConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// User service endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UserServiceConfig {
    /// Base URL, e.g. "http://localhost:8081". Users live under `/api/users/{id}`.
    pub base_url: String,

    /// TCP connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for UserServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8081".to_string(),
            connect_timeout_ms: 1000,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failure ratio (failures + slow calls) that opens the circuit, in (0, 1].
    pub failure_rate_threshold: f64,

    /// Number of most recent outcomes kept in the sliding window.
    pub window_size: usize,

    /// Outcomes required in the window before the ratio is evaluated.
    pub minimum_calls: usize,

    /// Cool-down spent in Open before probing, in milliseconds.
    pub open_duration_ms: u64,

    /// Probe calls admitted in Half-Open; the same number of successes closes the circuit.
    pub half_open_probes: u32,

    /// Calls slower than this count as failures, in milliseconds.
    pub slow_call_threshold_ms: u64,
}

impl CircuitBreakerConfig {
    pub fn open_duration(&self) -> Duration {
        Duration::from_millis(self.open_duration_ms)
    }

    pub fn slow_call_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_call_threshold_ms)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_rate_threshold: 0.5,
            window_size: 10,
            minimum_calls: 5,
            open_duration_ms: 10_000,
            half_open_probes: 3,
            slow_call_threshold_ms: 2000,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts per call, including the first.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Upper bound of the random jitter, as a fraction of the delay.
    pub jitter_ratio: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 1000,
            jitter_ratio: 0.1,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Per-attempt timeout for the user service in milliseconds.
    pub attempt_ms: u64,

    /// Total budget for one lookup (all attempts and backoff) in milliseconds.
    pub total_budget_ms: u64,

    /// Inbound request timeout in seconds.
    pub request_secs: u64,
}

impl TimeoutConfig {
    pub fn attempt(&self) -> Duration {
        Duration::from_millis(self.attempt_ms)
    }

    pub fn total_budget(&self) -> Duration {
        Duration::from_millis(self.total_budget_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            attempt_ms: 2000,
            total_budget_ms: 5000,
            request_secs: 30,
        }
    }
}

/// Fallback placeholder configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// When false, lookups that fail resolve to UNAVAILABLE.
    pub enabled: bool,

    /// Display name given to placeholder users.
    pub placeholder_name: String,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            placeholder_name: "Unknown User (Service Unavailable)".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log format ("pretty" or "json").
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
