//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and cross-field
//! constraints. All failures are collected, not just the first.

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::ServiceConfig;

/// A single rejected configuration value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a socket address")]
    BindAddress(String),

    #[error("user_service.base_url '{0}' is not an http(s) URL")]
    BaseUrl(String),

    #[error("circuit_breaker.failure_rate_threshold must be in (0, 1], got {0}")]
    FailureRateThreshold(f64),

    #[error("circuit_breaker.window_size must be at least 1")]
    WindowSize,

    #[error("circuit_breaker.minimum_calls must be in 1..={window_size}, got {minimum_calls}")]
    MinimumCalls {
        minimum_calls: usize,
        window_size: usize,
    },

    #[error("circuit_breaker.half_open_probes must be at least 1")]
    HalfOpenProbes,

    #[error("retries.max_attempts must be at least 1")]
    MaxAttempts,

    #[error("retries.base_delay_ms ({base}) exceeds retries.max_delay_ms ({max})")]
    BackoffBounds { base: u64, max: u64 },

    #[error("retries.jitter_ratio must be in [0, 1], got {0}")]
    JitterRatio(f64),

    #[error("timeouts.{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("observability.log_format must be 'pretty' or 'json', got '{0}'")]
    LogFormat(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    match Url::parse(&config.user_service.base_url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        _ => errors.push(ValidationError::BaseUrl(config.user_service.base_url.clone())),
    }

    let cb = &config.circuit_breaker;
    if !(cb.failure_rate_threshold > 0.0 && cb.failure_rate_threshold <= 1.0) {
        errors.push(ValidationError::FailureRateThreshold(cb.failure_rate_threshold));
    }
    if cb.window_size == 0 {
        errors.push(ValidationError::WindowSize);
    }
    if cb.minimum_calls == 0 || cb.minimum_calls > cb.window_size {
        errors.push(ValidationError::MinimumCalls {
            minimum_calls: cb.minimum_calls,
            window_size: cb.window_size,
        });
    }
    if cb.half_open_probes == 0 {
        errors.push(ValidationError::HalfOpenProbes);
    }

    let retries = &config.retries;
    if retries.max_attempts == 0 {
        errors.push(ValidationError::MaxAttempts);
    }
    if retries.base_delay_ms > retries.max_delay_ms {
        errors.push(ValidationError::BackoffBounds {
            base: retries.base_delay_ms,
            max: retries.max_delay_ms,
        });
    }
    if !(0.0..=1.0).contains(&retries.jitter_ratio) {
        errors.push(ValidationError::JitterRatio(retries.jitter_ratio));
    }

    if config.timeouts.attempt_ms == 0 {
        errors.push(ValidationError::ZeroTimeout("attempt_ms"));
    }
    if config.timeouts.total_budget_ms == 0 {
        errors.push(ValidationError::ZeroTimeout("total_budget_ms"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("request_secs"));
    }

    match config.observability.log_format.as_str() {
        "pretty" | "json" => {}
        other => errors.push(ValidationError::LogFormat(other.to_string())),
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
