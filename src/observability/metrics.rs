//! Metrics collection and exposition.
//!
//! # Metrics
//! - `order_service_requests_total` (counter): inbound requests by method, status
//! - `order_service_request_duration_seconds` (histogram): inbound latency
//! - `dependency_attempts_total` (counter): attempts by dependency, outcome
//! - `dependency_attempt_duration_seconds` (histogram): attempt latency
//! - `circuit_breaker_state` (gauge): 0=closed, 1=open, 2=half_open
//! - `circuit_breaker_transitions_total` (counter): transitions by from, to
//! - `fallback_activations_total` (counter): fallbacks by dependency, level
//! - `orders_created_total` (counter): created orders by validation status

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "order_service_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("order_service_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_attempt(dependency: &str, outcome: &'static str, elapsed: Duration) {
    counter!(
        "dependency_attempts_total",
        "dependency" => dependency.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("dependency_attempt_duration_seconds", "dependency" => dependency.to_string())
        .record(elapsed.as_secs_f64());
}

pub fn record_breaker_state(dependency: &str, state: &'static str) {
    let value = match state {
        "open" => 1.0,
        "half_open" => 2.0,
        _ => 0.0,
    };
    gauge!("circuit_breaker_state", "dependency" => dependency.to_string()).set(value);
}

pub fn record_breaker_transition(dependency: &str, from: &'static str, to: &'static str) {
    counter!(
        "circuit_breaker_transitions_total",
        "dependency" => dependency.to_string(),
        "from" => from,
        "to" => to
    )
    .increment(1);
}

pub fn record_fallback(dependency: &str, level: &'static str) {
    counter!(
        "fallback_activations_total",
        "dependency" => dependency.to_string(),
        "level" => level
    )
    .increment(1);
}

pub fn record_order_created(validation: &'static str) {
    counter!("orders_created_total", "validation" => validation).increment(1);
}
