//! Request-side middleware.
//!
//! # Responsibilities
//! - Name the correlation header and read it back for spans
//! - Record per-request metrics
//!
//! The request ID itself is generated by `tower_http::request_id` (UUID v4)
//! before any handler runs, so every log line inside a request carries it.

use std::time::Instant;

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderName},
    middleware::Next,
    response::Response,
};

use crate::observability::metrics;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// The request's correlation ID, or `"unknown"` if the header is missing.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Record count and latency of every request by method and final status.
pub async fn track_metrics(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();

    let response = next.run(request).await;

    metrics::record_request(method.as_str(), response.status().as_u16(), start);
    response
}
