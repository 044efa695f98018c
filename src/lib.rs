//! Order service with a resilient user-service client.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http (axum, request ID, trace, timeout)
//!                         │
//!                         ▼
//!                     orders (validate, look up user, persist)
//!                         │
//!                         ▼
//!                     resilience::CallOrchestrator
//!                         ├─ circuit_breaker  permit / report / transitions
//!                         ├─ retries          attempts, backoff, deadline
//!                         └─ fallback         placeholder user
//!                         │
//!                         ▼
//!                     client::users (reqwest) ─────▶ User Service
//!
//!     Cross-cutting: config, observability (tracing, metrics), lifecycle
//! ```

// Core subsystems
pub mod client;
pub mod config;
pub mod http;
pub mod orders;
pub mod resilience;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
