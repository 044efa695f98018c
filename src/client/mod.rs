//! Outbound clients for dependent services.
//!
//! Clients only translate transport results into [`DependencyError`]s; retry,
//! timeout and breaker policy live in `resilience`.
//!
//! [`DependencyError`]: crate::resilience::DependencyError

pub mod users;

pub use users::{ClientError, HttpUserClient, UserId, UserRecord};
