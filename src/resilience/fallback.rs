//! Fallback resolution for calls that could not reach the dependency.
//!
//! A resolver must be pure and must not do blocking I/O: it runs exactly when
//! the real dependency is unreachable. A resolver that cannot build a
//! substitute returns `UNAVAILABLE` with no payload.

use crate::client::{UserId, UserRecord};
use crate::config::FallbackConfig;
use crate::resilience::types::{CallError, RemoteResult};

pub trait FallbackResolver<Id, T>: Send + Sync {
    /// Produce a substitute for `id` after `reason` prevented a genuine result.
    fn resolve(&self, id: &Id, reason: CallError) -> RemoteResult<T>;
}

/// Resolves failed user lookups to a placeholder user carrying the requested id.
#[derive(Debug, Clone)]
pub struct PlaceholderUserFallback {
    placeholder_name: Option<String>,
}

impl PlaceholderUserFallback {
    pub fn new(placeholder_name: impl Into<String>) -> Self {
        Self {
            placeholder_name: Some(placeholder_name.into()),
        }
    }

    /// A resolver that never produces a placeholder.
    pub fn disabled() -> Self {
        Self {
            placeholder_name: None,
        }
    }

    pub fn from_config(config: &FallbackConfig) -> Self {
        if config.enabled {
            Self::new(config.placeholder_name.clone())
        } else {
            Self::disabled()
        }
    }
}

impl FallbackResolver<UserId, UserRecord> for PlaceholderUserFallback {
    fn resolve(&self, id: &UserId, reason: CallError) -> RemoteResult<UserRecord> {
        match self.placeholder_name.as_deref() {
            Some(name) if !name.trim().is_empty() => RemoteResult::degraded(
                UserRecord {
                    id: *id,
                    name: name.to_string(),
                    email: None,
                },
                reason,
            ),
            Some(_) => RemoteResult::unavailable(CallError::FallbackUnavailable(format!(
                "placeholder name is empty (after {})",
                reason.reason()
            ))),
            None => RemoteResult::unavailable(CallError::FallbackUnavailable(format!(
                "fallback disabled (after {})",
                reason.reason()
            ))),
        }
    }
}
