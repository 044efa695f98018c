//! Fire-and-forget resilience events for monitoring.
//!
//! Publishing never blocks: events go to a bounded broadcast channel, a send
//! with no subscribers is dropped, and a subscriber that falls behind loses
//! the oldest events (`RecvError::Lagged`) instead of stalling the sender.

use std::time::SystemTime;

use tokio::sync::broadcast;

use crate::resilience::circuit_breaker::BreakerState;
use crate::resilience::types::{CallAttempt, CallError, DegradationLevel};

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub enum ResilienceEvent {
    BreakerTransition {
        dependency: String,
        from: BreakerState,
        to: BreakerState,
        at: SystemTime,
    },
    AttemptCompleted {
        dependency: String,
        attempt: CallAttempt,
    },
    FallbackActivated {
        dependency: String,
        id: String,
        reason: CallError,
        level: DegradationLevel,
    },
}

/// Cloneable handle to the event channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ResilienceEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ResilienceEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: ResilienceEvent) {
        // Err only means nobody is listening.
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
