//! Domain event system — observability without coupling.
//!
//! The agent publishes events as a run progresses. Callers that own audit
//! logging or metrics subscribe; the core itself never persists anything.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::intent::Intent;
use crate::observation::ToolErrorCause;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A run was accepted and its goal understood
    RunStarted {
        run_id: String,
        intent: Intent,
        requires_real_time_data: bool,
        timestamp: DateTime<Utc>,
    },

    /// The reasoning step produced a thought
    ReasoningStep {
        run_id: String,
        iteration: u32,
        proposed: Option<Intent>,
        timestamp: DateTime<Utc>,
    },

    /// A tool was dispatched
    ToolDispatched {
        run_id: String,
        intent: Intent,
        attempt: u32,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// Self-correction chose a retry, repair, or escalation
    SelfCorrection {
        run_id: String,
        intent: Intent,
        cause: ToolErrorCause,
        decision: String,
        timestamp: DateTime<Utc>,
    },

    /// A run reached a terminal state
    RunFinished {
        run_id: String,
        iterations: u32,
        used_fallback: bool,
        fallback_reason: Option<String>,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
