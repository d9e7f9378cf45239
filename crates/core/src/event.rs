//! Loop event system — the observability port of the control loop.
//!
//! The loop publishes an event at each phase boundary. Subscribers (CLI
//! progress output, test probes) react without the loop knowing about them.
//! Publishing with no subscribers is a no-op, so a run behaves identically
//! with or without a bus attached.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All events emitted by a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LoopEvent {
    /// A new step began
    StepStarted {
        run_id: String,
        step: u32,
        timestamp: DateTime<Utc>,
    },

    /// Reason produced its assessment (or a failure placeholder)
    Reasoned {
        step: u32,
        degraded: bool,
        timestamp: DateTime<Utc>,
    },

    /// Decide produced a decision
    Decided {
        step: u32,
        next_action: String,
        capability_id: String,
        confidence: f64,
        should_stop: bool,
        should_revise: bool,
        timestamp: DateTime<Utc>,
    },

    /// Act invoked a capability
    CapabilityInvoked {
        step: u32,
        capability_id: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// Reflect produced its critique
    Reflected {
        step: u32,
        confidence: f64,
        should_revise: bool,
        timestamp: DateTime<Utc>,
    },

    /// The stop policy refused a stop request
    StopRejected {
        step: u32,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// The run reached a terminal state
    Finished {
        run_id: String,
        state: String,
        steps: u32,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for loop events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<LoopEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: LoopEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<LoopEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
