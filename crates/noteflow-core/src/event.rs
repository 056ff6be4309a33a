use crate::state::NodeResult;
use crate::types::{NodeTrace, SessionId};

/// Engine lifecycle and telemetry events.
#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    /// A workflow run started.
    RunStarted {
        session_id: SessionId,
        workflow: String,
    },
    /// A node was scheduled and began executing.
    NodeStarted {
        session_id: SessionId,
        node: String,
    },
    /// A node finished (successfully or not).
    NodeCompleted {
        session_id: SessionId,
        result: NodeResult,
    },
    /// Telemetry record for downstream storage.
    NodeTraced(NodeTrace),
    /// The run reached all finish nodes (or was cancelled).
    RunCompleted {
        session_id: SessionId,
        succeeded_nodes: usize,
        failed_nodes: usize,
        processing_time_secs: f64,
    },
}

/// Event bus using tokio broadcast channel.
/// All subscribers receive all events.
pub struct EventBus {
    tx: tokio::sync::broadcast::Sender<WorkflowEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = tokio::sync::broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: WorkflowEvent) {
        // Ignore error if no receivers
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<WorkflowEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
