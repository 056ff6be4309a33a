use std::sync::Arc;

use noteflow_engine::{WorkflowCatalog, WorkflowEngine};

/// Shared application state for axum handlers.
pub struct AppState {
    pub engine: Arc<WorkflowEngine>,
    pub catalog: Arc<WorkflowCatalog>,
}
