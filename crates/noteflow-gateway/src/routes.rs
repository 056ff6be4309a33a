use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use tracing::info;

use noteflow_core::state::WorkflowState;
use noteflow_core::types::{NoteRequest, SessionId, Topology, WorkflowResponse};
use noteflow_engine::{build_response, WorkflowDefinition};

use crate::state::AppState;

// GET /api/health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// GET /api/workflows
pub async fn workflow_info(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let describe = |definition: &WorkflowDefinition| {
        serde_json::json!({
            "nodes": definition.node_names(),
            "finish_nodes": definition.finish_nodes(),
        })
    };

    Json(serde_json::json!({
        "workflows": {
            "linear": describe(state.catalog.get(Topology::Linear)),
            "branching": describe(state.catalog.get(Topology::Branching)),
        }
    }))
}

// POST /api/notes/process
//
// Engine-level failures are data, not transport errors: the response is
// always 200 with `success` and `errors` describing what happened.
pub async fn process_note(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NoteRequest>,
) -> Result<Json<WorkflowResponse>, StatusCode> {
    if body.note.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let session_id = body
        .session_id
        .map(SessionId::from_string)
        .unwrap_or_default();
    info!(
        session_id = %session_id,
        topology = %body.topology,
        note_chars = body.note.len(),
        "Processing note"
    );

    let definition = state.catalog.get(body.topology);
    let workflow_state = WorkflowState::new(session_id, body.note);
    let final_state = state.engine.run(definition, workflow_state).await;

    Ok(Json(build_response(final_state, definition)))
}
