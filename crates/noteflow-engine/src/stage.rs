use std::collections::HashMap;

use futures::future::BoxFuture;

use noteflow_core::error::{NoteflowError, Result};
use noteflow_core::state::{StateField, WorkflowState};
use noteflow_core::types::Completion;

/// Read-only projection of the state fields one stage declares as inputs.
///
/// Built at schedule time. A declared field whose producer failed is
/// simply absent; the stage decides how to cope with that.
#[derive(Debug, Clone, Default)]
pub struct StageInput {
    fields: HashMap<StateField, String>,
}

impl StageInput {
    /// Project `reads` out of the state, rendering each present field to
    /// prompt text.
    pub fn project(state: &WorkflowState, reads: &[StateField]) -> Self {
        let mut fields = HashMap::new();
        for &field in reads {
            let text = match field {
                StateField::Note => Some(state.note.clone()),
                other => state.field(other).map(|o| o.to_prompt_text()),
            };
            if let Some(text) = text {
                fields.insert(field, text);
            }
        }
        Self { fields }
    }

    pub fn get(&self, field: StateField) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    /// Fetch a field the stage cannot work without.
    pub fn require(&self, field: StateField) -> Result<&str> {
        self.get(field).ok_or(NoteflowError::MissingInput(field))
    }

    /// Context map for the model call, keyed by field name.
    pub fn to_context(&self) -> HashMap<String, String> {
        self.fields
            .iter()
            .map(|(field, text)| (field.to_string(), text.clone()))
            .collect()
    }

    /// JSON rendering for the telemetry boundary.
    pub fn to_trace_value(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .fields
            .iter()
            .map(|(field, text)| (field.to_string(), serde_json::Value::String(text.clone())))
            .collect();
        serde_json::Value::Object(map)
    }
}

/// One analysis stage: consumes a declared subset of the workflow state
/// and produces a completion for the single field it owns.
///
/// Implementations are always invoked when their node becomes reachable,
/// even if a declared input is unset because a predecessor failed;
/// detecting the missing input (via `StageInput::require`) and failing
/// gracefully is the implementation's own responsibility.
pub trait Stage: Send + Sync + 'static {
    /// Node name inside a workflow definition.
    fn name(&self) -> &str;

    /// Role handed to the language model.
    fn role(&self) -> &str;

    /// State fields this stage reads.
    fn reads(&self) -> &[StateField];

    /// The single state field this stage writes.
    fn writes(&self) -> StateField;

    /// Nominal confidence when the model does not score itself.
    fn base_confidence(&self) -> f64 {
        0.8
    }

    fn execute<'a>(&'a self, input: &'a StageInput) -> BoxFuture<'a, Result<Completion>>;
}
