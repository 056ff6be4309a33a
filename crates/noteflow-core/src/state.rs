use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::SessionId;

/// A field of the workflow state that stages read from and write to.
///
/// `Note` is the immutable run input; the remaining fields are each owned
/// by exactly one node of a workflow definition, which is what lets
/// sibling branches run concurrently without write races.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateField {
    Note,
    Data,
    ValidatedData,
    Report,
    RiskAssessment,
    TreatmentPlan,
}

impl StateField {
    /// Whether a node may declare a write to this field.
    pub fn is_writable(&self) -> bool {
        !matches!(self, Self::Note)
    }
}

impl std::fmt::Display for StateField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Note => "note",
            Self::Data => "data",
            Self::ValidatedData => "validated_data",
            Self::Report => "report",
            Self::RiskAssessment => "risk_assessment",
            Self::TreatmentPlan => "treatment_plan",
        };
        write!(f, "{}", s)
    }
}

/// Output produced by one stage.
///
/// Models are asked for JSON; when the payload parses as an object or
/// array it is kept structured, otherwise the raw text is kept as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StageOutput {
    Text(String),
    Structured(serde_json::Value),
}

impl StageOutput {
    /// Classify a model completion as structured or plain text.
    pub fn from_model_text(text: &str) -> Self {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(text.trim()) {
            if value.is_object() || value.is_array() {
                return Self::Structured(value);
            }
        }
        Self::Text(text.to_string())
    }

    /// Render this output for interpolation into a downstream prompt.
    pub fn to_prompt_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Structured(v) => v.to_string(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            Self::Structured(_) => None,
        }
    }
}

/// A single-field write produced by one node run.
///
/// Deltas from nodes with disjoint declared writes commute: applying them
/// in either order yields the same state.
#[derive(Debug, Clone, PartialEq)]
pub struct StateDelta {
    pub field: StateField,
    pub value: StageOutput,
}

impl StateDelta {
    pub fn new(field: StateField, value: StageOutput) -> Self {
        Self { field, value }
    }
}

/// Result of one node execution, recorded in completion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeResult {
    pub agent_name: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<StageOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub processing_time_secs: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,
}

impl NodeResult {
    pub fn success(
        agent_name: impl Into<String>,
        output: StageOutput,
        confidence_score: f64,
        processing_time_secs: f64,
    ) -> Self {
        Self {
            agent_name: agent_name.into(),
            success: true,
            output: Some(output),
            error: None,
            processing_time_secs,
            confidence_score: Some(confidence_score),
        }
    }

    pub fn failure(
        agent_name: impl Into<String>,
        error: impl Into<String>,
        processing_time_secs: f64,
    ) -> Self {
        Self {
            agent_name: agent_name.into(),
            success: false,
            output: None,
            error: Some(error.into()),
            processing_time_secs,
            confidence_score: None,
        }
    }
}

/// The mutable record threaded through one workflow run.
///
/// Exclusively owned by that run: the engine takes it by value and hands
/// it back finalized, so concurrent runs never share state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    pub note: String,
    pub session_id: SessionId,

    pub data: Option<StageOutput>,
    pub validated_data: Option<StageOutput>,
    pub report: Option<StageOutput>,
    pub risk_assessment: Option<StageOutput>,
    pub treatment_plan: Option<StageOutput>,

    /// Failure messages, in completion order of the failing nodes.
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Per-node results, in completion order.
    pub agent_results: Vec<NodeResult>,

    /// Set once at finalization.
    pub timestamp: Option<DateTime<Utc>>,
    pub processing_time_secs: Option<f64>,
}

impl WorkflowState {
    pub fn new(session_id: SessionId, note: impl Into<String>) -> Self {
        Self {
            note: note.into(),
            session_id,
            data: None,
            validated_data: None,
            report: None,
            risk_assessment: None,
            treatment_plan: None,
            errors: Vec::new(),
            warnings: Vec::new(),
            agent_results: Vec::new(),
            timestamp: None,
            processing_time_secs: None,
        }
    }

    /// Read an output field. `Note` is not an output and yields `None`;
    /// read the `note` field directly for the run input.
    pub fn field(&self, field: StateField) -> Option<&StageOutput> {
        match field {
            StateField::Note => None,
            StateField::Data => self.data.as_ref(),
            StateField::ValidatedData => self.validated_data.as_ref(),
            StateField::Report => self.report.as_ref(),
            StateField::RiskAssessment => self.risk_assessment.as_ref(),
            StateField::TreatmentPlan => self.treatment_plan.as_ref(),
        }
    }

    /// Merge a node's write into the state.
    pub fn apply(&mut self, delta: StateDelta) {
        let slot = match delta.field {
            // Definition validation rejects note writers.
            StateField::Note => return,
            StateField::Data => &mut self.data,
            StateField::ValidatedData => &mut self.validated_data,
            StateField::Report => &mut self.report,
            StateField::RiskAssessment => &mut self.risk_assessment,
            StateField::TreatmentPlan => &mut self.treatment_plan,
        };
        *slot = Some(delta.value);
    }
}
