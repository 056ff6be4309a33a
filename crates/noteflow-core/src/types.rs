use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::NoteflowError;
use crate::state::{NodeResult, StageOutput};

/// Unique session identifier.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which canonical workflow to run a note through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    /// parse → evaluate → synthesize
    #[default]
    Linear,
    /// Adds the risk-assessment fork after evaluate.
    Branching,
}

impl std::fmt::Display for Topology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Linear => write!(f, "linear"),
            Self::Branching => write!(f, "branching"),
        }
    }
}

impl std::str::FromStr for Topology {
    type Err = NoteflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linear" => Ok(Self::Linear),
            "branching" => Ok(Self::Branching),
            other => Err(NoteflowError::Config(format!(
                "unknown topology: {}",
                other
            ))),
        }
    }
}

/// A single completion from the language model.
///
/// `confidence` is `None` when the backing model does not score itself;
/// the calling stage substitutes its own nominal confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub confidence: Option<f64>,
}

impl Completion {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            confidence: None,
        }
    }

    pub fn with_confidence(text: impl Into<String>, confidence: f64) -> Self {
        Self {
            text: text.into(),
            confidence: Some(confidence),
        }
    }
}

/// Telemetry record for one node execution.
///
/// Published fire-and-forget on the event bus; downstream storage and
/// durability are someone else's problem.
#[derive(Debug, Clone, Serialize)]
pub struct NodeTrace {
    pub session_id: SessionId,
    pub node: String,
    pub input: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<StageOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// Inbound request to process one clinical note.
#[derive(Debug, Clone, Deserialize)]
pub struct NoteRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    pub note: String,
    #[serde(default)]
    pub topology: Topology,
}

/// Caller-facing result of one workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowResponse {
    pub session_id: SessionId,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<StageOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_assessment: Option<StageOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub treatment_plan: Option<StageOutput>,
    pub agent_results: Vec<NodeResult>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub processing_time_secs: f64,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_topology_parse() {
        assert_eq!(Topology::from_str("linear").unwrap(), Topology::Linear);
        assert_eq!(
            Topology::from_str("branching").unwrap(),
            Topology::Branching
        );
        assert!(Topology::from_str("ring").is_err());
    }

    #[test]
    fn test_topology_serde() {
        let t: Topology = serde_json::from_str(r#""branching""#).unwrap();
        assert_eq!(t, Topology::Branching);
        assert_eq!(serde_json::to_string(&Topology::Linear).unwrap(), r#""linear""#);
    }

    #[test]
    fn test_note_request_defaults() {
        let req: NoteRequest =
            serde_json::from_str(r#"{"note": "45-year-old male chest pain"}"#).unwrap();
        assert_eq!(req.topology, Topology::Linear);
        assert!(req.session_id.is_none());
    }

    #[test]
    fn test_session_id_display() {
        let sid = SessionId::from_string("abc");
        assert_eq!(sid.to_string(), "abc");
        assert_ne!(SessionId::new(), SessionId::new());
    }
}
