use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, warn};

use noteflow_core::error::{ModelError, ModelErrorKind, NoteflowError};
use noteflow_core::state::{NodeResult, StageOutput, StateDelta};
use noteflow_core::types::Completion;

use crate::stage::{Stage, StageInput};

/// Everything one node execution hands back to the engine.
#[derive(Debug, Clone)]
pub struct NodeRun {
    /// The write for the node's owned field; empty on failure.
    pub delta: Option<StateDelta>,
    pub result: NodeResult,
    pub warnings: Vec<String>,
}

/// Uniform execution shell for one node: timing, timeout, failure
/// isolation, result recording.
///
/// This is the single place where lower-level failures are converted into
/// data; nothing escapes a node run as an error.
pub struct NodeRunner {
    stage: Arc<dyn Stage>,
    timeout: Duration,
}

impl NodeRunner {
    pub fn new(stage: Arc<dyn Stage>, timeout: Duration) -> Self {
        Self { stage, timeout }
    }

    pub async fn run(&self, input: StageInput) -> NodeRun {
        let name = self.stage.name().to_string();
        let started = Instant::now();

        let outcome = tokio::time::timeout(self.timeout, self.stage.execute(&input)).await;
        let elapsed = started.elapsed().as_secs_f64();

        match outcome {
            // Expiry is indistinguishable from the model reporting a
            // timeout itself.
            Err(_) => {
                let e = ModelError::timeout(format!(
                    "node exceeded {}s",
                    self.timeout.as_secs()
                ));
                self.failure(name, NoteflowError::Model(e), elapsed)
            }
            Ok(Ok(completion)) => self.success(name, completion, elapsed),
            Ok(Err(NoteflowError::Model(e)))
                if e.kind == ModelErrorKind::MalformedResponse && e.raw.is_some() =>
            {
                self.recover_malformed(name, e, elapsed)
            }
            Ok(Err(e)) => self.failure(name, e, elapsed),
        }
    }

    fn success(&self, name: String, completion: Completion, elapsed: f64) -> NodeRun {
        let output = StageOutput::from_model_text(&completion.text);
        let confidence = completion
            .confidence
            .unwrap_or_else(|| self.stage.base_confidence());
        NodeRun {
            delta: Some(StateDelta::new(self.stage.writes(), output.clone())),
            result: NodeResult::success(name, output, confidence, elapsed),
            warnings: Vec::new(),
        }
    }

    fn failure(&self, name: String, e: NoteflowError, elapsed: f64) -> NodeRun {
        error!(node = %name, error = %e, "Node failed");
        let failure = NoteflowError::NodeExecution {
            node: name.clone(),
            message: e.to_string(),
        };
        NodeRun {
            delta: None,
            result: NodeResult::failure(name, failure.to_string(), elapsed),
            warnings: Vec::new(),
        }
    }

    /// An unparseable model payload still carries the raw text; keep it
    /// at reduced confidence instead of failing the node.
    fn recover_malformed(&self, name: String, e: ModelError, elapsed: f64) -> NodeRun {
        let raw = e.raw.unwrap_or_default();
        warn!(node = %name, "Malformed model payload, keeping raw text");

        let output = StageOutput::Text(raw);
        let confidence = self.stage.base_confidence() * 0.5;
        let warning = format!("{}: malformed model payload, kept raw text", name);
        NodeRun {
            delta: Some(StateDelta::new(self.stage.writes(), output.clone())),
            result: NodeResult::success(name, output, confidence, elapsed),
            warnings: vec![warning],
        }
    }
}
