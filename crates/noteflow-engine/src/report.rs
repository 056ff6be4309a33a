use chrono::Utc;

use noteflow_core::state::WorkflowState;
use noteflow_core::types::WorkflowResponse;

use crate::graph::definition::WorkflowDefinition;

/// Assemble the caller-facing response from a finalized run.
///
/// `success` is false only when no finish node produced a usable output —
/// partial results alongside a populated `errors` list are normal and
/// expected.
pub fn build_response(
    state: WorkflowState,
    definition: &WorkflowDefinition,
) -> WorkflowResponse {
    let success = definition.finish_nodes().iter().any(|name| {
        definition
            .node(name)
            .is_some_and(|spec| state.field(spec.stage.writes()).is_some())
    });

    WorkflowResponse {
        session_id: state.session_id,
        success,
        report: state.report,
        risk_assessment: state.risk_assessment,
        treatment_plan: state.treatment_plan,
        agent_results: state.agent_results,
        errors: state.errors,
        warnings: state.warnings,
        processing_time_secs: state.processing_time_secs.unwrap_or(0.0),
        timestamp: state.timestamp.unwrap_or_else(Utc::now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use futures::future::BoxFuture;
    use noteflow_core::error::Result;
    use noteflow_core::state::{StageOutput, StateDelta, StateField};
    use noteflow_core::types::{Completion, SessionId};

    use crate::stage::{Stage, StageInput};
    use crate::WorkflowDefinition as Def;

    struct FieldStage {
        name: &'static str,
        writes: StateField,
    }

    impl Stage for FieldStage {
        fn name(&self) -> &str {
            self.name
        }

        fn role(&self) -> &str {
            self.name
        }

        fn reads(&self) -> &[StateField] {
            &[]
        }

        fn writes(&self) -> StateField {
            self.writes
        }

        fn execute<'a>(&'a self, _input: &'a StageInput) -> BoxFuture<'a, Result<Completion>> {
            Box::pin(async { Ok(Completion::new("ok")) })
        }
    }

    fn two_finish_definition() -> Def {
        Def::builder("pair")
            .node(Arc::new(FieldStage {
                name: "a",
                writes: StateField::Data,
            }))
            .node(Arc::new(FieldStage {
                name: "b",
                writes: StateField::Report,
            }))
            .node(Arc::new(FieldStage {
                name: "c",
                writes: StateField::TreatmentPlan,
            }))
            .edge("a", "b")
            .edge("a", "c")
            .finish("b")
            .finish("c")
            .build()
            .unwrap()
    }

    #[test]
    fn test_success_with_one_usable_finish_node() {
        let definition = two_finish_definition();
        let mut state = WorkflowState::new(SessionId::new(), "note");
        state.apply(StateDelta::new(
            StateField::Report,
            StageOutput::Text("report".into()),
        ));
        state.errors.push("c failed: transport error: boom".into());

        let response = build_response(state, &definition);
        assert!(response.success);
        assert_eq!(response.errors.len(), 1);
        assert!(response.treatment_plan.is_none());
    }

    #[test]
    fn test_failure_when_no_finish_node_produced_output() {
        let definition = two_finish_definition();
        let mut state = WorkflowState::new(SessionId::new(), "note");
        // Only the intermediate node produced anything.
        state.apply(StateDelta::new(
            StateField::Data,
            StageOutput::Text("parsed".into()),
        ));

        let response = build_response(state, &definition);
        assert!(!response.success);
    }
}
