use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use noteflow_core::config::EngineConfig;
use noteflow_core::error::ModelErrorKind;
use noteflow_core::event::{EventBus, WorkflowEvent};
use noteflow_core::state::{NodeResult, StageOutput, WorkflowState};
use noteflow_core::types::{SessionId, Topology, WorkflowResponse};
use noteflow_engine::{build_response, WorkflowCatalog, WorkflowEngine};
use noteflow_llm::{DegradedModel, DEGRADED_CONFIDENCE};
use noteflow_test_utils::{ScriptedModel, CHEST_PAIN_NOTE};

fn engine() -> WorkflowEngine {
    WorkflowEngine::new(EngineConfig::default(), Arc::new(EventBus::default()))
}

async fn run_note(model: &Arc<ScriptedModel>, topology: Topology) -> WorkflowResponse {
    let catalog = WorkflowCatalog::new(model.clone()).expect("canonical workflows validate");
    let definition = catalog.get(topology);
    let state = WorkflowState::new(SessionId::new(), CHEST_PAIN_NOTE);
    let final_state = engine().run(definition, state).await;
    build_response(final_state, definition)
}

fn result<'a>(response: &'a WorkflowResponse, node: &str) -> &'a NodeResult {
    response
        .agent_results
        .iter()
        .find(|r| r.agent_name == node)
        .unwrap_or_else(|| panic!("no result recorded for node {}", node))
}

#[tokio::test]
async fn test_linear_canned_scenario() {
    let model = Arc::new(ScriptedModel::with_clinical_defaults());
    let response = run_note(&model, Topology::Linear).await;

    assert!(response.success);
    assert!(response.errors.is_empty());
    assert_eq!(response.agent_results.len(), 3);

    // The report is exactly the canned synthesizer output.
    assert_eq!(
        response.report,
        Some(StageOutput::Structured(serde_json::json!({
            "patient_summary": "Chest pain that needs prompt evaluation.",
            "urgency": "soon"
        })))
    );
    assert!(response.risk_assessment.is_none());
    assert!(response.treatment_plan.is_none());

    // Confidence comes from each stage's nominal score.
    assert_eq!(result(&response, "parse").confidence_score, Some(0.9));
    assert_eq!(result(&response, "evaluate").confidence_score, Some(0.85));
    assert_eq!(result(&response, "synthesize").confidence_score, Some(0.9));
}

#[tokio::test]
async fn test_branching_synthesize_failure_leaves_siblings_intact() {
    let model = Arc::new(
        ScriptedModel::with_clinical_defaults().fail(
            "synthesizer",
            ModelErrorKind::Transport,
            "model unavailable",
        ),
    );
    let response = run_note(&model, Topology::Branching).await;

    assert_eq!(response.agent_results.len(), 5);
    assert_eq!(
        response.agent_results.iter().filter(|r| !r.success).count(),
        1
    );
    assert!(response.risk_assessment.is_some());
    assert!(response.treatment_plan.is_some());
    assert!(response.report.is_none());

    // plan_treatment finished with output, so the run succeeds overall.
    assert!(response.success);
    assert_eq!(
        response.errors,
        vec!["synthesize failed: transport error: model unavailable"]
    );
}

#[tokio::test]
async fn test_linear_parse_failure_still_runs_downstream() {
    let model = Arc::new(ScriptedModel::with_clinical_defaults().fail(
        "parser",
        ModelErrorKind::Transport,
        "boom",
    ));
    let response = run_note(&model, Topology::Linear).await;

    // Downstream nodes are never skipped; each fails on its own missing
    // input, in completion order behind the parse failure.
    assert_eq!(response.agent_results.len(), 3);
    assert!(!response.success);
    assert_eq!(response.errors.len(), 3);
    assert!(response.errors[0].starts_with("parse failed:"));
    assert!(response.errors[1].starts_with("evaluate failed:"));
    assert!(response.errors[2].starts_with("synthesize failed:"));

    let evaluate = result(&response, "evaluate");
    assert!(evaluate
        .error
        .as_deref()
        .unwrap()
        .contains("required input data is unavailable"));
}

#[tokio::test]
async fn test_branching_quota_on_risk_branch_only() {
    let model = Arc::new(ScriptedModel::with_clinical_defaults().fail(
        "risk_assessor",
        ModelErrorKind::QuotaExceeded,
        "monthly quota exhausted",
    ));
    let response = run_note(&model, Topology::Branching).await;

    assert_eq!(response.agent_results.len(), 5);
    assert_eq!(response.errors.len(), 2);
    assert!(response.errors[0].starts_with("assess_risk failed: quota exceeded"));
    assert!(response.errors[1]
        .starts_with("plan_treatment failed: required input risk_assessment"));

    // The synthesize branch is untouched, so the run still succeeds.
    assert!(response.success);
    assert!(response.report.is_some());
    assert!(response.risk_assessment.is_none());
    assert!(response.treatment_plan.is_none());
}

#[tokio::test]
async fn test_execution_respects_topological_order() {
    let model = Arc::new(ScriptedModel::with_clinical_defaults());
    run_note(&model, Topology::Branching).await;

    let order = model.call_order();
    assert_eq!(order.len(), 5);
    let pos = |role: &str| {
        order
            .iter()
            .position(|r| r == role)
            .unwrap_or_else(|| panic!("role {} was never called", role))
    };

    assert!(pos("parser") < pos("evaluator"));
    assert!(pos("evaluator") < pos("synthesizer"));
    assert!(pos("evaluator") < pos("risk_assessor"));
    assert!(pos("risk_assessor") < pos("treatment_planner"));
}

#[tokio::test]
async fn test_deterministic_stub_gives_idempotent_runs() {
    let model = Arc::new(ScriptedModel::with_clinical_defaults());
    let first = run_note(&model, Topology::Branching).await;
    let second = run_note(&model, Topology::Branching).await;

    let summarize = |r: &WorkflowResponse| -> Vec<(String, bool, Option<StageOutput>)> {
        r.agent_results
            .iter()
            .map(|n| (n.agent_name.clone(), n.success, n.output.clone()))
            .collect()
    };

    assert_eq!(summarize(&first), summarize(&second));
    assert_eq!(first.success, second.success);
    assert_eq!(first.report, second.report);
    assert_eq!(first.risk_assessment, second.risk_assessment);
    assert_eq!(first.treatment_plan, second.treatment_plan);
    assert_eq!(first.errors, second.errors);
    assert_eq!(first.warnings, second.warnings);
}

#[tokio::test]
async fn test_concurrent_runs_never_observe_each_other() {
    let model = Arc::new(
        ScriptedModel::new()
            .echo("parser")
            .echo("evaluator")
            .echo("synthesizer"),
    );
    let catalog = WorkflowCatalog::new(model.clone()).unwrap();
    let definition = catalog.get(Topology::Linear);
    let engine = engine();

    let one = WorkflowState::new(SessionId::from_string("run-1"), "note one: chest pain");
    let two = WorkflowState::new(SessionId::from_string("run-2"), "note two: headache");

    let (final_one, final_two) = tokio::join!(
        engine.run(definition, one),
        engine.run(definition, two)
    );

    let data_one = final_one.data.unwrap().to_prompt_text();
    let data_two = final_two.data.unwrap().to_prompt_text();
    assert!(data_one.contains("chest pain") && !data_one.contains("headache"));
    assert!(data_two.contains("headache") && !data_two.contains("chest pain"));
    assert_eq!(final_one.session_id, SessionId::from_string("run-1"));
    assert_eq!(final_two.session_id, SessionId::from_string("run-2"));
}

#[tokio::test(start_paused = true)]
async fn test_slow_node_times_out_without_stalling_the_run() {
    let model = Arc::new(
        ScriptedModel::with_clinical_defaults()
            .delay("synthesizer", Duration::from_secs(120)),
    );
    let response = run_note(&model, Topology::Branching).await;

    let synthesize = result(&response, "synthesize");
    assert!(!synthesize.success);
    assert!(synthesize.error.as_deref().unwrap().contains("timeout"));

    // The risk branch completed normally while synthesize hung.
    assert!(response.risk_assessment.is_some());
    assert!(response.treatment_plan.is_some());
    assert!(response.success);
}

#[tokio::test]
async fn test_degraded_mode_converts_quota_into_low_confidence_result() {
    let scripted = ScriptedModel::with_clinical_defaults().fail(
        "risk_assessor",
        ModelErrorKind::QuotaExceeded,
        "quota exhausted",
    );
    let model = Arc::new(DegradedModel::new(Box::new(scripted)));
    let catalog = WorkflowCatalog::new(model).unwrap();
    let definition = catalog.get(Topology::Branching);

    let state = WorkflowState::new(SessionId::new(), CHEST_PAIN_NOTE);
    let final_state = engine().run(definition, state).await;
    let response = build_response(final_state, definition);

    assert!(response.errors.is_empty());
    assert_eq!(response.agent_results.len(), 5);

    let risk = result(&response, "assess_risk");
    assert!(risk.success);
    assert_eq!(risk.confidence_score, Some(DEGRADED_CONFIDENCE));

    // The degraded risk output is still usable downstream.
    assert!(response.treatment_plan.is_some());
}

#[tokio::test]
async fn test_malformed_payload_recovered_as_raw_text() {
    let model = Arc::new(
        ScriptedModel::with_clinical_defaults()
            .fail_malformed("parser", "age 45, male, complaining of chest pain"),
    );
    let response = run_note(&model, Topology::Linear).await;

    let parse = result(&response, "parse");
    assert!(parse.success);
    assert_eq!(parse.confidence_score, Some(0.45));
    assert_eq!(
        parse.output.as_ref().and_then(|o| o.as_text()),
        Some("age 45, male, complaining of chest pain")
    );

    assert_eq!(response.warnings.len(), 1);
    assert!(response.warnings[0].starts_with("parse:"));

    // Downstream stages saw the raw text as their input and carried on.
    assert!(result(&response, "evaluate").success);
    assert!(response.success);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_run_finalizes_cleanly() {
    let model = Arc::new(
        ScriptedModel::with_clinical_defaults().delay("parser", Duration::from_secs(3600)),
    );
    let catalog = WorkflowCatalog::new(model).unwrap();
    let definition = catalog.get(Topology::Linear);

    let shutdown = CancellationToken::new();
    shutdown.cancel();

    let state = WorkflowState::new(SessionId::new(), CHEST_PAIN_NOTE);
    let final_state = engine()
        .run_with_shutdown(definition, state, shutdown)
        .await;

    assert!(final_state.agent_results.is_empty());
    assert!(final_state
        .warnings
        .iter()
        .any(|w| w.contains("cancelled")));
    assert!(final_state.processing_time_secs.is_some());
    assert!(final_state.timestamp.is_some());
}

#[tokio::test]
async fn test_events_are_published_for_each_node() {
    let model = Arc::new(ScriptedModel::with_clinical_defaults());
    let catalog = WorkflowCatalog::new(model).unwrap();
    let definition = catalog.get(Topology::Linear);

    let event_bus = Arc::new(EventBus::default());
    let mut rx = event_bus.subscribe();
    let engine = WorkflowEngine::new(EngineConfig::default(), event_bus);

    let state = WorkflowState::new(SessionId::from_string("evt"), CHEST_PAIN_NOTE);
    engine.run(definition, state).await;

    let mut started = 0;
    let mut completed = 0;
    let mut traced = 0;
    let mut run_completed = false;
    while let Ok(event) = rx.try_recv() {
        match event {
            WorkflowEvent::NodeStarted { .. } => started += 1,
            WorkflowEvent::NodeCompleted { .. } => completed += 1,
            WorkflowEvent::NodeTraced(trace) => {
                traced += 1;
                assert_eq!(trace.session_id, SessionId::from_string("evt"));
            }
            WorkflowEvent::RunCompleted {
                succeeded_nodes,
                failed_nodes,
                ..
            } => {
                run_completed = true;
                assert_eq!(succeeded_nodes, 3);
                assert_eq!(failed_nodes, 0);
            }
            WorkflowEvent::RunStarted { .. } => {}
        }
    }

    assert_eq!(started, 3);
    assert_eq!(completed, 3);
    assert_eq!(traced, 3);
    assert!(run_completed);
}
