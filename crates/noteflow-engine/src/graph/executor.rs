use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use noteflow_core::config::EngineConfig;
use noteflow_core::event::{EventBus, WorkflowEvent};
use noteflow_core::state::WorkflowState;
use noteflow_core::types::NodeTrace;

use crate::graph::definition::WorkflowDefinition;
use crate::graph::runner::{NodeRun, NodeRunner};
use crate::stage::StageInput;

type InflightNode = BoxFuture<'static, (String, serde_json::Value, NodeRun)>;

/// Executes one workflow run to completion.
///
/// Scheduling is readiness-driven: a node starts the moment every one of
/// its predecessors has completed (successfully or not), with ties among
/// ready nodes broken by declaration order. Sibling branches overlap, and
/// one branch's failure neither delays nor corrupts another. A run
/// terminates once every finish node has completed; node failures are
/// recorded on the state, never raised.
pub struct WorkflowEngine {
    config: EngineConfig,
    events: Arc<EventBus>,
}

impl WorkflowEngine {
    pub fn new(config: EngineConfig, events: Arc<EventBus>) -> Self {
        Self { config, events }
    }

    pub async fn run(
        &self,
        definition: &WorkflowDefinition,
        state: WorkflowState,
    ) -> WorkflowState {
        self.run_with_shutdown(definition, state, CancellationToken::new())
            .await
    }

    /// Like `run`, but abandons in-flight nodes when `shutdown` fires.
    /// The state stays consistent either way: it is owned by this run and
    /// finalized before being handed back.
    pub async fn run_with_shutdown(
        &self,
        definition: &WorkflowDefinition,
        mut state: WorkflowState,
        shutdown: CancellationToken,
    ) -> WorkflowState {
        let started = Instant::now();
        let session_id = state.session_id.clone();

        info!(
            session_id = %session_id,
            workflow = %definition.name(),
            "Workflow run started"
        );
        self.events.publish(WorkflowEvent::RunStarted {
            session_id: session_id.clone(),
            workflow: definition.name().to_string(),
        });

        let mut completed: HashSet<String> = HashSet::new();
        let mut scheduled: HashSet<String> = HashSet::new();
        let mut inflight: FuturesUnordered<InflightNode> = FuturesUnordered::new();

        self.schedule_ready(definition, &state, &completed, &mut scheduled, &mut inflight);

        while !finish_reached(definition, &completed) {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    warn!(session_id = %session_id, "Run cancelled, abandoning in-flight nodes");
                    state
                        .warnings
                        .push("run cancelled before all finish nodes completed".to_string());
                    break;
                }
                next = inflight.next() => {
                    let Some((node, trace_input, run)) = next else {
                        // Nothing left to poll. A validated definition
                        // cannot strand a finish node, so this only covers
                        // shutdown races.
                        break;
                    };
                    completed.insert(node.clone());
                    self.absorb(&mut state, &node, trace_input, run);
                    self.schedule_ready(
                        definition,
                        &state,
                        &completed,
                        &mut scheduled,
                        &mut inflight,
                    );
                }
            }
        }

        state.processing_time_secs = Some(started.elapsed().as_secs_f64());
        state.timestamp = Some(Utc::now());

        let failed = state.agent_results.iter().filter(|r| !r.success).count();
        let succeeded = state.agent_results.len() - failed;
        info!(
            session_id = %session_id,
            succeeded,
            failed,
            elapsed_secs = state.processing_time_secs.unwrap_or(0.0),
            "Workflow run completed"
        );
        self.events.publish(WorkflowEvent::RunCompleted {
            session_id,
            succeeded_nodes: succeeded,
            failed_nodes: failed,
            processing_time_secs: state.processing_time_secs.unwrap_or(0.0),
        });

        state
    }

    /// Start every not-yet-scheduled node whose predecessors have all
    /// completed. Input projection happens here, after the predecessors'
    /// deltas have been merged, so the futures own their data and the
    /// state stays exclusively with the engine.
    fn schedule_ready(
        &self,
        definition: &WorkflowDefinition,
        state: &WorkflowState,
        completed: &HashSet<String>,
        scheduled: &mut HashSet<String>,
        inflight: &mut FuturesUnordered<InflightNode>,
    ) {
        let timeout = Duration::from_secs(self.config.node_timeout_secs);

        for spec in definition.nodes() {
            if scheduled.contains(&spec.name) {
                continue;
            }
            let ready = definition
                .predecessors(&spec.name)
                .iter()
                .all(|p| completed.contains(*p));
            if !ready {
                continue;
            }
            scheduled.insert(spec.name.clone());

            let name = spec.name.clone();
            let input = StageInput::project(state, spec.stage.reads());
            let trace_input = input.to_trace_value();
            let runner = NodeRunner::new(spec.stage.clone(), timeout);

            debug!(node = %name, "Scheduling node");
            self.events.publish(WorkflowEvent::NodeStarted {
                session_id: state.session_id.clone(),
                node: name.clone(),
            });

            inflight.push(Box::pin(async move {
                let run = runner.run(input).await;
                (name, trace_input, run)
            }));
        }
    }

    /// Merge one completed node into the state, in completion order.
    fn absorb(
        &self,
        state: &mut WorkflowState,
        node: &str,
        trace_input: serde_json::Value,
        run: NodeRun,
    ) {
        let NodeRun {
            delta,
            result,
            warnings,
        } = run;

        if let Some(delta) = delta {
            state.apply(delta);
        }
        if let Some(ref error) = result.error {
            state.errors.push(error.clone());
        }
        state.warnings.extend(warnings);

        self.events.publish(WorkflowEvent::NodeTraced(NodeTrace {
            session_id: state.session_id.clone(),
            node: node.to_string(),
            input: trace_input,
            output: result.output.clone(),
            confidence: result.confidence_score,
            timestamp: Utc::now(),
        }));
        self.events.publish(WorkflowEvent::NodeCompleted {
            session_id: state.session_id.clone(),
            result: result.clone(),
        });

        debug!(
            node,
            success = result.success,
            elapsed_secs = result.processing_time_secs,
            "Node execution complete"
        );
        state.agent_results.push(result);
    }
}

fn finish_reached(definition: &WorkflowDefinition, completed: &HashSet<String>) -> bool {
    definition
        .finish_nodes()
        .iter()
        .all(|f| completed.contains(f))
}
