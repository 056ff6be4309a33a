use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use noteflow_core::error::{GraphConfigError, Result};
use noteflow_core::state::StateField;

use crate::stage::Stage;
use crate::stages::StageRegistry;

/// A named node of a workflow definition.
#[derive(Clone)]
pub struct NodeSpec {
    pub name: String,
    pub stage: Arc<dyn Stage>,
}

/// A directed dependency edge between two named nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeSpec {
    pub from: String,
    pub to: String,
}

/// A validated DAG of analysis stages.
///
/// Built once at process start and shared read-only across concurrent
/// runs. The entry node is derived: it is the unique node without
/// predecessors. Finish nodes are the nodes whose completion makes a run
/// eligible to terminate.
pub struct WorkflowDefinition {
    name: String,
    /// Declaration order — also the tie-break order for scheduling.
    nodes: Vec<NodeSpec>,
    edges: Vec<EdgeSpec>,
    entry: String,
    finish: Vec<String>,
}

impl std::fmt::Debug for WorkflowDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowDefinition")
            .field("name", &self.name)
            .field(
                "nodes",
                &self.nodes.iter().map(|n| &n.name).collect::<Vec<_>>(),
            )
            .field("edges", &self.edges)
            .field("entry", &self.entry)
            .field("finish", &self.finish)
            .finish()
    }
}

impl WorkflowDefinition {
    pub fn builder(name: impl Into<String>) -> WorkflowBuilder {
        WorkflowBuilder {
            name: name.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
            finish: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nodes(&self) -> &[NodeSpec] {
        &self.nodes
    }

    pub fn edges(&self) -> &[EdgeSpec] {
        &self.edges
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn finish_nodes(&self) -> &[String] {
        &self.finish
    }

    pub fn node(&self, name: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn node_names(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.name.as_str()).collect()
    }

    /// Names of the nodes `name` depends on.
    pub fn predecessors(&self, name: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|e| e.to == name)
            .map(|e| e.from.as_str())
            .collect()
    }
}

/// Builder for a workflow definition; `build` validates and freezes it.
pub struct WorkflowBuilder {
    name: String,
    nodes: Vec<NodeSpec>,
    edges: Vec<EdgeSpec>,
    finish: Vec<String>,
}

impl WorkflowBuilder {
    /// Add a node. Declaration order is the scheduling tie-break order.
    pub fn node(mut self, stage: Arc<dyn Stage>) -> Self {
        self.nodes.push(NodeSpec {
            name: stage.name().to_string(),
            stage,
        });
        self
    }

    pub fn edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.push(EdgeSpec {
            from: from.into(),
            to: to.into(),
        });
        self
    }

    pub fn finish(mut self, node: impl Into<String>) -> Self {
        self.finish.push(node.into());
        self
    }

    /// Validate the declared topology and freeze the definition.
    ///
    /// Fails on: duplicate node names, edges touching unknown nodes, an
    /// empty or unknown finish set, writes to read-only fields, two nodes
    /// writing the same field, zero or multiple entry candidates, cycles,
    /// and nodes unreachable from the entry.
    pub fn build(self) -> std::result::Result<WorkflowDefinition, GraphConfigError> {
        let Self {
            name,
            nodes,
            edges,
            finish,
        } = self;

        let mut seen = HashSet::new();
        for node in &nodes {
            if !seen.insert(node.name.as_str()) {
                return Err(GraphConfigError::DuplicateNode(node.name.clone()));
            }
        }
        let names: HashSet<&str> = seen;

        for edge in &edges {
            for endpoint in [&edge.from, &edge.to] {
                if !names.contains(endpoint.as_str()) {
                    return Err(GraphConfigError::UnknownNode(endpoint.clone()));
                }
            }
        }

        if finish.is_empty() {
            return Err(GraphConfigError::NoFinishNodes);
        }
        for node in &finish {
            if !names.contains(node.as_str()) {
                return Err(GraphConfigError::UnknownFinishNode(node.clone()));
            }
        }

        // Disjoint writes: this is what lets sibling branches run
        // concurrently without racing on the state.
        let mut writers: HashMap<StateField, &str> = HashMap::new();
        for node in &nodes {
            let field = node.stage.writes();
            if !field.is_writable() {
                return Err(GraphConfigError::ReadOnlyWrite {
                    node: node.name.clone(),
                    field,
                });
            }
            if let Some(first) = writers.insert(field, &node.name) {
                return Err(GraphConfigError::DuplicateWriter {
                    field,
                    first: first.to_string(),
                    second: node.name.clone(),
                });
            }
        }

        let entry = derive_entry(&nodes, &edges)?;
        check_acyclic(&nodes, &edges)?;
        check_reachable(&nodes, &edges, &entry)?;

        Ok(WorkflowDefinition {
            name,
            nodes,
            edges,
            entry,
            finish,
        })
    }
}

/// The entry node is the unique node with no incoming edges.
fn derive_entry(
    nodes: &[NodeSpec],
    edges: &[EdgeSpec],
) -> std::result::Result<String, GraphConfigError> {
    let targets: HashSet<&str> = edges.iter().map(|e| e.to.as_str()).collect();
    let entries: Vec<&NodeSpec> = nodes
        .iter()
        .filter(|n| !targets.contains(n.name.as_str()))
        .collect();

    match entries.as_slice() {
        [] => Err(GraphConfigError::NoEntry),
        [entry] => Ok(entry.name.clone()),
        many => Err(GraphConfigError::MultipleEntries(
            many.iter().map(|n| n.name.clone()).collect(),
        )),
    }
}

/// Kahn's algorithm; whatever cannot be ordered sits on a cycle.
fn check_acyclic(
    nodes: &[NodeSpec],
    edges: &[EdgeSpec],
) -> std::result::Result<(), GraphConfigError> {
    let mut in_degree: HashMap<&str, usize> =
        nodes.iter().map(|n| (n.name.as_str(), 0)).collect();
    for edge in edges {
        if let Some(d) = in_degree.get_mut(edge.to.as_str()) {
            *d += 1;
        }
    }

    let mut queue: VecDeque<&str> = nodes
        .iter()
        .map(|n| n.name.as_str())
        .filter(|n| in_degree[n] == 0)
        .collect();
    let mut ordered = 0usize;

    while let Some(node) = queue.pop_front() {
        ordered += 1;
        for edge in edges.iter().filter(|e| e.from == node) {
            if let Some(d) = in_degree.get_mut(edge.to.as_str()) {
                *d -= 1;
                if *d == 0 {
                    queue.push_back(&edge.to);
                }
            }
        }
    }

    if ordered == nodes.len() {
        Ok(())
    } else {
        let mut leftover: Vec<String> = nodes
            .iter()
            .map(|n| n.name.clone())
            .filter(|n| in_degree[n.as_str()] > 0)
            .collect();
        leftover.sort();
        Err(GraphConfigError::Cycle(leftover))
    }
}

fn check_reachable(
    nodes: &[NodeSpec],
    edges: &[EdgeSpec],
    entry: &str,
) -> std::result::Result<(), GraphConfigError> {
    let mut reached: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    reached.insert(entry);
    queue.push_back(entry);

    while let Some(node) = queue.pop_front() {
        for edge in edges.iter().filter(|e| e.from == node) {
            if reached.insert(edge.to.as_str()) {
                queue.push_back(edge.to.as_str());
            }
        }
    }

    match nodes.iter().find(|n| !reached.contains(n.name.as_str())) {
        Some(node) => Err(GraphConfigError::Unreachable(node.name.clone())),
        None => Ok(()),
    }
}

/// parse → evaluate → synthesize, finishing at synthesize.
pub fn linear_workflow(registry: &StageRegistry) -> Result<WorkflowDefinition> {
    Ok(WorkflowDefinition::builder("linear")
        .node(registry.get("parse")?)
        .node(registry.get("evaluate")?)
        .node(registry.get("synthesize")?)
        .edge("parse", "evaluate")
        .edge("evaluate", "synthesize")
        .finish("synthesize")
        .build()?)
}

/// The linear pipeline plus the risk fork after evaluate:
/// evaluate → assess_risk → plan_treatment. The two finish nodes
/// (synthesize, plan_treatment) are independent siblings downstream of
/// evaluate.
pub fn branching_workflow(registry: &StageRegistry) -> Result<WorkflowDefinition> {
    Ok(WorkflowDefinition::builder("branching")
        .node(registry.get("parse")?)
        .node(registry.get("evaluate")?)
        .node(registry.get("synthesize")?)
        .node(registry.get("assess_risk")?)
        .node(registry.get("plan_treatment")?)
        .edge("parse", "evaluate")
        .edge("evaluate", "synthesize")
        .edge("evaluate", "assess_risk")
        .edge("assess_risk", "plan_treatment")
        .finish("synthesize")
        .finish("plan_treatment")
        .build()?)
}
