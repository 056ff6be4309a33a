use std::sync::Arc;

use noteflow_core::error::Result;
use noteflow_core::traits::LanguageModel;
use noteflow_core::types::Topology;

use crate::graph::definition::{branching_workflow, linear_workflow, WorkflowDefinition};
use crate::stages::StageRegistry;

/// The two canonical workflow definitions, validated once at process
/// start and shared read-only across concurrent runs.
pub struct WorkflowCatalog {
    linear: WorkflowDefinition,
    branching: WorkflowDefinition,
}

impl WorkflowCatalog {
    /// Build both canonical workflows over one shared model client.
    pub fn new(model: Arc<dyn LanguageModel>) -> Result<Self> {
        let registry = StageRegistry::with_clinical_stages(model);
        Ok(Self {
            linear: linear_workflow(&registry)?,
            branching: branching_workflow(&registry)?,
        })
    }

    pub fn get(&self, topology: Topology) -> &WorkflowDefinition {
        match topology {
            Topology::Linear => &self.linear,
            Topology::Branching => &self.branching,
        }
    }
}
