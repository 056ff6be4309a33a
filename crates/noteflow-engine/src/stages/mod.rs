pub mod clinical;

pub use clinical::{
    AssessRiskStage, EvaluateStage, ParseStage, PlanTreatmentStage, SynthesizeStage,
};

use std::collections::HashMap;
use std::sync::Arc;

use noteflow_core::error::{NoteflowError, Result};
use noteflow_core::traits::LanguageModel;

use crate::stage::Stage;

/// Name → stage implementation map used to assemble workflow definitions.
#[derive(Default, Clone)]
pub struct StageRegistry {
    stages: HashMap<String, Arc<dyn Stage>>,
}

impl StageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register all five clinical stages over one shared model client.
    pub fn with_clinical_stages(model: Arc<dyn LanguageModel>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ParseStage::new(model.clone())));
        registry.register(Arc::new(EvaluateStage::new(model.clone())));
        registry.register(Arc::new(SynthesizeStage::new(model.clone())));
        registry.register(Arc::new(AssessRiskStage::new(model.clone())));
        registry.register(Arc::new(PlanTreatmentStage::new(model)));
        registry
    }

    pub fn register(&mut self, stage: Arc<dyn Stage>) {
        self.stages.insert(stage.name().to_string(), stage);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Stage>> {
        self.stages
            .get(name)
            .cloned()
            .ok_or_else(|| NoteflowError::UnknownStage(name.to_string()))
    }
}
