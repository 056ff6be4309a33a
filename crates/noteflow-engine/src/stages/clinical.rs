//! The five clinical analysis stages.
//!
//! Each stage owns one output field and a nominal confidence, gathers its
//! declared inputs, and hands them to the language model under its role.

use std::sync::Arc;

use futures::future::BoxFuture;

use noteflow_core::error::Result;
use noteflow_core::state::StateField;
use noteflow_core::traits::LanguageModel;
use noteflow_core::types::Completion;

use crate::stage::{Stage, StageInput};

/// Require every declared input, then run the model under the stage role.
async fn complete_stage(
    model: &Arc<dyn LanguageModel>,
    role: &str,
    reads: &[StateField],
    input: &StageInput,
) -> Result<Completion> {
    for &field in reads {
        input.require(field)?;
    }
    Ok(model.complete(role, &input.to_context()).await?)
}

/// Extracts structured medical entities (diagnoses, medications, vitals,
/// history) from the raw note.
pub struct ParseStage {
    model: Arc<dyn LanguageModel>,
}

impl ParseStage {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }
}

impl Stage for ParseStage {
    fn name(&self) -> &str {
        "parse"
    }

    fn role(&self) -> &str {
        "parser"
    }

    fn reads(&self) -> &[StateField] {
        &[StateField::Note]
    }

    fn writes(&self) -> StateField {
        StateField::Data
    }

    fn base_confidence(&self) -> f64 {
        0.9
    }

    fn execute<'a>(&'a self, input: &'a StageInput) -> BoxFuture<'a, Result<Completion>> {
        Box::pin(complete_stage(&self.model, self.role(), self.reads(), input))
    }
}

/// Validates the parsed entities against medical standards and suggests
/// ICD-10/SNOMED codes.
pub struct EvaluateStage {
    model: Arc<dyn LanguageModel>,
}

impl EvaluateStage {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }
}

impl Stage for EvaluateStage {
    fn name(&self) -> &str {
        "evaluate"
    }

    fn role(&self) -> &str {
        "evaluator"
    }

    fn reads(&self) -> &[StateField] {
        &[StateField::Data]
    }

    fn writes(&self) -> StateField {
        StateField::ValidatedData
    }

    fn base_confidence(&self) -> f64 {
        0.85
    }

    fn execute<'a>(&'a self, input: &'a StageInput) -> BoxFuture<'a, Result<Completion>> {
        Box::pin(complete_stage(&self.model, self.role(), self.reads(), input))
    }
}

/// Generates the patient-friendly report from validated data.
pub struct SynthesizeStage {
    model: Arc<dyn LanguageModel>,
}

impl SynthesizeStage {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }
}

impl Stage for SynthesizeStage {
    fn name(&self) -> &str {
        "synthesize"
    }

    fn role(&self) -> &str {
        "synthesizer"
    }

    fn reads(&self) -> &[StateField] {
        &[StateField::ValidatedData]
    }

    fn writes(&self) -> StateField {
        StateField::Report
    }

    fn base_confidence(&self) -> f64 {
        0.9
    }

    fn execute<'a>(&'a self, input: &'a StageInput) -> BoxFuture<'a, Result<Completion>> {
        Box::pin(complete_stage(&self.model, self.role(), self.reads(), input))
    }
}

/// Scores patient risk from the raw note plus the parsed entities.
pub struct AssessRiskStage {
    model: Arc<dyn LanguageModel>,
}

impl AssessRiskStage {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }
}

impl Stage for AssessRiskStage {
    fn name(&self) -> &str {
        "assess_risk"
    }

    fn role(&self) -> &str {
        "risk_assessor"
    }

    fn reads(&self) -> &[StateField] {
        &[StateField::Note, StateField::Data]
    }

    fn writes(&self) -> StateField {
        StateField::RiskAssessment
    }

    fn base_confidence(&self) -> f64 {
        0.8
    }

    fn execute<'a>(&'a self, input: &'a StageInput) -> BoxFuture<'a, Result<Completion>> {
        Box::pin(complete_stage(&self.model, self.role(), self.reads(), input))
    }
}

/// Suggests evidence-based treatment approaches from validated data and
/// the risk assessment.
pub struct PlanTreatmentStage {
    model: Arc<dyn LanguageModel>,
}

impl PlanTreatmentStage {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }
}

impl Stage for PlanTreatmentStage {
    fn name(&self) -> &str {
        "plan_treatment"
    }

    fn role(&self) -> &str {
        "treatment_planner"
    }

    fn reads(&self) -> &[StateField] {
        &[StateField::ValidatedData, StateField::RiskAssessment]
    }

    fn writes(&self) -> StateField {
        StateField::TreatmentPlan
    }

    fn base_confidence(&self) -> f64 {
        0.85
    }

    fn execute<'a>(&'a self, input: &'a StageInput) -> BoxFuture<'a, Result<Completion>> {
        Box::pin(complete_stage(&self.model, self.role(), self.reads(), input))
    }
}
