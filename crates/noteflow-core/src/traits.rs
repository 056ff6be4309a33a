use std::collections::HashMap;

use futures::future::BoxFuture;

use crate::error::ModelError;
use crate::types::Completion;

/// Language model client — the single point of contact with the external
/// text-generation capability.
///
/// `role` selects the instruction set (e.g. "parser", "risk_assessor");
/// `context` carries the named input texts that role works from. Failures
/// are classified by `ModelErrorKind`; the engine treats every kind
/// uniformly as a node failure unless a wrapper client opts into a
/// different policy (see `DegradedModel` in noteflow-llm).
pub trait LanguageModel: Send + Sync + 'static {
    fn complete<'a>(
        &'a self,
        role: &'a str,
        context: &'a HashMap<String, String>,
    ) -> BoxFuture<'a, Result<Completion, ModelError>>;
}
