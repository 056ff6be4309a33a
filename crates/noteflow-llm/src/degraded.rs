use std::collections::HashMap;

use futures::future::BoxFuture;
use tracing::warn;

use noteflow_core::error::{ModelError, ModelErrorKind};
use noteflow_core::traits::LanguageModel;
use noteflow_core::types::Completion;

/// Confidence attached to degraded completions.
pub const DEGRADED_CONFIDENCE: f64 = 0.2;

/// Opt-in quota policy: instead of failing the calling node when the
/// provider reports quota exhaustion, serve a canned low-confidence
/// completion so the rest of the workflow keeps its shape.
///
/// Every other error class passes through untouched.
pub struct DegradedModel {
    inner: Box<dyn LanguageModel>,
}

impl DegradedModel {
    pub fn new(inner: Box<dyn LanguageModel>) -> Self {
        Self { inner }
    }
}

fn degraded_text(role: &str) -> String {
    format!(
        "Automated {} analysis is temporarily unavailable; the note could not \
be processed by the model. Please review the note manually.",
        role.replace('_', " ")
    )
}

impl LanguageModel for DegradedModel {
    fn complete<'a>(
        &'a self,
        role: &'a str,
        context: &'a HashMap<String, String>,
    ) -> BoxFuture<'a, Result<Completion, ModelError>> {
        Box::pin(async move {
            match self.inner.complete(role, context).await {
                Err(e) if e.kind == ModelErrorKind::QuotaExceeded => {
                    warn!(role, error = %e, "Quota exhausted, serving degraded completion");
                    Ok(Completion::with_confidence(
                        degraded_text(role),
                        DEGRADED_CONFIDENCE,
                    ))
                }
                other => other,
            }
        })
    }
}
