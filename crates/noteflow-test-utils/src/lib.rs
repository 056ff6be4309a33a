//! Deterministic fakes for exercising the workflow engine without a real
//! model endpoint.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use futures::future::BoxFuture;

use noteflow_core::error::{ModelError, ModelErrorKind};
use noteflow_core::traits::LanguageModel;
use noteflow_core::types::Completion;

/// The note used across the concrete test scenarios.
pub const CHEST_PAIN_NOTE: &str = "45-year-old male chest pain";

#[derive(Debug, Clone)]
enum Reply {
    Text {
        text: String,
        confidence: Option<f64>,
    },
    Fail {
        kind: ModelErrorKind,
        message: String,
        raw: Option<String>,
    },
    /// Echo the rendered context back, for observing what a stage saw.
    EchoContext,
}

/// Scripted language model: canned per-role replies, optional per-role
/// delays, and a record of the order calls arrived in.
#[derive(Default)]
pub struct ScriptedModel {
    replies: HashMap<String, Reply>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canned structured replies for all five clinical roles.
    pub fn with_clinical_defaults() -> Self {
        Self::new()
            .reply(
                "parser",
                r#"{"symptoms": ["chest pain"], "age": 45, "sex": "male"}"#,
            )
            .reply(
                "evaluator",
                r#"{"validity_score": 0.9, "icd10_codes": ["R07.9"]}"#,
            )
            .reply(
                "synthesizer",
                r#"{"patient_summary": "Chest pain that needs prompt evaluation.", "urgency": "soon"}"#,
            )
            .reply(
                "risk_assessor",
                r#"{"overall_risk": "medium", "risk_score": 0.6}"#,
            )
            .reply(
                "treatment_planner",
                r#"{"treatment_options": ["ECG", "stress test"]}"#,
            )
    }

    pub fn reply(mut self, role: impl Into<String>, text: impl Into<String>) -> Self {
        self.replies.insert(
            role.into(),
            Reply::Text {
                text: text.into(),
                confidence: None,
            },
        );
        self
    }

    pub fn reply_with_confidence(
        mut self,
        role: impl Into<String>,
        text: impl Into<String>,
        confidence: f64,
    ) -> Self {
        self.replies.insert(
            role.into(),
            Reply::Text {
                text: text.into(),
                confidence: Some(confidence),
            },
        );
        self
    }

    pub fn fail(
        mut self,
        role: impl Into<String>,
        kind: ModelErrorKind,
        message: impl Into<String>,
    ) -> Self {
        self.replies.insert(
            role.into(),
            Reply::Fail {
                kind,
                message: message.into(),
                raw: None,
            },
        );
        self
    }

    /// Fail with a malformed-response error carrying the raw payload.
    pub fn fail_malformed(mut self, role: impl Into<String>, raw: impl Into<String>) -> Self {
        self.replies.insert(
            role.into(),
            Reply::Fail {
                kind: ModelErrorKind::MalformedResponse,
                message: "stubbed unparseable payload".into(),
                raw: Some(raw.into()),
            },
        );
        self
    }

    /// Echo the rendered context back as the completion text.
    pub fn echo(mut self, role: impl Into<String>) -> Self {
        self.replies.insert(role.into(), Reply::EchoContext);
        self
    }

    /// Sleep before answering for this role.
    pub fn delay(mut self, role: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(role.into(), delay);
        self
    }

    /// Roles in the order calls arrived.
    pub fn call_order(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl LanguageModel for ScriptedModel {
    fn complete<'a>(
        &'a self,
        role: &'a str,
        context: &'a HashMap<String, String>,
    ) -> BoxFuture<'a, Result<Completion, ModelError>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(role.to_string());

            if let Some(delay) = self.delays.get(role) {
                tokio::time::sleep(*delay).await;
            }

            match self.replies.get(role) {
                Some(Reply::Text { text, confidence }) => Ok(Completion {
                    text: text.clone(),
                    confidence: *confidence,
                }),
                Some(Reply::Fail { kind, message, raw }) => Err(ModelError {
                    kind: *kind,
                    message: message.clone(),
                    raw: raw.clone(),
                }),
                Some(Reply::EchoContext) => {
                    let mut keys: Vec<&String> = context.keys().collect();
                    keys.sort();
                    let text = keys
                        .iter()
                        .map(|k| format!("{}={}", k, context[*k]))
                        .collect::<Vec<_>>()
                        .join("; ");
                    Ok(Completion::new(text))
                }
                None => Ok(Completion::new("ok")),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_replies_and_call_order() {
        let model = ScriptedModel::new()
            .reply("parser", "parsed")
            .fail("evaluator", ModelErrorKind::Transport, "down");

        let ctx = HashMap::new();
        assert_eq!(model.complete("parser", &ctx).await.unwrap().text, "parsed");
        assert!(model.complete("evaluator", &ctx).await.is_err());
        assert_eq!(model.complete("unknown", &ctx).await.unwrap().text, "ok");
        assert_eq!(model.call_order(), vec!["parser", "evaluator", "unknown"]);
    }

    #[tokio::test]
    async fn test_echo_renders_context() {
        let model = ScriptedModel::new().echo("parser");
        let mut ctx = HashMap::new();
        ctx.insert("note".to_string(), "chest pain".to_string());

        let completion = model.complete("parser", &ctx).await.unwrap();
        assert_eq!(completion.text, "note=chest pain");
    }
}
