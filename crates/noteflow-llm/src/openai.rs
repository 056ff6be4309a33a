use std::collections::HashMap;
use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use noteflow_core::config::ModelConfig;
use noteflow_core::error::ModelError;
use noteflow_core::traits::LanguageModel;
use noteflow_core::types::Completion;

use crate::prompts;

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Non-streaming client for OpenAI-compatible chat-completions APIs.
///
/// One call produces one completion; the confidence slot is left empty
/// because these APIs do not score their own output.
pub struct OpenAiCompatClient {
    http: Client,
    config: ModelConfig,
}

impl OpenAiCompatClient {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    fn endpoint(&self) -> String {
        match &self.config.base_url {
            Some(base) => format!("{}/chat/completions", base.trim_end_matches('/')),
            None => OPENAI_API_URL.to_string(),
        }
    }
}

// Chat-completions API request types
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ApiMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

// Chat-completions API response types
#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl LanguageModel for OpenAiCompatClient {
    fn complete<'a>(
        &'a self,
        role: &'a str,
        context: &'a HashMap<String, String>,
    ) -> BoxFuture<'a, Result<Completion, ModelError>> {
        Box::pin(async move {
            let request = ChatRequest {
                model: self.config.model_id.clone(),
                messages: vec![
                    ApiMessage {
                        role: "system".into(),
                        content: prompts::instruction_for(role).to_string(),
                    },
                    ApiMessage {
                        role: "user".into(),
                        content: render_context(context),
                    },
                ],
                max_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
            };

            let mut req = self
                .http
                .post(self.endpoint())
                .timeout(Duration::from_secs(self.config.request_timeout_secs))
                .json(&request);
            if let Some(ref key) = self.config.api_key {
                req = req.bearer_auth(key);
            }

            let response = req.send().await.map_err(classify_send_error)?;
            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| ModelError::transport(e.to_string()))?;

            if !status.is_success() {
                return Err(classify_status(status, &body));
            }

            let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
                ModelError::malformed(format!("unparseable completion payload: {}", e), body.clone())
            })?;
            let text = parsed
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .ok_or_else(|| ModelError::malformed("completion payload had no choices", body))?;

            debug!(role, chars = text.len(), "model completion received");
            Ok(Completion::new(text))
        })
    }
}

/// Join the context fields into one prompt body, in stable key order.
fn render_context(context: &HashMap<String, String>) -> String {
    let mut keys: Vec<&String> = context.keys().collect();
    keys.sort();

    let mut body = String::new();
    for key in keys {
        body.push_str(key);
        body.push_str(":\n");
        body.push_str(&context[key]);
        body.push_str("\n\n");
    }
    body
}

fn classify_send_error(e: reqwest::Error) -> ModelError {
    if e.is_timeout() {
        ModelError::timeout(e.to_string())
    } else {
        ModelError::transport(e.to_string())
    }
}

fn classify_status(status: StatusCode, body: &str) -> ModelError {
    let summary = format!("HTTP {}: {}", status.as_u16(), truncate(body, 200));
    match status.as_u16() {
        408 | 504 => ModelError::timeout(summary),
        429 => ModelError::quota_exceeded(summary),
        _ => ModelError::transport(summary),
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
