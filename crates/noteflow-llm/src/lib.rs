pub mod degraded;
pub mod openai;
pub mod prompts;
pub mod retry;

use std::sync::Arc;

use noteflow_core::config::ModelConfig;
use noteflow_core::traits::LanguageModel;

pub use degraded::{DegradedModel, DEGRADED_CONFIDENCE};
pub use openai::OpenAiCompatClient;
pub use retry::RetryingModel;

/// Build the model stack described by the config: the base HTTP client,
/// optional transport retries, optional degraded-mode quota policy.
pub fn create_model(config: &ModelConfig) -> Arc<dyn LanguageModel> {
    let mut model: Box<dyn LanguageModel> = Box::new(OpenAiCompatClient::new(config.clone()));
    if let Some(ref retry) = config.retry {
        model = Box::new(RetryingModel::new(model, retry.clone()));
    }
    if config.degraded_mode {
        model = Box::new(DegradedModel::new(model));
    }
    Arc::from(model)
}
