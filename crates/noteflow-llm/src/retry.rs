use std::collections::HashMap;
use std::time::Duration;

use futures::future::BoxFuture;
use tracing::warn;

use noteflow_core::config::RetryConfig;
use noteflow_core::error::{ModelError, ModelErrorKind};
use noteflow_core::traits::LanguageModel;
use noteflow_core::types::Completion;

/// A model client that retries transient failures with backoff.
pub struct RetryingModel {
    inner: Box<dyn LanguageModel>,
    config: RetryConfig,
}

impl RetryingModel {
    pub fn new(inner: Box<dyn LanguageModel>, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

fn is_retryable(e: &ModelError) -> bool {
    matches!(e.kind, ModelErrorKind::Transport | ModelErrorKind::Timeout)
}

fn calculate_backoff(attempt: u32, config: &RetryConfig) -> Duration {
    let ms = (config.initial_backoff_ms * 2u64.pow(attempt)).min(config.max_backoff_ms);
    // Add jitter: 0.8x to 1.2x
    let jitter = 0.8 + rand::random::<f64>() * 0.4;
    Duration::from_millis((ms as f64 * jitter) as u64)
}

impl LanguageModel for RetryingModel {
    fn complete<'a>(
        &'a self,
        role: &'a str,
        context: &'a HashMap<String, String>,
    ) -> BoxFuture<'a, Result<Completion, ModelError>> {
        Box::pin(async move {
            let max_retries = self.config.max_retries;

            let mut last_err = None;
            for attempt in 0..=max_retries {
                match self.inner.complete(role, context).await {
                    Ok(completion) => return Ok(completion),
                    Err(e) => {
                        if is_retryable(&e) && attempt < max_retries {
                            let backoff = calculate_backoff(attempt, &self.config);
                            warn!(
                                role,
                                attempt = attempt + 1,
                                max_retries,
                                backoff_ms = backoff.as_millis() as u64,
                                error = %e,
                                "Retrying model request"
                            );
                            tokio::time::sleep(backoff).await;
                            last_err = Some(e);
                            continue;
                        }
                        return Err(e);
                    }
                }
            }

            Err(last_err
                .unwrap_or_else(|| ModelError::transport("model request failed with no attempts")))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct FlakyModel {
        failures_before_success: u32,
        calls: Arc<AtomicU32>,
    }

    impl LanguageModel for FlakyModel {
        fn complete<'a>(
            &'a self,
            _role: &'a str,
            _context: &'a HashMap<String, String>,
        ) -> BoxFuture<'a, Result<Completion, ModelError>> {
            Box::pin(async move {
                let call = self.calls.fetch_add(1, Ordering::SeqCst);
                if call < self.failures_before_success {
                    Err(ModelError::transport("connection reset"))
                } else {
                    Ok(Completion::new("ok"))
                }
            })
        }
    }

    fn fast_retry(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_backoff_ms: 1,
            max_backoff_ms: 4,
        }
    }

    #[test]
    fn test_is_retryable() {
        assert!(is_retryable(&ModelError::transport("reset")));
        assert!(is_retryable(&ModelError::timeout("slow")));
        assert!(!is_retryable(&ModelError::quota_exceeded("429")));
        assert!(!is_retryable(&ModelError::malformed("bad", "raw")));
    }

    #[test]
    fn test_backoff_is_bounded() {
        let config = RetryConfig {
            max_retries: 5,
            initial_backoff_ms: 1000,
            max_backoff_ms: 3000,
        };
        for attempt in 0..5 {
            let backoff = calculate_backoff(attempt, &config);
            assert!(backoff <= Duration::from_millis((3000.0 * 1.2) as u64));
        }
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let model = RetryingModel::new(
            Box::new(FlakyModel {
                failures_before_success: 2,
                calls: calls.clone(),
            }),
            fast_retry(3),
        );

        let completion = model.complete("parser", &HashMap::new()).await.unwrap();
        assert_eq!(completion.text, "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_does_not_retry_quota() {
        struct QuotaModel;
        impl LanguageModel for QuotaModel {
            fn complete<'a>(
                &'a self,
                _role: &'a str,
                _context: &'a HashMap<String, String>,
            ) -> BoxFuture<'a, Result<Completion, ModelError>> {
                Box::pin(async { Err(ModelError::quota_exceeded("429")) })
            }
        }

        let model = RetryingModel::new(Box::new(QuotaModel), fast_retry(3));
        let err = model.complete("parser", &HashMap::new()).await.unwrap_err();
        assert_eq!(err.kind, ModelErrorKind::QuotaExceeded);
    }
}
