//! Retry wrapper around a provider.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use super::providers::TextProvider;
use super::types::{GenerationRequest, GenerationResponse, LlmError};

/// Re-sends the same request after retryable failures, with a timeout on
/// every attempt.
pub struct RetryingProvider {
    inner: Arc<dyn TextProvider>,
    max_retries: u32,
    timeout: Duration,
}

impl RetryingProvider {
    pub fn new(inner: Arc<dyn TextProvider>, max_retries: u32, timeout: Duration) -> Self {
        Self {
            inner,
            max_retries,
            timeout,
        }
    }

    async fn attempt(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        match tokio::time::timeout(self.timeout, self.inner.complete(request)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout(self.timeout.as_secs())),
        }
    }
}

#[async_trait]
impl TextProvider for RetryingProvider {
    async fn complete(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        let mut attempt = 0;
        loop {
            match self.attempt(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        provider = self.inner.name(),
                        attempt,
                        max = self.max_retries,
                        error = %err,
                        "text generation failed, retrying"
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Flaky {
        failures: u32,
        calls: AtomicU32,
        error: LlmError,
    }

    #[async_trait]
    impl TextProvider for Flaky {
        async fn complete(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(self.error.clone());
            }
            Ok(GenerationResponse {
                content: request.last_user_text().to_string(),
                model: request.model,
                usage: None,
                finish_reason: None,
            })
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    fn flaky(failures: u32, error: LlmError) -> Arc<Flaky> {
        Arc::new(Flaky {
            failures,
            calls: AtomicU32::new(0),
            error,
        })
    }

    #[tokio::test]
    async fn test_recovers_within_retry_budget() {
        let inner = flaky(3, LlmError::Network("reset".into()));
        let provider = RetryingProvider::new(inner.clone(), 3, Duration::from_secs(5));
        let reply = provider
            .complete(GenerationRequest::from_prompt("m", "same prompt"))
            .await
            .unwrap();
        assert_eq!(reply.content, "same prompt");
        assert_eq!(inner.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_surfaces_error_after_budget() {
        let inner = flaky(10, LlmError::Api("503".into()));
        let provider = RetryingProvider::new(inner.clone(), 2, Duration::from_secs(5));
        let err = provider
            .complete(GenerationRequest::from_prompt("m", "x"))
            .await
            .unwrap_err();
        assert_eq!(err, LlmError::Api("503".into()));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_auth_errors_are_not_retried() {
        let inner = flaky(10, LlmError::Auth("bad key".into()));
        let provider = RetryingProvider::new(inner.clone(), 3, Duration::from_secs(5));
        assert!(provider
            .complete(GenerationRequest::from_prompt("m", "x"))
            .await
            .is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    struct Stalled;

    #[async_trait]
    impl TextProvider for Stalled {
        async fn complete(&self, _request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(LlmError::Api("unreachable".into()))
        }

        fn name(&self) -> &str {
            "stalled"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_per_attempt() {
        let provider = RetryingProvider::new(Arc::new(Stalled), 1, Duration::from_secs(30));
        let err = provider
            .complete(GenerationRequest::from_prompt("m", "x"))
            .await
            .unwrap_err();
        assert_eq!(err, LlmError::Timeout(30));
    }
}
