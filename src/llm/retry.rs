//! Retry-with-backoff wrapper for LLM providers.
//!
//! The engines depend only on `LlmProvider`; wrapping the transport here
//! keeps the state machines oblivious to retries.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use crate::error::LlmError;

use super::{CompletionRequest, CompletionResponse, LlmProvider};

/// Backoff policy: `base_delay * 2^attempt` plus up to half the base delay
/// of jitter, capped by `max_retries` additional attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry following `attempt` (0-based). A rate-limit
    /// hint from the provider overrides the computed backoff.
    fn delay_for(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        if let Some(hint) = hint {
            return hint;
        }
        let backoff = self.base_delay * 2u32.saturating_pow(attempt);
        let jitter_ceiling = (self.base_delay.as_millis() as u64 / 2).max(1);
        let jitter = rand::thread_rng().gen_range(0..jitter_ceiling);
        backoff + Duration::from_millis(jitter)
    }
}

/// Whether an error is worth retrying — transport failures and rate limits
/// are; malformed responses are not.
fn is_retryable(error: &LlmError) -> bool {
    matches!(
        error,
        LlmError::RequestFailed { .. } | LlmError::RateLimited { .. } | LlmError::Io(_)
    )
}

/// An `LlmProvider` that retries another provider per a `RetryPolicy`.
pub struct RetryingProvider {
    inner: Arc<dyn LlmProvider>,
    policy: RetryPolicy,
}

impl RetryingProvider {
    pub fn new(inner: Arc<dyn LlmProvider>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl LlmProvider for RetryingProvider {
    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let mut attempt = 0;
        loop {
            match self.inner.complete(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(error) => {
                    if attempt >= self.policy.max_retries || !is_retryable(&error) {
                        return Err(error);
                    }
                    let hint = match &error {
                        LlmError::RateLimited { retry_after, .. } => *retry_after,
                        _ => None,
                    };
                    let delay = self.policy.delay_for(attempt, hint);
                    tracing::warn!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "LLM call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    /// Provider that fails `failures` times before succeeding.
    struct FlakyProvider {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl LlmProvider for FlakyProvider {
        fn model_name(&self) -> &str {
            "flaky"
        }

        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(LlmError::RequestFailed {
                    provider: "flaky".to_string(),
                    reason: "boom".to_string(),
                })
            } else {
                Ok(CompletionResponse {
                    content: "ok".to_string(),
                })
            }
        }
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let inner = Arc::new(FlakyProvider {
            failures: 2,
            calls: AtomicU32::new(0),
        });
        let provider = RetryingProvider::new(inner.clone(), fast_policy(2));
        let response = provider.complete(CompletionRequest::new("hi")).await.unwrap();
        assert_eq!(response.content, "ok");
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let inner = Arc::new(FlakyProvider {
            failures: 10,
            calls: AtomicU32::new(0),
        });
        let provider = RetryingProvider::new(inner.clone(), fast_policy(2));
        let result = provider.complete(CompletionRequest::new("hi")).await;
        assert!(result.is_err());
        // Initial attempt plus two retries.
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_errors_fail_fast() {
        struct BadJson;

        #[async_trait]
        impl LlmProvider for BadJson {
            fn model_name(&self) -> &str {
                "bad"
            }
            async fn complete(
                &self,
                _request: CompletionRequest,
            ) -> Result<CompletionResponse, LlmError> {
                Err(LlmError::InvalidResponse {
                    provider: "bad".to_string(),
                    reason: "not json".to_string(),
                })
            }
        }

        let provider = RetryingProvider::new(Arc::new(BadJson), fast_policy(5));
        let result = provider.complete(CompletionRequest::new("hi")).await;
        assert!(matches!(result, Err(LlmError::InvalidResponse { .. })));
    }
}
