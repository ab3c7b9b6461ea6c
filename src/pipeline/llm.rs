//! Model interaction: the backend seam and the provider adapter.
//!
//! Everything that talks to a model goes through [`ChatBackend`]: one system
//! message, one user message, a temperature and an output cap in; text and
//! token counts out. [`ProviderBackend`] adapts any `edgequake_llm`
//! provider; tests plug in scripted backends instead.
//!
//! Retry decisions are not made here. The adapter only classifies failures
//! into [`CallError`] variants so callers can decide.

use crate::error::CallError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A system + user prompt pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPair {
    pub system: String,
    pub user: String,
}

impl PromptPair {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

/// One request to the remote model.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: PromptPair,
    pub temperature: f32,
    pub max_tokens: usize,
}

/// Generated text plus usage.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    pub content: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Text-to-text model boundary.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, CallError>;
}

/// Send `request`, failing with [`CallError::Timeout`] after `timeout`.
pub async fn complete_with_timeout(
    backend: &dyn ChatBackend,
    request: &CompletionRequest,
    timeout: Duration,
) -> Result<Completion, CallError> {
    match tokio::time::timeout(timeout, backend.complete(request)).await {
        Ok(result) => result,
        Err(_) => Err(CallError::Timeout {
            secs: timeout.as_secs(),
        }),
    }
}

/// [`ChatBackend`] over an `edgequake_llm` provider.
pub struct ProviderBackend {
    provider: Arc<dyn LLMProvider>,
}

impl ProviderBackend {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl ChatBackend for ProviderBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, CallError> {
        let messages = vec![
            ChatMessage::system(request.prompt.system.as_str()),
            ChatMessage::user(request.prompt.user.as_str()),
        ];
        let options = build_options(request);

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| classify_error(&e.to_string()))?;

        debug!(
            "{} input tokens, {} output tokens",
            response.prompt_tokens, response.completion_tokens
        );

        Ok(Completion {
            content: response.content,
            prompt_tokens: response.prompt_tokens as u64,
            completion_tokens: response.completion_tokens as u64,
        })
    }
}

/// Build `CompletionOptions` from a request.
fn build_options(request: &CompletionRequest) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(request.temperature),
        max_tokens: Some(request.max_tokens),
        ..Default::default()
    }
}

/// Sort a provider error message into a [`CallError`].
///
/// Providers surface HTTP status only through their messages, so this
/// matches on the usual markers. Unknown failures count as transient.
pub fn classify_error(message: &str) -> CallError {
    let lower = message.to_ascii_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if has(&["401", "403", "unauthorized", "forbidden", "invalid api key", "authentication"]) {
        CallError::Permanent(message.to_string())
    } else if has(&["429", "rate limit", "rate_limit", "too many requests"]) {
        CallError::RateLimited(message.to_string())
    } else if has(&["timed out", "timeout"]) {
        CallError::Transient(message.to_string())
    } else if has(&["400 bad request", "invalid_request", "content_filter", "context length"]) {
        CallError::Permanent(message.to_string())
    } else {
        CallError::Transient(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_options_copies_request_limits() {
        let req = CompletionRequest {
            prompt: PromptPair::new("sys", "user"),
            temperature: 0.2,
            max_tokens: 800,
        };
        let opts = build_options(&req);
        assert_eq!(opts.temperature, Some(0.2));
        assert_eq!(opts.max_tokens, Some(800));
    }

    #[test]
    fn classify_auth_errors_as_permanent() {
        assert!(matches!(
            classify_error("HTTP 401 Unauthorized: invalid api key"),
            CallError::Permanent(_)
        ));
        assert!(matches!(
            classify_error("Authentication failed"),
            CallError::Permanent(_)
        ));
    }

    #[test]
    fn classify_rate_limit_and_network() {
        assert!(matches!(
            classify_error("429 Too Many Requests"),
            CallError::RateLimited(_)
        ));
        assert!(matches!(
            classify_error("error sending request: connection reset"),
            CallError::Transient(_)
        ));
        assert!(matches!(
            classify_error("failed to parse response body"),
            CallError::Transient(_)
        ));
    }

    struct Slow;

    #[async_trait]
    impl ChatBackend for Slow {
        async fn complete(&self, _request: &CompletionRequest) -> Result<Completion, CallError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Completion::default())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_becomes_call_error() {
        let req = CompletionRequest {
            prompt: PromptPair::new("s", "u"),
            temperature: 0.0,
            max_tokens: 10,
        };
        let err = complete_with_timeout(&Slow, &req, Duration::from_secs(2))
            .await
            .unwrap_err();
        assert_eq!(err, CallError::Timeout { secs: 2 });
    }
}
