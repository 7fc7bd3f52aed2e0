//! Completion client abstraction shared by the chat and summarization paths.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::memory::core::message::ChatMessage;

/// Boxed future type for completion calls.
pub type LlmFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors produced by completion backends.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Transport-level failure or unusable request.
    #[error("request failed: {0}")]
    Request(String),
    /// Upstream answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Provider error message.
        message: String,
    },
    /// Upstream answered without any text.
    #[error("empty or missing content in response")]
    EmptyResponse,
    /// The call exceeded its time budget.
    #[error("LLM call timed out after {0}s")]
    Timeout(u64),
    /// HTTP client error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    /// Rig HTTP client construction error.
    #[error("http client error: {0}")]
    HttpClient(#[from] rig::http_client::Error),
    /// Rig completion error.
    #[error("completion error: {0}")]
    Completion(#[from] rig::completion::CompletionError),
}

/// Convenience result alias for completion calls.
pub type LlmResult<T> = Result<T, LlmError>;

/// Per-call sampling options.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompletionOptions {
    /// Sampling temperature.
    pub temperature: f64,
    /// Optional cap on generated tokens.
    pub max_tokens: Option<u64>,
}

impl CompletionOptions {
    /// Options with the given temperature and no token cap.
    #[must_use]
    pub const fn with_temperature(temperature: f64) -> Self {
        Self {
            temperature,
            max_tokens: None,
        }
    }
}

/// Trait abstraction over chat completion backends.
pub trait LlmClient: Send + Sync {
    /// Complete an ordered list of role-tagged messages.
    ///
    /// # Errors
    /// Returns an error if the upstream call fails or yields no text.
    fn complete(
        &self,
        messages: Vec<ChatMessage>,
        options: CompletionOptions,
    ) -> LlmFuture<'_, LlmResult<String>>;

    /// Model name reported to callers.
    fn model(&self) -> &str;

    /// Complete a single raw prompt sent as one user message.
    ///
    /// # Errors
    /// Returns an error if the upstream call fails or yields no text.
    fn prompt(&self, prompt: &str, options: CompletionOptions) -> LlmFuture<'_, LlmResult<String>> {
        self.complete(vec![ChatMessage::user(prompt)], options)
    }
}

/// Run a completion under a time budget.
///
/// Dropping the inner future on timeout cancels the in-flight request.
///
/// # Errors
/// Returns [`LlmError::Timeout`] if the budget elapses, or the backend error.
pub async fn complete_within(
    client: &dyn LlmClient,
    messages: Vec<ChatMessage>,
    options: CompletionOptions,
    limit: Duration,
) -> LlmResult<String> {
    bounded(client, client.complete(messages, options), limit).await
}

/// Run a single raw prompt under a time budget.
///
/// # Errors
/// Returns [`LlmError::Timeout`] if the budget elapses, or the backend error.
pub async fn prompt_within(
    client: &dyn LlmClient,
    prompt: &str,
    options: CompletionOptions,
    limit: Duration,
) -> LlmResult<String> {
    bounded(client, client.prompt(prompt, options), limit).await
}

async fn bounded(
    client: &dyn LlmClient,
    call: LlmFuture<'_, LlmResult<String>>,
    limit: Duration,
) -> LlmResult<String> {
    if let Ok(result) = tokio::time::timeout(limit, call).await {
        result
    } else {
        warn!(model = client.model(), limit_secs = limit.as_secs(), "LLM call timed out");
        Err(LlmError::Timeout(limit.as_secs()))
    }
}
