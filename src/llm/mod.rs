//! Completion backends behind a single [`LlmClient`] seam.

pub mod client;
pub mod echo;
pub mod ollama;
pub mod openai;

use std::sync::Arc;

use tracing::info;

pub use client::{
    CompletionOptions, LlmClient, LlmError, LlmFuture, LlmResult, complete_within, prompt_within,
};
pub use echo::EchoClient;
pub use ollama::OllamaClient;
pub use openai::OpenAiCompatibleClient;

use crate::memory::core::config::{LlmConfig, LlmProvider};

/// Build the configured completion backend.
///
/// # Errors
/// Returns an error if the underlying HTTP client cannot be built.
pub fn build_client(config: &LlmConfig) -> LlmResult<Arc<dyn LlmClient>> {
    let client: Arc<dyn LlmClient> = match config.provider {
        LlmProvider::OpenAi => Arc::new(OpenAiCompatibleClient::new(config)?),
        LlmProvider::Ollama => Arc::new(OllamaClient::new(config)?),
        LlmProvider::Echo => Arc::new(EchoClient),
    };
    info!(
        provider = %config.provider,
        model = client.model(),
        base_url = %config.base_url,
        "completion backend ready"
    );
    Ok(client)
}
