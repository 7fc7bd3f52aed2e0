//! Application state shared across all request handlers.

use std::sync::Arc;

use crate::llm::{LlmClient, build_client};
use crate::memory::core::config::MemoryConfig;
use crate::memory::core::errors::CoreResult;
use crate::memory::engine::ChatOrchestrator;
use crate::memory::store::SessionMemoryStore;
use crate::memory::summarization::Summarizer;

/// Shared application state.
pub struct AppState {
    /// Chat engine over the process-wide session store.
    pub orchestrator: ChatOrchestrator,
    /// Text summarizer.
    pub summarizer: Summarizer,
    /// Effective configuration.
    pub config: Arc<MemoryConfig>,
}

impl AppState {
    /// Build state with the completion backend named by the configuration.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or the backend
    /// cannot be built.
    pub fn from_config(config: MemoryConfig) -> CoreResult<Arc<Self>> {
        let client = build_client(&config.llm)?;
        Self::with_client(config, client)
    }

    /// Build state around an existing completion backend.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn with_client(config: MemoryConfig, client: Arc<dyn LlmClient>) -> CoreResult<Arc<Self>> {
        config.validate()?;
        let config = Arc::new(config);
        let store = Arc::new(SessionMemoryStore::new(&config.short_term));
        let orchestrator = ChatOrchestrator::new(store, Arc::clone(&client), Arc::clone(&config));
        let summarizer = Summarizer::new(client, Arc::clone(&config))?;

        Ok(Arc::new(Self {
            orchestrator,
            summarizer,
            config,
        }))
    }
}
