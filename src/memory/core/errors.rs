//! Error types for the memory and summarization core.

use thiserror::Error;

use crate::llm::LlmError;

/// Core error type shared by the orchestrator, the store and the summarizer.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A required field is missing or empty.
    #[error("validation error: {0}")]
    Validation(String),
    /// Missing credential or invalid configuration values.
    #[error("configuration error: {0}")]
    Config(String),
    /// Upstream LLM failure (network, timeout, quota, malformed reply).
    #[error("service error: {0}")]
    Service(#[from] LlmError),
    /// Referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// URL parse error in configuration.
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

impl CoreError {
    /// Build a validation error for a missing field.
    #[must_use]
    pub fn missing(field: &str) -> Self {
        Self::Validation(format!("{field} is required"))
    }

    /// HTTP status code this error maps to.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::NotFound(_) => 404,
            Self::Config(_) | Self::Service(_) | Self::Url(_) => 500,
        }
    }
}

/// Convenience result alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
