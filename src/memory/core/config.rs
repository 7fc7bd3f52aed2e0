//! Configuration for the memory engine, the summarizer and the server.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::llm::ollama::{DEFAULT_OLLAMA_MODEL, DEFAULT_OLLAMA_URL};
use crate::memory::core::errors::{CoreError, CoreResult};

/// Default chat preamble sent ahead of every conversation.
pub const DEFAULT_SYSTEM_PREAMBLE: &str = "You are a friendly, helpful AI assistant. \
You remember the earlier turns of this conversation and answer with that context in mind.";

/// Top-level configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Short-term session memory settings.
    pub short_term: ShortTermConfig,
    /// Prompt construction settings.
    pub prompt: PromptConfig,
    /// Summarization settings.
    pub summary: SummaryConfig,
    /// Completion model settings.
    pub llm: LlmConfig,
    /// HTTP server settings.
    pub server: ServerConfig,
}

impl MemoryConfig {
    /// Build a configuration from the process environment.
    ///
    /// Unset variables keep their defaults; unparsable numbers are rejected.
    ///
    /// # Errors
    /// Returns an error if a variable holds an invalid value.
    pub fn from_env() -> CoreResult<Self> {
        let mut config = Self::default();

        if let Some(provider) = env_string("LLM_PROVIDER") {
            config.llm.provider = provider.parse()?;
        }
        if config.llm.provider == LlmProvider::Ollama {
            config.llm.base_url = DEFAULT_OLLAMA_URL.to_string();
            config.llm.model = DEFAULT_OLLAMA_MODEL.to_string();
        }
        if let Some(key) = env_string("OPENAI_API_KEY") {
            config.llm.api_key = Some(key);
        }
        if let Some(model) = env_string("OPENAI_MODEL") {
            config.llm.model = model;
        }
        if let Some(base_url) = env_string("OPENAI_BASE_URL") {
            config.llm.base_url = base_url;
        }
        if let Some(secs) = env_parse("LLM_TIMEOUT_SECS")? {
            config.llm.timeout_secs = secs;
        }
        if let Some(window) = env_parse("SESSION_WINDOW")? {
            config.short_term.window = window;
        }
        if let Some(max_chars) = env_parse("PROMPT_MAX_CHARS")? {
            config.prompt.max_chars = max_chars;
        }
        if let Some(threshold) = env_parse("SUMMARY_THRESHOLD")? {
            config.summary.direct_threshold = threshold;
        }
        if let Some(size) = env_parse("SUMMARY_CHUNK_SIZE")? {
            config.summary.chunk_size = size;
        }
        if let Some(overlap) = env_parse("SUMMARY_CHUNK_OVERLAP")? {
            config.summary.chunk_overlap = overlap;
        }
        if let Some(concurrency) = env_parse("SUMMARY_CONCURRENCY")? {
            config.summary.concurrency = concurrency;
        }
        if let Some(max_chars) = env_parse("SUMMARY_MERGE_MAX_CHARS")? {
            config.summary.merge_max_chars = max_chars;
        }
        if let Some(port) = env_parse("PORT")? {
            config.server.port = port;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> CoreResult<()> {
        if self.short_term.window == 0 {
            return Err(CoreError::Config(
                "short_term.window must be > 0".to_string(),
            ));
        }

        if self.prompt.max_chars == 0 {
            return Err(CoreError::Config("prompt.max_chars must be > 0".to_string()));
        }

        if self.summary.chunk_size == 0 {
            return Err(CoreError::Config(
                "summary.chunk_size must be > 0".to_string(),
            ));
        }

        if self.summary.chunk_overlap >= self.summary.chunk_size {
            return Err(CoreError::Config(format!(
                "summary.chunk_overlap ({}) must be < summary.chunk_size ({})",
                self.summary.chunk_overlap, self.summary.chunk_size
            )));
        }

        if self.summary.direct_threshold < self.summary.chunk_size {
            return Err(CoreError::Config(format!(
                "summary.direct_threshold ({}) must be >= summary.chunk_size ({})",
                self.summary.direct_threshold, self.summary.chunk_size
            )));
        }

        if self.summary.concurrency == 0 {
            return Err(CoreError::Config(
                "summary.concurrency must be > 0".to_string(),
            ));
        }

        if self.llm.timeout_secs == 0 {
            return Err(CoreError::Config("llm.timeout_secs must be > 0".to_string()));
        }

        if self.llm.model.trim().is_empty() {
            return Err(CoreError::Config("llm.model must not be empty".to_string()));
        }

        Url::parse(&self.llm.base_url)?;

        Ok(())
    }
}

/// Short-term session memory settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShortTermConfig {
    /// Number of most recent exchanges kept per session.
    pub window: usize,
}

impl ShortTermConfig {
    /// Maximum number of stored messages per session.
    #[must_use]
    pub const fn max_messages(&self) -> usize {
        self.window.saturating_mul(2)
    }
}

impl Default for ShortTermConfig {
    fn default() -> Self {
        Self { window: 10 }
    }
}

/// Prompt construction settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Fixed system message placed ahead of every chat prompt.
    pub system_preamble: String,
    /// Character budget for the assembled chat prompt.
    pub max_chars: usize,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system_preamble: DEFAULT_SYSTEM_PREAMBLE.to_string(),
            max_chars: 24_000,
        }
    }
}

/// Summarization settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SummaryConfig {
    /// Texts up to this many characters are summarized in one call.
    pub direct_threshold: usize,
    /// Chunk size for long texts.
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks.
    pub chunk_overlap: usize,
    /// Chunk summaries allowed in flight at once (1 = sequential).
    pub concurrency: usize,
    /// Joined partial summaries above this size are merged in groups first.
    pub merge_max_chars: usize,
    /// Length of the original-text preview in responses.
    pub preview_chars: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            direct_threshold: 3000,
            chunk_size: 2000,
            chunk_overlap: 0,
            concurrency: 1,
            merge_max_chars: 12_000,
            preview_chars: 200,
        }
    }
}

/// Completion backend kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Any `/chat/completions` endpoint (OpenAI and compatible gateways).
    #[default]
    OpenAi,
    /// Local Ollama server.
    Ollama,
    /// Offline echo backend for development.
    Echo,
}

impl LlmProvider {
    /// Stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
            Self::Echo => "echo",
        }
    }

    /// Whether this backend needs an API key.
    #[must_use]
    pub const fn requires_api_key(self) -> bool {
        matches!(self, Self::OpenAi)
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LlmProvider {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            "echo" => Ok(Self::Echo),
            other => Err(CoreError::Config(format!("unknown LLM provider: {other}"))),
        }
    }
}

/// Completion model settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Backend kind.
    pub provider: LlmProvider,
    /// API credential.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Model name.
    pub model: String,
    /// Base URL of the API.
    pub base_url: String,
    /// Sampling temperature for chat turns.
    pub chat_temperature: f64,
    /// Sampling temperature for summaries.
    pub summary_temperature: f64,
    /// Optional max tokens per completion.
    pub max_tokens: Option<u64>,
    /// Upper bound for a single completion call.
    pub timeout_secs: u64,
}

impl LlmConfig {
    /// Whether the backend can be called with the configured credential.
    #[must_use]
    pub fn credential_configured(&self) -> bool {
        !self.provider.requires_api_key()
            || self
                .api_key
                .as_deref()
                .is_some_and(|key| !key.trim().is_empty())
    }

    /// Fail fast when the credential is missing.
    ///
    /// # Errors
    /// Returns a configuration error if the provider needs a key and none is set.
    pub fn require_credential(&self) -> CoreResult<()> {
        if self.credential_configured() {
            Ok(())
        } else {
            Err(CoreError::Config(
                "OPENAI_API_KEY environment variable is not configured".to_string(),
            ))
        }
    }

    /// Timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("chat_temperature", &self.chat_temperature)
            .field("summary_temperature", &self.summary_temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAi,
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            chat_temperature: 0.7,
            summary_temperature: 0.3,
            max_tokens: None,
            timeout_secs: 60,
        }
    }
}

/// HTTP server settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listening port.
    pub port: u16,
    /// Directory served for unknown paths.
    pub static_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            static_dir: "static".to_string(),
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_parse<T: FromStr>(name: &str) -> CoreResult<Option<T>> {
    env_string(name)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|_| CoreError::Config(format!("{name} has an invalid value: {raw}")))
        })
        .transpose()
}
