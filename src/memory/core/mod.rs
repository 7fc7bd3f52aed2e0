//! Core memory types and identifiers.

pub mod config;
pub mod errors;
pub mod ids;
pub mod message;

pub use config::{
    DEFAULT_SYSTEM_PREAMBLE, LlmConfig, LlmProvider, MemoryConfig, PromptConfig, ServerConfig,
    ShortTermConfig, SummaryConfig,
};
pub use errors::{CoreError, CoreResult};
pub use ids::{DEFAULT_SESSION_ID, SessionId};
pub use message::{ChatMessage, Role, Session, complete_exchanges};
