//! Conversational memory and summarization.
//!
//! This module is organized into:
//! - `core`: Configuration, errors, session identifiers, and chat messages
//! - `store`: Per-session bounded history with per-key locking
//! - `prompt`: Budget enforcement and prompt assembly
//! - `engine`: Chat turn orchestration
//! - `summarization`: Text chunking and map-reduce summarization

pub mod core;
pub mod engine;
pub mod prompt;
pub mod store;
pub mod summarization;

pub use core::{
    ChatMessage, CoreError, CoreResult, LlmConfig, LlmProvider, MemoryConfig, PromptConfig, Role,
    ServerConfig, Session, SessionId, ShortTermConfig, SummaryConfig,
};
pub use engine::{ChatOrchestrator, ChatReply, ChatTurn};
pub use prompt::{PromptParts, build_chat_prompt, enforce_budget};
pub use store::SessionMemoryStore;
pub use summarization::{SummaryMethod, SummaryOutcome, Summarizer, TextChunker};
