//! Chat engine orchestration module.

pub mod orchestrator;

pub use orchestrator::{ChatOrchestrator, ChatReply, ChatTurn};
