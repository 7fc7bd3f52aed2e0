//! Conversation message and session model.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::memory::core::ids::SessionId;

/// Role of a chat message.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// System preamble.
    System,
    /// User input. Legacy clients send `human`.
    #[serde(alias = "human")]
    User,
    /// Model reply. Legacy clients send `ai`.
    #[serde(alias = "ai")]
    Assistant,
}

impl Role {
    /// Stable string form used on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "system" => Ok(Self::System),
            "user" | "human" => Ok(Self::User),
            "assistant" | "ai" => Ok(Self::Assistant),
            _ => Err(value.to_string()),
        }
    }
}

/// A single role-tagged message.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author of the message.
    #[serde(alias = "type")]
    pub role: Role,
    /// Text payload.
    pub content: String,
}

impl ChatMessage {
    /// Build a message with an explicit role.
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Build a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Build a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Build an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Character length of the content.
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

/// A conversation thread keyed by session id.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Session identifier.
    pub session_id: SessionId,
    /// Ordered messages, alternating user and assistant.
    pub messages: Vec<ChatMessage>,
}

impl Session {
    /// Create an empty session.
    #[must_use]
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            messages: Vec::new(),
        }
    }

    /// Number of complete user/assistant exchanges.
    #[must_use]
    pub fn exchanges(&self) -> usize {
        self.messages.len() / 2
    }

    /// Whether the session holds no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Keep only complete user/assistant exchanges, in order.
///
/// System messages, blank messages and unpaired halves are dropped.
#[must_use]
pub fn complete_exchanges(messages: Vec<ChatMessage>) -> Vec<ChatMessage> {
    let mut out = Vec::with_capacity(messages.len());
    let mut pending_user: Option<ChatMessage> = None;

    for message in messages {
        if message.content.trim().is_empty() {
            continue;
        }
        match message.role {
            Role::System => {}
            Role::User => pending_user = Some(message),
            Role::Assistant => {
                if let Some(user) = pending_user.take() {
                    out.push(user);
                    out.push(message);
                }
            }
        }
    }

    out
}
