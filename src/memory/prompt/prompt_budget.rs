//! Prompt budget enforcement utilities.

use crate::memory::core::message::ChatMessage;

/// Prompt parts before assembly.
#[derive(Clone, Debug)]
pub struct PromptParts {
    /// Fixed system preamble.
    pub preamble: String,
    /// Prior exchanges, oldest first.
    pub history: Vec<ChatMessage>,
    /// Current user message.
    pub user_message: String,
}

impl PromptParts {
    /// Approximate the character count of the assembled prompt.
    #[must_use]
    pub fn estimate_len(&self) -> usize {
        estimate_len(self)
    }
}

/// Enforce the prompt budget by dropping the oldest exchanges.
///
/// The preamble and the user message are never dropped, so a prompt may
/// still exceed `max_chars` once the history is empty.
#[must_use]
pub fn enforce_budget(mut parts: PromptParts, max_chars: usize) -> PromptParts {
    let mut total = estimate_len(&parts);
    let mut cut = 0;

    while total > max_chars && cut < parts.history.len() {
        let end = (cut + 2).min(parts.history.len());
        total -= parts.history[cut..end]
            .iter()
            .map(message_len)
            .sum::<usize>();
        cut = end;
    }

    if cut > 0 {
        parts.history.drain(..cut);
    }
    parts
}

fn message_len(message: &ChatMessage) -> usize {
    message.char_len() + message.role.as_str().len()
}

fn estimate_len(parts: &PromptParts) -> usize {
    let mut total = "system".len() + parts.preamble.chars().count();
    total += parts.history.iter().map(message_len).sum::<usize>();
    total += "user".len() + parts.user_message.chars().count();
    total
}
