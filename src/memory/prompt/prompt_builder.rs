//! Prompt builder for chat turns.

use crate::memory::core::message::ChatMessage;
use crate::memory::prompt::prompt_budget::PromptParts;

/// Assemble the ordered message list: preamble, history, new user message.
#[must_use]
pub fn build_chat_prompt(parts: &PromptParts) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(parts.history.len() + 2);
    messages.push(ChatMessage::system(parts.preamble.as_str()));
    messages.extend(parts.history.iter().cloned());
    messages.push(ChatMessage::user(parts.user_message.as_str()));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::core::message::Role;

    #[test]
    fn test_order_is_preamble_history_message() {
        let parts = PromptParts {
            preamble: "be helpful".to_string(),
            history: vec![ChatMessage::user("q1"), ChatMessage::assistant("a1")],
            user_message: "q2".to_string(),
        };

        let prompt = build_chat_prompt(&parts);
        let roles: Vec<Role> = prompt.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
        assert_eq!(prompt[0].content, "be helpful");
        assert_eq!(prompt[3].content, "q2");
    }

    #[test]
    fn test_empty_history() {
        let parts = PromptParts {
            preamble: "p".to_string(),
            history: Vec::new(),
            user_message: "hello".to_string(),
        };
        assert_eq!(build_chat_prompt(&parts).len(), 2);
    }
}
