//! Echo backend: replies with the last user message prefixed by `[echo]`.
//! Lets the whole request path run without network access or an API key.

use crate::llm::client::{CompletionOptions, LlmClient, LlmFuture, LlmResult};
use crate::memory::core::message::{ChatMessage, Role};

/// Offline completion backend.
#[derive(Debug, Clone, Default)]
pub struct EchoClient;

impl LlmClient for EchoClient {
    fn complete(
        &self,
        messages: Vec<ChatMessage>,
        _options: CompletionOptions,
    ) -> LlmFuture<'_, LlmResult<String>> {
        let last = messages
            .into_iter()
            .rev()
            .find(|message| message.role == Role::User)
            .map(|message| message.content)
            .unwrap_or_default();
        Box::pin(async move { Ok(format!("[echo] {last}")) })
    }

    fn model(&self) -> &str {
        "echo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echoes_last_user_message() {
        let reply = EchoClient
            .complete(
                vec![
                    ChatMessage::system("rules"),
                    ChatMessage::user("first"),
                    ChatMessage::assistant("ok"),
                    ChatMessage::user("second"),
                ],
                CompletionOptions::with_temperature(0.0),
            )
            .await;
        assert_eq!(reply.ok().as_deref(), Some("[echo] second"));
    }

    #[tokio::test]
    async fn test_prompt_uses_single_message() {
        let reply = EchoClient
            .prompt("hello", CompletionOptions::with_temperature(0.0))
            .await;
        assert_eq!(reply.ok().as_deref(), Some("[echo] hello"));
    }
}
