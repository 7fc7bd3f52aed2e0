//! Ollama completion backend built on Rig.

use reqwest::Client as ReqwestClient;
use rig::client::{CompletionClient, Nothing};
use rig::completion::CompletionModel;
use rig::message::{AssistantContent, Message};
use rig::providers::ollama;
use tracing::debug;

use crate::llm::client::{CompletionOptions, LlmClient, LlmError, LlmFuture, LlmResult};
use crate::memory::core::config::LlmConfig;
use crate::memory::core::message::{ChatMessage, Role};

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default local model.
pub const DEFAULT_OLLAMA_MODEL: &str = "mistral:7b-instruct-q8_0";

/// Completion client for a local or remote Ollama server.
pub struct OllamaClient {
    model: ollama::CompletionModel<ReqwestClient>,
    model_name: String,
}

impl OllamaClient {
    /// Create a new Ollama client from config.
    ///
    /// # Errors
    /// Returns an error if the Rig client cannot be built.
    pub fn new(config: &LlmConfig) -> LlmResult<Self> {
        let client = ollama::Client::<ReqwestClient>::builder()
            .api_key(Nothing)
            .base_url(&config.base_url)
            .build()
            .map_err(LlmError::from)?;
        let model = client.completion_model(config.model.clone());

        Ok(Self {
            model,
            model_name: config.model.clone(),
        })
    }

    async fn send(&self, messages: Vec<ChatMessage>, options: CompletionOptions) -> LlmResult<String> {
        let parts = split_messages(messages).ok_or_else(|| {
            LlmError::Request("completion needs at least one non-system message".to_string())
        })?;

        debug!(
            model = %self.model_name,
            history = parts.history.len(),
            "sending Ollama completion request"
        );

        let mut builder = self
            .model
            .completion_request(parts.prompt)
            .messages(parts.history)
            .temperature(options.temperature)
            .max_tokens_opt(options.max_tokens);
        if let Some(preamble) = parts.preamble {
            builder = builder.preamble(preamble);
        }

        let response = self.model.completion(builder.build()).await?;
        let text = extract_text(&response.choice);
        let text = text.trim();
        if text.is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(text.to_string())
    }
}

impl LlmClient for OllamaClient {
    fn complete(
        &self,
        messages: Vec<ChatMessage>,
        options: CompletionOptions,
    ) -> LlmFuture<'_, LlmResult<String>> {
        Box::pin(async move { self.send(messages, options).await })
    }

    fn model(&self) -> &str {
        &self.model_name
    }
}

/// Chat messages rearranged into Rig's preamble / history / prompt shape.
struct RigParts {
    preamble: Option<String>,
    history: Vec<Message>,
    prompt: Message,
}

fn split_messages(messages: Vec<ChatMessage>) -> Option<RigParts> {
    let mut preamble: Option<String> = None;
    let mut history: Vec<Message> = Vec::with_capacity(messages.len());

    for message in messages {
        match message.role {
            Role::System => match preamble.as_mut() {
                Some(existing) => {
                    existing.push_str("\n\n");
                    existing.push_str(&message.content);
                }
                None => preamble = Some(message.content),
            },
            Role::User => history.push(Message::user(message.content)),
            Role::Assistant => history.push(Message::assistant(message.content)),
        }
    }

    let prompt = history.pop()?;
    Some(RigParts {
        preamble,
        history,
        prompt,
    })
}

fn extract_text(choice: &rig::OneOrMany<AssistantContent>) -> String {
    let mut out = String::new();
    for content in choice.iter() {
        if let AssistantContent::Text(text) = content {
            out.push_str(&text.text);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_moves_system_to_preamble() {
        let parts = split_messages(vec![
            ChatMessage::system("rules"),
            ChatMessage::user("q1"),
            ChatMessage::assistant("a1"),
            ChatMessage::user("q2"),
        ]);

        let parts = parts.map(|p| (p.preamble, p.history.len()));
        assert_eq!(parts, Some((Some("rules".to_string()), 2)));
    }

    #[test]
    fn test_split_requires_prompt() {
        assert!(split_messages(vec![ChatMessage::system("only rules")]).is_none());
    }
}
