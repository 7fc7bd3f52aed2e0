//! OpenAI-compatible chat completion client (`POST {base_url}/chat/completions`).
//!
//! Works against OpenAI itself and the many gateways that mirror its API.
//! Wire types stay private to this module.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::llm::client::{CompletionOptions, LlmClient, LlmError, LlmFuture, LlmResult};
use crate::memory::core::config::LlmConfig;
use crate::memory::core::message::ChatMessage;

/// Connection establishment timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for any `/chat/completions` endpoint.
///
/// Cheap to clone: `reqwest::Client` is reference counted internally.
#[derive(Clone)]
pub struct OpenAiCompatibleClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiCompatibleClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &LlmConfig) -> LlmResult<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            endpoint: completions_endpoint(&config.base_url),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    async fn send(&self, messages: Vec<ChatMessage>, options: CompletionOptions) -> LlmResult<String> {
        let payload = build_payload(&self.model, &messages, options);

        debug!(
            model = %self.model,
            messages = messages.len(),
            temperature = ?payload.temperature,
            "sending chat completion request"
        );

        let mut request = self.client.post(&self.endpoint).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|err| {
            error!(url = %self.endpoint, error = %err, "chat completion transport failure");
            LlmError::Http(err)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read error body>".to_string());
            let message = error_message(&body);
            error!(status = status.as_u16(), %message, "chat completion returned HTTP error");
            return Err(LlmError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let parsed = response.json::<ChatCompletionResponse>().await?;
        debug!(choices = parsed.choices.len(), "received chat completion");
        first_choice_text(parsed)
    }
}

impl LlmClient for OpenAiCompatibleClient {
    fn complete(
        &self,
        messages: Vec<ChatMessage>,
        options: CompletionOptions,
    ) -> LlmFuture<'_, LlmResult<String>> {
        Box::pin(async move { self.send(messages, options).await })
    }

    fn model(&self) -> &str {
        &self.model
    }
}

fn completions_endpoint(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

fn build_payload<'a>(
    model: &'a str,
    messages: &'a [ChatMessage],
    options: CompletionOptions,
) -> ChatCompletionRequest<'a> {
    // gpt-5 family models reject an explicit temperature.
    let temperature = if model.starts_with("gpt-5") {
        None
    } else {
        Some(options.temperature)
    };

    ChatCompletionRequest {
        model,
        messages: messages
            .iter()
            .map(|message| WireMessage {
                role: message.role.as_str(),
                content: &message.content,
            })
            .collect(),
        temperature,
        max_tokens: options.max_tokens,
    }
}

fn first_choice_text(parsed: ChatCompletionResponse) -> LlmResult<String> {
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or(LlmError::EmptyResponse)
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body).map_or_else(
        |_| body.trim().to_string(),
        |envelope| {
            let code = envelope
                .error
                .code
                .map(|value| match value {
                    serde_json::Value::String(code) => format!(" [code={code}]"),
                    other => format!(" [code={other}]"),
                })
                .unwrap_or_default();
            format!("{}{code}", envelope.error.message)
        },
    )
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    code: Option<serde_json::Value>,
}
