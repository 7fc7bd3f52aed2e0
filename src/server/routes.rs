//! HTTP route handlers for the chat and summarization API.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tower_http::services::ServeDir;
use tracing::debug;

use crate::memory::core::errors::CoreError;
use crate::memory::core::ids::SessionId;
use crate::memory::core::message::ChatMessage;
use crate::memory::engine::ChatTurn;
use crate::memory::summarization::SummaryMethod;

use super::error::ApiError;
use super::state::AppState;

/// Create the API router with all routes.
///
/// Paths outside the API are served from the configured static directory.
pub fn create_router(state: Arc<AppState>) -> Router {
    let static_dir = ServeDir::new(&state.config.server.static_dir);

    Router::new()
        .route("/health", get(health_check))
        .route("/ai", get(features))
        .route("/ai/chat", post(chat))
        .route("/ai/summarize", post(summarize))
        .route("/ai/clear", post(clear_session))
        .route("/ai/config", get(config_info))
        .fallback_service(static_dir)
        .with_state(state)
}

/// Success envelope shared by the chat and summarize endpoints.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    /// Always `true`.
    pub success: bool,
    /// Endpoint payload.
    pub data: T,
    /// Human-readable status.
    pub message: &'static str,
}

impl<T> Envelope<T> {
    const fn ok(data: T, message: &'static str) -> Self {
        Self {
            success: true,
            data,
            message,
        }
    }
}

/// Decode a JSON body, treating an empty body as the default request.
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|err| ApiError(CoreError::Validation(format!("invalid JSON body: {err}"))))
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Feature listing for the AI endpoints.
async fn features() -> impl IntoResponse {
    Json(serde_json::json!({
        "success": true,
        "message": "AI endpoints",
        "features": {
            "POST /ai/chat": "chat with per-session memory",
            "POST /ai/summarize": "summarize text of any length",
            "POST /ai/clear": "clear a session's history",
            "GET /ai/config": "completion backend configuration"
        }
    }))
}

/// Chat request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// The user's message.
    pub message: Option<String>,
    /// Caller-held transcript overriding stored history.
    pub history: Option<Vec<ChatMessage>>,
    /// Target session, `"default"` when absent.
    pub session_id: Option<String>,
}

/// Chat response payload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatData {
    /// The user message as received.
    pub user_message: String,
    /// The model reply.
    pub ai_response: String,
    /// Stored history after the turn.
    pub history: Vec<ChatMessage>,
    /// Session the turn was recorded in.
    pub session_id: SessionId,
    /// Model used.
    pub model: String,
    /// RFC 3339 completion time.
    pub timestamp: String,
}

/// Handle chat requests.
async fn chat(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Envelope<ChatData>>, ApiError> {
    let request: ChatRequest = parse_body(&body)?;
    let turn = ChatTurn {
        session_id: SessionId::from(request.session_id),
        message: request.message.unwrap_or_default(),
        history: request.history,
    };

    let reply = state.orchestrator.chat(turn).await?;
    debug!(session = %reply.session_id, history = reply.history.len(), "chat turn committed");

    Ok(Json(Envelope::ok(
        ChatData {
            user_message: reply.user_message,
            ai_response: reply.reply,
            history: reply.history,
            session_id: reply.session_id,
            model: reply.model,
            timestamp: reply.timestamp.to_rfc3339(),
        },
        "chat completed",
    )))
}

/// Summarize request.
#[derive(Debug, Default, Deserialize)]
pub struct SummarizeRequest {
    /// Text to summarize.
    pub text: Option<String>,
}

/// Summarize response payload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeData {
    /// Preview of the source text.
    pub original_text: String,
    /// Final summary.
    pub summary: String,
    /// Source length in characters.
    pub original_length: usize,
    /// Strategy used.
    pub method: SummaryMethod,
    /// Chunk count for the chunked strategy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunks_processed: Option<usize>,
    /// Model used.
    pub model: String,
    /// RFC 3339 completion time.
    pub timestamp: String,
}

/// Handle summarize requests.
async fn summarize(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Envelope<SummarizeData>>, ApiError> {
    let request: SummarizeRequest = parse_body(&body)?;
    let text = request.text.unwrap_or_default();

    let outcome = state.summarizer.summarize(&text).await?;
    let message = match outcome.method {
        SummaryMethod::Direct => "text summarized",
        SummaryMethod::Chunked => "long text summarized in chunks",
    };

    Ok(Json(Envelope::ok(
        SummarizeData {
            original_text: outcome.original_preview,
            summary: outcome.summary,
            original_length: outcome.original_length,
            method: outcome.method,
            chunks_processed: outcome.chunks_processed,
            model: outcome.model,
            timestamp: Utc::now().to_rfc3339(),
        },
        message,
    )))
}

/// Clear request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearRequest {
    /// Session to clear, `"default"` when absent.
    pub session_id: Option<String>,
}

/// Clear response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearResponse {
    /// Always `true`.
    pub success: bool,
    /// Human-readable status.
    pub message: &'static str,
    /// Session that was cleared.
    pub session_id: SessionId,
}

/// Handle session clear requests.
async fn clear_session(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ClearResponse>, ApiError> {
    let request: ClearRequest = parse_body(&body)?;
    let session_id = SessionId::from(request.session_id);
    state.orchestrator.clear(&session_id).await;

    Ok(Json(ClearResponse {
        success: true,
        message: "conversation history cleared",
        session_id,
    }))
}

/// Report backend configuration without secrets.
async fn config_info(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let llm = &state.config.llm;
    let ready = llm.credential_configured();

    Json(serde_json::json!({
        "success": true,
        "message": "AI configuration",
        "configuration": {
            "apiKeyConfigured": ready,
            "provider": llm.provider,
            "baseUrl": llm.base_url,
            "model": llm.model,
            "timeoutSecs": llm.timeout_secs,
            "sessionWindow": state.config.short_term.window,
            "summaryThreshold": state.config.summary.direct_threshold,
            "summaryChunkSize": state.config.summary.chunk_size
        },
        "currentStatus": {
            "ready": ready,
            "sessionsActive": state.orchestrator.session_count()
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_body_is_default_request() {
        let request: Result<ClearRequest, ApiError> = parse_body(&Bytes::new());
        assert!(request.is_ok_and(|r| r.session_id.is_none()));

        let request: Result<ClearRequest, ApiError> = parse_body(&Bytes::from_static(b"  \n"));
        assert!(request.is_ok());
    }

    #[test]
    fn test_invalid_json_is_validation_error() {
        let request: Result<ChatRequest, ApiError> = parse_body(&Bytes::from_static(b"{not json"));
        assert!(matches!(request, Err(ApiError(CoreError::Validation(_)))));
    }

    #[test]
    fn test_chat_request_accepts_legacy_history() {
        let body = Bytes::from_static(
            br#"{"message":"next","sessionId":"s9","history":[{"type":"human","content":"q"},{"type":"ai","content":"a"}]}"#,
        );
        let request: ChatRequest = parse_body(&body).unwrap_or_default();
        assert_eq!(request.session_id.as_deref(), Some("s9"));
        assert_eq!(
            request.history,
            Some(vec![ChatMessage::user("q"), ChatMessage::assistant("a")])
        );
    }
}
