//! Chat turn orchestration over session memory.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::llm::{CompletionOptions, LlmClient, complete_within};
use crate::memory::core::config::MemoryConfig;
use crate::memory::core::errors::{CoreError, CoreResult};
use crate::memory::core::ids::SessionId;
use crate::memory::core::message::{ChatMessage, complete_exchanges};
use crate::memory::prompt::{PromptParts, build_chat_prompt, enforce_budget};
use crate::memory::store::SessionMemoryStore;

/// One inbound chat request.
#[derive(Clone, Debug, Default)]
pub struct ChatTurn {
    /// Target session.
    pub session_id: SessionId,
    /// New user message.
    pub message: String,
    /// Caller-held transcript that replaces stored history when non-empty.
    pub history: Option<Vec<ChatMessage>>,
}

impl ChatTurn {
    /// Build a turn without external history.
    #[must_use]
    pub fn new(session_id: impl Into<SessionId>, message: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            message: message.into(),
            history: None,
        }
    }

    /// Attach a caller-held transcript.
    #[must_use]
    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = Some(history);
        self
    }
}

/// Outcome of a successful chat turn.
#[derive(Clone, Debug)]
pub struct ChatReply {
    /// Session the turn was recorded in.
    pub session_id: SessionId,
    /// The user message as received.
    pub user_message: String,
    /// Model reply.
    pub reply: String,
    /// Stored history after the append and trim.
    pub history: Vec<ChatMessage>,
    /// Model that produced the reply.
    pub model: String,
    /// Completion time.
    pub timestamp: DateTime<Utc>,
}

/// Builds prompts from session memory, calls the model, records the exchange.
pub struct ChatOrchestrator {
    store: Arc<SessionMemoryStore>,
    client: Arc<dyn LlmClient>,
    config: Arc<MemoryConfig>,
}

impl ChatOrchestrator {
    /// Create an orchestrator over an existing store.
    #[must_use]
    pub fn new(
        store: Arc<SessionMemoryStore>,
        client: Arc<dyn LlmClient>,
        config: Arc<MemoryConfig>,
    ) -> Self {
        Self {
            store,
            client,
            config,
        }
    }

    /// Session store backing this orchestrator.
    #[must_use]
    pub const fn store(&self) -> &Arc<SessionMemoryStore> {
        &self.store
    }

    /// Model name of the completion backend.
    #[must_use]
    pub fn model(&self) -> &str {
        self.client.model()
    }

    /// Run one chat turn.
    ///
    /// The session stays locked from the history read until the exchange is
    /// recorded, so concurrent turns on one session see each other's
    /// replies. Nothing is written unless the model call succeeds.
    ///
    /// # Errors
    /// Returns a validation error for an empty message, a configuration error
    /// when the credential is missing, and a service error if the call fails.
    pub async fn chat(&self, turn: ChatTurn) -> CoreResult<ChatReply> {
        if turn.message.trim().is_empty() {
            return Err(CoreError::missing("message"));
        }
        self.config.llm.require_credential()?;

        let ChatTurn {
            session_id,
            message,
            history,
        } = turn;

        let _lease = self.store.lock(&session_id).await;

        let external = history.filter(|messages| !messages.is_empty());
        let uses_external = external.is_some();
        let base = match external {
            Some(messages) => complete_exchanges(messages),
            None => self.store.history(&session_id),
        };

        let parts = enforce_budget(
            PromptParts {
                preamble: self.config.prompt.system_preamble.clone(),
                history: base.clone(),
                user_message: message.clone(),
            },
            self.config.prompt.max_chars,
        );
        if parts.history.len() < base.len() {
            debug!(
                session = %session_id,
                dropped = base.len() - parts.history.len(),
                "prompt budget dropped oldest messages"
            );
        }
        let prompt = build_chat_prompt(&parts);

        info!(
            session = %session_id,
            history = base.len(),
            external_history = uses_external,
            "running chat turn"
        );

        let options = CompletionOptions {
            temperature: self.config.llm.chat_temperature,
            max_tokens: self.config.llm.max_tokens,
        };
        let reply = complete_within(
            self.client.as_ref(),
            prompt,
            options,
            self.config.llm.timeout(),
        )
        .await
        .map_err(|err| {
            warn!(session = %session_id, error = %err, "chat completion failed");
            CoreError::from(err)
        })?;

        let history = if uses_external {
            let mut messages = base;
            messages.push(ChatMessage::user(message.as_str()));
            messages.push(ChatMessage::assistant(reply.as_str()));
            self.store.replace_history(&session_id, messages)
        } else {
            self.store.append(&session_id, message.as_str(), reply.as_str())
        };

        Ok(ChatReply {
            session_id,
            user_message: message,
            reply,
            history,
            model: self.client.model().to_string(),
            timestamp: Utc::now(),
        })
    }

    /// Forget a session, waiting for any in-flight turn on it.
    pub async fn clear(&self, session_id: &SessionId) -> bool {
        let lease = self.store.lock(session_id).await;
        let removed = self.store.clear(session_id);
        drop(lease);
        info!(session = %session_id, removed, "session cleared");
        removed
    }

    /// Number of active sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.store.size()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::time::Duration;

    use tokio::sync::Mutex;

    use super::*;
    use crate::llm::{LlmError, LlmFuture, LlmResult};
    use crate::memory::core::message::Role;

    #[derive(Default)]
    struct Scripted {
        replies: Mutex<VecDeque<LlmResult<String>>>,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
        delay: Duration,
    }

    impl Scripted {
        fn replying(replies: Vec<LlmResult<String>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                ..Self::default()
            }
        }
    }

    impl LlmClient for Scripted {
        fn complete(
            &self,
            messages: Vec<ChatMessage>,
            _options: CompletionOptions,
        ) -> LlmFuture<'_, LlmResult<String>> {
            Box::pin(async move {
                self.seen.lock().await.push(messages);
                tokio::time::sleep(self.delay).await;
                self.replies
                    .lock()
                    .await
                    .pop_front()
                    .unwrap_or_else(|| Ok("ok".to_string()))
            })
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }

    fn keyed_config() -> Arc<MemoryConfig> {
        let mut config = MemoryConfig::default();
        config.llm.api_key = Some("sk-test".to_string());
        Arc::new(config)
    }

    fn orchestrator(client: Arc<Scripted>, config: Arc<MemoryConfig>) -> ChatOrchestrator {
        let store = Arc::new(SessionMemoryStore::new(&config.short_term));
        ChatOrchestrator::new(store, client, config)
    }

    #[tokio::test]
    async fn test_first_turn_records_exchange() {
        let client = Arc::new(Scripted::replying(vec![Ok("hi there".to_string())]));
        let engine = orchestrator(Arc::clone(&client), keyed_config());

        let reply = engine.chat(ChatTurn::new("s1", "hello")).await;
        let reply = reply.map_err(|e| e.to_string());
        assert_eq!(
            reply.as_ref().map(|r| r.history.clone()),
            Ok(vec![ChatMessage::user("hello"), ChatMessage::assistant("hi there")])
        );
        assert_eq!(reply.map(|r| r.session_id), Ok(SessionId::from("s1")));

        let seen = client.seen.lock().await;
        let roles: Vec<Role> = seen[0].iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User]);
    }

    #[tokio::test]
    async fn test_prompt_includes_stored_history_in_order() {
        let client = Arc::new(Scripted::default());
        let engine = orchestrator(Arc::clone(&client), keyed_config());

        let _ = engine.chat(ChatTurn::new("s1", "one")).await;
        let _ = engine.chat(ChatTurn::new("s1", "two")).await;

        let seen = client.seen.lock().await;
        let contents: Vec<&str> = seen[1].iter().skip(1).map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "ok", "two"]);
    }

    #[tokio::test]
    async fn test_empty_message_rejected_without_mutation() {
        let client = Arc::new(Scripted::default());
        let engine = orchestrator(Arc::clone(&client), keyed_config());

        let result = engine.chat(ChatTurn::new("s1", "   ")).await;
        assert!(matches!(result, Err(CoreError::Validation(_))));
        assert_eq!(engine.session_count(), 0);
        assert!(client.seen.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_credential_fails_before_call() {
        let client = Arc::new(Scripted::default());
        let engine = orchestrator(Arc::clone(&client), Arc::new(MemoryConfig::default()));

        let result = engine.chat(ChatTurn::new("s1", "hello")).await;
        assert!(matches!(result, Err(CoreError::Config(_))));
        assert!(client.seen.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_upstream_failure_leaves_store_untouched() {
        let client = Arc::new(Scripted::replying(vec![
            Ok("first".to_string()),
            Err(LlmError::Status {
                status: 429,
                message: "quota".to_string(),
            }),
        ]));
        let engine = orchestrator(client, keyed_config());
        let id = SessionId::from("s1");

        let _ = engine.chat(ChatTurn::new("s1", "q1")).await;
        let before = engine.store().history(&id);

        let result = engine.chat(ChatTurn::new("s1", "q2")).await;
        assert!(matches!(result, Err(CoreError::Service(_))));
        assert_eq!(engine.store().history(&id), before);
    }

    #[tokio::test]
    async fn test_failed_turns_leave_no_lock_entries() {
        let client = Arc::new(Scripted::replying(
            (0..50).map(|_| Err(LlmError::EmptyResponse)).collect(),
        ));
        let engine = orchestrator(client, keyed_config());

        for n in 0..50 {
            let result = engine.chat(ChatTurn::new(format!("s{n}"), "hello")).await;
            assert!(matches!(result, Err(CoreError::Service(_))));
        }

        assert_eq!(engine.session_count(), 0);
        assert_eq!(engine.store().lock_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_turn_leaves_no_lock_entry() {
        let client = Arc::new(Scripted {
            delay: Duration::from_secs(5),
            ..Scripted::default()
        });
        let engine = orchestrator(client, keyed_config());

        let turn = engine.chat(ChatTurn::new("gone", "hello"));
        let timed_out = tokio::time::timeout(Duration::from_millis(10), turn).await;
        assert!(timed_out.is_err());

        assert_eq!(engine.session_count(), 0);
        assert_eq!(engine.store().lock_count(), 0);
    }

    #[tokio::test]
    async fn test_external_history_overrides_store() {
        let client = Arc::new(Scripted::default());
        let engine = orchestrator(Arc::clone(&client), keyed_config());
        let id = SessionId::from("s1");
        engine.store().append(&id, "stored q", "stored a");

        let turn = ChatTurn::new("s1", "new").with_history(vec![
            ChatMessage::user("client q"),
            ChatMessage::assistant("client a"),
        ]);
        let reply = engine.chat(turn).await.map(|r| r.history).unwrap_or_default();

        let contents: Vec<&str> = reply.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["client q", "client a", "new", "ok"]);
        assert_eq!(engine.store().history(&id), reply);

        let seen = client.seen.lock().await;
        assert!(seen[0].iter().all(|m| m.content != "stored q"));
    }

    #[tokio::test]
    async fn test_empty_external_history_uses_store() {
        let client = Arc::new(Scripted::default());
        let engine = orchestrator(Arc::clone(&client), keyed_config());
        engine.store().append(&SessionId::from("s1"), "stored q", "stored a");

        let turn = ChatTurn::new("s1", "new").with_history(Vec::new());
        let history = engine.chat(turn).await.map(|r| r.history).unwrap_or_default();
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].content, "stored q");
    }

    #[tokio::test]
    async fn test_same_session_turns_are_serialized() {
        let client = Arc::new(Scripted {
            delay: Duration::from_millis(20),
            ..Scripted::default()
        });
        let engine = orchestrator(Arc::clone(&client), keyed_config());

        let (a, b) = tokio::join!(
            engine.chat(ChatTurn::new("s1", "a")),
            engine.chat(ChatTurn::new("s1", "b"))
        );
        assert!(a.is_ok() && b.is_ok());

        let seen = client.seen.lock().await;
        let mut prompt_sizes: Vec<usize> = seen.iter().map(Vec::len).collect();
        prompt_sizes.sort_unstable();
        assert_eq!(prompt_sizes, vec![2, 4]);
        assert_eq!(engine.store().history(&SessionId::from("s1")).len(), 4);
    }

    #[tokio::test]
    async fn test_history_trimmed_to_window() {
        let mut config = MemoryConfig::default();
        config.llm.api_key = Some("sk-test".to_string());
        config.short_term.window = 2;
        let engine = orchestrator(Arc::new(Scripted::default()), Arc::new(config));

        for n in 0..5 {
            let _ = engine.chat(ChatTurn::new("s1", format!("q{n}"))).await;
        }
        let history = engine.store().history(&SessionId::from("s1"));
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].content, "q3");
    }

    #[tokio::test]
    async fn test_clear_removes_session_and_lock() {
        let engine = orchestrator(Arc::new(Scripted::default()), keyed_config());
        let id = SessionId::from("s1");
        let _ = engine.chat(ChatTurn::new("s1", "hello")).await;

        assert_eq!(engine.store().lock_count(), 1);

        assert!(engine.clear(&id).await);
        assert_eq!(engine.store().lock_count(), 0);
        assert!(!engine.clear(&id).await);
        assert!(engine.store().get_or_create(&id).is_empty());
    }
}
