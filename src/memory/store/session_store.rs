//! In-process session memory.
//!
//! Holds the bounded message history of every live session. State is lost on
//! restart. Every write keeps the sequence as whole user/assistant exchanges
//! and trims it to the configured window of most recent exchanges.

use dashmap::DashMap;
use tracing::debug;

use crate::memory::core::config::ShortTermConfig;
use crate::memory::core::ids::SessionId;
use crate::memory::core::message::{ChatMessage, Session, complete_exchanges};
use crate::memory::store::keyed_lock::{KeyGuard, KeyedMutex};

/// Process-wide store of conversation sessions.
pub struct SessionMemoryStore {
    sessions: DashMap<SessionId, Session>,
    locks: KeyedMutex<SessionId>,
    config: ShortTermConfig,
}

/// Exclusive hold on one session.
///
/// On drop the lock entry is forgotten if the session holds no history, so
/// failed or cancelled turns on unknown ids leave nothing behind.
pub struct SessionLease<'a> {
    store: &'a SessionMemoryStore,
    session_id: SessionId,
    guard: Option<KeyGuard>,
}

impl Drop for SessionLease<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        if !self.store.sessions.contains_key(&self.session_id) {
            self.store.locks.prune(&self.session_id);
        }
    }
}

impl SessionMemoryStore {
    /// Create a store using the configured window.
    #[must_use]
    pub fn new(config: &ShortTermConfig) -> Self {
        Self::with_window(config.window)
    }

    /// Create a store keeping at most `window` exchanges per session.
    #[must_use]
    pub fn with_window(window: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            locks: KeyedMutex::new(),
            config: ShortTermConfig {
                window: window.max(1),
            },
        }
    }

    /// Maximum exchanges kept per session.
    #[must_use]
    pub const fn window(&self) -> usize {
        self.config.window
    }

    /// Return the session, creating an empty one on first reference.
    #[must_use]
    pub fn get_or_create(&self, session_id: &SessionId) -> Session {
        self.sessions
            .entry(session_id.clone())
            .or_insert_with(|| Session::new(session_id.clone()))
            .clone()
    }

    /// Snapshot of a session's messages without creating it.
    #[must_use]
    pub fn history(&self, session_id: &SessionId) -> Vec<ChatMessage> {
        self.sessions
            .get(session_id)
            .map(|session| session.messages.clone())
            .unwrap_or_default()
    }

    /// Append one exchange and trim; returns the resulting history.
    pub fn append(
        &self,
        session_id: &SessionId,
        user_message: impl Into<String>,
        assistant_message: impl Into<String>,
    ) -> Vec<ChatMessage> {
        let mut entry = self
            .sessions
            .entry(session_id.clone())
            .or_insert_with(|| Session::new(session_id.clone()));
        entry.messages.push(ChatMessage::user(user_message));
        entry.messages.push(ChatMessage::assistant(assistant_message));
        trim_to_window(&mut entry.messages, self.config.max_messages());

        debug!(
            session = %session_id,
            messages = entry.messages.len(),
            "appended exchange"
        );
        entry.messages.clone()
    }

    /// Overwrite a session's history with caller-supplied messages.
    ///
    /// Only complete user/assistant exchanges are kept, then the window
    /// applies. Returns the stored history.
    pub fn replace_history(
        &self,
        session_id: &SessionId,
        messages: Vec<ChatMessage>,
    ) -> Vec<ChatMessage> {
        let supplied = messages.len();
        let mut messages = complete_exchanges(messages);
        trim_to_window(&mut messages, self.config.max_messages());

        debug!(
            session = %session_id,
            supplied,
            kept = messages.len(),
            "replaced session history"
        );

        let session = Session {
            session_id: session_id.clone(),
            messages: messages.clone(),
        };
        self.sessions.insert(session_id.clone(), session);
        messages
    }

    /// Remove a session. Returns whether it existed; clearing twice is fine.
    pub fn clear(&self, session_id: &SessionId) -> bool {
        let removed = self.sessions.remove(session_id).is_some();
        debug!(session = %session_id, removed, "cleared session");
        removed
    }

    /// Number of active sessions.
    #[must_use]
    pub fn size(&self) -> usize {
        self.sessions.len()
    }

    /// Serialize work on one session; different sessions proceed in parallel.
    pub async fn lock(&self, session_id: &SessionId) -> SessionLease<'_> {
        let guard = self.locks.lock(session_id).await;
        SessionLease {
            store: self,
            session_id: session_id.clone(),
            guard: Some(guard),
        }
    }

    /// Number of sessions with a lock entry.
    #[must_use]
    pub fn lock_count(&self) -> usize {
        self.locks.len()
    }
}

impl Default for SessionMemoryStore {
    fn default() -> Self {
        Self::new(&ShortTermConfig::default())
    }
}

/// Keep the `max_messages` most recent messages.
///
/// Input is always whole exchanges and `max_messages` is even, so dropping
/// the prefix never splits a pair.
fn trim_to_window(messages: &mut Vec<ChatMessage>, max_messages: usize) {
    if messages.len() > max_messages {
        let excess = messages.len() - max_messages;
        messages.drain(..excess);
    }
}
