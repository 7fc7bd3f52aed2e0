//! Session state owned by the chat engine.

pub mod keyed_lock;
pub mod session_store;

pub use keyed_lock::{KeyGuard, KeyedMutex};
pub use session_store::{SessionLease, SessionMemoryStore};
