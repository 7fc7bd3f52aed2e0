//! Keyed async mutex: one lock per key, created on demand.

use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Guard returned by [`KeyedMutex::lock`]; the key stays locked until it drops.
pub type KeyGuard = OwnedMutexGuard<()>;

/// A family of async mutexes addressed by key.
///
/// Holders of the same key are serialized; different keys never contend.
pub struct KeyedMutex<K> {
    locks: DashMap<K, Arc<Mutex<()>>>,
}

impl<K: Eq + Hash + Clone> KeyedMutex<K> {
    /// Create an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Acquire the lock for `key`, waiting behind earlier holders.
    pub async fn lock(&self, key: &K) -> KeyGuard {
        let mutex = Arc::clone(
            &self
                .locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        );
        mutex.lock_owned().await
    }

    /// Drop the lock entry for `key` if nobody holds or awaits it.
    pub fn prune(&self, key: &K) {
        self.locks
            .remove_if(key, |_, mutex| Arc::strong_count(mutex) == 1);
    }

    /// Number of keys with a lock entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether the table holds no lock entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl<K: Eq + Hash + Clone> Default for KeyedMutex<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_same_key_is_serialized() {
        let locks = Arc::new(KeyedMutex::<String>::new());
        let key = "a".to_string();
        let guard = locks.lock(&key).await;

        let waiter = {
            let locks = Arc::clone(&locks);
            let key = key.clone();
            tokio::spawn(async move {
                let _guard = locks.lock(&key).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        assert!(waiter.await.is_ok());
    }

    #[tokio::test]
    async fn test_different_keys_do_not_contend() {
        let locks = KeyedMutex::<String>::new();
        let _a = locks.lock(&"a".to_string()).await;
        let b = tokio::time::timeout(Duration::from_millis(50), locks.lock(&"b".to_string())).await;
        assert!(b.is_ok());
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_prune_keeps_held_locks() {
        let locks = KeyedMutex::<String>::new();
        let key = "a".to_string();

        let guard = locks.lock(&key).await;
        locks.prune(&key);
        assert_eq!(locks.len(), 1);

        drop(guard);
        locks.prune(&key);
        assert!(locks.is_empty());
    }
}
