// In-memory implementation of TrustStore.
//
// Used when DATABASE_URL=memory and in tests. Trust is lost on restart,
// which means everyone starts over on probation.

use crate::core::moderation::{StoreError, TrustStore};
use async_trait::async_trait;
use dashmap::DashMap;

/// A composite key for looking up trust.
/// Users can be in multiple chats, so both ids are needed.
#[derive(Hash, Eq, PartialEq, Clone, Copy, Debug)]
struct ChatUserKey {
    chat_id: u64,
    user_id: u64,
}

/// In-memory implementation of TrustStore.
///
/// DashMap shards its locks, so writes to the same key are serialized while
/// different keys rarely contend.
pub struct InMemoryTrustStore {
    data: DashMap<ChatUserKey, bool>,
}

impl InMemoryTrustStore {
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
        }
    }
}

#[async_trait]
impl TrustStore for InMemoryTrustStore {
    async fn get(&self, chat_id: u64, user_id: u64) -> Result<bool, StoreError> {
        let key = ChatUserKey { chat_id, user_id };
        Ok(self.data.get(&key).map(|entry| *entry).unwrap_or(false))
    }

    async fn set(&self, chat_id: u64, user_id: u64, trusted: bool) -> Result<(), StoreError> {
        let key = ChatUserKey { chat_id, user_id };

        // entry() holds the shard lock for the whole upsert
        self.data
            .entry(key)
            .and_modify(|value| *value = trusted)
            .or_insert(trusted);

        Ok(())
    }
}

impl Default for InMemoryTrustStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemoryTrustStore::new();

        // Unknown users are on probation
        assert!(!store.get(1, 2).await.unwrap());

        store.set(1, 2, true).await.unwrap();
        assert!(store.get(1, 2).await.unwrap());

        // Overwrite
        store.set(1, 2, false).await.unwrap();
        assert!(!store.get(1, 2).await.unwrap());
        assert_eq!(store.data.len(), 1);
    }

    #[tokio::test]
    async fn test_keys_are_isolated() {
        let store = InMemoryTrustStore::new();

        store.set(1, 2, true).await.unwrap();

        assert!(!store.get(2, 1).await.unwrap()); // swapped ids
        assert!(!store.get(1, 3).await.unwrap()); // other user
        assert!(!store.get(9, 2).await.unwrap()); // other chat
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers() {
        let store = Arc::new(InMemoryTrustStore::new());

        let handles: Vec<_> = (0..64u64)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.set(1, i % 8, true).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.data.len(), 8);
        for user in 0..8 {
            assert!(store.get(1, user).await.unwrap());
        }
    }
}
