// Per-key serialization in front of any TrustStore.
//
// Calls on the same (chat_id, user_id) run one at a time; calls on different
// keys never wait on each other. The lock is held only for the single wrapped
// store call, never across classifier or gateway work.

use crate::core::moderation::{StoreError, TrustStore};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

type KeyLock = Arc<Mutex<()>>;

pub struct KeyLockedTrustStore<S: TrustStore> {
    inner: S,
    locks: DashMap<(u64, u64), KeyLock>,
}

impl<S: TrustStore> KeyLockedTrustStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            locks: DashMap::new(),
        }
    }

    fn ticket(&self, key: (u64, u64)) -> LockTicket<'_, S> {
        let lock = Arc::clone(self.locks.entry(key).or_default().value());
        LockTicket {
            store: self,
            key,
            lock,
        }
    }
}

/// A claim on one key's lock. Dropping it prunes the lock table, also when the
/// owning future is cancelled while still waiting.
struct LockTicket<'a, S: TrustStore> {
    store: &'a KeyLockedTrustStore<S>,
    key: (u64, u64),
    lock: KeyLock,
}

impl<S: TrustStore> Drop for LockTicket<'_, S> {
    fn drop(&mut self) {
        // Our own clone is still alive here, so the table entry plus ours is 2.
        // remove_if runs under the shard lock, and ticket() clones under the same
        // shard lock, so a count of 2 means no other task can still reach it.
        self.store
            .locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 2);
    }
}

#[async_trait]
impl<S: TrustStore> TrustStore for KeyLockedTrustStore<S> {
    async fn get(&self, chat_id: u64, user_id: u64) -> Result<bool, StoreError> {
        let ticket = self.ticket((chat_id, user_id));
        let _guard = ticket.lock.lock().await;
        self.inner.get(chat_id, user_id).await
    }

    async fn set(&self, chat_id: u64, user_id: u64, trusted: bool) -> Result<(), StoreError> {
        let ticket = self.ticket((chat_id, user_id));
        let _guard = ticket.lock.lock().await;
        self.inner.set(chat_id, user_id, trusted).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::moderation::InMemoryTrustStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Records the highest number of overlapping calls per key.
    struct SlowStore {
        inner: InMemoryTrustStore,
        in_flight: DashMap<(u64, u64), usize>,
        max_overlap: AtomicUsize,
    }

    impl SlowStore {
        fn new() -> Self {
            Self {
                inner: InMemoryTrustStore::new(),
                in_flight: DashMap::new(),
                max_overlap: AtomicUsize::new(0),
            }
        }

        async fn tracked<T>(
            &self,
            key: (u64, u64),
            op: impl std::future::Future<Output = T> + Send,
        ) -> T {
            let now = {
                let mut entry = self.in_flight.entry(key).or_insert(0);
                *entry += 1;
                *entry
            };
            self.max_overlap.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(2)).await;
            let result = op.await;
            *self.in_flight.entry(key).or_insert(1) -= 1;
            result
        }
    }

    #[async_trait]
    impl TrustStore for SlowStore {
        async fn get(&self, chat_id: u64, user_id: u64) -> Result<bool, StoreError> {
            self.tracked((chat_id, user_id), self.inner.get(chat_id, user_id))
                .await
        }

        async fn set(&self, chat_id: u64, user_id: u64, trusted: bool) -> Result<(), StoreError> {
            self.tracked((chat_id, user_id), self.inner.set(chat_id, user_id, trusted))
                .await
        }
    }

    #[tokio::test]
    async fn test_passes_through() {
        let store = KeyLockedTrustStore::new(InMemoryTrustStore::new());

        assert!(!store.get(1, 2).await.unwrap());
        store.set(1, 2, true).await.unwrap();
        assert!(store.get(1, 2).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_same_key_calls_never_overlap() {
        let store = Arc::new(KeyLockedTrustStore::new(SlowStore::new()));

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    if i % 2 == 0 {
                        store.set(1, 1, true).await.map(|_| ())
                    } else {
                        store.get(1, 1).await.map(|_| ())
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.inner.max_overlap.load(Ordering::SeqCst), 1);
        assert!(store.get(1, 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_cancelled_waiter_does_not_leak_lock() {
        let store = KeyLockedTrustStore::new(InMemoryTrustStore::new());
        let holder = store.ticket((1, 1));
        let guard = holder.lock.lock().await;

        let waited = tokio::time::timeout(Duration::from_millis(10), store.get(1, 1)).await;
        assert!(waited.is_err());

        drop(guard);
        drop(holder);
        assert!(store.locks.is_empty());
    }

    #[tokio::test]
    async fn test_lock_table_is_pruned() {
        let store = KeyLockedTrustStore::new(InMemoryTrustStore::new());

        for user in 0..100 {
            store.set(1, user, true).await.unwrap();
        }

        assert!(store.locks.is_empty());
    }
}
