use crate::models::ContentKey;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-content mutual exclusion for the report/escalation sequence.
///
/// Entries live only while someone holds or waits on them.
#[derive(Clone, Default)]
pub struct ContentLocks {
    locks: Arc<DashMap<ContentKey, Arc<Mutex<()>>>>,
}

pub struct ContentGuard {
    key: ContentKey,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<DashMap<ContentKey, Arc<Mutex<()>>>>,
}

impl ContentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: ContentKey) -> ContentGuard {
        let mutex = self.locks.entry(key).or_default().clone();
        let guard = mutex.lock_owned().await;
        ContentGuard {
            key,
            guard: Some(guard),
            locks: self.locks.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Drop for ContentGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map still references the mutex: nobody holds or waits on it.
        self.locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn entries_are_pruned_after_release() {
        let locks = ContentLocks::new();
        {
            let _guard = locks.acquire(ContentKey::post(1)).await;
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn same_key_is_exclusive() {
        let locks = ContentLocks::new();
        let guard = locks.acquire(ContentKey::post(1)).await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(ContentKey::post(1)).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn different_keys_do_not_block() {
        let locks = ContentLocks::new();
        let _post = locks.acquire(ContentKey::post(1)).await;
        let other = tokio::time::timeout(
            Duration::from_millis(200),
            locks.acquire(ContentKey::topic(1)),
        )
        .await;
        assert!(other.is_ok());
        assert_eq!(locks.len(), 2);
    }
}
