use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::{RecordId, RecordKind};

type RecordKey = (RecordKind, RecordId);

/// Per-record async locks serializing read-modify-write cycles.
///
/// Entries are created on demand and dropped again once no caller holds or
/// waits on them, so the map only grows with the number of records being
/// mutated concurrently.
#[derive(Default)]
pub struct RecordLocks {
    locks: Mutex<HashMap<RecordKey, Arc<AsyncMutex<()>>>>,
}

impl RecordLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to the given record.
    pub async fn acquire(&self, kind: RecordKind, id: RecordId) -> RecordGuard<'_> {
        let key = (kind, id);
        let lock = {
            let mut locks = self.locks.lock();
            locks
                .entry(key)
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        let guard = lock.lock_owned().await;
        RecordGuard {
            registry: self,
            key,
            guard: Some(guard),
        }
    }

    /// Number of records that currently have a lock entry.
    pub fn active(&self) -> usize {
        self.locks.lock().len()
    }

    fn release(&self, key: &RecordKey) {
        let mut locks = self.locks.lock();
        // Map holds one reference; any other means a waiter still needs it
        if let Some(lock) = locks.get(key) {
            if Arc::strong_count(lock) == 1 {
                locks.remove(key);
            }
        }
    }
}

pub struct RecordGuard<'a> {
    registry: &'a RecordLocks,
    key: RecordKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for RecordGuard<'_> {
    fn drop(&mut self) {
        // Unlock before pruning so the owned guard's Arc is released
        self.guard.take();
        self.registry.release(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use uuid::Uuid;

    use super::*;

    #[tokio::test]
    async fn test_entries_are_pruned_after_release() {
        let locks = RecordLocks::new();
        let id = Uuid::new_v4();
        {
            let _guard = locks.acquire(RecordKind::Manual, id).await;
            assert_eq!(locks.active(), 1);
        }
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn test_same_record_is_serialized() {
        let locks = Arc::new(RecordLocks::new());
        let id = Uuid::new_v4();
        let counter = Arc::new(AsyncMutex::new(Vec::new()));

        let guard = locks.acquire(RecordKind::Converted, id).await;

        let task = {
            let locks = locks.clone();
            let counter = counter.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(RecordKind::Converted, id).await;
                counter.lock().await.push("second");
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        counter.lock().await.push("first");
        drop(guard);
        task.await.unwrap();

        assert_eq!(*counter.lock().await, vec!["first", "second"]);
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn test_different_records_do_not_block() {
        let locks = RecordLocks::new();
        let _a = locks.acquire(RecordKind::Manual, Uuid::new_v4()).await;
        let _b = locks.acquire(RecordKind::Manual, Uuid::new_v4()).await;
        let _c = locks.acquire(RecordKind::Processing, Uuid::new_v4()).await;
        assert_eq!(locks.active(), 3);
    }
}
