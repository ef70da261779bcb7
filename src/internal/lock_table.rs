//! Per-key async locks, created on demand under one global lock.

use std::sync::Arc;

use tokio::sync::Mutex;

use super::KeyMap;
use crate::key::NormalizedKey;

/// One async mutex per normalized key.
///
/// The global mutex only guards the map itself and is never held while a
/// per-key lock is awaited, so callers for different keys never serialize
/// once their locks exist.
pub(crate) struct LockTable {
    locks: Mutex<KeyMap<Arc<Mutex<()>>>>,
}

impl LockTable {
    pub(crate) fn new() -> Self {
        Self {
            locks: Mutex::new(KeyMap::default()),
        }
    }

    /// Returns the lock for `key`, creating it if needed.
    pub(crate) async fn lock_for(&self, key: &NormalizedKey) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        if let Some(lock) = locks.get(key) {
            return Arc::clone(lock);
        }
        let lock = Arc::new(Mutex::new(()));
        locks.insert(key.clone(), Arc::clone(&lock));
        lock
    }

    pub(crate) async fn clear(&self) {
        self.locks.lock().await.clear();
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_key_shares_lock() {
        let table = LockTable::new();
        let key = NormalizedKey::String("pool".into());
        let a = table.lock_for(&key).await;
        let b = table.lock_for(&key).await;
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(table.len().await, 1);
    }

    #[tokio::test]
    async fn distinct_keys_do_not_block_each_other() {
        let table = LockTable::new();
        let a = table.lock_for(&NormalizedKey::String("a".into())).await;
        let b = table.lock_for(&NormalizedKey::String("b".into())).await;
        let _held = a.lock().await;
        assert!(b.try_lock().is_ok());
    }

    #[tokio::test]
    async fn clear_recreates_locks() {
        let table = LockTable::new();
        let key = NormalizedKey::String("pool".into());
        let before = table.lock_for(&key).await;
        table.clear().await;
        assert_eq!(table.len().await, 0);
        let after = table.lock_for(&key).await;
        assert!(!Arc::ptr_eq(&before, &after));
    }
}
