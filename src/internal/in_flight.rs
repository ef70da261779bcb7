//! Handles to constructions that have started but not yet committed.

use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;

use super::KeyMap;
use crate::error::{RegistryError, RegistryResult};
use crate::factory::AnyArc;
use crate::key::NormalizedKey;

/// Joinable construction outcome. Every clone resolves to the same result.
pub(crate) type Construction = Shared<BoxFuture<'static, RegistryResult<AnyArc>>>;

/// A running construction and the generation that registered it.
#[derive(Clone)]
pub(crate) struct InFlight {
    pub(crate) generation: u64,
    pub(crate) construction: Construction,
}

impl InFlight {
    /// True when the construction task was aborted by the runtime. Such a
    /// slot is stale and may be replaced by a fresh construction.
    pub(crate) fn was_cancelled(&self) -> bool {
        matches!(self.construction.peek(), Some(Err(RegistryError::Cancelled(_))))
    }
}

/// In-flight constructions by key.
///
/// Entries are inserted and removed only while the key's lock is held; the
/// inner mutex is never held across an await.
pub(crate) struct InFlightTable {
    entries: Mutex<KeyMap<InFlight>>,
}

impl InFlightTable {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(KeyMap::default()),
        }
    }

    pub(crate) fn get(&self, key: &NormalizedKey) -> Option<InFlight> {
        self.entries.lock().get(key).cloned()
    }

    pub(crate) fn insert(&self, key: NormalizedKey, entry: InFlight) {
        self.entries.lock().insert(key, entry);
    }

    /// Removes the entry for `key` if it still belongs to `generation`.
    pub(crate) fn remove(&self, key: &NormalizedKey, generation: u64) -> bool {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.generation == generation => {
                entries.remove(key);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn clear(&self) {
        self.entries.lock().clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::Arc;

    fn ready(outcome: RegistryResult<AnyArc>) -> Construction {
        async move { outcome }.boxed().shared()
    }

    #[test]
    fn remove_checks_generation() {
        let table = InFlightTable::new();
        let key = NormalizedKey::String("splitter".into());
        table.insert(
            key.clone(),
            InFlight {
                generation: 7,
                construction: ready(Ok(Arc::new(1u8))),
            },
        );
        assert!(!table.remove(&key, 6));
        assert_eq!(table.len(), 1);
        assert!(table.remove(&key, 7));
        assert!(table.get(&key).is_none());
    }

    #[tokio::test]
    async fn cancelled_slot_is_detected_after_completion() {
        let entry = InFlight {
            generation: 1,
            construction: ready(Err(RegistryError::Cancelled("pool".into()))),
        };
        assert!(!entry.was_cancelled());
        let _ = entry.construction.clone().await;
        assert!(entry.was_cancelled());
    }

    #[tokio::test]
    async fn joiners_share_one_outcome() {
        let entry = InFlight {
            generation: 1,
            construction: ready(Ok(Arc::new(String::from("model")))),
        };
        let a = entry.construction.clone().await.unwrap();
        let b = entry.construction.clone().await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
