//! Completed instances by normalized key.

use parking_lot::RwLock;

use super::KeyMap;
use crate::factory::{AnyArc, Built};
use crate::key::NormalizedKey;

/// The durable result of successful constructions.
///
/// Written only from the success branch of a construction, drained only by
/// `close_all`. Readers see either no entry or a complete one.
pub(crate) struct InstanceStore {
    instances: RwLock<KeyMap<Built>>,
}

impl InstanceStore {
    pub(crate) fn new() -> Self {
        Self {
            instances: RwLock::new(KeyMap::default()),
        }
    }

    pub(crate) fn get(&self, key: &NormalizedKey) -> Option<AnyArc> {
        self.instances.read().get(key).map(|built| built.value.clone())
    }

    pub(crate) fn contains(&self, key: &NormalizedKey) -> bool {
        self.instances.read().contains_key(key)
    }

    pub(crate) fn type_name(&self, key: &NormalizedKey) -> Option<&'static str> {
        self.instances.read().get(key).map(|built| built.type_name)
    }

    pub(crate) fn put(&self, key: NormalizedKey, built: Built) {
        self.instances.write().insert(key, built);
    }

    /// Takes every instance out of the store.
    pub(crate) fn drain(&self) -> Vec<(NormalizedKey, Built)> {
        self.instances.write().drain().collect()
    }

    pub(crate) fn keys(&self) -> Vec<NormalizedKey> {
        self.instances.read().keys().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.instances.read().len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.instances.read().is_empty()
    }

    /// Number of stored instances that registered a teardown capability.
    pub(crate) fn closeable_count(&self) -> usize {
        self.instances
            .read()
            .values()
            .filter(|built| built.teardown.is_some())
            .count()
    }
}
