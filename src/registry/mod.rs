//! The keyed singleton registry.
//!
//! This module contains [`Registry`], the process-wide owner of shared,
//! expensive-to-construct resources. It creates each instance at most once per
//! normalized key, hands the same `Arc` to every caller, and tears every
//! instance down on [`Registry::close_all`].

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tokio::sync::{Mutex, RwLock};

use crate::config::RegistryConfig;
use crate::error::{FactoryPanic, RegistryError, RegistryResult};
use crate::factory::{constructor_job, AnyArc, Factory, Job};
use crate::internal::{
    Construction, ConstructionTracker, InFlight, InFlightTable, InstanceStore, LockTable,
};
use crate::key::{Key, NormalizedKey};
use crate::observer::Observers;
use crate::state::RegistryState;

mod builder;
mod shutdown;

pub use builder::RegistryBuilder;
pub use shutdown::TeardownOutcome;

tokio::task_local! {
    /// Identity of the registry whose construction task is being polled.
    static CONSTRUCTING: usize;
}

/// Keyed singleton registry.
///
/// The `Registry` owns one instance per normalized [`Key`]. The first caller of
/// [`create`](Registry::create) for a key runs the factory; callers arriving
/// while that construction is in flight join it and receive the same outcome.
/// Once stored, lookups take a read lock on the store and nothing else.
///
/// # Thread Safety
///
/// `Registry` is cheap to clone (it uses `Arc` internally). Construct it once
/// at startup, hand clones to the call sites that need shared resources, and
/// call [`close_all`](Registry::close_all) once at shutdown.
///
/// # Examples
///
/// ```
/// use ferrous_registry::{Factory, Key, Registry};
/// use std::sync::Arc;
///
/// struct Embedder { dims: usize }
///
/// # #[tokio::main]
/// # async fn main() {
/// let registry = Registry::new();
///
/// let a = registry
///     .create(Key::of::<Embedder>(), Some(Factory::from_fn(|| Embedder { dims: 768 })))
///     .await
///     .unwrap();
/// let b = registry.get::<Embedder>(Key::of::<Embedder>()).unwrap();
///
/// assert!(Arc::ptr_eq(&a, &b));
/// assert_eq!(b.dims, 768);
///
/// registry.close_all().await;
/// # }
/// ```
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

pub(crate) struct RegistryInner {
    config: RegistryConfig,
    store: InstanceStore,
    locks: LockTable,
    in_flight: InFlightTable,
    /// Read-held by slow-path creates while they join or start a
    /// construction, write-held by `close_all`.
    gate: RwLock<()>,
    constructions: Arc<ConstructionTracker>,
    draining: AtomicBool,
    generations: AtomicU64,
    observers: Observers,
}

impl Registry {
    /// Creates an empty registry with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Creates an empty registry with `config`.
    pub fn with_config(config: RegistryConfig) -> Self {
        Self::from_parts(config, Observers::default())
    }

    /// Starts a [`RegistryBuilder`].
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    fn from_parts(config: RegistryConfig, observers: Observers) -> Self {
        Registry {
            inner: Arc::new(RegistryInner {
                config,
                store: InstanceStore::new(),
                locks: LockTable::new(),
                in_flight: InFlightTable::new(),
                gate: RwLock::new(()),
                constructions: ConstructionTracker::new(),
                draining: AtomicBool::new(false),
                generations: AtomicU64::new(0),
                observers,
            }),
        }
    }

    /// Configuration the registry was built with.
    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }

    /// Returns the stored instance for `key`, creating it if needed.
    ///
    /// Behavior for a key with no stored instance:
    /// - a construction already in flight is joined, and its outcome returned;
    /// - otherwise `factory` (or, when `None`, the key's own constructor) runs
    ///   exactly once and its instance is stored before any caller sees it.
    ///
    /// A failed construction stores nothing. The initiator and every joiner
    /// receive the same [`RegistryError::Construction`], and the next call
    /// starts over.
    ///
    /// Dropping the returned future does not cancel the construction.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::NoFactory`] when no instance is stored, `factory` is
    ///   `None` and the key is not constructible
    /// - [`RegistryError::Construction`] when the factory fails or panics
    /// - [`RegistryError::TypeMismatch`] when the stored instance is not a `T`
    /// - [`RegistryError::Cancelled`] when the runtime aborted the construction
    ///
    /// # Examples
    ///
    /// ```
    /// use ferrous_registry::{Factory, Registry, RegistryError};
    ///
    /// # #[tokio::main]
    /// # async fn main() {
    /// let registry = Registry::new();
    ///
    /// let first = registry
    ///     .create("Model", Some(Factory::from_fn(|| "weights-v1".to_string())))
    ///     .await
    ///     .unwrap();
    ///
    /// // Keys are case-insensitive; the stored instance wins
    /// let again = registry
    ///     .create("model", Some(Factory::from_fn(|| "weights-v2".to_string())))
    ///     .await
    ///     .unwrap();
    /// assert_eq!(*again, "weights-v1");
    /// assert!(std::sync::Arc::ptr_eq(&first, &again));
    ///
    /// let missing = registry.create::<String>("tokenizer", None).await;
    /// assert!(matches!(missing, Err(RegistryError::NoFactory(_))));
    /// # }
    /// ```
    pub async fn create<T>(
        &self,
        key: impl Into<Key>,
        factory: Option<Factory<T>>,
    ) -> RegistryResult<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        let key = key.into();
        let normalized = key.normalize();
        if let Some(value) = self.inner.store.get(&normalized) {
            return downcast(&normalized, value);
        }

        let mode = self.inner.config.default_run_mode;
        let job = match factory {
            Some(factory) => factory.into_job(mode),
            None => match key.constructor() {
                Some(constructor) => constructor_job(Arc::clone(constructor), mode),
                None => return Err(RegistryError::NoFactory(normalized.to_string())),
            },
        };

        tracing::debug!(key = %normalized, "registry miss");
        let value = self.get_or_construct(normalized.clone(), job).await?;
        downcast(&normalized, value)
    }

    /// Returns the stored instance for `key`.
    ///
    /// Never constructs and never waits for a construction in flight.
    pub fn get<T>(&self, key: impl Into<Key>) -> RegistryResult<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        let normalized = key.into().normalize();
        let value = self.lookup(&normalized)?;
        downcast(&normalized, value)
    }

    /// Returns the stored instance for `key` without a type check.
    pub fn get_any(&self, key: impl Into<Key>) -> RegistryResult<Arc<dyn Any + Send + Sync>> {
        self.lookup(&key.into().normalize())
    }

    fn lookup(&self, key: &NormalizedKey) -> RegistryResult<AnyArc> {
        self.inner
            .store
            .get(key)
            .ok_or_else(|| RegistryError::NotFound(key.to_string()))
    }

    /// Returns true if an instance is stored for `key`.
    pub fn contains(&self, key: impl Into<Key>) -> bool {
        self.inner.store.contains(&key.into().normalize())
    }

    /// Concrete type name of the instance stored for `key`.
    pub fn type_name_of(&self, key: impl Into<Key>) -> Option<&'static str> {
        self.inner.store.type_name(&key.into().normalize())
    }

    /// Number of stored instances.
    pub fn len(&self) -> usize {
        self.inner.store.len()
    }

    /// Returns true if no instance is stored.
    pub fn is_empty(&self) -> bool {
        self.inner.store.is_empty()
    }

    /// Normalized keys of the stored instances, sorted.
    pub fn keys(&self) -> Vec<NormalizedKey> {
        let mut keys = self.inner.store.keys();
        keys.sort();
        keys
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RegistryState {
        if self.inner.draining.load(Ordering::Acquire) {
            RegistryState::Draining
        } else if self.inner.store.is_empty() {
            RegistryState::Empty
        } else {
            RegistryState::Populated
        }
    }

    /// Slow path: per-key lock, re-check, then join or start a construction.
    ///
    /// The gate is released before the construction is awaited. Creates
    /// issued from inside one of this registry's constructions skip the gate:
    /// a pending `close_all` waits for the enclosing construction, so they
    /// must not wait for `close_all`.
    async fn get_or_construct(&self, key: NormalizedKey, job: Job) -> RegistryResult<AnyArc> {
        let construction = {
            let _gate = if self.inside_construction() {
                None
            } else {
                Some(self.inner.gate.read().await)
            };
            let lock = self.inner.locks.lock_for(&key).await;
            let _guard = lock.lock().await;

            if let Some(value) = self.inner.store.get(&key) {
                return Ok(value);
            }

            let construction = match self.inner.in_flight.get(&key) {
                Some(entry) if !entry.was_cancelled() => {
                    tracing::debug!(key = %key, generation = entry.generation, "joining in-flight construction");
                    self.inner.observers.construction_joined(&key);
                    entry.construction
                }
                _ => self.start_construction(key, job, Arc::clone(&lock)),
            };
            construction
        };
        construction.await
    }

    fn id(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    fn inside_construction(&self) -> bool {
        CONSTRUCTING.try_with(|id| *id == self.id()).unwrap_or(false)
    }

    /// Spawns the construction task and registers its handle. Must be called
    /// with the per-key lock held, and with the gate held unless nested.
    fn start_construction(&self, key: NormalizedKey, job: Job, lock: Arc<Mutex<()>>) -> Construction {
        let generation = self.inner.generations.fetch_add(1, Ordering::Relaxed);
        self.inner.observers.construction_started(&key);

        let ticket = self.inner.constructions.enter();
        let id = self.id();
        let inner = Arc::clone(&self.inner);
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            let _ticket = ticket;
            CONSTRUCTING
                .scope(id, inner.run_construction(task_key, generation, job, lock))
                .await
        });

        let label = key.to_string();
        let construction = async move {
            match handle.await {
                Ok(outcome) => outcome,
                Err(err) if err.is_panic() => Err(RegistryError::construction(
                    label,
                    Box::new(FactoryPanic::from_payload(err.into_panic())),
                )),
                Err(_) => Err(RegistryError::Cancelled(label)),
            }
        }
        .boxed()
        .shared();

        self.inner.in_flight.insert(
            key,
            InFlight {
                generation,
                construction: construction.clone(),
            },
        );
        construction
    }
}

impl RegistryInner {
    /// Runs `job` and commits its outcome under the per-key lock.
    async fn run_construction(
        &self,
        key: NormalizedKey,
        generation: u64,
        job: Job,
        lock: Arc<Mutex<()>>,
    ) -> RegistryResult<AnyArc> {
        let started = Instant::now();
        tracing::debug!(key = %key, generation, "construction started");

        let built = match AssertUnwindSafe(job).catch_unwind().await {
            Ok(Ok(built)) => Ok(built),
            Ok(Err(err)) => Err(RegistryError::construction(&key, err)),
            Err(payload) => Err(RegistryError::construction(
                &key,
                Box::new(FactoryPanic::from_payload(payload)),
            )),
        };

        let guard = lock.lock().await;
        let outcome = built.map(|built| {
            let value = Arc::clone(&built.value);
            self.store.put(key.clone(), built);
            value
        });
        self.in_flight.remove(&key, generation);
        drop(guard);

        let elapsed = started.elapsed();
        match &outcome {
            Ok(_) => tracing::debug!(
                key = %key,
                generation,
                elapsed_ms = elapsed.as_millis() as u64,
                "construction committed"
            ),
            Err(err) => tracing::debug!(
                key = %key,
                generation,
                error = %err,
                "construction failed, slot released"
            ),
        }
        self.observers
            .construction_finished(&key, elapsed, outcome.as_ref().map(|_| ()));
        outcome
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("state", &self.state())
            .field("instances", &self.len())
            .field("in_flight", &self.inner.in_flight.len())
            .field("running", &self.inner.constructions.running())
            .field("observers", &self.inner.observers.len())
            .field("config", &self.inner.config)
            .finish()
    }
}

impl Drop for RegistryInner {
    fn drop(&mut self) {
        let pending = self.store.closeable_count();
        if pending > 0 {
            tracing::warn!(
                pending,
                "registry dropped with instances awaiting teardown; call close_all().await before dropping"
            );
        }
    }
}

fn downcast<T>(key: &NormalizedKey, value: AnyArc) -> RegistryResult<Arc<T>>
where
    T: Send + Sync + 'static,
{
    value
        .downcast::<T>()
        .map_err(|_| RegistryError::TypeMismatch {
            key: key.to_string(),
            expected: std::any::type_name::<T>(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn fast_path_returns_stored_instance() {
        let registry = Registry::new();
        let a = registry
            .create("pool", Some(Factory::from_fn(|| 1u32).inline()))
            .await
            .unwrap();
        let b = registry.create::<u32>("pool", None).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.state(), RegistryState::Populated);
    }

    #[tokio::test]
    async fn in_flight_slot_is_released_after_commit() {
        let registry = Registry::new();
        registry
            .create("embedder", Some(Factory::from_fn(|| 384usize)))
            .await
            .unwrap();
        assert_eq!(registry.inner.in_flight.len(), 0);

        let _ = registry
            .create::<usize>("broken", Some(Factory::sync(|| Err::<usize, _>("no weights"))))
            .await;
        assert_eq!(registry.inner.in_flight.len(), 0);
        assert!(!registry.contains("broken"));
    }

    #[tokio::test]
    async fn dropped_initiator_does_not_cancel_construction() {
        let registry = Registry::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);

        let slow = registry.create(
            "slow",
            Some(Factory::future(move || async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, std::io::Error>(7u8)
            })),
        );
        // Poll long enough to start the construction, then drop the caller.
        let _ = tokio::time::timeout(Duration::from_millis(5), slow).await;

        let value = registry
            .create("slow", Some(Factory::from_fn(|| 0u8).inline()))
            .await
            .unwrap();
        assert_eq!(*value, 7);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn debug_shows_state() {
        let registry = Registry::new();
        let repr = format!("{:?}", registry);
        assert!(repr.contains("Empty"));
        assert!(repr.contains("instances: 0"));
    }
}
