//! Observers for construction and teardown events.
//!
//! Observers receive a callback for every construction the registry starts,
//! joins and finishes, and for every instance it tears down. The registry also
//! emits `tracing` events of its own; observers exist for callers that want
//! to collect metrics or forward events elsewhere.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::RegistryError;
use crate::key::NormalizedKey;
use crate::registry::TeardownOutcome;

/// Observer trait for registry lifecycle events.
///
/// Callbacks run synchronously on the task that produced the event. Keep them
/// cheap. All methods default to no-ops.
///
/// # Examples
///
/// ```
/// use ferrous_registry::{NormalizedKey, Registry, RegistryError, RegistryObserver};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// struct SlowConstructionAlarm {
///     threshold: Duration,
/// }
///
/// impl RegistryObserver for SlowConstructionAlarm {
///     fn construction_finished(
///         &self,
///         key: &NormalizedKey,
///         duration: Duration,
///         _outcome: Result<(), &RegistryError>,
///     ) {
///         if duration > self.threshold {
///             eprintln!("{} took {:?}", key, duration);
///         }
///     }
/// }
///
/// let registry = Registry::builder()
///     .observer(Arc::new(SlowConstructionAlarm { threshold: Duration::from_secs(2) }))
///     .build();
/// # let _ = registry;
/// ```
pub trait RegistryObserver: Send + Sync {
    /// A caller became the initiator of a construction.
    fn construction_started(&self, _key: &NormalizedKey) {}

    /// A caller joined a construction already in flight.
    fn construction_joined(&self, _key: &NormalizedKey) {}

    /// A construction committed its outcome.
    fn construction_finished(
        &self,
        _key: &NormalizedKey,
        _duration: Duration,
        _outcome: Result<(), &RegistryError>,
    ) {
    }

    /// Teardown of one instance finished during `close_all`.
    fn teardown_finished(&self, _key: &NormalizedKey, _outcome: &TeardownOutcome) {}
}

/// Fan-out over the registered observers.
#[derive(Default, Clone)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn RegistryObserver>>,
}

impl Observers {
    pub(crate) fn add(&mut self, observer: Arc<dyn RegistryObserver>) {
        self.observers.push(observer);
    }

    pub(crate) fn len(&self) -> usize {
        self.observers.len()
    }

    pub(crate) fn construction_started(&self, key: &NormalizedKey) {
        for observer in &self.observers {
            observer.construction_started(key);
        }
    }

    pub(crate) fn construction_joined(&self, key: &NormalizedKey) {
        for observer in &self.observers {
            observer.construction_joined(key);
        }
    }

    pub(crate) fn construction_finished(
        &self,
        key: &NormalizedKey,
        duration: Duration,
        outcome: Result<(), &RegistryError>,
    ) {
        for observer in &self.observers {
            observer.construction_finished(key, duration, outcome);
        }
    }

    pub(crate) fn teardown_finished(&self, key: &NormalizedKey, outcome: &TeardownOutcome) {
        for observer in &self.observers {
            observer.teardown_finished(key, outcome);
        }
    }
}

/// Observer that forwards every event to `tracing` at `info` level.
///
/// Failures are logged at `warn`.
#[derive(Debug, Clone)]
pub struct LoggingObserver {
    prefix: String,
}

impl LoggingObserver {
    /// Creates a logging observer with the default prefix.
    pub fn new() -> Self {
        Self {
            prefix: "registry".to_string(),
        }
    }

    /// Creates a logging observer with a custom prefix field.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for LoggingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryObserver for LoggingObserver {
    fn construction_started(&self, key: &NormalizedKey) {
        tracing::info!(prefix = %self.prefix, key = %key, "construction started");
    }

    fn construction_joined(&self, key: &NormalizedKey) {
        tracing::info!(prefix = %self.prefix, key = %key, "joined in-flight construction");
    }

    fn construction_finished(
        &self,
        key: &NormalizedKey,
        duration: Duration,
        outcome: Result<(), &RegistryError>,
    ) {
        match outcome {
            Ok(()) => tracing::info!(
                prefix = %self.prefix,
                key = %key,
                elapsed_ms = duration.as_millis() as u64,
                "construction finished"
            ),
            Err(err) => tracing::warn!(
                prefix = %self.prefix,
                key = %key,
                elapsed_ms = duration.as_millis() as u64,
                error = %err,
                "construction failed"
            ),
        }
    }

    fn teardown_finished(&self, key: &NormalizedKey, outcome: &TeardownOutcome) {
        if outcome.is_failure() {
            tracing::warn!(prefix = %self.prefix, key = %key, outcome = ?outcome, "teardown failed");
        } else {
            tracing::info!(prefix = %self.prefix, key = %key, outcome = ?outcome, "teardown finished");
        }
    }
}

/// Observer that counts events.
///
/// # Examples
///
/// ```
/// use ferrous_registry::{Factory, MetricsObserver, Registry};
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let metrics = Arc::new(MetricsObserver::new());
/// let registry = Registry::builder().observer(metrics.clone()).build();
///
/// registry.create("splitter", Some(Factory::from_fn(|| 512usize).inline())).await.unwrap();
/// registry.create("splitter", Some(Factory::from_fn(|| 1024usize).inline())).await.unwrap();
///
/// assert_eq!(metrics.constructions(), 1);
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MetricsObserver {
    constructions: AtomicU64,
    joins: AtomicU64,
    failures: AtomicU64,
    finished: AtomicU64,
    construction_nanos: AtomicU64,
    teardowns: AtomicU64,
    teardown_failures: AtomicU64,
}

impl MetricsObserver {
    /// Creates a metrics observer with zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Constructions started.
    pub fn constructions(&self) -> u64 {
        self.constructions.load(Ordering::Relaxed)
    }

    /// Callers that joined an in-flight construction.
    pub fn joins(&self) -> u64 {
        self.joins.load(Ordering::Relaxed)
    }

    /// Constructions that failed.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Instances whose teardown ran (successfully or not).
    pub fn teardowns(&self) -> u64 {
        self.teardowns.load(Ordering::Relaxed)
    }

    /// Teardowns that failed, panicked or timed out.
    pub fn teardown_failures(&self) -> u64 {
        self.teardown_failures.load(Ordering::Relaxed)
    }

    /// Mean time from start to commit over finished constructions.
    pub fn average_construction_time(&self) -> Option<Duration> {
        let finished = self.finished.load(Ordering::Relaxed);
        if finished == 0 {
            return None;
        }
        Some(Duration::from_nanos(
            self.construction_nanos.load(Ordering::Relaxed) / finished,
        ))
    }

    /// Resets every counter.
    pub fn reset(&self) {
        for counter in [
            &self.constructions,
            &self.joins,
            &self.failures,
            &self.finished,
            &self.construction_nanos,
            &self.teardowns,
            &self.teardown_failures,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl RegistryObserver for MetricsObserver {
    fn construction_started(&self, _key: &NormalizedKey) {
        self.constructions.fetch_add(1, Ordering::Relaxed);
    }

    fn construction_joined(&self, _key: &NormalizedKey) {
        self.joins.fetch_add(1, Ordering::Relaxed);
    }

    fn construction_finished(
        &self,
        _key: &NormalizedKey,
        duration: Duration,
        outcome: Result<(), &RegistryError>,
    ) {
        self.finished.fetch_add(1, Ordering::Relaxed);
        self.construction_nanos
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
        if outcome.is_err() {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn teardown_finished(&self, _key: &NormalizedKey, outcome: &TeardownOutcome) {
        if matches!(outcome, TeardownOutcome::Skipped) {
            return;
        }
        self.teardowns.fetch_add(1, Ordering::Relaxed);
        if outcome.is_failure() {
            self.teardown_failures.fetch_add(1, Ordering::Relaxed);
        }
    }
}
