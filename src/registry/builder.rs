//! Builder for [`Registry`].

use std::sync::Arc;
use std::time::Duration;

use super::Registry;
use crate::config::RegistryConfig;
use crate::factory::RunMode;
use crate::observer::{Observers, RegistryObserver};

/// Assembles a [`Registry`] from configuration and observers.
///
/// # Examples
///
/// ```
/// use ferrous_registry::{LoggingObserver, Registry, RunMode};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let registry = Registry::builder()
///     .run_mode(RunMode::Inline)
///     .teardown_timeout(Duration::from_secs(10))
///     .observer(Arc::new(LoggingObserver::new()))
///     .build();
///
/// assert_eq!(registry.config().teardown_timeout, Some(Duration::from_secs(10)));
/// ```
#[derive(Default)]
pub struct RegistryBuilder {
    config: RegistryConfig,
    observers: Observers,
}

impl RegistryBuilder {
    /// Creates a builder with the default configuration and no observers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: RegistryConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the run mode for synchronous factories without an explicit one.
    pub fn run_mode(mut self, mode: RunMode) -> Self {
        self.config.default_run_mode = mode;
        self
    }

    /// Sets the per-instance teardown deadline.
    pub fn teardown_timeout(mut self, timeout: Duration) -> Self {
        self.config.teardown_timeout = Some(timeout);
        self
    }

    /// Adds an observer. Observers are notified in registration order.
    pub fn observer(mut self, observer: Arc<dyn RegistryObserver>) -> Self {
        self.observers.add(observer);
        self
    }

    /// Builds the registry.
    pub fn build(self) -> Registry {
        tracing::debug!(
            run_mode = ?self.config.default_run_mode,
            teardown_timeout = ?self.config.teardown_timeout,
            observers = self.observers.len(),
            "registry built"
        );
        Registry::from_parts(self.config, self.observers)
    }
}
