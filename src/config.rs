//! Registry configuration.
//!
//! Configuration is read once when the registry is built. Values come from
//! code (`Default` plus builder methods), from the environment, or, with the
//! `config` feature, from JSON.

use std::env;
use std::time::Duration;

use crate::error::{RegistryError, RegistryResult};
use crate::factory::RunMode;

/// Default prefix for environment variables.
pub const ENV_PREFIX: &str = "FERROUS_REGISTRY";

/// Settings that shape construction and teardown.
///
/// # Examples
///
/// ```
/// use ferrous_registry::{Registry, RegistryConfig, RunMode};
/// use std::time::Duration;
///
/// let config = RegistryConfig::default()
///     .with_default_run_mode(RunMode::Inline)
///     .with_teardown_timeout(Duration::from_secs(5));
///
/// let registry = Registry::with_config(config);
/// assert_eq!(registry.config().default_run_mode, RunMode::Inline);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct RegistryConfig {
    /// Run mode for synchronous factories that did not choose one
    pub default_run_mode: RunMode,
    /// Per-instance deadline for teardown during `close_all`
    #[cfg_attr(feature = "config", serde(with = "millis"))]
    pub teardown_timeout: Option<Duration>,
}

impl RegistryConfig {
    /// Sets the run mode used by synchronous factories without an explicit one.
    pub fn with_default_run_mode(mut self, mode: RunMode) -> Self {
        self.default_run_mode = mode;
        self
    }

    /// Bounds how long a single instance may take to tear down.
    pub fn with_teardown_timeout(mut self, timeout: Duration) -> Self {
        self.teardown_timeout = Some(timeout);
        self
    }

    /// Reads `FERROUS_REGISTRY_RUN_MODE` and
    /// `FERROUS_REGISTRY_TEARDOWN_TIMEOUT_MS`, falling back to defaults for
    /// unset variables.
    pub fn from_env() -> RegistryResult<Self> {
        Self::from_env_with_prefix(ENV_PREFIX)
    }

    /// Like [`from_env`](Self::from_env) with a custom variable prefix.
    pub fn from_env_with_prefix(prefix: &str) -> RegistryResult<Self> {
        let prefix = prefix.to_uppercase();
        let mut config = Self::default();

        if let Some(mode) = read_var(&prefix, "RUN_MODE") {
            config.default_run_mode = mode.parse()?;
        }
        if let Some(ms) = read_var(&prefix, "TEARDOWN_TIMEOUT_MS") {
            let ms: u64 = ms.trim().parse().map_err(|_| {
                RegistryError::InvalidConfig(format!(
                    "{}_TEARDOWN_TIMEOUT_MS must be a non-negative integer, got `{}`",
                    prefix, ms
                ))
            })?;
            config.teardown_timeout = Some(Duration::from_millis(ms));
        }
        Ok(config)
    }

    /// Parses a JSON document such as
    /// `{"default_run_mode": "inline", "teardown_timeout": 2500}`.
    #[cfg(feature = "config")]
    pub fn from_json(json: &str) -> RegistryResult<Self> {
        serde_json::from_str(json).map_err(|e| RegistryError::InvalidConfig(e.to_string()))
    }

    /// Reads and parses a JSON configuration file.
    #[cfg(feature = "config")]
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> RegistryResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            RegistryError::InvalidConfig(format!("{}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }
}

fn read_var(prefix: &str, name: &str) -> Option<String> {
    env::var(format!("{}_{}", prefix, name))
        .ok()
        .filter(|value| !value.trim().is_empty())
}

#[cfg(feature = "config")]
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}
