//! Error types for the singleton registry.

use std::sync::Arc;

/// Boxed error returned by factories and teardown hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Factory error shared between the initiator of a construction and every
/// caller that joined it.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Registry errors
///
/// Represents the conditions that can occur while creating, looking up or
/// configuring registry instances. Errors are `Clone` so a single construction
/// outcome can be handed to every caller waiting on it.
///
/// # Examples
///
/// ```rust
/// use ferrous_registry::{Registry, RegistryError};
///
/// let registry = Registry::new();
/// match registry.get::<String>("embedder") {
///     Err(RegistryError::NotFound(key)) => assert_eq!(key, "embedder"),
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    /// Neither a factory nor a constructible key was supplied
    #[error("no factory supplied and key `{0}` is not constructible")]
    NoFactory(String),
    /// No instance stored for the key
    #[error("no instance registered for key `{0}`")]
    NotFound(String),
    /// The factory failed; every caller of the same construction sees this
    #[error("construction of `{key}` failed: {source}")]
    Construction {
        key: String,
        #[source]
        source: SharedError,
    },
    /// The stored instance is not of the requested type
    #[error("instance for `{key}` is not a `{expected}`")]
    TypeMismatch { key: String, expected: &'static str },
    /// The construction task was aborted before it produced an outcome
    #[error("construction of `{0}` was cancelled")]
    Cancelled(String),
    /// A configuration value could not be parsed
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RegistryError {
    /// Wraps a factory error for `key`.
    pub(crate) fn construction(key: impl ToString, source: BoxError) -> Self {
        RegistryError::Construction {
            key: key.to_string(),
            source: Arc::from(source),
        }
    }

    /// Returns true when retrying `create` for the same key may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RegistryError::Construction { .. } | RegistryError::Cancelled(_)
        )
    }
}

/// Panic payload captured from a factory, surfaced as the source of a
/// [`RegistryError::Construction`].
#[derive(Debug, Clone, thiserror::Error)]
#[error("factory panicked: {0}")]
pub struct FactoryPanic(pub String);

impl FactoryPanic {
    /// Extracts a readable message from a panic payload.
    pub(crate) fn from_payload(payload: Box<dyn std::any::Any + Send>) -> Self {
        FactoryPanic(panic_message(&*payload))
    }
}

/// Readable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Result type for registry operations
///
/// A convenience alias for `Result<T, RegistryError>`.
///
/// # Examples
///
/// ```rust
/// use ferrous_registry::{RegistryResult, RegistryError};
///
/// fn lookup() -> RegistryResult<u32> {
///     Err(RegistryError::NotFound("splitter".to_string()))
/// }
///
/// assert!(lookup().is_err());
/// ```
pub type RegistryResult<T> = Result<T, RegistryError>;
