//! Factories and execution policy for instance construction.
//!
//! A [`Factory`] wraps whatever produces a resource: a cheap closure, a
//! blocking constructor (model loading, pool warm-up) or an async handshake.
//! The registry turns it into a boxed construction job that runs at most once
//! per key.

use std::any::Any;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::error::{BoxError, FactoryPanic, RegistryError};
use crate::traits::Teardown;

/// Type-erased shared instance.
pub(crate) type AnyArc = Arc<dyn Any + Send + Sync>;

/// Constructor carried by a constructible [`Key`](crate::Key).
pub(crate) type Constructor = Arc<dyn Fn() -> Result<Built, BoxError> + Send + Sync>;

/// Erased construction job, polled by the construction task.
pub(crate) type Job = BoxFuture<'static, Result<Built, BoxError>>;

/// Where synchronous factories run.
///
/// Async factories are always awaited on the runtime; this only affects
/// factories built with [`Factory::sync`] or [`Factory::from_fn`].
///
/// Every construction is polled by its own spawned task, so neither mode runs
/// the factory on the calling task. `Inline` runs it on a runtime worker
/// thread, which on a current-thread runtime is the caller's thread. Task
/// locals of the caller are not visible to the factory in either mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "snake_case"))]
pub enum RunMode {
    /// Run on tokio's blocking pool so the scheduler is never stalled
    #[default]
    Thread,
    /// Run on a runtime worker inside the construction task; for cheap,
    /// non-blocking factories
    Inline,
}

impl FromStr for RunMode {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "thread" | "threaded" => Ok(RunMode::Thread),
            "inline" => Ok(RunMode::Inline),
            other => Err(RegistryError::InvalidConfig(format!(
                "unknown run mode `{}` (expected `thread` or `inline`)",
                other
            ))),
        }
    }
}

/// A freshly built instance with its optional teardown capability.
#[derive(Clone)]
pub(crate) struct Built {
    pub(crate) value: AnyArc,
    pub(crate) type_name: &'static str,
    pub(crate) teardown: Option<Arc<dyn Teardown>>,
}

impl Built {
    pub(crate) fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Built {
            value: Arc::new(value),
            type_name: std::any::type_name::<T>(),
            teardown: None,
        }
    }

    pub(crate) fn closeable<T: Teardown>(value: T) -> Self {
        let value = Arc::new(value);
        Built {
            value: value.clone(),
            type_name: std::any::type_name::<T>(),
            teardown: Some(value),
        }
    }
}

enum FactoryKind<T> {
    Sync {
        make: Box<dyn FnOnce() -> Result<T, BoxError> + Send>,
        mode: Option<RunMode>,
    },
    Async(Box<dyn FnOnce() -> BoxFuture<'static, Result<T, BoxError>> + Send>),
}

/// Produces the instance for a registry slot.
///
/// # Examples
///
/// ```
/// use ferrous_registry::{Factory, Registry, RunMode};
///
/// struct Embedder { dims: usize }
/// struct Splitter { chunk: usize }
///
/// # #[tokio::main]
/// # async fn main() {
/// let registry = Registry::new();
///
/// // Blocking constructor, dispatched to the blocking pool
/// let embedder = registry
///     .create("embedder", Some(Factory::from_fn(|| Embedder { dims: 768 })))
///     .await
///     .unwrap();
///
/// // Cheap constructor, run inline
/// let splitter = registry
///     .create("splitter", Some(Factory::from_fn(|| Splitter { chunk: 512 }).run_mode(RunMode::Inline)))
///     .await
///     .unwrap();
///
/// // Async constructor
/// let pool = registry
///     .create("pool", Some(Factory::future(|| async {
///         Ok::<_, std::io::Error>(vec!["conn-1".to_string()])
///     })))
///     .await
///     .unwrap();
///
/// assert_eq!(embedder.dims, 768);
/// assert_eq!(splitter.chunk, 512);
/// assert_eq!(pool.len(), 1);
/// # }
/// ```
pub struct Factory<T> {
    kind: FactoryKind<T>,
    teardown: Option<fn(&Arc<T>) -> Arc<dyn Teardown>>,
}

fn as_teardown<T: Teardown>(value: &Arc<T>) -> Arc<dyn Teardown> {
    value.clone()
}

impl<T: Send + Sync + 'static> Factory<T> {
    /// Fallible synchronous factory.
    pub fn sync<F, E>(make: F) -> Self
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        E: Into<BoxError>,
    {
        Factory {
            kind: FactoryKind::Sync {
                make: Box::new(move || make().map_err(Into::into)),
                mode: None,
            },
            teardown: None,
        }
    }

    /// Infallible synchronous factory.
    pub fn from_fn<F>(make: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Self::sync(move || Ok::<T, std::convert::Infallible>(make()))
    }

    /// Asynchronous factory, awaited on the runtime.
    pub fn future<F, Fut, E>(make: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        Factory {
            kind: FactoryKind::Async(Box::new(move || {
                make().map(|res| res.map_err(Into::into)).boxed()
            })),
            teardown: None,
        }
    }

    /// Sets where a synchronous factory runs. Ignored for async factories.
    pub fn run_mode(mut self, mode: RunMode) -> Self {
        if let FactoryKind::Sync { mode: slot, .. } = &mut self.kind {
            *slot = Some(mode);
        }
        self
    }

    /// Shorthand for `run_mode(RunMode::Inline)`.
    pub fn inline(self) -> Self {
        self.run_mode(RunMode::Inline)
    }

    /// Registers the built instance for teardown through its [`Teardown`]
    /// implementation.
    pub fn closeable(mut self) -> Self
    where
        T: Teardown,
    {
        self.teardown = Some(as_teardown::<T>);
        self
    }

    /// Returns true for factories built with [`Factory::future`].
    pub fn is_async(&self) -> bool {
        matches!(self.kind, FactoryKind::Async(_))
    }

    pub(crate) fn into_job(self, default_mode: RunMode) -> Job {
        let teardown = self.teardown;
        let finish = move |value: T| {
            let value = Arc::new(value);
            Built {
                teardown: teardown.map(|attach| attach(&value)),
                value,
                type_name: std::any::type_name::<T>(),
            }
        };
        match self.kind {
            FactoryKind::Sync { make, mode } => run_sync(make, mode.unwrap_or(default_mode))
                .map(move |res| res.map(finish))
                .boxed(),
            FactoryKind::Async(make) => async move { make().await.map(finish) }.boxed(),
        }
    }
}

/// Builds the job for a constructible key.
pub(crate) fn constructor_job(constructor: Constructor, mode: RunMode) -> Job {
    run_sync(move || constructor(), mode)
}

fn run_sync<R, F>(make: F, mode: RunMode) -> BoxFuture<'static, Result<R, BoxError>>
where
    R: Send + 'static,
    F: FnOnce() -> Result<R, BoxError> + Send + 'static,
{
    match mode {
        RunMode::Inline => async move { make() }.boxed(),
        RunMode::Thread => async move {
            match tokio::task::spawn_blocking(make).await {
                Ok(res) => res,
                Err(err) if err.is_panic() => {
                    Err(Box::new(FactoryPanic::from_payload(err.into_panic())) as BoxError)
                }
                Err(err) => Err(Box::new(err) as BoxError),
            }
        }
        .boxed(),
    }
}
