//! # ferrous-registry
//!
//! Process-wide keyed singleton registry for expensive, shared resources:
//! embedding models, connection pools, authentication clients.
//!
//! ## Features
//!
//! - **Single-flight construction**: concurrent `create` calls for one key run
//!   the factory once and all receive the same `Arc`
//! - **Key normalization**: names are case-insensitive, a type and an instance
//!   of that type resolve to one slot, generic parameterizations stay distinct
//! - **Rollback on failure**: a failed factory stores nothing, and every caller
//!   of that construction sees the same error
//! - **Execution policy**: blocking factories run on the blocking pool, cheap
//!   ones inline, async ones on the runtime
//! - **Graceful shutdown**: `close_all` tears every instance down through the
//!   first teardown shape it supports, isolating failures
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_registry::{Factory, Key, Registry};
//! use std::sync::Arc;
//!
//! struct ConnectionPool {
//!     url: String,
//! }
//!
//! # #[tokio::main]
//! # async fn main() {
//! // Build once at startup and hand clones to the call sites.
//! let registry = Registry::new();
//!
//! let pool = registry
//!     .create(Key::of::<ConnectionPool>(), Some(Factory::from_fn(|| ConnectionPool {
//!         url: "postgres://localhost".to_string(),
//!     })))
//!     .await
//!     .unwrap();
//!
//! let same = registry.get::<ConnectionPool>(Key::of::<ConnectionPool>()).unwrap();
//! assert!(Arc::ptr_eq(&pool, &same));
//! assert_eq!(same.url, "postgres://localhost");
//!
//! // Close once at shutdown.
//! registry.close_all().await;
//! assert!(registry.is_empty());
//! # }
//! ```
//!
//! ## Keys
//!
//! ```rust
//! use ferrous_registry::Key;
//!
//! struct Embedder;
//! struct Chunk;
//! struct Page;
//!
//! assert_eq!(Key::name("Embedder").normalize(), Key::name("embedder").normalize());
//! assert_eq!(Key::of::<Embedder>().normalize(), Key::instance_of(&Embedder).normalize());
//! assert_ne!(Key::of::<Vec<Chunk>>().normalize(), Key::of::<Vec<Page>>().normalize());
//! ```
//!
//! ## Teardown
//!
//! Instances opt into shutdown by implementing [`Teardown`] and being created
//! through [`Factory::closeable`] or [`Key::closeable`]. See [`Teardown`] for
//! the supported shapes and their priority.

pub mod config;
pub mod error;
pub mod factory;
pub mod key;
pub mod observer;
pub mod registry;
pub mod state;
pub mod traits;

// Internal modules
mod internal;

pub use config::{RegistryConfig, ENV_PREFIX};
pub use error::{BoxError, FactoryPanic, RegistryError, RegistryResult, SharedError};
pub use factory::{Factory, RunMode};
pub use key::{Key, NormalizedKey, TypeKey};
pub use observer::{LoggingObserver, MetricsObserver, RegistryObserver};
pub use registry::{Registry, RegistryBuilder, TeardownOutcome};
pub use state::RegistryState;
pub use traits::{Teardown, TeardownResult, TeardownShape};
