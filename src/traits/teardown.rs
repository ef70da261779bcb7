//! Teardown capabilities for graceful shutdown.

use crate::error::BoxError;

/// Result of a single teardown attempt.
pub type TeardownResult = Result<(), BoxError>;

/// The closed set of teardown shapes an instance may support.
///
/// `close_all` tries the first supported shape in [`TeardownShape::PRIORITY`]
/// order and ignores the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TeardownShape {
    /// Asynchronous close, awaited
    AsyncClose,
    /// Synchronous counterpart of the asynchronous close
    AsyncCloseSync,
    /// Generic synchronous close
    Close,
    /// Synchronous disconnect
    Disconnect,
}

impl TeardownShape {
    /// Order in which shapes are tried.
    pub const PRIORITY: [TeardownShape; 4] = [
        TeardownShape::AsyncClose,
        TeardownShape::AsyncCloseSync,
        TeardownShape::Close,
        TeardownShape::Disconnect,
    ];

    /// Picks the highest-priority shape among `supported`.
    pub fn select(supported: &[TeardownShape]) -> Option<TeardownShape> {
        Self::PRIORITY
            .iter()
            .copied()
            .find(|shape| supported.contains(shape))
    }

    /// Name of the method the shape dispatches to.
    pub fn method_name(&self) -> &'static str {
        match self {
            TeardownShape::AsyncClose => "aclose",
            TeardownShape::AsyncCloseSync => "aclose_sync",
            TeardownShape::Close => "close",
            TeardownShape::Disconnect => "disconnect",
        }
    }
}

/// Trait for instances the registry should tear down on `close_all`.
///
/// An implementation declares which shapes it supports through
/// [`shapes`](Teardown::shapes) and overrides the matching methods. Only the
/// highest-priority supported shape is invoked; the remaining methods keep
/// their no-op defaults.
///
/// # Examples
///
/// ```
/// use ferrous_registry::{Factory, Registry, Teardown, TeardownResult, TeardownShape};
/// use async_trait::async_trait;
///
/// struct OidcClient {
///     issuer: String,
/// }
///
/// #[async_trait]
/// impl Teardown for OidcClient {
///     fn shapes(&self) -> &'static [TeardownShape] {
///         &[TeardownShape::AsyncClose]
///     }
///
///     async fn aclose(&self) -> TeardownResult {
///         println!("Closing session with {}", self.issuer);
///         Ok(())
///     }
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let registry = Registry::new();
/// registry
///     .create("oidc", Some(Factory::from_fn(|| OidcClient {
///         issuer: "https://auth.example.com".to_string(),
///     }).inline().closeable()))
///     .await
///     .unwrap();
///
/// registry.close_all().await;
/// assert!(registry.is_empty());
/// # }
/// ```
#[async_trait::async_trait]
pub trait Teardown: Send + Sync + 'static {
    /// Shapes this instance supports.
    fn shapes(&self) -> &'static [TeardownShape];

    /// Asynchronous close.
    async fn aclose(&self) -> TeardownResult {
        Ok(())
    }

    /// Synchronous close sharing the asynchronous close's role.
    fn aclose_sync(&self) -> TeardownResult {
        Ok(())
    }

    /// Generic synchronous close.
    fn close(&self) -> TeardownResult {
        Ok(())
    }

    /// Synchronous disconnect.
    fn disconnect(&self) -> TeardownResult {
        Ok(())
    }
}
