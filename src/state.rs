//! Registry lifecycle states.

use std::fmt;

/// Lifecycle state of a [`Registry`](crate::Registry).
///
/// A registry moves `Empty -> Populated` on its first successful construction,
/// `Populated -> Draining` when `close_all` starts and back to `Empty` once
/// every teardown attempt has finished. A drained registry is reusable.
///
/// # Examples
///
/// ```rust
/// use ferrous_registry::{Factory, Registry, RegistryState};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let registry = Registry::new();
/// assert_eq!(registry.state(), RegistryState::Empty);
///
/// registry.create("splitter", Some(Factory::from_fn(|| 512usize).inline())).await.unwrap();
/// assert_eq!(registry.state(), RegistryState::Populated);
///
/// registry.close_all().await;
/// assert_eq!(registry.state(), RegistryState::Empty);
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistryState {
    /// No instance is stored
    Empty,
    /// At least one instance is stored
    Populated,
    /// `close_all` is tearing instances down
    Draining,
}

impl RegistryState {
    /// Returns true while `close_all` is running.
    pub fn is_draining(&self) -> bool {
        matches!(self, RegistryState::Draining)
    }
}

impl fmt::Display for RegistryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RegistryState::Empty => "empty",
            RegistryState::Populated => "populated",
            RegistryState::Draining => "draining",
        })
    }
}
