//! Internal implementation details.

pub(crate) mod in_flight;
pub(crate) mod lock_table;
pub(crate) mod store;
pub(crate) mod tracker;

pub(crate) use in_flight::{Construction, InFlight, InFlightTable};
pub(crate) use lock_table::LockTable;
pub(crate) use store::InstanceStore;
pub(crate) use tracker::ConstructionTracker;

use crate::key::NormalizedKey;

/// Map keyed by normalized key, hashed with ahash when the feature is on.
#[cfg(feature = "ahash")]
pub(crate) type KeyMap<V> = std::collections::HashMap<NormalizedKey, V, ahash::RandomState>;
#[cfg(not(feature = "ahash"))]
pub(crate) type KeyMap<V> = std::collections::HashMap<NormalizedKey, V>;
