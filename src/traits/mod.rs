//! Capability traits implemented by registry instances.

mod teardown;

pub use teardown::{Teardown, TeardownResult, TeardownShape};
