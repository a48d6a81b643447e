//! Thread-safe pool of expensive, non-shareable resources.
//!
//! Resources are built lazily by a factory closure, handed out as exclusive
//! [`Pooled`] guards, and returned to the idle list when the guard drops. A
//! resource that reports itself corrupt is destroyed instead of returned.

mod guard;
#[allow(clippy::module_inception)]
mod pool;

pub use guard::Pooled;
pub use pool::{PoolStats, PooledResource, ResourcePool};
