use std::fmt;
use std::ops::{Deref, DerefMut};

use super::{PooledResource, ResourcePool};

/// Exclusive handle to a checked-out pool resource.
///
/// The guard is the only owner of the resource while it exists. Dropping it
/// releases the resource back to its pool on every exit path, including early
/// returns and unwinding.
pub struct Pooled<'p, R: PooledResource, E> {
    pool: &'p ResourcePool<R, E>,
    resource: Option<R>,
}

impl<'p, R: PooledResource, E> Pooled<'p, R, E> {
    pub(super) fn new(pool: &'p ResourcePool<R, E>, resource: R) -> Self {
        Self {
            pool,
            resource: Some(resource),
        }
    }

    /// Takes the resource out of the guard without returning it to the pool.
    ///
    /// The caller becomes responsible for handing it back via
    /// [`ResourcePool::release`] or dropping it.
    pub fn detach(mut self) -> R {
        // Only `Drop` and `detach` take the value, and both consume the guard.
        match self.resource.take() {
            Some(resource) => resource,
            None => unreachable!("pooled resource taken twice"),
        }
    }
}

impl<R: PooledResource, E> Deref for Pooled<'_, R, E> {
    type Target = R;

    fn deref(&self) -> &R {
        match &self.resource {
            Some(resource) => resource,
            None => unreachable!("pooled resource used after release"),
        }
    }
}

impl<R: PooledResource, E> DerefMut for Pooled<'_, R, E> {
    fn deref_mut(&mut self) -> &mut R {
        match &mut self.resource {
            Some(resource) => resource,
            None => unreachable!("pooled resource used after release"),
        }
    }
}

impl<R: PooledResource, E> Drop for Pooled<'_, R, E> {
    fn drop(&mut self) {
        if let Some(resource) = self.resource.take() {
            self.pool.release(resource);
        }
    }
}

impl<R: PooledResource, E> fmt::Debug for Pooled<'_, R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pooled").finish_non_exhaustive()
    }
}
