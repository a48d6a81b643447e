use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::Pooled;

/// A resource that can live in a [`ResourcePool`].
///
/// Construction is the pool's factory; destruction is `Drop`.
pub trait PooledResource: Send {
    /// Reports whether the resource is unusable and must not be handed out again.
    fn is_corrupt(&self) -> bool {
        false
    }
}

type Factory<R, E> = Box<dyn Fn() -> Result<R, E> + Send + Sync>;

/// Snapshot of pool bookkeeping.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct PoolStats {
    /// Resources built by the factory over the pool's lifetime.
    pub created: usize,
    /// Resources currently idle in the pool.
    pub idle: usize,
    /// Resources destroyed because they reported corruption.
    pub discarded: usize,
}

/// Lazily populated stack of idle resources.
///
/// The pool has no size cap: it grows to the peak number of concurrent holders
/// and only shrinks when a corrupt resource is discarded or the pool is dropped.
pub struct ResourcePool<R, E> {
    idle: Mutex<Vec<R>>,
    factory: Factory<R, E>,
    created: AtomicUsize,
    discarded: AtomicUsize,
}

impl<R: PooledResource, E> ResourcePool<R, E> {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<R, E> + Send + Sync + 'static,
    {
        Self {
            idle: Mutex::new(Vec::new()),
            factory: Box::new(factory),
            created: AtomicUsize::new(0),
            discarded: AtomicUsize::new(0),
        }
    }

    /// Checks out one resource, building a new one if none is idle.
    ///
    /// The lock is only held to pop from the idle list; the factory runs
    /// unlocked so a slow construction never stalls other acquirers. Factory
    /// errors are returned unchanged and nothing is added to the pool.
    pub fn acquire(&self) -> Result<Pooled<'_, R, E>, E> {
        let reused = self.lock_idle().pop();
        let resource = match reused {
            Some(resource) => {
                log::trace!("pool: reusing idle resource");
                resource
            }
            None => {
                let resource = (self.factory)()?;
                let total = self.created.fetch_add(1, Ordering::Relaxed) + 1;
                log::debug!("pool: created resource ({total} total)");
                resource
            }
        };
        Ok(Pooled::new(self, resource))
    }

    /// Returns a resource to the idle list, or destroys it if it is corrupt.
    ///
    /// Dropping a [`Pooled`] guard calls this; it only needs to be called by
    /// hand for resources taken out with [`Pooled::detach`].
    pub fn release(&self, resource: R) {
        if resource.is_corrupt() {
            self.discarded.fetch_add(1, Ordering::Relaxed);
            log::warn!("pool: discarding corrupt resource");
            drop(resource);
            return;
        }
        self.lock_idle().push(resource);
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            created: self.created.load(Ordering::Relaxed),
            idle: self.lock_idle().len(),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }

    // The idle list is never left half-updated, so a poisoned lock is still usable.
    fn lock_idle(&self) -> MutexGuard<'_, Vec<R>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
