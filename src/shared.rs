use parking_lot::RwLock;
use smallworld_core::{Distance, DistanceMetric, HnswIndex, Neighbor};
use std::sync::Arc;

/// Cloneable handle enforcing one writer or many readers on an index.
///
/// Builds take the write lock for the whole batch; queries share the read lock.
pub struct SharedIndex<D = DistanceMetric> {
    inner: Arc<RwLock<HnswIndex<D>>>,
}

impl<D> Clone for SharedIndex<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: Distance> SharedIndex<D> {
    pub fn new(index: HnswIndex<D>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(index)),
        }
    }

    /// Runs `f` with exclusive access.
    pub fn build<R>(&self, f: impl FnOnce(&mut HnswIndex<D>) -> R) -> R {
        f(&mut *self.inner.write())
    }

    /// Runs `f` with shared access.
    pub fn search<R>(&self, f: impl FnOnce(&HnswIndex<D>) -> R) -> R {
        f(&*self.inner.read())
    }

    pub fn k_nearest(&self, query: &[f32], k: usize) -> smallworld_core::Result<Vec<Neighbor>> {
        self.inner.read().k_nearest(query, k)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
