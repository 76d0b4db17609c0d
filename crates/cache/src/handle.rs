use std::sync::{Arc, RwLock, RwLockReadGuard};

use index::{EmbeddingId, EmbeddingVector, TenantEmbeddingIndex};

/// Shared read-only view of one tenant's cached index.
///
/// Handed out by [`get_or_load`](crate::EmbeddingCacheProvider::get_or_load).
/// Readers take a short read lock per call; every accessor returns owned data
/// so nothing borrowed outlives the lock. Mutation is only reachable through
/// the provider.
#[derive(Debug, Clone)]
pub struct TenantIndexHandle {
    inner: Arc<RwLock<TenantEmbeddingIndex>>,
}

impl TenantIndexHandle {
    pub(crate) fn new(index: TenantEmbeddingIndex) -> Self {
        Self {
            inner: Arc::new(RwLock::new(index)),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, TenantEmbeddingIndex> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn write<R>(&self, mutation: impl FnOnce(&mut TenantEmbeddingIndex) -> R) -> R {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        mutation(&mut *guard)
    }

    /// Runs `f` against the index under one read lock.
    pub fn with_index<R>(&self, f: impl FnOnce(&TenantEmbeddingIndex) -> R) -> R {
        let guard = self.read();
        f(&*guard)
    }

    pub fn get(&self, id: &EmbeddingId) -> Option<EmbeddingVector> {
        self.read().get(id).cloned()
    }

    pub fn contains(&self, id: &EmbeddingId) -> bool {
        self.read().contains(id)
    }

    pub fn subject_name_of(&self, id: &EmbeddingId) -> Option<String> {
        self.read().subject_name_of(id).map(str::to_string)
    }

    pub fn subject_names(&self) -> Vec<String> {
        self.read().subject_names()
    }

    /// Copy of every embedding at the time of the call.
    pub fn all(&self) -> Vec<EmbeddingVector> {
        self.read().all()
    }

    /// Full detached copy of the index.
    pub fn snapshot(&self) -> TenantEmbeddingIndex {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.read().dimension()
    }

    /// True when both handles point at the same cached index.
    pub fn ptr_eq(&self, other: &TenantIndexHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
