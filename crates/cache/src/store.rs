use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use index::{EmbeddingId, EmbeddingVector};

use crate::error::StoreError;

/// Read side of the persistent subject/embedding store.
///
/// The cache only ever asks for a whole tenant at once; writes go to the store
/// through the surrounding service and reach the cache as mutations.
#[async_trait]
pub trait EmbeddingStore: Send + Sync {
    /// Every embedding currently stored for `tenant`.
    async fn list_embeddings(&self, tenant: &str) -> Result<Vec<EmbeddingVector>, StoreError>;
}

/// An in-memory store guarded by a `RwLock`. Useful for tests and demos.
///
/// Counts `list_embeddings` calls per tenant and can be told to fail or to
/// respond slowly, which is what the cache tests lean on.
#[derive(Default)]
pub struct InMemoryEmbeddingStore {
    tenants: RwLock<HashMap<String, HashMap<EmbeddingId, EmbeddingVector>>>,
    calls: Mutex<HashMap<String, usize>>,
    total_calls: AtomicUsize,
    failing: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

impl InMemoryEmbeddingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace one embedding.
    pub fn put(&self, tenant: &str, embedding: EmbeddingVector) {
        self.write_tenants()
            .entry(tenant.to_string())
            .or_default()
            .insert(embedding.id(), embedding);
    }

    pub fn remove(&self, tenant: &str, id: &EmbeddingId) -> Option<EmbeddingVector> {
        self.write_tenants().get_mut(tenant)?.remove(id)
    }

    /// Removes every embedding of `subject_name`, returning how many went.
    pub fn remove_subject(&self, tenant: &str, subject_name: &str) -> usize {
        let mut tenants = self.write_tenants();
        let Some(rows) = tenants.get_mut(tenant) else {
            return 0;
        };
        let before = rows.len();
        rows.retain(|_, e| e.subject_name() != subject_name);
        before - rows.len()
    }

    /// Re-files every embedding of `old_name` under `new_name`.
    pub fn rename_subject(&self, tenant: &str, old_name: &str, new_name: &str) -> usize {
        let mut tenants = self.write_tenants();
        let Some(rows) = tenants.get_mut(tenant) else {
            return 0;
        };
        let mut renamed = 0;
        for row in rows.values_mut() {
            if row.subject_name() == old_name {
                *row = EmbeddingVector::new(
                    row.id(),
                    new_name,
                    row.vector().to_vec(),
                    row.calculator_version(),
                );
                renamed += 1;
            }
        }
        renamed
    }

    /// Drops a whole tenant, returning how many embeddings it had.
    pub fn clear_tenant(&self, tenant: &str) -> usize {
        self.write_tenants()
            .remove(tenant)
            .map_or(0, |rows| rows.len())
    }

    pub fn len(&self, tenant: &str) -> usize {
        self.read_tenants().get(tenant).map_or(0, HashMap::len)
    }

    /// Makes subsequent `list_embeddings` calls fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Delays every `list_embeddings` call, simulating a slow database.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = delay;
    }

    /// How many times `list_embeddings` ran for `tenant`.
    pub fn list_calls(&self, tenant: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(tenant)
            .copied()
            .unwrap_or(0)
    }

    /// How many times `list_embeddings` ran for any tenant.
    pub fn total_list_calls(&self) -> usize {
        self.total_calls.load(Ordering::SeqCst)
    }

    fn read_tenants(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<String, HashMap<EmbeddingId, EmbeddingVector>>>
    {
        self.tenants
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_tenants(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<String, HashMap<EmbeddingId, EmbeddingVector>>>
    {
        self.tenants
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl EmbeddingStore for InMemoryEmbeddingStore {
    async fn list_embeddings(&self, tenant: &str) -> Result<Vec<EmbeddingVector>, StoreError> {
        *self
            .calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(tenant.to_string())
            .or_insert(0) += 1;
        self.total_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!(
                "in-memory store set to fail for tenant {tenant}"
            )));
        }

        Ok(self
            .read_tenants()
            .get(tenant)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(subject: &str) -> EmbeddingVector {
        EmbeddingVector::new(EmbeddingId::new_v4(), subject, vec![1.0, 0.0], "v1")
    }

    #[tokio::test]
    async fn lists_only_the_requested_tenant() {
        let store = InMemoryEmbeddingStore::new();
        store.put("t1", row("alice"));
        store.put("t1", row("bob"));
        store.put("t2", row("carol"));

        assert_eq!(store.list_embeddings("t1").await.unwrap().len(), 2);
        assert_eq!(store.list_embeddings("t2").await.unwrap().len(), 1);
        assert!(store.list_embeddings("t3").await.unwrap().is_empty());
        assert_eq!(store.list_calls("t1"), 1);
        assert_eq!(store.total_list_calls(), 3);
    }

    #[tokio::test]
    async fn failing_store_reports_unavailable() {
        let store = InMemoryEmbeddingStore::new();
        store.set_failing(true);
        let err = store.list_embeddings("t1").await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));

        store.set_failing(false);
        assert!(store.list_embeddings("t1").await.is_ok());
    }

    #[test]
    fn subject_edits() {
        let store = InMemoryEmbeddingStore::new();
        store.put("t1", row("alice"));
        store.put("t1", row("alice"));
        store.put("t1", row("bob"));

        assert_eq!(store.rename_subject("t1", "alice", "alicia"), 2);
        assert_eq!(store.remove_subject("t1", "alicia"), 2);
        assert_eq!(store.len("t1"), 1);
        assert_eq!(store.clear_tenant("t1"), 1);
        assert_eq!(store.len("t1"), 0);
    }
}
