use std::sync::Arc;

use cache::{
    CacheError, CacheHealth, CacheMutation, CacheStats, EmbeddingCacheProvider, EmbeddingStore,
    HealthConfig, MutationOutcome, TenantIndexHandle,
};
use index::{EmbeddingId, EmbeddingVector};
use tracing::{debug, info};
use verify::{Predictor, Verification, VerifyError};

use crate::config::FaceCacheConfig;

/// The cache and the predictor wired together from one configuration.
///
/// The `on_*` hooks are meant to be called by the subject/embedding service
/// after its store write succeeded. They keep already-cached tenants in sync
/// and never load a cold tenant.
#[derive(Debug, Clone)]
pub struct Engine {
    cache: Arc<EmbeddingCacheProvider>,
    predictor: Predictor,
    health: HealthConfig,
}

impl Engine {
    pub fn new(config: &FaceCacheConfig, store: Arc<dyn EmbeddingStore>) -> Self {
        let cache = Arc::new(EmbeddingCacheProvider::new(store, config.cache_config()));
        let predictor = Predictor::new(Arc::clone(&cache), config.similarity_config());
        info!(
            dimension = config.vector.dimension,
            load_timeout_ms = config.cache.load_timeout_ms,
            "face cache engine ready"
        );
        Self {
            cache,
            predictor,
            health: config.health_config(),
        }
    }

    pub fn cache(&self) -> &Arc<EmbeddingCacheProvider> {
        &self.cache
    }

    pub fn predictor(&self) -> &Predictor {
        &self.predictor
    }

    pub async fn index(&self, tenant: &str) -> Result<TenantIndexHandle, CacheError> {
        self.cache.get_or_load(tenant).await
    }

    pub async fn verify(
        &self,
        tenant: &str,
        probe: &[f64],
        reference: &EmbeddingId,
    ) -> Result<f64, VerifyError> {
        self.predictor.verify(tenant, probe, reference).await
    }

    pub async fn verify_detailed(
        &self,
        tenant: &str,
        probe: &[f64],
        reference: &EmbeddingId,
    ) -> Result<Verification, VerifyError> {
        self.predictor.verify_detailed(tenant, probe, reference).await
    }

    /// Loads every tenant listed in the health configuration, stopping at the
    /// first failure.
    pub async fn warm_up(&self) -> Result<usize, CacheError> {
        for tenant in &self.health.required_tenants {
            let index = self.cache.get_or_load(tenant).await?;
            debug!(tenant = %tenant, embeddings = index.len(), "warmed tenant");
        }
        Ok(self.health.required_tenants.len())
    }

    pub fn on_embedding_added(&self, tenant: &str, embedding: EmbeddingVector) -> bool {
        self.cache
            .apply(tenant, CacheMutation::Insert(embedding))
            .is_some()
    }

    pub fn on_embedding_removed(&self, tenant: &str, id: EmbeddingId) -> bool {
        matches!(
            self.cache.apply(tenant, CacheMutation::RemoveById(id)),
            Some(MutationOutcome::Removed(Some(_)))
        )
    }

    /// A subject and all its embeddings were deleted.
    pub fn on_subject_deleted(&self, tenant: &str, subject_name: &str) -> usize {
        self.remove_subject(tenant, subject_name)
    }

    /// A subject was kept but its embeddings were deleted.
    pub fn on_subject_embeddings_cleared(&self, tenant: &str, subject_name: &str) -> usize {
        self.remove_subject(tenant, subject_name)
    }

    pub fn on_subject_renamed(&self, tenant: &str, from: &str, to: &str) -> usize {
        let mutation = CacheMutation::RenameSubject {
            from: from.to_string(),
            to: to.to_string(),
        };
        affected(self.cache.apply(tenant, mutation))
    }

    /// Every subject of the tenant was deleted; the next access reloads.
    pub fn on_tenant_cleared(&self, tenant: &str) {
        self.cache.invalidate(tenant);
    }

    /// The tenant itself was deleted; its cache slot is dropped when idle.
    pub fn on_tenant_removed(&self, tenant: &str) -> bool {
        self.cache.evict(tenant)
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn health(&self) -> CacheHealth {
        self.cache.health(&self.health)
    }

    fn remove_subject(&self, tenant: &str, subject_name: &str) -> usize {
        let mutation = CacheMutation::RemoveBySubject(subject_name.to_string());
        affected(self.cache.apply(tenant, mutation))
    }
}

fn affected(outcome: Option<MutationOutcome>) -> usize {
    match outcome {
        Some(MutationOutcome::Affected(count)) => count,
        _ => 0,
    }
}
