//! Cache statistics and the UP/DOWN health report built from them.

use std::collections::BTreeSet;
use std::sync::atomic::Ordering;

use serde::{Deserialize, Serialize};

use crate::provider::{EmbeddingCacheProvider, SlotState};

/// Which tenants must be warm and how strictly to judge them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Tenants expected to be cached.
    #[serde(default)]
    pub required_tenants: Vec<String>,
    /// Report DOWN when a required tenant is missing or not loaded.
    #[serde(default)]
    pub strict: bool,
    /// Also require the tenant to be fully loaded, not just known.
    #[serde(default)]
    pub warmup_check: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    Up,
    Down,
}

/// Point-in-time counters for the whole cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub tracked_tenants: usize,
    pub loaded_tenants: usize,
    pub loading_tenants: usize,
    pub cached_embeddings: usize,
    pub hits: u64,
    pub misses: u64,
    pub loads: u64,
    pub load_failures: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheHealth {
    pub status: HealthStatus,
    pub required: Vec<String>,
    /// Required tenants the cache has never seen.
    pub missing: Vec<String>,
    /// Required tenants known to the cache but not loaded right now.
    pub not_loaded: Vec<String>,
    pub strict: bool,
    pub warmup_check: bool,
    pub stats: CacheStats,
}

impl CacheHealth {
    pub fn is_up(&self) -> bool {
        self.status == HealthStatus::Up
    }
}

impl EmbeddingCacheProvider {
    pub fn stats(&self) -> CacheStats {
        let counters = self.counters();
        let mut stats = CacheStats {
            hits: counters.hits.load(Ordering::Relaxed),
            misses: counters.misses.load(Ordering::Relaxed),
            loads: counters.loads.load(Ordering::Relaxed),
            load_failures: counters.load_failures.load(Ordering::Relaxed),
            ..CacheStats::default()
        };
        self.for_each_slot(|_, state, embeddings| {
            stats.tracked_tenants += 1;
            match state {
                SlotState::Loaded => stats.loaded_tenants += 1,
                SlotState::Loading => stats.loading_tenants += 1,
                SlotState::Absent => {}
            }
            stats.cached_embeddings += embeddings;
        });
        stats
    }

    /// Health report against `config`. Only strict mode can report DOWN.
    pub fn health(&self, config: &HealthConfig) -> CacheHealth {
        let mut known = BTreeSet::new();
        let mut loaded = BTreeSet::new();
        self.for_each_slot(|tenant, state, _| {
            known.insert(tenant.to_string());
            if state == SlotState::Loaded {
                loaded.insert(tenant.to_string());
            }
        });

        let mut missing = Vec::new();
        let mut not_loaded = Vec::new();
        for tenant in &config.required_tenants {
            if !known.contains(tenant) {
                missing.push(tenant.clone());
            } else if config.warmup_check && !loaded.contains(tenant) {
                not_loaded.push(tenant.clone());
            }
        }

        let degraded = !missing.is_empty() || !not_loaded.is_empty();
        let status = if config.strict && degraded {
            HealthStatus::Down
        } else {
            HealthStatus::Up
        };

        CacheHealth {
            status,
            required: config.required_tenants.clone(),
            missing,
            not_loaded,
            strict: config.strict,
            warmup_check: config.warmup_check,
            stats: self.stats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::store::{EmbeddingStore, InMemoryEmbeddingStore};
    use index::{EmbeddingId, EmbeddingVector};
    use std::sync::Arc;

    fn provider() -> (Arc<InMemoryEmbeddingStore>, EmbeddingCacheProvider) {
        let store = Arc::new(InMemoryEmbeddingStore::new());
        store.put(
            "t1",
            EmbeddingVector::new(EmbeddingId::new_v4(), "alice", vec![1.0, 0.0], "v1"),
        );
        let dyn_store: Arc<dyn EmbeddingStore> = store.clone();
        (store, EmbeddingCacheProvider::new(dyn_store, CacheConfig::new(2)))
    }

    #[tokio::test]
    async fn stats_count_tenants_and_embeddings() {
        let (_store, provider) = provider();
        provider.get_or_load("t1").await.unwrap();
        provider.get_or_load("t1").await.unwrap();
        provider.get_or_load("t2").await.unwrap();
        provider.invalidate("t2");

        let stats = provider.stats();
        assert_eq!(stats.tracked_tenants, 2);
        assert_eq!(stats.loaded_tenants, 1);
        assert_eq!(stats.loading_tenants, 0);
        assert_eq!(stats.cached_embeddings, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.loads, 2);
    }

    #[tokio::test]
    async fn lenient_health_stays_up() {
        let (_store, provider) = provider();
        let config = HealthConfig {
            required_tenants: vec!["t1".into()],
            strict: false,
            warmup_check: true,
        };
        let health = provider.health(&config);
        assert!(health.is_up());
        assert_eq!(health.missing, vec!["t1".to_string()]);
    }

    #[tokio::test]
    async fn strict_health_goes_down_until_warm() {
        let (_store, provider) = provider();
        let config = HealthConfig {
            required_tenants: vec!["t1".into()],
            strict: true,
            warmup_check: true,
        };
        assert_eq!(provider.health(&config).status, HealthStatus::Down);

        provider.get_or_load("t1").await.unwrap();
        assert!(provider.health(&config).is_up());

        provider.invalidate("t1");
        let health = provider.health(&config);
        assert_eq!(health.status, HealthStatus::Down);
        assert_eq!(health.not_loaded, vec!["t1".to_string()]);
        assert!(health.missing.is_empty());
    }

    #[test]
    fn health_serializes_uppercase_status() {
        let (_store, provider) = provider();
        let json = serde_json::to_value(provider.health(&HealthConfig::default())).unwrap();
        assert_eq!(json["status"], "UP");
        assert_eq!(json["stats"]["tracked_tenants"], 0);
    }
}
