//! Workspace umbrella crate for the per-tenant face embedding cache.
//!
//! This crate stitches the vector math, tenant index, cache provider and
//! verification predictor together behind one configuration and an
//! [`Engine`] facade.
//!
//! ```no_run
//! use std::sync::Arc;
//! use facecache::{Engine, FaceCacheConfig, InMemoryEmbeddingStore};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = FaceCacheConfig::from_file("facecache.yaml")?;
//! facecache::init_tracing(&config.logging);
//!
//! let engine = Engine::new(&config, Arc::new(InMemoryEmbeddingStore::new()));
//! engine.warm_up().await?;
//! println!("{:?}", engine.health().status);
//! # Ok(())
//! # }
//! ```

pub mod config;
mod engine;
#[cfg(feature = "subscriber")]
mod logging;

pub use crate::config::{
    CacheYamlConfig, ConfigLoadError, FaceCacheConfig, LoggingConfig, SimilarityYamlConfig,
    VectorYamlConfig,
};
pub use crate::engine::Engine;
#[cfg(feature = "subscriber")]
pub use crate::logging::init_tracing;

pub use cache::{
    CacheConfig, CacheError, CacheHealth, CacheMutation, CacheStats, EmbeddingCacheProvider,
    EmbeddingStore, HealthConfig, HealthStatus, InMemoryEmbeddingStore, MutationOutcome,
    SlotState, StoreError, TenantIndexHandle,
};
pub use index::{EmbeddingId, EmbeddingVector, IndexError, TenantEmbeddingIndex};
pub use vector::{
    Coefficients, SimilarityConfig, VectorError, euclidean_distance, normalize,
    normalize_in_place, round_score, similarity,
};
pub use verify::{Predictor, Verification, VerifyError};
