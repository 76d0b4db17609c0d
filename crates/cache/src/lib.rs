//! Per-tenant face embedding cache.
//!
//! [`EmbeddingCacheProvider`] maps a tenant key to that tenant's
//! [`TenantEmbeddingIndex`](index::TenantEmbeddingIndex). Tenants are loaded
//! lazily from an [`EmbeddingStore`], with concurrent requests for a cold
//! tenant collapsing into one store fetch. Write paths mirror store changes
//! into tenants that are already cached and never load cold ones.
//!
//! ```no_run
//! use std::sync::Arc;
//! use cache::{CacheConfig, CacheMutation, EmbeddingCacheProvider, InMemoryEmbeddingStore};
//!
//! # async fn demo() -> Result<(), cache::CacheError> {
//! let store = Arc::new(InMemoryEmbeddingStore::new());
//! let provider = EmbeddingCacheProvider::new(store, CacheConfig::new(512));
//!
//! let index = provider.get_or_load("tenant-a").await?;
//! println!("{} embeddings cached", index.len());
//!
//! provider.apply("tenant-a", CacheMutation::RemoveBySubject("alice".into()));
//! provider.invalidate("tenant-a");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod handle;
pub mod health;
pub mod mutation;
pub mod provider;
pub mod store;

pub use config::CacheConfig;
pub use error::{CacheError, StoreError};
pub use handle::TenantIndexHandle;
pub use health::{CacheHealth, CacheStats, HealthConfig, HealthStatus};
pub use mutation::{CacheMutation, MutationOutcome};
pub use provider::{EmbeddingCacheProvider, SlotState};
pub use store::{EmbeddingStore, InMemoryEmbeddingStore};
