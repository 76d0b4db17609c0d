use std::time::Duration;

use index::IndexError;
use thiserror::Error;

/// Failures reported by an [`EmbeddingStore`](crate::EmbeddingStore).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached at all.
    #[error("backing store unavailable: {0}")]
    Unavailable(String),
    /// The store answered but the query failed.
    #[error("backing store query failed: {0}")]
    Query(String),
}

/// Errors surfaced by the cache provider.
///
/// Cloneable so every waiter of a shared load receives the same failure.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CacheError {
    /// The store fetch failed; the tenant is back to absent and may be retried.
    #[error("failed to load embeddings for tenant {tenant}: {source}")]
    Load { tenant: String, source: StoreError },
    /// A stored row does not fit the configured dimension.
    #[error("stored embedding rejected while loading tenant {tenant}: {source}")]
    InvalidEmbedding { tenant: String, source: IndexError },
    /// This caller stopped waiting; the load itself keeps running.
    #[error("loading tenant {tenant} did not finish within {timeout:?}")]
    LoadTimeout { tenant: String, timeout: Duration },
    /// The load task panicked or was cancelled by the runtime.
    #[error("load task for tenant {tenant} aborted: {reason}")]
    LoadAborted { tenant: String, reason: String },
}

impl CacheError {
    pub fn tenant(&self) -> &str {
        match self {
            CacheError::Load { tenant, .. }
            | CacheError::InvalidEmbedding { tenant, .. }
            | CacheError::LoadTimeout { tenant, .. }
            | CacheError::LoadAborted { tenant, .. } => tenant,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn load_error_keeps_store_source() {
        let err = CacheError::Load {
            tenant: "t1".into(),
            source: StoreError::Unavailable("connection refused".into()),
        };
        assert!(err.to_string().contains("tenant t1"));
        assert!(err.to_string().contains("connection refused"));
        assert!(err.source().is_some());
        assert_eq!(err.tenant(), "t1");
    }

    #[test]
    fn timeout_error_mentions_duration() {
        let err = CacheError::LoadTimeout {
            tenant: "t2".into(),
            timeout: Duration::from_millis(250),
        };
        assert!(err.to_string().contains("250ms"));
    }

    #[test]
    fn errors_clone_equal() {
        let err = CacheError::LoadAborted {
            tenant: "t3".into(),
            reason: "panicked".into(),
        };
        assert_eq!(err.clone(), err);
    }
}
