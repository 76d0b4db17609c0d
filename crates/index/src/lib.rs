//! # Tenant embedding index
//!
//! In-memory structures mirroring the face embeddings one tenant keeps in the
//! backing store.
//!
//! - [`EmbeddingVector`] is the immutable stored value: id, subject name,
//!   unit-length vector, calculator version and optional audit bytes.
//! - [`TenantEmbeddingIndex`] holds a tenant's embeddings by id and by subject
//!   name and keeps both lookups consistent through every insert, removal and
//!   rename.
//!
//! The index itself is plain data with `&mut self` mutators. Sharing it across
//! threads, loading it from the store and deciding when it is safe to mutate
//! is the job of the cache crate.
//!
//! ```
//! use index::{EmbeddingId, EmbeddingVector, TenantEmbeddingIndex};
//!
//! let mut index = TenantEmbeddingIndex::new(3);
//! let id = EmbeddingId::new_v4();
//! index.insert(EmbeddingVector::new(id, "alice", vec![1.0, 0.0, 0.0], "facenet"));
//!
//! assert_eq!(index.subject_name_of(&id), Some("alice"));
//! assert_eq!(index.rename_subject("alice", "alicia"), 1);
//! assert_eq!(index.remove_by_subject_name("alicia"), 1);
//! assert!(index.is_empty());
//! ```

mod embedding;
mod error;
mod tenant;

pub use crate::embedding::{EmbeddingId, EmbeddingVector};
pub use crate::error::IndexError;
pub use crate::tenant::TenantEmbeddingIndex;
