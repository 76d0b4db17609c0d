use index::{EmbeddingId, EmbeddingVector, TenantEmbeddingIndex};
use tracing::debug;

use crate::provider::EmbeddingCacheProvider;

/// Incremental change mirrored from a successful store write.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheMutation {
    /// A new embedding was stored. Panics on apply if its dimension does not
    /// match the cached index.
    Insert(EmbeddingVector),
    RemoveById(EmbeddingId),
    /// Every embedding of one subject was deleted.
    RemoveBySubject(String),
    RenameSubject { from: String, to: String },
}

/// What a [`CacheMutation`] changed in the cached index.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome {
    /// Holds the embedding the insert replaced, if the id was already cached.
    Inserted { replaced: Option<EmbeddingVector> },
    Removed(Option<EmbeddingVector>),
    /// Number of embeddings removed or renamed.
    Affected(usize),
}

impl CacheMutation {
    pub fn kind(&self) -> &'static str {
        match self {
            CacheMutation::Insert(_) => "insert",
            CacheMutation::RemoveById(_) => "remove_by_id",
            CacheMutation::RemoveBySubject(_) => "remove_by_subject",
            CacheMutation::RenameSubject { .. } => "rename_subject",
        }
    }

    pub fn apply_to(self, index: &mut TenantEmbeddingIndex) -> MutationOutcome {
        match self {
            CacheMutation::Insert(embedding) => MutationOutcome::Inserted {
                replaced: index.insert(embedding),
            },
            CacheMutation::RemoveById(id) => MutationOutcome::Removed(index.remove_by_id(&id)),
            CacheMutation::RemoveBySubject(subject) => {
                MutationOutcome::Affected(index.remove_by_subject_name(&subject))
            }
            CacheMutation::RenameSubject { from, to } => {
                MutationOutcome::Affected(index.rename_subject(&from, &to))
            }
        }
    }
}

impl EmbeddingCacheProvider {
    /// Applies a named mutation if the tenant is loaded; see
    /// [`if_present`](Self::if_present).
    pub fn apply(&self, tenant: &str, mutation: CacheMutation) -> Option<MutationOutcome> {
        let kind = mutation.kind();
        let outcome = self.if_present(tenant, move |index| mutation.apply_to(index));
        debug!(tenant, kind, applied = outcome.is_some(), "cache mutation");
        outcome
    }
}
