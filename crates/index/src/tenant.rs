use hashbrown::{HashMap, HashSet};
use vector::ensure_finite;

use crate::embedding::{EmbeddingId, EmbeddingVector};
use crate::error::IndexError;

/// In-memory mirror of one tenant's stored face embeddings.
///
/// Keeps the embeddings keyed by id plus a subject-name → ids lookup. Every
/// mutating method updates both maps before returning, so a reader never sees
/// one without the other. All vectors share the dimension fixed at
/// construction.
#[derive(Debug, Clone)]
pub struct TenantEmbeddingIndex {
    dimension: usize,
    by_id: HashMap<EmbeddingId, EmbeddingVector>,
    by_subject: HashMap<String, HashSet<EmbeddingId>>,
}

impl TenantEmbeddingIndex {
    /// Empty index accepting vectors of `dimension` components.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            by_id: HashMap::new(),
            by_subject: HashMap::new(),
        }
    }

    /// Builds an index from store rows, stopping at the first row with the
    /// wrong dimension or a NaN/infinite component.
    pub fn from_embeddings<I>(dimension: usize, embeddings: I) -> Result<Self, IndexError>
    where
        I: IntoIterator<Item = EmbeddingVector>,
    {
        let mut index = Self::new(dimension);
        for embedding in embeddings {
            index.try_insert(embedding)?;
        }
        Ok(index)
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Adds `embedding`, replacing any entry with the same id. Returns the
    /// replaced entry.
    ///
    /// # Panics
    /// Panics when the vector dimension differs from the index dimension.
    pub fn insert(&mut self, embedding: EmbeddingVector) -> Option<EmbeddingVector> {
        if let Err(err) = self.check_dimension(&embedding) {
            panic!("tenant index invariant violated: {err}");
        }
        self.link(embedding)
    }

    /// Checked variant of [`insert`](Self::insert) for rows coming from outside
    /// the process. Also rejects NaN or infinite components.
    pub fn try_insert(
        &mut self,
        embedding: EmbeddingVector,
    ) -> Result<Option<EmbeddingVector>, IndexError> {
        self.check_dimension(&embedding)?;
        ensure_finite(embedding.vector()).map_err(|source| IndexError::NonFinite {
            id: embedding.id(),
            source,
        })?;
        Ok(self.link(embedding))
    }

    fn check_dimension(&self, embedding: &EmbeddingVector) -> Result<(), IndexError> {
        if embedding.dimension() == self.dimension {
            return Ok(());
        }
        Err(IndexError::DimensionMismatch {
            id: embedding.id(),
            expected: self.dimension,
            actual: embedding.dimension(),
        })
    }

    fn link(&mut self, embedding: EmbeddingVector) -> Option<EmbeddingVector> {
        let id = embedding.id();
        let subject = embedding.subject_name().to_string();
        let previous = self.by_id.insert(id, embedding);
        if let Some(old) = &previous {
            self.unlink_subject(old.subject_name(), &id);
        }
        self.by_subject.entry(subject).or_default().insert(id);
        previous
    }

    /// Removes one embedding. Absent ids are a no-op.
    pub fn remove_by_id(&mut self, id: &EmbeddingId) -> Option<EmbeddingVector> {
        let removed = self.by_id.remove(id)?;
        self.unlink_subject(removed.subject_name(), id);
        Some(removed)
    }

    /// Removes every embedding of `subject_name` and returns how many went.
    pub fn remove_by_subject_name(&mut self, subject_name: &str) -> usize {
        let Some(ids) = self.by_subject.remove(subject_name) else {
            return 0;
        };
        for id in &ids {
            self.by_id.remove(id);
        }
        ids.len()
    }

    /// Moves every embedding of `old_name` under `new_name`, updating the
    /// embeddings' own subject field too. Returns the number of embeddings
    /// moved; an unknown `old_name` is a no-op.
    pub fn rename_subject(&mut self, old_name: &str, new_name: &str) -> usize {
        if old_name == new_name {
            return self.by_subject.get(old_name).map_or(0, HashSet::len);
        }
        let Some(ids) = self.by_subject.remove(old_name) else {
            return 0;
        };
        for id in &ids {
            if let Some(embedding) = self.by_id.get_mut(id) {
                embedding.rename(new_name);
            }
        }
        let moved = ids.len();
        self.by_subject
            .entry(new_name.to_string())
            .or_default()
            .extend(ids);
        moved
    }

    /// Drops everything while keeping the dimension.
    pub fn clear(&mut self) {
        self.by_id.clear();
        self.by_subject.clear();
    }

    pub fn get(&self, id: &EmbeddingId) -> Option<&EmbeddingVector> {
        self.by_id.get(id)
    }

    pub fn contains(&self, id: &EmbeddingId) -> bool {
        self.by_id.contains_key(id)
    }

    /// Whose face is this embedding.
    pub fn subject_name_of(&self, id: &EmbeddingId) -> Option<&str> {
        self.by_id.get(id).map(EmbeddingVector::subject_name)
    }

    /// Embeddings currently filed under `subject_name`.
    pub fn embeddings_of(&self, subject_name: &str) -> Vec<&EmbeddingVector> {
        self.by_subject
            .get(subject_name)
            .map(|ids| ids.iter().filter_map(|id| self.by_id.get(id)).collect())
            .unwrap_or_default()
    }

    /// Subject names that own at least one embedding, sorted.
    pub fn subject_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.by_subject.keys().cloned().collect();
        names.sort();
        names
    }

    /// Borrowing iterator over every embedding.
    pub fn iter(&self) -> impl Iterator<Item = &EmbeddingVector> {
        self.by_id.values()
    }

    /// Owned copy of every embedding; later mutations do not show up in it.
    pub fn all(&self) -> Vec<EmbeddingVector> {
        self.by_id.values().cloned().collect()
    }

    fn unlink_subject(&mut self, subject_name: &str, id: &EmbeddingId) {
        if let Some(ids) = self.by_subject.get_mut(subject_name) {
            ids.remove(id);
            if ids.is_empty() {
                self.by_subject.remove(subject_name);
            }
        }
    }
}
