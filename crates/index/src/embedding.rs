use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vector::{normalize, VectorError};

/// Opaque identifier of a stored face embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmbeddingId(Uuid);

impl EmbeddingId {
    /// Fresh random id.
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for EmbeddingId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl FromStr for EmbeddingId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for EmbeddingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One stored face embedding.
///
/// The vector is expected to be unit length already (see [`EmbeddingVector::from_raw`]
/// for the normalizing constructor) and is shared behind an `Arc` so snapshots
/// of a tenant index stay cheap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingVector {
    id: EmbeddingId,
    subject_name: String,
    vector: Arc<[f64]>,
    calculator_version: String,
    /// Raw source bytes kept for audit only; never used in similarity math.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<Bytes>,
}

impl EmbeddingVector {
    /// Wraps an already normalized vector.
    pub fn new(
        id: EmbeddingId,
        subject_name: impl Into<String>,
        vector: impl Into<Arc<[f64]>>,
        calculator_version: impl Into<String>,
    ) -> Self {
        Self {
            id,
            subject_name: subject_name.into(),
            vector: vector.into(),
            calculator_version: calculator_version.into(),
            source: None,
        }
    }

    /// Normalizes a raw extractor output before wrapping it.
    pub fn from_raw(
        id: EmbeddingId,
        subject_name: impl Into<String>,
        raw: &[f64],
        calculator_version: impl Into<String>,
    ) -> Result<Self, VectorError> {
        let normalized = normalize(raw)?;
        Ok(Self::new(id, subject_name, normalized, calculator_version))
    }

    /// Attaches the image bytes the embedding was computed from.
    pub fn with_source(mut self, source: impl Into<Bytes>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn id(&self) -> EmbeddingId {
        self.id
    }

    pub fn subject_name(&self) -> &str {
        &self.subject_name
    }

    pub fn vector(&self) -> &[f64] {
        &self.vector
    }

    pub fn dimension(&self) -> usize {
        self.vector.len()
    }

    pub fn calculator_version(&self) -> &str {
        &self.calculator_version
    }

    pub fn source(&self) -> Option<&Bytes> {
        self.source.as_ref()
    }

    pub(crate) fn rename(&mut self, subject_name: &str) {
        self.subject_name = subject_name.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_id_parses_and_displays() {
        let raw = "67e55044-10b1-426f-9247-bb680e5fe0c8";
        let id: EmbeddingId = raw.parse().unwrap();
        assert_eq!(id.to_string(), raw);
        assert!("not-a-uuid".parse::<EmbeddingId>().is_err());
    }

    #[test]
    fn from_raw_normalizes() {
        let e = EmbeddingVector::from_raw(EmbeddingId::new_v4(), "alice", &[3.0, 4.0], "v1")
            .unwrap();
        assert!((e.vector()[0] - 0.6).abs() < 1e-12);
        assert!((e.vector()[1] - 0.8).abs() < 1e-12);
        assert_eq!(e.dimension(), 2);
    }

    #[test]
    fn from_raw_rejects_zero_vector() {
        let err = EmbeddingVector::from_raw(EmbeddingId::new_v4(), "alice", &[0.0, 0.0], "v1")
            .unwrap_err();
        assert_eq!(err, VectorError::DegenerateVector);
    }

    #[test]
    fn source_bytes_are_optional() {
        let e = EmbeddingVector::new(EmbeddingId::new_v4(), "bob", vec![1.0], "v1");
        assert!(e.source().is_none());
        let e = e.with_source(vec![0xFF, 0xD8]);
        assert_eq!(e.source().map(|b| b.len()), Some(2));
    }

    #[test]
    fn serde_roundtrip_keeps_fields() {
        let e = EmbeddingVector::new(EmbeddingId::new_v4(), "carol", vec![0.0, 1.0], "facenet");
        let json = serde_json::to_string(&e).unwrap();
        let back: EmbeddingVector = serde_json::from_str(&json).unwrap();
        assert_eq!(e, back);
    }
}
