use thiserror::Error;
use vector::VectorError;

use crate::embedding::EmbeddingId;

/// Errors reported by the checked index paths.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexError {
    #[error("embedding {id} has dimension {actual}, index expects {expected}")]
    DimensionMismatch {
        id: EmbeddingId,
        expected: usize,
        actual: usize,
    },
    #[error("embedding {id} has a non-finite component")]
    NonFinite {
        id: EmbeddingId,
        #[source]
        source: VectorError,
    },
}
