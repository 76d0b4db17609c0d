use cache::CacheError;
use index::EmbeddingId;
use thiserror::Error;
use vector::VectorError;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum VerifyError {
    /// The reference embedding does not exist in the tenant.
    #[error("reference embedding {id} not found for tenant {tenant}")]
    NotFound { tenant: String, id: EmbeddingId },
    /// The tenant index could not be obtained.
    #[error(transparent)]
    Cache(#[from] CacheError),
    /// The probe cannot be normalized (zero or non-finite).
    #[error("invalid probe vector: {0}")]
    InvalidProbe(#[from] VectorError),
    #[error("probe has dimension {actual}, tenant embeddings have {expected}")]
    ProbeDimension { expected: usize, actual: usize },
    #[error("probe computed by calculator {probe}, reference {id} by {reference}")]
    CalculatorMismatch {
        id: EmbeddingId,
        probe: String,
        reference: String,
    },
    #[error("at least one probe vector is required")]
    NoProbes,
}

impl VerifyError {
    /// True for the reference-not-found outcome, which callers usually map to
    /// a client error rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, VerifyError::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions_keep_the_cause() {
        let err: VerifyError = VectorError::DegenerateVector.into();
        assert_eq!(err, VerifyError::InvalidProbe(VectorError::DegenerateVector));

        let err: VerifyError = CacheError::LoadAborted {
            tenant: "t1".into(),
            reason: "cancelled".into(),
        }
        .into();
        assert!(err.to_string().contains("t1"));
        assert!(!err.is_not_found());
    }
}
