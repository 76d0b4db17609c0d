use thiserror::Error;

/// Errors surfaced by the vector math helpers.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum VectorError {
    /// The input has zero L2 norm (or is empty) and has no direction to keep.
    #[error("degenerate vector: cannot normalize a zero-length vector")]
    DegenerateVector,
    /// A component is NaN or infinite.
    #[error("vector component {index} is not finite: {value}")]
    NonFinite { index: usize, value: f64 },
    /// Two vectors that must be compared have different lengths.
    #[error("vector length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    /// The distance-to-score curve cannot be built from the configured values.
    #[error("invalid similarity calibration: {0}")]
    InvalidCalibration(String),
}
