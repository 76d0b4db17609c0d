//! # Face vector math
//!
//! Numeric helpers shared by the embedding index and the verification
//! predictor. Everything works on `f64` slices of a fixed dimension:
//!
//! - [`normalize`] / [`normalize_in_place`] rescale to unit L2 length and
//!   reject zero vectors instead of producing NaNs.
//! - [`euclidean_distance`] and [`dot`] over equal-length vectors.
//! - [`SimilarityConfig`] turns a distance into a calibrated score in
//!   `[0, 1]`, with coefficients chosen per extraction-model version.
//! - [`round_score`] rounds to five decimals for presentation only.
//!
//! ```
//! use vector::{normalize, round_score, SimilarityConfig};
//!
//! let cfg = SimilarityConfig::default();
//! let stored = normalize(&[1.0, 0.0, 0.0]).unwrap();
//! let probe = normalize(&[2.0, 0.0, 0.0]).unwrap();
//! assert_eq!(round_score(cfg.similarity(&probe, &stored)), 1.0);
//! ```

pub mod error;
pub mod normalize;
pub mod similarity;

pub use crate::error::VectorError;
pub use crate::normalize::{ensure_finite, l2_norm, l2_norm_squared, normalize, normalize_in_place};
pub use crate::similarity::{
    dot, euclidean_distance, round_score, similarity, Coefficients, SimilarityConfig,
    SCORE_DECIMALS, UNIT_SPHERE_DIAMETER,
};
