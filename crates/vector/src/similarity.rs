//! Distance and calibrated similarity between unit-length face embeddings.
//!
//! Extraction models calibrate differently, so the distance-to-score curve is
//! driven by [`Coefficients`] looked up per calculator version in a
//! [`SimilarityConfig`]. The raw curve is a shifted hyperbolic tangent
//!
//! ```text
//! g(d) = (tanh((offset - d) * scale) + 1) / 2
//! ```
//!
//! rescaled so that `g(0)` maps to exactly `1.0` and `g(max_distance)` maps to
//! exactly `0.0`. Scores are clamped to `[0, 1]` and kept at full precision;
//! [`round_score`] is only for presentation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::VectorError;
use crate::normalize::ensure_finite;

/// Number of decimal places kept by [`round_score`].
pub const SCORE_DECIMALS: i32 = 5;

/// Largest Euclidean distance between two unit vectors.
pub const UNIT_SPHERE_DIAMETER: f64 = 2.0;

/// Dot product of two equal-length vectors.
///
/// # Panics
/// Panics when the lengths differ; callers check dimensions up front.
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    assert_eq!(a.len(), b.len(), "dot product over vectors of different length");
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Euclidean distance between two equal-length vectors.
///
/// # Panics
/// Panics when the lengths differ; callers check dimensions up front.
pub fn euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
    assert_eq!(a.len(), b.len(), "distance over vectors of different length");
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

/// Rounds half-up to [`SCORE_DECIMALS`] places. Scores are non-negative so
/// `f64::round` (half away from zero) matches half-up.
pub fn round_score(score: f64) -> f64 {
    let factor = 10f64.powi(SCORE_DECIMALS);
    (score * factor).round() / factor
}

/// Calibration of the tanh curve for one extraction model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coefficients {
    /// Distance at which the raw curve crosses one half.
    pub offset: f64,
    /// Steepness of the raw curve around `offset`.
    pub scale: f64,
}

impl Default for Coefficients {
    fn default() -> Self {
        Self {
            offset: 1.1817961,
            scale: 5.291995557,
        }
    }
}

impl Coefficients {
    pub fn new(offset: f64, scale: f64) -> Self {
        Self { offset, scale }
    }

    fn raw(&self, distance: f64) -> f64 {
        (((self.offset - distance) * self.scale).tanh() + 1.0) / 2.0
    }

    fn validate(&self) -> Result<(), VectorError> {
        ensure_finite(&[self.offset, self.scale])
    }
}

/// Distance-to-similarity configuration shared by every tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityConfig {
    /// Coefficients used when a calculator version has no override.
    pub default_coefficients: Coefficients,
    /// Per calculator-version overrides.
    #[serde(default)]
    pub calculators: HashMap<String, Coefficients>,
    /// Distance that maps to a score of zero.
    pub max_distance: f64,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            default_coefficients: Coefficients::default(),
            calculators: HashMap::new(),
            max_distance: UNIT_SPHERE_DIAMETER,
        }
    }
}

impl SimilarityConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_coefficients(mut self, coefficients: Coefficients) -> Self {
        self.default_coefficients = coefficients;
        self
    }

    pub fn with_calculator(mut self, version: impl Into<String>, coefficients: Coefficients) -> Self {
        self.calculators.insert(version.into(), coefficients);
        self
    }

    pub fn with_max_distance(mut self, max_distance: f64) -> Self {
        self.max_distance = max_distance;
        self
    }

    /// Coefficients for `calculator`, falling back to the defaults.
    pub fn coefficients_for(&self, calculator: Option<&str>) -> Coefficients {
        calculator
            .and_then(|version| self.calculators.get(version))
            .copied()
            .unwrap_or(self.default_coefficients)
    }

    /// Checks that every coefficient is finite and the curve is usable.
    pub fn validate(&self) -> Result<(), VectorError> {
        ensure_finite(&[self.max_distance])?;
        if self.max_distance <= 0.0 {
            return Err(VectorError::InvalidCalibration(format!(
                "max_distance must be > 0, got {}",
                self.max_distance
            )));
        }
        self.default_coefficients.validate()?;
        for coefficients in self.calculators.values() {
            coefficients.validate()?;
        }
        Ok(())
    }

    /// Maps a distance onto `[0, 1]` with the given calibration. A NaN or
    /// infinite distance scores `0.0`.
    pub fn score_distance(&self, distance: f64, coefficients: Coefficients) -> f64 {
        if !distance.is_finite() {
            return 0.0;
        }
        if distance <= 0.0 {
            return 1.0;
        }
        if distance >= self.max_distance {
            return 0.0;
        }
        let top = coefficients.raw(0.0);
        let bottom = coefficients.raw(self.max_distance);
        let span = top - bottom;
        if span <= 0.0 || !span.is_finite() {
            // Flat or inverted calibration: fall back to a linear ramp.
            return (1.0 - distance / self.max_distance).clamp(0.0, 1.0);
        }
        ((coefficients.raw(distance) - bottom) / span).clamp(0.0, 1.0)
    }

    /// Similarity of two pre-normalized, equal-length vectors using the
    /// default calibration.
    pub fn similarity(&self, a: &[f64], b: &[f64]) -> f64 {
        self.similarity_for(None, a, b)
    }

    /// Similarity using the calibration registered for `calculator`.
    pub fn similarity_for(&self, calculator: Option<&str>, a: &[f64], b: &[f64]) -> f64 {
        let coefficients = self.coefficients_for(calculator);
        self.score_distance(euclidean_distance(a, b), coefficients)
    }

    /// Like [`similarity_for`](Self::similarity_for) but reports a length
    /// mismatch instead of panicking.
    pub fn try_similarity_for(
        &self,
        calculator: Option<&str>,
        a: &[f64],
        b: &[f64],
    ) -> Result<f64, VectorError> {
        if a.len() != b.len() {
            return Err(VectorError::LengthMismatch {
                expected: b.len(),
                actual: a.len(),
            });
        }
        Ok(self.similarity_for(calculator, a, b))
    }
}

/// Similarity of two pre-normalized vectors under the default configuration.
pub fn similarity(a: &[f64], b: &[f64]) -> f64 {
    SimilarityConfig::default().similarity(a, b)
}
