use crate::error::VectorError;

/// Squared L2 norm, accumulated in `f64`.
pub fn l2_norm_squared(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum()
}

/// L2 norm of `v`.
pub fn l2_norm(v: &[f64]) -> f64 {
    l2_norm_squared(v).sqrt()
}

/// Rejects NaN and infinite components before they can spread through the math.
pub fn ensure_finite(v: &[f64]) -> Result<(), VectorError> {
    match v.iter().position(|x| !x.is_finite()) {
        Some(index) => Err(VectorError::NonFinite {
            index,
            value: v[index],
        }),
        None => Ok(()),
    }
}

/// In-place L2 normalization helper to keep allocations down during hot paths.
///
/// A zero (or empty) vector is left untouched and reported as
/// [`VectorError::DegenerateVector`] instead of being divided into NaNs.
pub fn normalize_in_place(v: &mut [f64]) -> Result<(), VectorError> {
    ensure_finite(v)?;
    let norm_sq = l2_norm_squared(v);
    if norm_sq == 0.0 {
        return Err(VectorError::DegenerateVector);
    }
    let inv_norm = norm_sq.sqrt().recip();
    for x in v.iter_mut() {
        *x *= inv_norm;
    }
    Ok(())
}

/// Returns a unit-length copy of `v`; the caller's vector is left as it was.
pub fn normalize(v: &[f64]) -> Result<Vec<f64>, VectorError> {
    let mut out = v.to_vec();
    normalize_in_place(&mut out)?;
    Ok(out)
}
