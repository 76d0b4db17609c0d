//! 1:1 face verification.
//!
//! The [`Predictor`] looks up one reference embedding in a tenant's cached
//! index and scores a probe vector against it. It does not search the tenant
//! for the nearest match.

mod error;
mod predictor;

pub use error::VerifyError;
pub use predictor::{Predictor, Verification};
