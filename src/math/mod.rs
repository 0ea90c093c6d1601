//! Numerical utilities: covariance factorization and bounded minimization.

pub mod cholesky;
pub mod optimize;

pub use cholesky::*;
pub use optimize::*;
