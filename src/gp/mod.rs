//! Gaussian-process regression for light curves.
//!
//! - `kernel`: covariance terms (SHO, real exponential, white noise)
//! - `process`: the `GaussianProcess` trait and its dense implementation
//! - `regression`: `GpLightCurve`, the fit / predict / sample front-end

pub mod kernel;
pub mod process;
pub mod regression;

pub use kernel::*;
pub use process::*;
pub use regression::*;
