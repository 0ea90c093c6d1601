//! Error types.
//!
//! Library code returns typed errors (`GridError`, `GpError`) so callers can
//! match on the failure. The binary collapses everything into `AppError`,
//! which carries the process exit code:
//!
//! - `2`: bad input or configuration (unknown parameter, unreadable file)
//! - `3`: no usable data (empty selection, degenerate light curve)
//! - `4`: numerical failure (factorization, optimizer)

use thiserror::Error;

/// Failures of the spectral grid reader.
#[derive(Debug, Error)]
pub enum GridError {
    #[error("unknown parameter '{name}' (grid declares: {declared})")]
    InvalidParameter { name: String, declared: String },

    #[error("parameter '{name}' was given a non-finite value")]
    NonFiniteValue { name: String },

    #[error("parameter '{name}' has no tabulated values")]
    EmptyGrid { name: String },

    #[error("energy {value} lies outside every energy bin")]
    OutOfRange { value: f64 },

    #[error("row {row} is outside the table ({rows} rows)")]
    RowOutOfRange { row: usize, rows: usize },

    #[error("corrupt grid: {0}")]
    Corrupt(String),

    #[error("failed to read grid '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported grid format: {0}")]
    Format(String),

    #[error("grid backend error in '{path}': {message}")]
    Backend { path: String, message: String },
}

/// Failures of the Gaussian-process regression helper.
#[derive(Debug, Error)]
pub enum GpError {
    #[error("degenerate light curve: {0}")]
    Degenerate(String),

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("covariance matrix is not positive definite")]
    NotPositiveDefinite,

    #[error("optimizer failed: {0}")]
    Optimizer(String),
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

impl From<GridError> for AppError {
    fn from(err: GridError) -> Self {
        let code = match &err {
            GridError::EmptyGrid { .. } => 3,
            _ => 2,
        };
        AppError::new(code, err.to_string())
    }
}

impl From<GpError> for AppError {
    fn from(err: GpError) -> Self {
        let code = match &err {
            GpError::InvalidOption(_) => 2,
            GpError::Degenerate(_) => 3,
            GpError::NotPositiveDefinite | GpError::Optimizer(_) => 4,
        };
        AppError::new(code, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_errors_map_to_input_exit_code() {
        let err: AppError = GridError::OutOfRange { value: 3.0 }.into();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("3"));
    }

    #[test]
    fn numerical_gp_errors_map_to_exit_code_4() {
        let err: AppError = GpError::NotPositiveDefinite.into();
        assert_eq!(err.exit_code(), 4);
        let err: AppError = GpError::Degenerate("flat".into()).into();
        assert_eq!(err.exit_code(), 3);
    }
}
