//! Cholesky factorization of covariance matrices.
//!
//! GP covariance matrices are symmetric positive definite in exact
//! arithmetic but can be numerically semi-definite (closely spaced samples,
//! no measurement errors, very long correlation times). We factor `K` and,
//! if that fails, retry with a progressively larger diagonal jitter scaled
//! to the mean diagonal.

use nalgebra::{Cholesky, DMatrix, DVector, Dyn};

/// Relative jitter levels tried after a plain factorization fails.
const JITTER_LEVELS: [f64; 4] = [1e-12, 1e-10, 1e-8, 1e-6];

/// A factored covariance matrix plus the jitter that was needed.
#[derive(Debug, Clone)]
pub struct Factor {
    pub chol: Cholesky<f64, Dyn>,
    pub jitter: f64,
}

impl Factor {
    /// `ln |K|`.
    pub fn log_det(&self) -> f64 {
        2.0 * self.chol.l_dirty().diagonal().iter().map(|d| d.ln()).sum::<f64>()
    }

    /// `K⁻¹ b`.
    pub fn solve(&self, b: &DVector<f64>) -> DVector<f64> {
        self.chol.solve(b)
    }

    /// `K⁻¹ B`.
    pub fn solve_matrix(&self, b: &DMatrix<f64>) -> DMatrix<f64> {
        self.chol.solve(b)
    }

    /// Lower-triangular factor `L` with `K = L Lᵀ`.
    pub fn lower(&self) -> DMatrix<f64> {
        self.chol.l()
    }
}

/// Factor `k`, adding jitter if needed.
///
/// Returns `None` if the matrix cannot be factored even with the largest jitter.
pub fn factor_with_jitter(k: &DMatrix<f64>) -> Option<Factor> {
    if let Some(chol) = k.clone().cholesky() {
        return Some(Factor { chol, jitter: 0.0 });
    }

    let n = k.nrows();
    if n == 0 {
        return None;
    }
    let scale = (k.diagonal().iter().map(|d| d.abs()).sum::<f64>() / n as f64).max(f64::MIN_POSITIVE);

    for &level in &JITTER_LEVELS {
        let jitter = level * scale;
        let mut kj = k.clone();
        for i in 0..n {
            kj[(i, i)] += jitter;
        }
        if let Some(chol) = kj.cholesky() {
            log::debug!("covariance factored with jitter {jitter:.3e}");
            return Some(Factor { chol, jitter });
        }
    }

    None
}

/// A matrix `A` with `k ≈ A Aᵀ`, for symmetric positive semi-definite `k`.
///
/// Uses the Cholesky factor when it exists. Rank-deficient matrices (e.g. a
/// posterior covariance evaluated at noiseless training points) fall back to
/// an eigendecomposition with round-off negative eigenvalues clamped to zero.
pub fn psd_sqrt(k: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    if let Some(chol) = k.clone().cholesky() {
        return Some(chol.l());
    }

    let eig = k.clone().symmetric_eigen();
    if eig.eigenvalues.iter().any(|l| !l.is_finite()) {
        return None;
    }
    let clamped = eig.eigenvalues.iter().filter(|&&l| l < 0.0).count();
    if clamped > 0 {
        log::debug!("clamped {clamped} negative eigenvalues of a {}x{} covariance", k.nrows(), k.ncols());
    }
    let roots = eig.eigenvalues.map(|l| l.max(0.0).sqrt());
    Some(eig.eigenvectors * DMatrix::from_diagonal(&roots))
}
