//! Gaussian-process conditioning on a time series.
//!
//! `GaussianProcess` is the seam the light-curve helper talks to:
//! configure a model once (`DenseGp::new` + `compute`), then ask for the
//! likelihood, the predictive mean/variance or conditional draws.
//!
//! `DenseGp` works with the full `n x n` covariance matrix and a Cholesky
//! factor, which is plenty for light curves of a few thousand bins.

use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::error::GpError;
use crate::gp::kernel::Kernel;
use crate::math::{Factor, factor_with_jitter, psd_sqrt};

const LN_2PI: f64 = 1.837_877_066_409_345_3;

pub trait GaussianProcess {
    /// `ln p(y | θ)` for observations at the computed time stamps.
    fn log_likelihood(&self, y: &[f64]) -> Result<f64, GpError>;

    /// Predictive mean and variance at `t`, conditioned on `y`.
    fn predict(&self, y: &[f64], t: &[f64]) -> Result<(Vec<f64>, Vec<f64>), GpError>;

    /// `n` draws from the conditional distribution at `t`.
    fn sample_conditional<R: Rng + ?Sized>(
        &self,
        y: &[f64],
        t: &[f64],
        n: usize,
        rng: &mut R,
    ) -> Result<Vec<Vec<f64>>, GpError>;
}

#[derive(Debug, Clone)]
pub struct DenseGp {
    kernel: Kernel,
    mean: f64,
    time: Vec<f64>,
    yerr: Option<Vec<f64>>,
    factor: Option<Factor>,
}

impl DenseGp {
    /// A GP with a constant mean function.
    pub fn new(kernel: Kernel, mean: f64) -> Self {
        Self {
            kernel,
            mean,
            time: Vec::new(),
            yerr: None,
            factor: None,
        }
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Build and factor the training covariance for observations at `time`
    /// with optional 1-sigma errors `yerr`.
    pub fn compute(&mut self, time: &[f64], yerr: Option<&[f64]>) -> Result<(), GpError> {
        if let Some(e) = yerr {
            if e.len() != time.len() {
                return Err(GpError::InvalidOption(format!(
                    "{} errors for {} time stamps",
                    e.len(),
                    time.len()
                )));
            }
        }
        self.time = time.to_vec();
        self.yerr = yerr.map(<[f64]>::to_vec);
        self.refactor()
    }

    /// Set the free kernel parameters and refactor the covariance.
    pub fn set_parameter_vector(&mut self, values: &[f64]) -> Result<(), GpError> {
        self.kernel.set_parameter_vector(values)?;
        if self.time.is_empty() {
            return Ok(());
        }
        self.refactor()
    }

    fn refactor(&mut self) -> Result<(), GpError> {
        self.factor = None;
        let k = self.training_covariance();
        self.factor = Some(factor_with_jitter(&k).ok_or(GpError::NotPositiveDefinite)?);
        Ok(())
    }

    fn training_covariance(&self) -> DMatrix<f64> {
        let n = self.time.len();
        let white = self.kernel.white_variance();
        DMatrix::from_fn(n, n, |i, j| {
            let mut v = self.kernel.value(self.time[i] - self.time[j]);
            if i == j {
                v += white;
                if let Some(e) = &self.yerr {
                    v += e[i] * e[i];
                }
            }
            v
        })
    }

    /// `K(train, query)`, shape `n x m`.
    fn cross_covariance(&self, t: &[f64]) -> DMatrix<f64> {
        DMatrix::from_fn(self.time.len(), t.len(), |i, j| {
            self.kernel.value(self.time[i] - t[j])
        })
    }

    fn factor(&self) -> Result<&Factor, GpError> {
        self.factor
            .as_ref()
            .ok_or_else(|| GpError::InvalidOption("GP has not been computed on any data".to_string()))
    }

    fn residuals(&self, y: &[f64]) -> Result<DVector<f64>, GpError> {
        if y.len() != self.time.len() {
            return Err(GpError::InvalidOption(format!(
                "{} observations for {} time stamps",
                y.len(),
                self.time.len()
            )));
        }
        Ok(DVector::from_iterator(y.len(), y.iter().map(|v| v - self.mean)))
    }

    /// Conditional mean and the `(K*ᵀ K⁻¹)` product reused by prediction and sampling.
    fn condition(&self, y: &[f64], t: &[f64]) -> Result<(DVector<f64>, DMatrix<f64>, DMatrix<f64>), GpError> {
        let factor = self.factor()?;
        let r = self.residuals(y)?;
        let alpha = factor.solve(&r);
        let ks = self.cross_covariance(t);
        let mu = ks.transpose() * alpha;
        let mu = mu.map(|v| v + self.mean);
        let v = factor.solve_matrix(&ks);
        Ok((mu, ks, v))
    }
}

impl GaussianProcess for DenseGp {
    fn log_likelihood(&self, y: &[f64]) -> Result<f64, GpError> {
        let factor = self.factor()?;
        let r = self.residuals(y)?;
        let alpha = factor.solve(&r);
        let n = r.len() as f64;
        Ok(-0.5 * (r.dot(&alpha) + factor.log_det() + n * LN_2PI))
    }

    fn predict(&self, y: &[f64], t: &[f64]) -> Result<(Vec<f64>, Vec<f64>), GpError> {
        let (mu, ks, v) = self.condition(y, t)?;
        let k0 = self.kernel.value(0.0);
        let var = (0..t.len())
            .map(|j| (k0 - ks.column(j).dot(&v.column(j))).max(0.0))
            .collect();
        Ok((mu.as_slice().to_vec(), var))
    }

    fn sample_conditional<R: Rng + ?Sized>(
        &self,
        y: &[f64],
        t: &[f64],
        n: usize,
        rng: &mut R,
    ) -> Result<Vec<Vec<f64>>, GpError> {
        let (mu, ks, v) = self.condition(y, t)?;
        let m = t.len();
        let kss = DMatrix::from_fn(m, m, |i, j| self.kernel.value(t[i] - t[j]));
        let cov = kss - ks.transpose() * v;
        // Symmetrize before factoring; the product above is only symmetric up to rounding.
        let cov = (&cov + cov.transpose()) * 0.5;
        let lower = psd_sqrt(&cov).ok_or(GpError::NotPositiveDefinite)?;

        let mut draws = Vec::with_capacity(n);
        for _ in 0..n {
            let z = DVector::from_fn(m, |_, _| {
                let s: f64 = StandardNormal.sample(rng);
                s
            });
            let draw = &mu + &lower * z;
            draws.push(draw.as_slice().to_vec());
        }
        Ok(draws)
    }
}
