//! Light-curve regression with a Gaussian process.
//!
//! Workflow:
//! 1. clean the light curve (NaN handling, gap removal)
//! 2. optionally move to log space (`lognorm`)
//! 3. build the kernel (default: SHO with `S0 = var / (ω0 Q)`, `Q` frozen,
//!    optionally plus white noise)
//! 4. fit the free hyperparameters by maximum likelihood
//! 5. predict / draw posterior samples, converting back out of log space

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::distributions::{Distribution, Uniform};
use rayon::prelude::*;
use serde::Serialize;

use crate::domain::LightCurve;
use crate::error::GpError;
use crate::gp::kernel::{Kernel, Term};
use crate::gp::process::{DenseGp, GaussianProcess};
use crate::math::{OptimizeOptions, OptimizeResult, minimize_bounded};

/// Lower bound on the white-noise variance when `noise_kernel` is enabled.
const MIN_NOISE_LEVEL: f64 = 1e-10;

/// Half-width (in log space) of the box restart points are drawn from.
const RESTART_SPREAD: f64 = 2.0;

/// Largest default query grid. Conditional sampling builds an `m x m`
/// covariance, so the dense GP cannot go much further anyway.
pub const MAX_QUERY_POINTS: usize = 10_000;

/// Construction options.
#[derive(Debug, Clone)]
pub struct RegressionOptions {
    /// Custom kernel; overrides `kernel_pars` and `noise_kernel`.
    pub kernel: Option<Kernel>,
    /// `(Q, ω0)` for the default SHO kernel.
    pub kernel_pars: (f64, f64),
    pub use_errors: bool,
    pub noise_kernel: bool,
    pub lognorm: bool,
    pub remove_gaps: bool,
    pub remove_nan: bool,
    pub zero_nan: bool,
    pub run_fit: bool,
    pub optimizer: OptimizeOptions,
}

impl Default for RegressionOptions {
    fn default() -> Self {
        Self {
            kernel: None,
            kernel_pars: (1.0 / 2.0_f64.sqrt(), 1e-5),
            use_errors: true,
            noise_kernel: false,
            lognorm: false,
            remove_gaps: true,
            remove_nan: false,
            zero_nan: true,
            run_fit: true,
            optimizer: OptimizeOptions::default(),
        }
    }
}

/// Outcome of a maximum-likelihood fit.
#[derive(Debug, Clone, Serialize)]
pub struct FitReport {
    pub converged: bool,
    pub message: String,
    pub iterations: usize,
    pub evaluations: usize,
    pub initial_log_likelihood: f64,
    pub log_likelihood: f64,
    pub parameters: Vec<(String, f64)>,
}

/// A GP model of one light curve.
#[derive(Debug, Clone)]
pub struct GpLightCurve {
    /// Cleaned series, in log space when `lognorm` is set.
    lc: LightCurve,
    lognorm: bool,
    variance: f64,
    dt: f64,
    gp: DenseGp,
    optimizer: OptimizeOptions,
    last_fit: Option<FitReport>,
}

impl GpLightCurve {
    pub fn new(lc: LightCurve, opts: RegressionOptions) -> Result<Self, GpError> {
        let mut lc = lc;
        if lc.rate.len() != lc.time.len() || lc.error.len() != lc.time.len() {
            return Err(GpError::InvalidOption(format!(
                "light curve columns differ in length (time={}, rate={}, error={})",
                lc.time.len(),
                lc.rate.len(),
                lc.error.len()
            )));
        }

        if opts.zero_nan {
            lc.zero_nan();
        }
        if opts.remove_gaps {
            lc.remove_gaps();
        } else if opts.remove_nan {
            lc.remove_nan();
        }

        if lc.len() < 2 {
            return Err(GpError::Degenerate(format!(
                "need at least 2 time bins, have {}",
                lc.len()
            )));
        }
        if lc.time.iter().chain(&lc.rate).any(|v| !v.is_finite()) {
            return Err(GpError::Degenerate(
                "time or rate contains non-finite values".to_string(),
            ));
        }
        if opts.use_errors && lc.error.iter().any(|v| !v.is_finite()) {
            return Err(GpError::Degenerate("errors contain non-finite values".to_string()));
        }

        let dt = lc
            .min_dt()
            .ok_or_else(|| GpError::Degenerate("all time stamps are identical".to_string()))?;
        let linear_mean = mean(&lc.rate);

        if opts.lognorm {
            if lc.rate.iter().any(|&r| r <= 0.0) {
                return Err(GpError::Degenerate(
                    "log-normal mode needs strictly positive rates".to_string(),
                ));
            }
            for i in 0..lc.len() {
                lc.error[i] /= lc.rate[i];
                lc.rate[i] = lc.rate[i].ln();
            }
        }

        let series_mean = mean(&lc.rate);
        let variance = lc.rate.iter().map(|r| (r - series_mean).powi(2)).sum::<f64>() / lc.len() as f64;
        if !(variance.is_finite() && variance > 0.0) {
            return Err(GpError::Degenerate(format!(
                "rate variance is {variance}; nothing to model"
            )));
        }

        let kernel = match opts.kernel {
            Some(kernel) => kernel,
            None => {
                let (q, w0) = opts.kernel_pars;
                let mut kernel = Kernel::sho_for_variance(variance, q, w0)?;
                if opts.noise_kernel {
                    kernel.push(noise_term(linear_mean, dt)?);
                }
                kernel
            }
        };
        log::info!("GP kernel: {kernel}");

        let mut gp = DenseGp::new(kernel, series_mean);
        let yerr = opts.use_errors.then_some(lc.error.as_slice());
        gp.compute(&lc.time, yerr)?;

        let mut model = Self {
            lc,
            lognorm: opts.lognorm,
            variance,
            dt,
            gp,
            optimizer: opts.optimizer,
            last_fit: None,
        };

        if opts.run_fit {
            model.fit()?;
        }
        Ok(model)
    }

    /// The cleaned (and possibly log-transformed) series being modelled.
    pub fn light_curve(&self) -> &LightCurve {
        &self.lc
    }

    pub fn kernel(&self) -> &Kernel {
        self.gp.kernel()
    }

    pub fn variance(&self) -> f64 {
        self.variance
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn last_fit(&self) -> Option<&FitReport> {
        self.last_fit.as_ref()
    }

    pub fn log_likelihood(&self) -> Result<f64, GpError> {
        self.gp.log_likelihood(&self.lc.rate)
    }

    /// Maximize the likelihood over the free kernel parameters.
    ///
    /// A fit that stops without meeting the convergence criteria still
    /// updates the parameters to the best point found; the returned report
    /// says so and the caller decides whether to retry.
    pub fn fit(&mut self) -> Result<FitReport, GpError> {
        let x0 = self.gp.kernel().parameter_vector();
        self.fit_from(&[x0])
    }

    /// Like [`fit`](Self::fit), but also starts from `restarts` random points
    /// around the current parameters and keeps the best optimum.
    pub fn fit_with_restarts(&mut self, restarts: usize, seed: u64) -> Result<FitReport, GpError> {
        let x0 = self.gp.kernel().parameter_vector();
        let bounds = self.gp.kernel().parameter_bounds();
        let mut rng = StdRng::seed_from_u64(seed);
        let jitter = Uniform::new_inclusive(-RESTART_SPREAD, RESTART_SPREAD);

        let mut starts = vec![x0.clone()];
        for _ in 0..restarts {
            let start = x0
                .iter()
                .zip(&bounds)
                .map(|(&v, &(lo, hi))| (v + jitter.sample(&mut rng)).clamp(lo, hi))
                .collect();
            starts.push(start);
        }
        self.fit_from(&starts)
    }

    fn fit_from(&mut self, starts: &[Vec<f64>]) -> Result<FitReport, GpError> {
        let initial_log_likelihood = self.log_likelihood()?;
        let bounds = self.gp.kernel().parameter_bounds();
        let template = &self.gp;
        let y = &self.lc.rate;
        let opts = self.optimizer;

        let objective = |params: &[f64]| neg_log_likelihood(template, params, y);

        let results: Vec<OptimizeResult> = starts
            .par_iter()
            .map(|x0| minimize_bounded(objective, x0, &bounds, opts))
            .collect();

        let best = results
            .into_iter()
            .filter(|r| r.fun.is_finite())
            .min_by(|a, b| a.fun.total_cmp(&b.fun))
            .ok_or_else(|| GpError::Optimizer("no start point gave a finite likelihood".to_string()))?;

        self.gp.set_parameter_vector(&best.x)?;
        let log_likelihood = self.log_likelihood()?;

        let report = FitReport {
            converged: best.converged,
            message: best.message.clone(),
            iterations: best.iterations,
            evaluations: best.evaluations,
            initial_log_likelihood,
            log_likelihood,
            parameters: self
                .gp
                .kernel()
                .parameter_names()
                .into_iter()
                .zip(best.x.iter().copied())
                .collect(),
        };

        if report.converged {
            log::info!(
                "GP fit converged after {} iterations: ln L {:.4} -> {:.4}",
                report.iterations,
                initial_log_likelihood,
                log_likelihood
            );
        } else {
            log::warn!(
                "GP fit did not converge ({}); ln L {:.4} -> {:.4}",
                report.message,
                initial_log_likelihood,
                log_likelihood
            );
        }

        self.last_fit = Some(report.clone());
        Ok(report)
    }

    /// Uniform grid from the first time stamp, stepping by the finest
    /// observed sampling interval, stopping before the last time stamp.
    ///
    /// Fails with `InvalidOption` if that grid would exceed
    /// [`MAX_QUERY_POINTS`]; pass explicit query times instead.
    pub fn default_query_times(&self) -> Result<Vec<f64>, GpError> {
        let t_min = self.lc.time.iter().copied().fold(f64::INFINITY, f64::min);
        let t_max = self.lc.time.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let span = t_max - t_min;
        let steps = (span / self.dt).ceil();
        if !(steps.is_finite() && steps <= MAX_QUERY_POINTS as f64) {
            return Err(GpError::InvalidOption(format!(
                "default query grid over span {span} with dt {} needs {steps} points (limit {MAX_QUERY_POINTS}); \
                 pass explicit query times",
                self.dt
            )));
        }
        let n = steps as usize;
        Ok((0..n).map(|i| t_min + i as f64 * self.dt).collect())
    }

    /// Predictive mean (`rate`) and standard deviation (`error`) at `t`
    /// (default: [`default_query_times`](Self::default_query_times)).
    ///
    /// In log-normal mode the mean is exponentiated and the error scaled by it.
    pub fn predict(&self, t: Option<&[f64]>) -> Result<LightCurve, GpError> {
        let time = self.query_times(t)?;
        let (mu, var) = self.gp.predict(&self.lc.rate, &time)?;
        let mut rate = mu;
        let mut error: Vec<f64> = var.iter().map(|v| v.sqrt()).collect();
        if self.lognorm {
            for (r, e) in rate.iter_mut().zip(error.iter_mut()) {
                *r = r.exp();
                *e *= *r;
            }
        }
        Ok(LightCurve::new(time, rate, error))
    }

    /// `n` posterior draws at `t`, with zero errors.
    pub fn sample(&self, n: usize, t: Option<&[f64]>, seed: u64) -> Result<Vec<LightCurve>, GpError> {
        if n == 0 {
            return Err(GpError::InvalidOption("number of samples must be > 0".to_string()));
        }
        let time = self.query_times(t)?;
        let mut rng = StdRng::seed_from_u64(seed);
        let draws = self.gp.sample_conditional(&self.lc.rate, &time, n, &mut rng)?;

        Ok(draws
            .into_iter()
            .map(|mut rate| {
                if self.lognorm {
                    rate.iter_mut().for_each(|r| *r = r.exp());
                }
                LightCurve::without_errors(time.clone(), rate)
            })
            .collect())
    }

    fn query_times(&self, t: Option<&[f64]>) -> Result<Vec<f64>, GpError> {
        match t {
            Some(t) => Ok(t.to_vec()),
            None => self.default_query_times(),
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// White-noise term sized for Poisson noise at `mean_rate` counts/s in bins of `dt`.
fn noise_term(mean_rate: f64, dt: f64) -> Result<Term, GpError> {
    let counts = mean_rate * dt;
    if !(counts.is_finite() && counts > 0.0) {
        return Err(GpError::InvalidOption(format!(
            "noise kernel needs a positive mean count per bin (mean rate {mean_rate}, dt {dt})"
        )));
    }
    let level = counts.sqrt() / counts;
    let upper = (2.0 * level).ln();
    let lower = MIN_NOISE_LEVEL.ln().min(upper);
    Term::white(level.ln()).with_bounds("log_sigma2", (lower, upper))
}

fn neg_log_likelihood(template: &DenseGp, params: &[f64], y: &[f64]) -> f64 {
    let mut gp = template.clone();
    if gp.set_parameter_vector(params).is_err() {
        return f64::INFINITY;
    }
    match gp.log_likelihood(y) {
        Ok(ll) if ll.is_finite() => -ll,
        _ => f64::INFINITY,
    }
}
