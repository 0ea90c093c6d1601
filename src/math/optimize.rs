//! Bound-constrained quasi-Newton minimization.
//!
//! GP hyperparameter fits need to minimize a smooth, cheap-to-evaluate but
//! gradient-free objective (the negative log-likelihood) over a box. We use a
//! projected BFGS scheme:
//!
//! - gradients by central differences (one-sided at active bounds)
//! - search direction `-H g` with the inverse-Hessian approximation `H`,
//!   zeroed on coordinates pinned at a bound
//! - Armijo backtracking on the projected step
//! - BFGS update of `H` whenever the curvature condition `sᵀy > 0` holds
//!
//! Convergence is declared when the projected gradient or the relative
//! objective decrease falls below tolerance. Everything else (iteration cap,
//! failed line search, non-finite objective at the start) is reported
//! through `OptimizeResult::converged` / `message`, never hidden.

use std::cell::Cell;

use nalgebra::{DMatrix, DVector};

/// Stopping criteria.
#[derive(Debug, Clone, Copy)]
pub struct OptimizeOptions {
    pub max_iter: usize,
    /// Projected-gradient infinity-norm tolerance.
    pub gtol: f64,
    /// Relative objective decrease tolerance.
    pub ftol: f64,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self {
            max_iter: 200,
            gtol: 1e-5,
            ftol: 1e-10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OptimizeResult {
    pub x: Vec<f64>,
    pub fun: f64,
    pub iterations: usize,
    pub evaluations: usize,
    pub converged: bool,
    pub message: String,
}

/// Minimize `f` over the box `bounds`, starting from `x0` (clamped into the box).
///
/// `f` may return a non-finite value for infeasible points; the line search
/// treats those as "too far" and backs off.
pub fn minimize_bounded<F>(
    f: F,
    x0: &[f64],
    bounds: &[(f64, f64)],
    opts: OptimizeOptions,
) -> OptimizeResult
where
    F: Fn(&[f64]) -> f64,
{
    let n = x0.len();
    let evals = Cell::new(0usize);
    let mut eval = |x: &DVector<f64>| {
        evals.set(evals.get() + 1);
        f(x.as_slice())
    };

    let mut x = clamp(&DVector::from_row_slice(x0), bounds);
    let mut fx = eval(&x);
    if !fx.is_finite() {
        return OptimizeResult {
            x: x.as_slice().to_vec(),
            fun: fx,
            iterations: 0,
            evaluations: evals.get(),
            converged: false,
            message: "objective is not finite at the starting point".to_string(),
        };
    }
    if n == 0 {
        return OptimizeResult {
            x: Vec::new(),
            fun: fx,
            iterations: 0,
            evaluations: evals.get(),
            converged: true,
            message: "no free parameters".to_string(),
        };
    }

    let mut g = gradient(&mut eval, &x, fx, bounds);
    let mut h = DMatrix::<f64>::identity(n, n);

    for iter in 0..opts.max_iter {
        let pg = projected_gradient(&x, &g, bounds);
        if pg.amax() <= opts.gtol {
            return finish(x, fx, iter, evals.get(), true, "projected gradient below tolerance");
        }

        let free = free_mask(&x, &g, bounds);
        let mut d = -(&h * &g);
        for i in 0..n {
            if !free[i] {
                d[i] = 0.0;
            }
        }
        if g.dot(&d) >= 0.0 {
            // H lost positive definiteness on the free subspace; restart.
            h = DMatrix::identity(n, n);
            d = -pg.clone();
        }

        let Some((x_new, f_new)) = line_search(&mut eval, &x, fx, &g, &d, bounds) else {
            return finish(x, fx, iter, evals.get(), false, "line search failed to decrease the objective");
        };

        let g_new = gradient(&mut eval, &x_new, f_new, bounds);
        let s = &x_new - &x;
        let y = &g_new - &g;
        let sy = s.dot(&y);
        if sy > 1e-12 {
            let rho = 1.0 / sy;
            let eye = DMatrix::<f64>::identity(n, n);
            let left = &eye - rho * &s * y.transpose();
            let right = &eye - rho * &y * s.transpose();
            h = left * &h * right + rho * &s * s.transpose();
        }

        let decrease = fx - f_new;
        let scale = fx.abs().max(f_new.abs()).max(1.0);
        log::debug!("optimizer iter {iter}: f = {f_new:.6}, |pg| = {:.3e}", pg.amax());

        x = x_new;
        fx = f_new;
        g = g_new;

        if decrease <= opts.ftol * scale {
            return finish(x, fx, iter + 1, evals.get(), true, "relative reduction of objective below tolerance");
        }
    }

    finish(x, fx, opts.max_iter, evals.get(), false, "iteration limit reached")
}

fn finish(
    x: DVector<f64>,
    fun: f64,
    iterations: usize,
    evaluations: usize,
    converged: bool,
    message: &str,
) -> OptimizeResult {
    OptimizeResult {
        x: x.as_slice().to_vec(),
        fun,
        iterations,
        evaluations,
        converged,
        message: message.to_string(),
    }
}

fn clamp(x: &DVector<f64>, bounds: &[(f64, f64)]) -> DVector<f64> {
    DVector::from_iterator(
        x.len(),
        x.iter().zip(bounds).map(|(&v, &(lo, hi))| v.clamp(lo, hi)),
    )
}

/// Coordinates that may move: not pinned at a bound with the gradient pushing outward.
fn free_mask(x: &DVector<f64>, g: &DVector<f64>, bounds: &[(f64, f64)]) -> Vec<bool> {
    x.iter()
        .zip(g.iter())
        .zip(bounds)
        .map(|((&xi, &gi), &(lo, hi))| !((xi <= lo && gi > 0.0) || (xi >= hi && gi < 0.0)))
        .collect()
}

fn projected_gradient(x: &DVector<f64>, g: &DVector<f64>, bounds: &[(f64, f64)]) -> DVector<f64> {
    let free = free_mask(x, g, bounds);
    DVector::from_iterator(
        g.len(),
        g.iter().zip(free).map(|(&gi, keep)| if keep { gi } else { 0.0 }),
    )
}

fn gradient<E>(eval: &mut E, x: &DVector<f64>, fx: f64, bounds: &[(f64, f64)]) -> DVector<f64>
where
    E: FnMut(&DVector<f64>) -> f64,
{
    let mut g = DVector::zeros(x.len());
    for i in 0..x.len() {
        let (lo, hi) = bounds[i];
        let h = 1e-6 * x[i].abs().max(1.0);

        let mut up = x.clone();
        up[i] = (x[i] + h).min(hi);
        let mut down = x.clone();
        down[i] = (x[i] - h).max(lo);

        let span = up[i] - down[i];
        if span <= 0.0 {
            continue;
        }
        let f_up = if up[i] > x[i] { eval(&up) } else { fx };
        let f_down = if down[i] < x[i] { eval(&down) } else { fx };
        let gi = (f_up - f_down) / span;
        g[i] = if gi.is_finite() { gi } else { 0.0 };
    }
    g
}

fn line_search<E>(
    eval: &mut E,
    x: &DVector<f64>,
    fx: f64,
    g: &DVector<f64>,
    d: &DVector<f64>,
    bounds: &[(f64, f64)],
) -> Option<(DVector<f64>, f64)>
where
    E: FnMut(&DVector<f64>) -> f64,
{
    const C1: f64 = 1e-4;
    let mut alpha: f64 = 1.0;
    for _ in 0..60 {
        let candidate = clamp(&(x + alpha * d), bounds);
        let step = &candidate - x;
        if step.amax() == 0.0 {
            return None;
        }
        let f_new = eval(&candidate);
        if f_new.is_finite() && f_new <= fx + C1 * g.dot(&step) {
            return Some((candidate, f_new));
        }
        alpha *= 0.5;
    }
    None
}
