//! Stationary covariance kernels built from additive terms.
//!
//! Supported terms:
//!
//! - `Sho`: stochastically driven, damped simple harmonic oscillator with
//!   parameters `ln S0`, `ln Q`, `ln ω0`. Its autocovariance is
//!
//!   ```text
//!   Q > 1/2:  S0 ω0 Q e^{-ω0τ/2Q} [cos(ηω0τ) + sin(ηω0τ)/(2ηQ)],   η = sqrt(1 - 1/4Q²)
//!   Q = 1/2:  S0 ω0 Q e^{-ω0τ} (1 + ω0τ)
//!   Q < 1/2:  S0 ω0 Q e^{-ω0τ/2Q} [cosh(fω0τ) + sinh(fω0τ)/(2fQ)],  f = sqrt(1/4Q² - 1)
//!   ```
//!
//! - `Real`: damped random walk, `a e^{-cτ}` with parameters `ln a`, `ln c`.
//! - `White`: uncorrelated noise of variance `σ²` (parameter `ln σ²`), added
//!   to the diagonal of the training covariance only.
//!
//! Parameters live in log space, carry box bounds, and can be frozen; the
//! optimizer only sees the free ones.

use std::fmt;

use crate::error::GpError;

/// Default box for log-space kernel parameters.
pub const LOG_BOUNDS: (f64, f64) = (-15.0, 15.0);

/// `|Q - 1/2|` below which the critically damped form is used.
const CRITICAL_Q_EPS: f64 = 1e-8;

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: &'static str,
    pub value: f64,
    pub bounds: (f64, f64),
    pub frozen: bool,
}

impl Parameter {
    fn new(name: &'static str, value: f64) -> Self {
        Self {
            name,
            value,
            bounds: LOG_BOUNDS,
            frozen: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermKind {
    Sho,
    Real,
    White,
}

impl TermKind {
    pub fn display_name(self) -> &'static str {
        match self {
            TermKind::Sho => "SHOTerm",
            TermKind::Real => "RealTerm",
            TermKind::White => "WhiteTerm",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    kind: TermKind,
    params: Vec<Parameter>,
}

impl Term {
    pub fn sho(log_s0: f64, log_q: f64, log_omega0: f64) -> Self {
        Self {
            kind: TermKind::Sho,
            params: vec![
                Parameter::new("log_S0", log_s0),
                Parameter::new("log_Q", log_q),
                Parameter::new("log_omega0", log_omega0),
            ],
        }
    }

    pub fn real(log_a: f64, log_c: f64) -> Self {
        Self {
            kind: TermKind::Real,
            params: vec![Parameter::new("log_a", log_a), Parameter::new("log_c", log_c)],
        }
    }

    pub fn white(log_sigma2: f64) -> Self {
        Self {
            kind: TermKind::White,
            params: vec![Parameter::new("log_sigma2", log_sigma2)],
        }
    }

    pub fn kind(&self) -> TermKind {
        self.kind
    }

    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    /// Replace the bounds of parameter `name`.
    pub fn with_bounds(mut self, name: &str, bounds: (f64, f64)) -> Result<Self, GpError> {
        self.param_mut(name)?.bounds = bounds;
        Ok(self)
    }

    /// Exclude parameter `name` from fitting.
    pub fn frozen(mut self, name: &str) -> Result<Self, GpError> {
        self.param_mut(name)?.frozen = true;
        Ok(self)
    }

    fn param_mut(&mut self, name: &str) -> Result<&mut Parameter, GpError> {
        let kind = self.kind;
        self.params
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| {
                GpError::InvalidOption(format!("{} has no parameter '{name}'", kind.display_name()))
            })
    }

    fn value_of(&self, i: usize) -> f64 {
        self.params[i].value.exp()
    }

    /// Stationary covariance at lag `tau` (zero for white noise).
    fn covariance(&self, tau: f64) -> f64 {
        let tau = tau.abs();
        match self.kind {
            TermKind::Sho => sho_covariance(tau, self.value_of(0), self.value_of(1), self.value_of(2)),
            TermKind::Real => self.value_of(0) * (-self.value_of(1) * tau).exp(),
            TermKind::White => 0.0,
        }
    }

    fn white_variance(&self) -> f64 {
        match self.kind {
            TermKind::White => self.value_of(0),
            _ => 0.0,
        }
    }
}

fn sho_covariance(tau: f64, s0: f64, q: f64, w0: f64) -> f64 {
    let amp = s0 * w0 * q;
    let x = w0 * tau;

    if (q - 0.5).abs() < CRITICAL_Q_EPS {
        return amp * (-x).exp() * (1.0 + x);
    }

    if q > 0.5 {
        let eta = (1.0 - 1.0 / (4.0 * q * q)).sqrt();
        amp * (-x / (2.0 * q)).exp() * ((eta * x).cos() + (eta * x).sin() / (2.0 * eta * q))
    } else {
        // Overdamped: expand cosh/sinh so both exponentials decay.
        let f = (1.0 / (4.0 * q * q) - 1.0).sqrt();
        let c = 1.0 / (2.0 * f * q);
        let d = 1.0 / (2.0 * q);
        0.5 * amp * ((1.0 + c) * ((f - d) * x).exp() + (1.0 - c) * (-(f + d) * x).exp())
    }
}

/// Sum of kernel terms.
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    terms: Vec<Term>,
}

impl Kernel {
    pub fn new(terms: Vec<Term>) -> Self {
        Self { terms }
    }

    /// SHO kernel whose zero-lag covariance equals `variance`:
    /// `S0 = variance / (ω0 Q)`, with `ln Q` frozen.
    pub fn sho_for_variance(variance: f64, q: f64, w0: f64) -> Result<Self, GpError> {
        if !(q.is_finite() && q > 0.0 && w0.is_finite() && w0 > 0.0) {
            return Err(GpError::InvalidOption(format!(
                "kernel parameters must be positive (Q={q}, w0={w0})"
            )));
        }
        let s0 = variance / (w0 * q);
        let term = Term::sho(s0.ln(), q.ln(), w0.ln()).frozen("log_Q")?;
        Ok(Self::new(vec![term]))
    }

    pub fn push(&mut self, term: Term) {
        self.terms.push(term);
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    /// Covariance at lag `tau`, excluding white-noise terms.
    pub fn value(&self, tau: f64) -> f64 {
        self.terms.iter().map(|t| t.covariance(tau)).sum()
    }

    /// Total white-noise variance.
    pub fn white_variance(&self) -> f64 {
        self.terms.iter().map(Term::white_variance).sum()
    }

    fn free(&self) -> impl Iterator<Item = (usize, &Parameter)> {
        self.terms
            .iter()
            .enumerate()
            .flat_map(|(i, t)| t.params.iter().map(move |p| (i, p)))
            .filter(|(_, p)| !p.frozen)
    }

    /// Values of the free parameters.
    pub fn parameter_vector(&self) -> Vec<f64> {
        self.free().map(|(_, p)| p.value).collect()
    }

    pub fn parameter_bounds(&self) -> Vec<(f64, f64)> {
        self.free().map(|(_, p)| p.bounds).collect()
    }

    pub fn parameter_names(&self) -> Vec<String> {
        self.free()
            .map(|(i, p)| format!("terms[{i}]:{}", p.name))
            .collect()
    }

    pub fn set_parameter_vector(&mut self, values: &[f64]) -> Result<(), GpError> {
        let n_free = self.free().count();
        if values.len() != n_free {
            return Err(GpError::InvalidOption(format!(
                "expected {n_free} kernel parameters, got {}",
                values.len()
            )));
        }
        let mut it = values.iter();
        for term in &mut self.terms {
            for p in term.params.iter_mut().filter(|p| !p.frozen) {
                if let Some(&v) = it.next() {
                    p.value = v;
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, term) in self.terms.iter().enumerate() {
            if i > 0 {
                write!(f, " + ")?;
            }
            write!(f, "{}(", term.kind.display_name())?;
            for (j, p) in term.params.iter().enumerate() {
                if j > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}={:.4}", p.name, p.value)?;
                if p.frozen {
                    write!(f, " [frozen]")?;
                }
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}
