//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory by the grid reader and the GP helper
//! - exported to JSON/CSV
//! - handed to any plotting front-end (display hints travel with the data)

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Axis scale hint for a plotted quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    Linear,
    Log,
}

/// Presentation metadata carried alongside a curve.
///
/// Nothing in this crate interprets these values; they describe how the
/// curve is meant to be displayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayHints {
    pub x_scale: Scale,
    pub y_scale: Scale,
    pub x_label: String,
    pub y_label: String,
}

impl DisplayHints {
    /// Hints for a model spectrum (count rate vs. energy, log-log).
    pub fn spectrum() -> Self {
        Self {
            x_scale: Scale::Log,
            y_scale: Scale::Log,
            x_label: "Energy / keV".to_string(),
            y_label: "Count Rate".to_string(),
        }
    }
}

/// Paired `(x, y)` samples plus display hints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub hints: DisplayHints,
}

impl Curve {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.x.iter().copied().zip(self.y.iter().copied())
    }
}

/// One spectral bin, `[low, high)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyBin {
    pub low: f64,
    pub high: f64,
}

impl EnergyBin {
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    pub fn midpoint(&self) -> f64 {
        0.5 * (self.low + self.high)
    }

    pub fn contains(&self, value: f64) -> bool {
        self.low <= value && value < self.high
    }
}

/// One tabulated model parameter (a grid axis).
///
/// `num_values` is kept separately from `values` because grid files declare
/// both; the loader checks that they agree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterAxis {
    pub name: String,
    pub num_values: usize,
    pub values: Vec<f64>,
    /// Declared default value. Not necessarily one of `values`.
    pub initial: f64,
}

impl ParameterAxis {
    pub fn new(name: impl Into<String>, values: Vec<f64>, initial: f64) -> Self {
        Self {
            name: name.into(),
            num_values: values.len(),
            values,
            initial,
        }
    }
}

/// Requested parameter values, keyed by parameter name.
pub type Overrides = BTreeMap<String, f64>;

/// A time series of rates with (optional) 1-sigma errors.
///
/// When a source has no error column, `error` is all zeros.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightCurve {
    pub time: Vec<f64>,
    pub rate: Vec<f64>,
    pub error: Vec<f64>,
}

impl LightCurve {
    pub fn new(time: Vec<f64>, rate: Vec<f64>, error: Vec<f64>) -> Self {
        Self { time, rate, error }
    }

    pub fn without_errors(time: Vec<f64>, rate: Vec<f64>) -> Self {
        let error = vec![0.0; time.len()];
        Self { time, rate, error }
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Replace NaN rates with zero (so they are later treated as gaps).
    pub fn zero_nan(&mut self) {
        for r in self.rate.iter_mut() {
            if r.is_nan() {
                *r = 0.0;
            }
        }
    }

    /// Drop time bins where the rate is exactly zero.
    pub fn remove_gaps(&mut self) {
        self.retain(|rate| rate != 0.0);
    }

    /// Drop time bins where the rate is NaN.
    pub fn remove_nan(&mut self) {
        self.retain(|rate| !rate.is_nan());
    }

    /// Smallest positive spacing between consecutive time stamps.
    ///
    /// Stands in for the bin width. After gap removal it is measured over the
    /// kept bins only.
    pub fn min_dt(&self) -> Option<f64> {
        self.time
            .windows(2)
            .map(|w| w[1] - w[0])
            .filter(|d| *d > 0.0)
            .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |a| a.min(d))))
    }

    fn retain(&mut self, keep: impl Fn(f64) -> bool) {
        let mut time = Vec::with_capacity(self.len());
        let mut rate = Vec::with_capacity(self.len());
        let mut error = Vec::with_capacity(self.len());
        for i in 0..self.len() {
            if keep(self.rate[i]) {
                time.push(self.time[i]);
                rate.push(self.rate[i]);
                error.push(self.error.get(i).copied().unwrap_or(0.0));
            }
        }
        self.time = time;
        self.rate = rate;
        self.error = error;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn energy_bin_is_half_open() {
        let bin = EnergyBin::new(1.0, 2.0);
        assert!(bin.contains(1.0));
        assert!(bin.contains(1.999));
        assert!(!bin.contains(2.0));
        assert_eq!(bin.midpoint(), 1.5);
    }

    #[test]
    fn zero_nan_then_remove_gaps_drops_both() {
        let mut lc = LightCurve::new(
            vec![0.0, 1.0, 2.0, 3.0],
            vec![1.0, f64::NAN, 0.0, 4.0],
            vec![0.1, 0.2, 0.3, 0.4],
        );
        lc.zero_nan();
        lc.remove_gaps();
        assert_eq!(lc.time, vec![0.0, 3.0]);
        assert_eq!(lc.rate, vec![1.0, 4.0]);
        assert_eq!(lc.error, vec![0.1, 0.4]);
    }

    #[test]
    fn min_dt_ignores_repeated_times() {
        let lc = LightCurve::without_errors(vec![0.0, 2.0, 2.0, 2.5, 5.0], vec![1.0; 5]);
        assert_eq!(lc.min_dt(), Some(0.5));
    }

    #[test]
    fn min_dt_after_gap_removal_spans_kept_bins() {
        // Bin width 1, but every other bin is empty.
        let time: Vec<f64> = (0..6).map(f64::from).collect();
        let mut lc = LightCurve::without_errors(time, vec![1.0, 0.0, 2.0, 0.0, 3.0, 0.0]);
        assert_eq!(lc.min_dt(), Some(1.0));
        lc.remove_gaps();
        assert_eq!(lc.min_dt(), Some(2.0));
    }
}
