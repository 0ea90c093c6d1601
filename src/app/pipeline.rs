//! Shared pipeline logic behind the CLI commands.
//!
//! Each pipeline takes a plain config struct and returns its computed
//! outputs; printing and file exports stay in `app`.

use std::path::PathBuf;

use crate::domain::{Curve, LightCurve, Overrides};
use crate::error::AppError;
use crate::gp::{FitReport, GpLightCurve, Kernel, RegressionOptions};
use crate::grid::{GridSource, Snapped, SpectralModel};

/// Inputs of a spectrum lookup.
#[derive(Debug, Clone)]
pub struct SpectrumConfig {
    pub model: PathBuf,
    pub overrides: Overrides,
    pub energy_range: Option<(f64, f64)>,
    pub export: Option<PathBuf>,
}

/// Outputs of a spectrum lookup.
#[derive(Debug, Clone)]
pub struct SpectrumOutput {
    pub snapped: Vec<Snapped>,
    pub row: usize,
    pub curve: Curve,
}

/// Resolve the overrides against `model` and extract the spectrum.
///
/// The model's stored selection is left untouched.
pub fn run_spectrum<S: GridSource>(
    model: &mut SpectralModel<S>,
    config: &SpectrumConfig,
) -> Result<SpectrumOutput, AppError> {
    let snapped = model.snap(&config.overrides)?;
    let row = model.spectrum_number(&config.overrides)?;
    let curve = model.spectrum_at(row, config.energy_range)?;

    Ok(SpectrumOutput { snapped, row, curve })
}

/// Inputs of a light-curve regression.
#[derive(Debug, Clone)]
pub struct RegressionConfig {
    pub input: PathBuf,
    pub options: RegressionOptions,
    pub restarts: usize,
    pub samples: usize,
    pub seed: u64,
    pub predict_out: Option<PathBuf>,
    pub samples_out: Option<PathBuf>,
    pub report_out: Option<PathBuf>,
}

/// Outputs of a light-curve regression.
#[derive(Debug, Clone)]
pub struct RegressionOutput {
    /// Cleaned series the GP was conditioned on (log space if `lognorm`).
    pub data: LightCurve,
    pub kernel: Kernel,
    pub fit: Option<FitReport>,
    pub log_likelihood: f64,
    pub prediction: LightCurve,
    pub samples: Vec<LightCurve>,
}

/// Build the GP model, fit it, predict on the default grid and draw samples.
pub fn run_regression(lc: LightCurve, config: &RegressionConfig) -> Result<RegressionOutput, AppError> {
    let fit_requested = config.options.run_fit;
    let mut options = config.options.clone();
    // Restarts replace the single-start fit done during construction.
    if config.restarts > 0 {
        options.run_fit = false;
    }

    let mut model = GpLightCurve::new(lc, options)?;
    if fit_requested && config.restarts > 0 {
        model.fit_with_restarts(config.restarts, config.seed)?;
    }

    let prediction = model.predict(None)?;
    let samples = if config.samples > 0 {
        model.sample(config.samples, None, config.seed)?
    } else {
        Vec::new()
    };

    Ok(RegressionOutput {
        data: model.light_curve().clone(),
        kernel: model.kernel().clone(),
        fit: model.last_fit().cloned(),
        log_likelihood: model.log_likelihood()?,
        prediction,
        samples,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EnergyBin, ParameterAxis};
    use crate::grid::InMemorySource;

    fn model() -> SpectralModel<InMemorySource> {
        // Gamma x Incl = 3 x 2, row = iGamma * 2 + iIncl.
        let spectra = (0..6).map(|r| vec![r as f64, 10.0 + r as f64]).collect();
        let source = InMemorySource::new(
            vec![EnergyBin::new(1.0, 2.0), EnergyBin::new(2.0, 3.0)],
            vec![
                ParameterAxis::new("Gamma", vec![1.5, 2.0, 2.5], 2.0),
                ParameterAxis::new("Incl", vec![30.0, 60.0], 30.0),
            ],
            spectra,
        );
        SpectralModel::open(source).unwrap()
    }

    fn spectrum_config(overrides: &[(&str, f64)]) -> SpectrumConfig {
        SpectrumConfig {
            model: PathBuf::from("unused.json"),
            overrides: overrides.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            energy_range: None,
            export: None,
        }
    }

    #[test]
    fn spectrum_pipeline_reports_snapping() {
        let mut model = model();
        let out = run_spectrum(&mut model, &spectrum_config(&[("Incl", 50.0)])).unwrap();
        assert_eq!(out.row, 3);
        assert_eq!(out.curve.y, vec![3.0, 13.0]);
        assert_eq!(out.snapped[1].value, 60.0);
        assert_eq!(model.selection().get("Incl"), Some(30.0));
    }

    #[test]
    fn persisted_selection_feeds_later_lookups() {
        let mut model = model();
        model.persist(&spectrum_config(&[("Gamma", 2.5)]).overrides).unwrap();
        let out = run_spectrum(&mut model, &spectrum_config(&[])).unwrap();
        assert_eq!(out.row, 4);
        assert_eq!(out.snapped[0].value, 2.5);
    }

    #[test]
    fn unknown_parameter_maps_to_exit_code_2() {
        let mut model = model();
        let err = run_spectrum(&mut model, &spectrum_config(&[("Norm", 1.0)])).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    fn regression_config(run_fit: bool, restarts: usize, samples: usize) -> RegressionConfig {
        RegressionConfig {
            input: PathBuf::from("unused.csv"),
            options: RegressionOptions {
                kernel_pars: (std::f64::consts::FRAC_1_SQRT_2, 0.5),
                run_fit,
                ..RegressionOptions::default()
            },
            restarts,
            samples,
            seed: 5,
            predict_out: None,
            samples_out: None,
            report_out: None,
        }
    }

    fn light_curve() -> LightCurve {
        let time: Vec<f64> = (0..40).map(|i| i as f64 * 0.5).collect();
        let rate = time.iter().map(|t| 20.0 + 3.0 * (t / 2.0).cos()).collect();
        LightCurve::new(time, rate, vec![0.5; 40])
    }

    #[test]
    fn regression_without_fit_has_no_report() {
        let out = run_regression(light_curve(), &regression_config(false, 0, 2)).unwrap();
        assert!(out.fit.is_none());
        assert_eq!(out.samples.len(), 2);
        assert_eq!(out.prediction.len(), 39);
        assert!(out.log_likelihood.is_finite());
    }

    #[test]
    fn regression_with_restarts_reports_fit() {
        let out = run_regression(light_curve(), &regression_config(true, 2, 0)).unwrap();
        let fit = out.fit.expect("fit report");
        assert!(fit.log_likelihood >= fit.initial_log_likelihood - 1e-9);
        assert!(out.samples.is_empty());
    }

    #[test]
    fn degenerate_light_curve_maps_to_exit_code_3() {
        let flat = LightCurve::without_errors(vec![0.0, 1.0, 2.0], vec![1.0; 3]);
        let err = run_regression(flat, &regression_config(false, 0, 0)).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
