//! Command-line parsing for `specgrid`.
//!
//! Argument parsing and command dispatch stay separate from the grid and
//! regression code; this module only turns argv into typed values.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::Overrides;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "specgrid",
    version,
    about = "Spectral model grid lookup and Gaussian-process light-curve regression"
)]
pub struct Cli {
    /// Log at debug level (overrides RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the parameter axes and energy range of a model grid.
    Params(GridArgs),
    /// Extract the spectrum nearest to a set of parameter values.
    Spectrum(SpectrumArgs),
    /// Fit a Gaussian process to a light curve, then predict and sample.
    Gp(GpArgs),
}

/// Options shared by the grid commands.
#[derive(Debug, Args, Clone)]
pub struct GridArgs {
    /// Model grid file (.json, or .fits/.mod with the `fits` feature).
    ///
    /// Falls back to SPECGRID_MODEL (environment or .env).
    #[arg(short, long, value_name = "PATH")]
    pub model: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct SpectrumArgs {
    #[command(flatten)]
    pub grid: GridArgs,

    /// Parameter override, repeatable (e.g. `--set Gamma=1.9`).
    #[arg(short = 's', long = "set", value_name = "NAME=VALUE", value_parser = parse_override)]
    pub overrides: Vec<(String, f64)>,

    /// Lower edge of the energy range.
    #[arg(long, requires = "energy_max")]
    pub energy_min: Option<f64>,

    /// Upper edge of the energy range (exclusive).
    #[arg(long, requires = "energy_min")]
    pub energy_max: Option<f64>,

    /// Export the spectrum (`.json` writes JSON, anything else CSV).
    #[arg(long, value_name = "PATH")]
    pub export: Option<PathBuf>,
}

impl SpectrumArgs {
    /// Overrides as a map; later `--set` flags win over earlier ones.
    pub fn override_map(&self) -> Overrides {
        self.overrides.iter().cloned().collect()
    }

    pub fn energy_range(&self) -> Option<(f64, f64)> {
        self.energy_min.zip(self.energy_max)
    }
}

#[derive(Debug, Args, Clone)]
pub struct GpArgs {
    /// Light-curve CSV with `time`, `rate` and optional `error` columns.
    #[arg(short, long, value_name = "CSV")]
    pub input: PathBuf,

    /// Quality factor of the SHO kernel (held fixed during the fit).
    #[arg(long, default_value_t = std::f64::consts::FRAC_1_SQRT_2)]
    pub q: f64,

    /// Initial undamped angular frequency of the SHO kernel.
    #[arg(long, default_value_t = 1e-5)]
    pub w0: f64,

    /// Ignore the error column.
    #[arg(long)]
    pub no_errors: bool,

    /// Add a white-noise term to the kernel.
    #[arg(long)]
    pub noise_kernel: bool,

    /// Model the logarithm of the rate.
    #[arg(long)]
    pub lognorm: bool,

    /// Keep zero-rate bins instead of dropping them as gaps.
    #[arg(long)]
    pub keep_gaps: bool,

    /// Drop NaN bins (only when gaps are kept).
    #[arg(long)]
    pub remove_nan: bool,

    /// Skip hyperparameter fitting.
    #[arg(long)]
    pub no_fit: bool,

    /// Extra randomized optimizer starts.
    #[arg(long, default_value_t = 0)]
    pub restarts: usize,

    /// Number of conditional samples to draw.
    #[arg(long, default_value_t = 0)]
    pub samples: usize,

    /// Random seed for restarts and sampling.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Write the predicted light curve to CSV.
    #[arg(long, value_name = "PATH")]
    pub predict_out: Option<PathBuf>,

    /// Write the conditional samples to CSV.
    #[arg(long, value_name = "PATH")]
    pub samples_out: Option<PathBuf>,

    /// Write the fit report to JSON.
    #[arg(long, value_name = "PATH")]
    pub report_out: Option<PathBuf>,
}

/// Parse a `NAME=VALUE` override.
pub fn parse_override(s: &str) -> Result<(String, f64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{s}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing parameter name in '{s}'"));
    }
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid value for '{name}': '{}'", value.trim()))?;
    Ok((name.to_string(), value))
}
