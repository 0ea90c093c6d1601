//! Top-level application orchestration.
//!
//! `src/main.rs` stays tiny; this module is the "real main" that:
//! - loads `.env` and initializes logging
//! - parses CLI arguments
//! - runs the grid or regression pipeline
//! - prints reports and writes optional exports

use std::path::{Path, PathBuf};

use clap::Parser;

use crate::cli::{Cli, Command, GpArgs, GridArgs, SpectrumArgs};
use crate::error::AppError;
use crate::gp::RegressionOptions;

pub mod pipeline;

use pipeline::{RegressionConfig, SpectrumConfig};

/// Environment variable naming the default model grid.
pub const MODEL_ENV: &str = "SPECGRID_MODEL";

/// Entry point for the `specgrid` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Params(args) => handle_params(&args),
        Command::Spectrum(args) => handle_spectrum(&args),
        Command::Gp(args) => handle_gp(&args),
    }
}

fn init_logging(verbose: bool) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    // A second init (e.g. from tests) is harmless.
    builder.try_init().ok();
}

fn handle_params(args: &GridArgs) -> Result<(), AppError> {
    let path = resolve_model_path(args)?;
    let model = crate::io::open_grid(&path)?;
    print!("{}", crate::report::format_parameters(model.grid()));
    Ok(())
}

fn handle_spectrum(args: &SpectrumArgs) -> Result<(), AppError> {
    let config = spectrum_config_from_args(args)?;
    let mut model = crate::io::open_grid(&config.model)?;
    let out = pipeline::run_spectrum(&mut model, &config)?;

    print!("{}", crate::report::format_selection(&out.snapped, out.row));
    print!("{}", crate::report::format_spectrum_summary(&out.curve));

    if let Some(path) = &config.export {
        if has_extension(path, "json") {
            crate::io::write_curve_json(path, &out.curve)?;
        } else {
            crate::io::write_curve_csv(path, &out.curve)?;
        }
        log::info!("wrote spectrum to {}", path.display());
    }
    Ok(())
}

fn handle_gp(args: &GpArgs) -> Result<(), AppError> {
    let config = regression_config_from_args(args);
    let lc = crate::io::read_light_curve(&config.input)?;
    if config.options.use_errors && !crate::io::has_errors(&lc) {
        log::info!("{} has no error column; fitting without measurement errors", config.input.display());
    }
    let out = pipeline::run_regression(lc, &config)?;

    print!(
        "{}",
        crate::report::format_fit_summary(&out.data, &out.kernel, out.fit.as_ref(), out.log_likelihood)
    );

    if let Some(path) = &config.predict_out {
        crate::io::write_light_curve_csv(path, &out.prediction)?;
        log::info!("wrote prediction ({} points) to {}", out.prediction.len(), path.display());
    }
    if let Some(path) = &config.samples_out {
        crate::io::write_samples_csv(path, &out.samples)?;
        log::info!("wrote {} samples to {}", out.samples.len(), path.display());
    }
    if let Some(path) = &config.report_out {
        match &out.fit {
            Some(report) => crate::io::write_json(path, report, "fit report")?,
            None => log::warn!("no fit was run; skipping {}", path.display()),
        }
    }
    Ok(())
}

/// `--model`, else `SPECGRID_MODEL` from the environment (or `.env`).
pub fn resolve_model_path(args: &GridArgs) -> Result<PathBuf, AppError> {
    if let Some(path) = &args.model {
        return Ok(path.clone());
    }
    std::env::var(MODEL_ENV)
        .map(PathBuf::from)
        .map_err(|_| AppError::new(2, format!("No model grid given: pass --model or set {MODEL_ENV} (.env).")))
}

pub fn spectrum_config_from_args(args: &SpectrumArgs) -> Result<SpectrumConfig, AppError> {
    Ok(SpectrumConfig {
        model: resolve_model_path(&args.grid)?,
        overrides: args.override_map(),
        energy_range: args.energy_range(),
        export: args.export.clone(),
    })
}

pub fn regression_config_from_args(args: &GpArgs) -> RegressionConfig {
    RegressionConfig {
        input: args.input.clone(),
        options: RegressionOptions {
            kernel_pars: (args.q, args.w0),
            use_errors: !args.no_errors,
            noise_kernel: args.noise_kernel,
            lognorm: args.lognorm,
            remove_gaps: !args.keep_gaps,
            remove_nan: args.remove_nan,
            run_fit: !args.no_fit,
            ..RegressionOptions::default()
        },
        restarts: args.restarts,
        samples: args.samples,
        seed: args.seed,
        predict_out: args.predict_out.clone(),
        samples_out: args.samples_out.clone(),
        report_out: args.report_out.clone(),
    }
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_model_wins_over_environment() {
        let args = GridArgs {
            model: Some(PathBuf::from("grid.json")),
        };
        assert_eq!(resolve_model_path(&args).unwrap(), PathBuf::from("grid.json"));
    }

    #[test]
    fn gp_flags_map_to_options() {
        let cli = Cli::parse_from([
            "specgrid", "gp", "--input", "lc.csv", "--lognorm", "--keep-gaps", "--no-errors", "--no-fit",
        ]);
        let Command::Gp(args) = cli.command else {
            panic!("expected gp command");
        };
        let config = regression_config_from_args(&args);
        assert!(config.options.lognorm);
        assert!(!config.options.remove_gaps);
        assert!(!config.options.use_errors);
        assert!(!config.options.run_fit);
        assert!(config.options.zero_nan);
    }

    #[test]
    fn json_extension_is_case_insensitive() {
        assert!(has_extension(Path::new("out.JSON"), "json"));
        assert!(!has_extension(Path::new("out.csv"), "json"));
    }
}
