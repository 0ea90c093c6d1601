//! Export results to CSV and JSON.
//!
//! The exports are meant to be easy to consume in spreadsheets or plotting
//! scripts; columns are plain numbers with a single header line.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::domain::{Curve, LightCurve};
use crate::error::AppError;

fn create(path: &Path, what: &str) -> Result<BufWriter<File>, AppError> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|e| AppError::new(2, format!("Failed to create {what} '{}': {e}", path.display())))
}

fn write_err(what: &str) -> impl Fn(std::io::Error) -> AppError + '_ {
    move |e| AppError::new(2, format!("Failed to write {what}: {e}"))
}

/// Write a spectrum as `x,y` rows.
pub fn write_curve_csv(path: &Path, curve: &Curve) -> Result<(), AppError> {
    let mut file = create(path, "curve CSV")?;
    let err = write_err("curve CSV");

    writeln!(file, "x,y").map_err(&err)?;
    for (x, y) in curve.points() {
        writeln!(file, "{x},{y}").map_err(&err)?;
    }
    file.flush().map_err(&err)
}

/// Write a spectrum (values plus display hints) as pretty JSON.
pub fn write_curve_json(path: &Path, curve: &Curve) -> Result<(), AppError> {
    write_json(path, curve, "curve JSON")
}

/// Write any serializable value as pretty JSON (fit reports, summaries).
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T, what: &str) -> Result<(), AppError> {
    let file = create(path, what)?;
    serde_json::to_writer_pretty(file, value)
        .map_err(|e| AppError::new(2, format!("Failed to write {what}: {e}")))
}

/// Write a light curve as `time,rate,error` rows.
pub fn write_light_curve_csv(path: &Path, lc: &LightCurve) -> Result<(), AppError> {
    let mut file = create(path, "light-curve CSV")?;
    let err = write_err("light-curve CSV");

    writeln!(file, "time,rate,error").map_err(&err)?;
    for i in 0..lc.len() {
        writeln!(file, "{},{},{}", lc.time[i], lc.rate[i], lc.error[i]).map_err(&err)?;
    }
    file.flush().map_err(&err)
}

/// Write conditional draws as `time,sample_0,sample_1,...`.
///
/// All draws must share the same time stamps.
pub fn write_samples_csv(path: &Path, samples: &[LightCurve]) -> Result<(), AppError> {
    let Some(first) = samples.first() else {
        return Err(AppError::new(3, "No samples to export."));
    };
    if samples.iter().any(|s| s.time != first.time) {
        return Err(AppError::new(2, "Samples do not share the same time stamps."));
    }

    let mut file = create(path, "samples CSV")?;
    let err = write_err("samples CSV");

    let header: Vec<String> = std::iter::once("time".to_string())
        .chain((0..samples.len()).map(|i| format!("sample_{i}")))
        .collect();
    writeln!(file, "{}", header.join(",")).map_err(&err)?;

    for (i, t) in first.time.iter().enumerate() {
        let row: Vec<String> = std::iter::once(t.to_string())
            .chain(samples.iter().map(|s| s.rate[i].to_string()))
            .collect();
        writeln!(file, "{}", row.join(",")).map_err(&err)?;
    }
    file.flush().map_err(&err)
}
