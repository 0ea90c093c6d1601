//! Light-curve CSV ingest.
//!
//! Expected schema (header names are case-insensitive, `#` starts a comment):
//!
//! ```text
//! time,rate,error
//! 0.0,12.1,0.4
//! ```
//!
//! `error` is optional. Empty or unparsable rate cells are read as NaN so the
//! regression pre-processing (`zero_nan` / `remove_nan`) decides what happens
//! to them; a bad `time` cell is a hard error because the series would no
//! longer be ordered.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use crate::domain::LightCurve;
use crate::error::AppError;

const TIME_COLUMNS: [&str; 3] = ["time", "t", "mjd"];
const RATE_COLUMNS: [&str; 4] = ["rate", "flux", "counts", "y"];
const ERROR_COLUMNS: [&str; 4] = ["error", "err", "rate_err", "yerr"];

/// Load a light curve from a CSV file.
pub fn read_light_curve(path: &Path) -> Result<LightCurve, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::new(
            2,
            format!("Failed to open light curve '{}': {e}", path.display()),
        )
    })?;
    read_light_curve_from(file)
}

/// Parse light-curve CSV from any reader.
pub fn read_light_curve_from<R: Read>(reader: R) -> Result<LightCurve, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let time_idx = find_column(&header_map, &TIME_COLUMNS)
        .ok_or_else(|| AppError::new(2, "Missing required column: `time`"))?;
    let rate_idx = find_column(&header_map, &RATE_COLUMNS)
        .ok_or_else(|| AppError::new(2, "Missing required column: `rate`"))?;
    let error_idx = find_column(&header_map, &ERROR_COLUMNS);

    let mut time = Vec::new();
    let mut rate = Vec::new();
    let mut error = Vec::new();

    for (idx, result) in reader.records().enumerate() {
        // records() starts after the header, lines are 1-based.
        let line = idx + 2;
        let record = result.map_err(|e| AppError::new(2, format!("line {line}: CSV parse error: {e}")))?;

        let t = record
            .get(time_idx)
            .and_then(parse_f64)
            .filter(|t| t.is_finite())
            .ok_or_else(|| AppError::new(2, format!("line {line}: invalid `time` value")))?;
        if let Some(&prev) = time.last() {
            if t < prev {
                return Err(AppError::new(
                    2,
                    format!("line {line}: time stamps must be non-decreasing ({t} after {prev})"),
                ));
            }
        }

        time.push(t);
        rate.push(record.get(rate_idx).and_then(parse_f64).unwrap_or(f64::NAN));
        error.push(
            error_idx
                .and_then(|i| record.get(i))
                .and_then(parse_f64)
                .unwrap_or(0.0),
        );
    }

    if time.is_empty() {
        return Err(AppError::new(3, "Light curve contains no rows."));
    }

    log::debug!(
        "read light curve: {} rows, error column {}",
        time.len(),
        if error_idx.is_some() { "present" } else { "absent" }
    );

    Ok(LightCurve::new(time, rate, error))
}

/// Whether the CSV provided an error column (all-zero errors otherwise).
pub fn has_errors(lc: &LightCurve) -> bool {
    lc.error.iter().any(|e| *e != 0.0)
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports may prefix the first header with a BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn find_column(header_map: &HashMap<String, usize>, names: &[&str]) -> Option<usize> {
    names.iter().find_map(|n| header_map.get(*n).copied())
}

fn parse_f64(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok()
}
