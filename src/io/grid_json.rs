//! Portable JSON representation of a model grid.
//!
//! ```json
//! {
//!   "energies":   [{"low": 0.1, "high": 0.2}, ...],
//!   "parameters": [{"name": "Gamma", "num_values": 3, "values": [1.0, 1.5, 2.0], "initial": 1.5}, ...],
//!   "spectra":    [[...], ...]
//! }
//! ```
//!
//! `num_values` is optional and defaults to `values.len()`; when present it
//! must agree (checked when the model is opened). The field aliases follow
//! the column names of XSPEC table models (`ENERG_LO`, `NUMBVALS`, ...), so
//! a table dumped column-by-column loads unchanged.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{EnergyBin, ParameterAxis};
use crate::error::GridError;
use crate::grid::InMemorySource;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BinRecord {
    #[serde(alias = "ENERG_LO")]
    low: f64,
    #[serde(alias = "ENERG_HI")]
    high: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ParameterRecord {
    #[serde(alias = "NAME")]
    name: String,
    #[serde(alias = "NUMBVALS", default, skip_serializing_if = "Option::is_none")]
    num_values: Option<usize>,
    #[serde(alias = "VALUE")]
    values: Vec<f64>,
    #[serde(alias = "INITIAL")]
    initial: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GridFile {
    #[serde(alias = "ENERGIES")]
    energies: Vec<BinRecord>,
    #[serde(alias = "PARAMETERS")]
    parameters: Vec<ParameterRecord>,
    #[serde(alias = "SPECTRA", alias = "INTPSPEC")]
    spectra: Vec<Vec<f64>>,
}

/// Read a JSON grid file into memory.
pub fn read_json_grid(path: &Path) -> Result<InMemorySource, GridError> {
    let file = File::open(path).map_err(|source| GridError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let grid: GridFile = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| GridError::Format(format!("invalid grid JSON '{}': {e}", path.display())))?;

    let energy_bins = grid
        .energies
        .into_iter()
        .map(|b| EnergyBin::new(b.low, b.high))
        .collect();
    let parameters = grid
        .parameters
        .into_iter()
        .map(|p| ParameterAxis {
            num_values: p.num_values.unwrap_or(p.values.len()),
            name: p.name,
            values: p.values,
            initial: p.initial,
        })
        .collect();

    Ok(InMemorySource::new(energy_bins, parameters, grid.spectra))
}

/// Write an in-memory grid as JSON.
pub fn write_json_grid(path: &Path, source: &InMemorySource) -> Result<(), GridError> {
    let io_err = |source| GridError::Io {
        path: path.display().to_string(),
        source,
    };
    let file = File::create(path).map_err(io_err)?;

    let grid = GridFile {
        energies: source
            .energy_bins
            .iter()
            .map(|b| BinRecord {
                low: b.low,
                high: b.high,
            })
            .collect(),
        parameters: source
            .parameters
            .iter()
            .map(|p| ParameterRecord {
                name: p.name.clone(),
                num_values: Some(p.num_values),
                values: p.values.clone(),
                initial: p.initial,
            })
            .collect(),
        spectra: source.spectra.clone(),
    };

    serde_json::to_writer_pretty(BufWriter::new(file), &grid)
        .map_err(|e| GridError::Format(format!("failed to write grid JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Overrides;
    use crate::grid::SpectralModel;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("specgrid_{}_{name}", std::process::id()))
    }

    #[test]
    fn written_grid_reloads_into_same_model() {
        let source = InMemorySource::new(
            vec![EnergyBin::new(1.0, 2.0), EnergyBin::new(2.0, 4.0)],
            vec![ParameterAxis::new("kT", vec![0.5, 1.0], 1.0)],
            vec![vec![1.0, 2.0], vec![3.0, 4.0]],
        );
        let path = temp_path("roundtrip.json");
        write_json_grid(&path, &source).unwrap();
        let loaded = read_json_grid(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, source);

        let mut model = SpectralModel::open(loaded).unwrap();
        let curve = model.spectrum(&Overrides::new(), None).unwrap();
        assert_eq!(curve.y, vec![3.0, 4.0]);
    }

    #[test]
    fn accepts_table_model_column_names() {
        let path = temp_path("columns.json");
        std::fs::write(
            &path,
            r#"{
                "ENERGIES": [{"ENERG_LO": 0.0, "ENERG_HI": 1.0}],
                "PARAMETERS": [{"NAME": "A", "NUMBVALS": 2, "VALUE": [1.0, 2.0], "INITIAL": 2.0}],
                "SPECTRA": [[5.0], [6.0]]
            }"#,
        )
        .unwrap();
        let loaded = read_json_grid(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded.parameters[0].num_values, 2);
        assert_eq!(loaded.spectra.len(), 2);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read_json_grid(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, GridError::Io { .. }));
    }

    #[test]
    fn malformed_json_is_format_error() {
        let path = temp_path("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = read_json_grid(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(matches!(err, GridError::Format(_)));
    }
}
