//! Input/output helpers.
//!
//! - model grid files: JSON (`grid_json`) and FITS table models (`fits`,
//!   behind the `fits` cargo feature)
//! - light-curve CSV ingest (`lightcurve`)
//! - result exports (CSV/JSON) (`export`)

pub mod export;
#[cfg(feature = "fits")]
pub mod fits;
pub mod grid_json;
pub mod lightcurve;

pub use export::*;
#[cfg(feature = "fits")]
pub use fits::FitsGridFile;
pub use grid_json::*;
pub use lightcurve::*;

use std::path::Path;

use crate::error::GridError;
use crate::grid::{GridSource, SpectralModel};

/// Open a model grid, choosing the backend from the file extension.
pub fn open_grid(path: &Path) -> Result<SpectralModel<Box<dyn GridSource>>, GridError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let source: Box<dyn GridSource> = match ext.as_str() {
        "json" => Box::new(read_json_grid(path)?),
        #[cfg(feature = "fits")]
        "fits" | "fit" | "mod" => Box::new(FitsGridFile::open(path)?),
        #[cfg(not(feature = "fits"))]
        "fits" | "fit" | "mod" => {
            return Err(GridError::Format(format!(
                "'{}' is a FITS grid; rebuild with `--features fits`",
                path.display()
            )));
        }
        other => {
            return Err(GridError::Format(format!(
                "unrecognized extension '{other}' for '{}' (expected .json or .fits)",
                path.display()
            )));
        }
    };

    SpectralModel::open(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EnergyBin, Overrides, ParameterAxis};
    use crate::grid::InMemorySource;

    #[test]
    fn unknown_extension_is_format_error() {
        let err = open_grid(Path::new("grid.txt")).unwrap_err();
        assert!(matches!(err, GridError::Format(_)));
    }

    #[test]
    fn json_grid_opens_as_boxed_model() {
        let source = InMemorySource::new(
            vec![EnergyBin::new(1.0, 2.0)],
            vec![ParameterAxis::new("A", vec![1.0, 2.0, 3.0], 2.0)],
            vec![vec![10.0], vec![20.0], vec![30.0]],
        );
        let path = std::env::temp_dir().join(format!("specgrid_open_{}.JSON", std::process::id()));
        write_json_grid(&path, &source).unwrap();
        let mut model = open_grid(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let mut overrides = Overrides::new();
        overrides.insert("A".into(), 2.9);
        assert_eq!(model.spectrum_number(&overrides).unwrap(), 2);
        assert_eq!(model.spectrum(&overrides, None).unwrap().y, vec![30.0]);
    }
}
