//! XSPEC table-model grids stored as FITS.
//!
//! Layout read here:
//!
//! - `ENERGIES`: `ENERG_LO`, `ENERG_HI` (one row per bin)
//! - `PARAMETERS`: `NAME`, `NUMBVALS`, `VALUE` (vector), `INITIAL`
//! - `SPECTRA`: `INTPSPEC` (vector, one row per parameter combination)
//!
//! Spectra rows are read on demand; the file handle stays open for the life
//! of the source and is closed by `FitsFile`'s `Drop`.

use std::fmt;
use std::path::{Path, PathBuf};

use fitsio::FitsFile;
use fitsio::hdu::{FitsHdu, HduInfo};

use crate::domain::{EnergyBin, ParameterAxis};
use crate::error::GridError;
use crate::grid::GridSource;

const ENERGIES: &str = "ENERGIES";
const PARAMETERS: &str = "PARAMETERS";
const SPECTRA: &str = "SPECTRA";

pub struct FitsGridFile {
    fits: FitsFile,
    path: PathBuf,
}

impl fmt::Debug for FitsGridFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FitsGridFile").field("path", &self.path).finish()
    }
}

impl FitsGridFile {
    pub fn open(path: &Path) -> Result<Self, GridError> {
        let fits = FitsFile::open(path).map_err(|e| GridError::Backend {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        log::debug!("opened FITS grid {}", path.display());
        Ok(Self {
            fits,
            path: path.to_path_buf(),
        })
    }

    fn err(&self, message: impl fmt::Display) -> GridError {
        GridError::Backend {
            path: self.path.display().to_string(),
            message: message.to_string(),
        }
    }

    fn table(&mut self, name: &str) -> Result<FitsHdu, GridError> {
        self.fits
            .hdu(name)
            .map_err(|e| self.err(format!("missing {name} extension: {e}")))
    }

    fn num_rows(&self, hdu: &FitsHdu) -> Result<usize, GridError> {
        match &hdu.info {
            HduInfo::TableInfo { num_rows, .. } => Ok(*num_rows),
            _ => Err(self.err("expected a binary table")),
        }
    }

    /// Elements per cell of column `name`.
    fn repeat(&self, hdu: &FitsHdu, name: &str) -> Result<usize, GridError> {
        let HduInfo::TableInfo {
            column_descriptions,
            ..
        } = &hdu.info
        else {
            return Err(self.err("expected a binary table"));
        };
        column_descriptions
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .map(|c| c.data_type.repeat)
            .ok_or_else(|| self.err(format!("missing column {name}")))
    }
}

impl GridSource for FitsGridFile {
    fn energy_bins(&mut self) -> Result<Vec<EnergyBin>, GridError> {
        let hdu = self.table(ENERGIES)?;
        let lo: Vec<f64> = hdu
            .read_col(&mut self.fits, "ENERG_LO")
            .map_err(|e| self.err(e))?;
        let hi: Vec<f64> = hdu
            .read_col(&mut self.fits, "ENERG_HI")
            .map_err(|e| self.err(e))?;
        if lo.len() != hi.len() {
            return Err(GridError::Corrupt(format!(
                "{} ENERG_LO values but {} ENERG_HI values",
                lo.len(),
                hi.len()
            )));
        }
        Ok(lo.into_iter().zip(hi).map(|(l, h)| EnergyBin::new(l, h)).collect())
    }

    fn parameters(&mut self) -> Result<Vec<ParameterAxis>, GridError> {
        let hdu = self.table(PARAMETERS)?;
        let names: Vec<String> = hdu.read_col(&mut self.fits, "NAME").map_err(|e| self.err(e))?;
        let counts: Vec<i64> = hdu
            .read_col(&mut self.fits, "NUMBVALS")
            .map_err(|e| self.err(e))?;
        let initial: Vec<f64> = hdu
            .read_col(&mut self.fits, "INITIAL")
            .map_err(|e| self.err(e))?;
        let repeat = self.repeat(&hdu, "VALUE")?;
        // Vector column: `repeat` values per row, flattened.
        let flat: Vec<f64> = hdu.read_col(&mut self.fits, "VALUE").map_err(|e| self.err(e))?;
        if flat.len() != names.len() * repeat {
            return Err(GridError::Corrupt(format!(
                "VALUE holds {} numbers for {} parameters of {repeat} values",
                flat.len(),
                names.len()
            )));
        }

        let mut axes = Vec::with_capacity(names.len());
        for (row, name) in names.into_iter().enumerate() {
            let declared = counts.get(row).copied().unwrap_or(0);
            let num_values = usize::try_from(declared)
                .map_err(|_| GridError::Corrupt(format!("parameter '{name}' declares {declared} values")))?;
            if num_values > repeat {
                return Err(GridError::Corrupt(format!(
                    "parameter '{name}' declares {num_values} values but VALUE holds {repeat}"
                )));
            }
            let start = row * repeat;
            axes.push(ParameterAxis {
                name: name.trim().to_string(),
                num_values,
                values: flat[start..start + num_values].to_vec(),
                initial: initial.get(row).copied().unwrap_or(f64::NAN),
            });
        }
        Ok(axes)
    }

    fn row_count(&mut self) -> Result<usize, GridError> {
        let hdu = self.table(SPECTRA)?;
        self.num_rows(&hdu)
    }

    fn read_row(&mut self, row: usize) -> Result<Vec<f64>, GridError> {
        let hdu = self.table(SPECTRA)?;
        let rows = self.num_rows(&hdu)?;
        if row >= rows {
            return Err(GridError::RowOutOfRange { row, rows });
        }
        hdu.read_col_range(&mut self.fits, "INTPSPEC", &(row..row + 1))
            .map_err(|e| self.err(e))
    }
}

#[cfg(test)]
mod tests {
    use fitsio::tables::{ColumnDataType, ColumnDescription};

    use super::*;
    use crate::domain::Overrides;
    use crate::grid::SpectralModel;

    fn column(name: &str, kind: ColumnDataType, repeat: usize) -> fitsio::tables::ConcreteColumnDescription {
        ColumnDescription::new(name)
            .with_type(kind)
            .that_repeats(repeat)
            .create()
            .unwrap()
    }

    /// Two axes (A: 2 values, B: 3 values) padded to a VALUE width of 3.
    fn write_grid(path: &Path) {
        std::fs::remove_file(path).ok();
        let mut fits = FitsFile::create(path).open().unwrap();

        let energies = [
            column("ENERG_LO", ColumnDataType::Double, 1),
            column("ENERG_HI", ColumnDataType::Double, 1),
        ];
        let hdu = fits.create_table(ENERGIES, &energies).unwrap();
        hdu.write_col(&mut fits, "ENERG_LO", &[1.0, 2.0]).unwrap();
        hdu.write_col(&mut fits, "ENERG_HI", &[2.0, 3.0]).unwrap();

        let parameters = [
            column("NAME", ColumnDataType::String, 12),
            column("NUMBVALS", ColumnDataType::Int, 1),
            column("VALUE", ColumnDataType::Double, 3),
            column("INITIAL", ColumnDataType::Double, 1),
        ];
        let hdu = fits.create_table(PARAMETERS, &parameters).unwrap();
        hdu.write_col(&mut fits, "NAME", &["A".to_string(), "B".to_string()])
            .unwrap();
        hdu.write_col(&mut fits, "NUMBVALS", &[2i32, 3]).unwrap();
        hdu.write_col(&mut fits, "VALUE", &[1.0, 2.0, 0.0, 10.0, 20.0, 30.0])
            .unwrap();
        hdu.write_col(&mut fits, "INITIAL", &[1.0, 10.0]).unwrap();

        let spectra = [column("INTPSPEC", ColumnDataType::Double, 2)];
        let hdu = fits.create_table(SPECTRA, &spectra).unwrap();
        let flat: Vec<f64> = (0..6).flat_map(|r| [r as f64, r as f64 + 0.5]).collect();
        hdu.write_col(&mut fits, "INTPSPEC", &flat).unwrap();
    }

    #[test]
    fn reads_vector_columns_without_padding() {
        let path = std::env::temp_dir().join(format!("specgrid-fits-{}.fits", std::process::id()));
        write_grid(&path);

        let mut source = FitsGridFile::open(&path).unwrap();
        let axes = source.parameters().unwrap();
        assert_eq!(axes[0].name, "A");
        assert_eq!(axes[0].values, vec![1.0, 2.0]);
        assert_eq!(axes[1].values, vec![10.0, 20.0, 30.0]);
        assert_eq!(source.row_count().unwrap(), 6);
        assert_eq!(source.read_row(4).unwrap(), vec![4.0, 4.5]);
        assert!(matches!(
            source.read_row(6),
            Err(GridError::RowOutOfRange { row: 6, rows: 6 })
        ));

        let mut model = SpectralModel::open(source).unwrap();
        // B=25 ties between 20 and 30; the lower index wins. Row = 1 * 3 + 1.
        let overrides: Overrides = [("A".to_string(), 2.0), ("B".to_string(), 25.0)].into_iter().collect();
        assert_eq!(model.spectrum_number(&overrides).unwrap(), 4);

        drop(model);
        std::fs::remove_file(&path).ok();
    }
}
