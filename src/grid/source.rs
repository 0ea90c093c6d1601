//! Grid storage backends.
//!
//! A backend exposes the three tables a model grid consists of (energies,
//! parameters, spectra). It is owned by the `SpectralModel` for the model's
//! whole lifetime and released when the model is dropped.

use crate::domain::{EnergyBin, ParameterAxis};
use crate::error::GridError;

pub trait GridSource: std::fmt::Debug {
    /// Energy bins of the spectral axis.
    fn energy_bins(&mut self) -> Result<Vec<EnergyBin>, GridError>;

    /// Parameter axes, in declared (flattening) order.
    fn parameters(&mut self) -> Result<Vec<ParameterAxis>, GridError>;

    /// Number of rows in the spectra table.
    fn row_count(&mut self) -> Result<usize, GridError>;

    /// Read one row of the spectra table.
    fn read_row(&mut self, row: usize) -> Result<Vec<f64>, GridError>;
}

impl<S: GridSource + ?Sized> GridSource for Box<S> {
    fn energy_bins(&mut self) -> Result<Vec<EnergyBin>, GridError> {
        (**self).energy_bins()
    }

    fn parameters(&mut self) -> Result<Vec<ParameterAxis>, GridError> {
        (**self).parameters()
    }

    fn row_count(&mut self) -> Result<usize, GridError> {
        (**self).row_count()
    }

    fn read_row(&mut self, row: usize) -> Result<Vec<f64>, GridError> {
        (**self).read_row(row)
    }
}

/// A fully materialized grid.
#[derive(Debug, Clone, PartialEq)]
pub struct InMemorySource {
    pub energy_bins: Vec<EnergyBin>,
    pub parameters: Vec<ParameterAxis>,
    pub spectra: Vec<Vec<f64>>,
}

impl InMemorySource {
    pub fn new(
        energy_bins: Vec<EnergyBin>,
        parameters: Vec<ParameterAxis>,
        spectra: Vec<Vec<f64>>,
    ) -> Self {
        Self {
            energy_bins,
            parameters,
            spectra,
        }
    }
}

impl GridSource for InMemorySource {
    fn energy_bins(&mut self) -> Result<Vec<EnergyBin>, GridError> {
        Ok(self.energy_bins.clone())
    }

    fn parameters(&mut self) -> Result<Vec<ParameterAxis>, GridError> {
        Ok(self.parameters.clone())
    }

    fn row_count(&mut self) -> Result<usize, GridError> {
        Ok(self.spectra.len())
    }

    fn read_row(&mut self, row: usize) -> Result<Vec<f64>, GridError> {
        self.spectra
            .get(row)
            .cloned()
            .ok_or(GridError::RowOutOfRange {
                row,
                rows: self.spectra.len(),
            })
    }
}
