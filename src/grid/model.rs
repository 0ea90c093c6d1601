//! A loaded spectral model: backend + grid + current parameter selection.

use crate::domain::{Curve, Overrides};
use crate::error::GridError;
use crate::grid::extract::SpectrumExtractor;
use crate::grid::index::{CurrentSelection, Grid, ParameterGridIndex, Snapped};
use crate::grid::source::GridSource;

/// Tabulated spectral model.
///
/// The backend is acquired by [`SpectralModel::open`] and released when the
/// model is dropped, on every path (including a failed `open`, which drops
/// the backend before returning the error).
#[derive(Debug)]
pub struct SpectralModel<S: GridSource> {
    source: S,
    grid: Grid,
    selection: CurrentSelection,
}

impl<S: GridSource> SpectralModel<S> {
    /// Read the energy and parameter tables and validate them against the
    /// spectra table size.
    pub fn open(mut source: S) -> Result<Self, GridError> {
        let energy_bins = source.energy_bins()?;
        let axes = source.parameters()?;
        let rows = source.row_count()?;
        let grid = Grid::new(axes, energy_bins, rows)?;
        let selection = CurrentSelection::from_grid(&grid);

        log::info!(
            "loaded model grid: {} parameters, {} spectra, {} energy bins",
            grid.axes().len(),
            grid.row_count(),
            grid.energy_bins().len()
        );

        Ok(Self {
            source,
            grid,
            selection,
        })
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn selection(&self) -> &CurrentSelection {
        &self.selection
    }

    /// Row of the spectra table selected by `overrides` on top of the
    /// current selection.
    pub fn spectrum_number(&self, overrides: &Overrides) -> Result<usize, GridError> {
        ParameterGridIndex::new(&self.grid).resolve(&self.selection, overrides)
    }

    /// Tabulated values each parameter snaps to for `overrides`.
    pub fn snap(&self, overrides: &Overrides) -> Result<Vec<Snapped>, GridError> {
        ParameterGridIndex::new(&self.grid).snap(&self.selection, overrides)
    }

    pub fn find_energy(&self, value: f64) -> Result<usize, GridError> {
        SpectrumExtractor::new(&self.grid).find_bin(value)
    }

    pub fn energy_axis(&self) -> Vec<f64> {
        SpectrumExtractor::new(&self.grid).energy_axis()
    }

    /// Spectrum at the grid point nearest to the requested parameters,
    /// optionally restricted to an energy range.
    pub fn spectrum(
        &mut self,
        overrides: &Overrides,
        range: Option<(f64, f64)>,
    ) -> Result<Curve, GridError> {
        let row = self.spectrum_number(overrides)?;
        SpectrumExtractor::new(&self.grid).extract(&mut self.source, row, range)
    }

    /// Spectrum stored at `row`.
    pub fn spectrum_at(&mut self, row: usize, range: Option<(f64, f64)>) -> Result<Curve, GridError> {
        SpectrumExtractor::new(&self.grid).extract(&mut self.source, row, range)
    }

    /// Make `overrides` the new defaults for subsequent lookups.
    pub fn persist(&mut self, overrides: &Overrides) -> Result<(), GridError> {
        self.selection.apply(&self.grid, overrides)
    }

    /// Go back to the declared initial values.
    pub fn reset_selection(&mut self) {
        self.selection = CurrentSelection::from_grid(&self.grid);
    }
}
