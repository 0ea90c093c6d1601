//! Spectrum extraction by row index, with optional energy-range cropping.

use crate::domain::{Curve, DisplayHints, EnergyBin};
use crate::error::GridError;
use crate::grid::index::Grid;
use crate::grid::source::GridSource;

#[derive(Debug, Clone, Copy)]
pub struct SpectrumExtractor<'g> {
    bins: &'g [EnergyBin],
    row_count: usize,
}

impl<'g> SpectrumExtractor<'g> {
    pub fn new(grid: &'g Grid) -> Self {
        Self {
            bins: grid.energy_bins(),
            row_count: grid.row_count(),
        }
    }

    /// Index of the bin with `low <= value < high`.
    pub fn find_bin(&self, value: f64) -> Result<usize, GridError> {
        self.bins
            .iter()
            .position(|b| b.contains(value))
            .ok_or(GridError::OutOfRange { value })
    }

    /// Bin midpoints, `0.5 * (low + high)`.
    pub fn energy_axis(&self) -> Vec<f64> {
        self.bins.iter().map(EnergyBin::midpoint).collect()
    }

    /// Exclusive end index for a range's upper bound.
    ///
    /// Same as `find_bin`, except that the top edge of the last bin closes the
    /// range at the end of the spectral axis.
    fn end_bin(&self, value: f64) -> Result<usize, GridError> {
        match self.find_bin(value) {
            Ok(i) => Ok(i),
            Err(_) if self.bins.last().is_some_and(|b| b.high == value) => Ok(self.bins.len()),
            Err(e) => Err(e),
        }
    }

    /// Fetch row `row` paired with the energy axis.
    ///
    /// With `range = Some((lo, hi))` the curve is cut to bins
    /// `[find_bin(lo), find_bin(hi))`. The upper bin itself is excluded, and a
    /// range whose upper bin does not lie above the lower one yields an empty
    /// curve.
    pub fn extract<S: GridSource + ?Sized>(
        &self,
        source: &mut S,
        row: usize,
        range: Option<(f64, f64)>,
    ) -> Result<Curve, GridError> {
        if row >= self.row_count {
            return Err(GridError::RowOutOfRange {
                row,
                rows: self.row_count,
            });
        }

        let (imin, imax) = match range {
            Some((lo, hi)) => (self.find_bin(lo)?, self.end_bin(hi)?),
            None => (0, self.bins.len()),
        };

        let spectrum = source.read_row(row)?;
        if spectrum.len() != self.bins.len() {
            return Err(GridError::Corrupt(format!(
                "spectrum {row} has {} values for {} energy bins",
                spectrum.len(),
                self.bins.len()
            )));
        }

        let (x, y) = if imax > imin {
            (
                self.bins[imin..imax].iter().map(EnergyBin::midpoint).collect(),
                spectrum[imin..imax].to_vec(),
            )
        } else {
            (Vec::new(), Vec::new())
        };

        Ok(Curve {
            x,
            y,
            hints: DisplayHints::spectrum(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ParameterAxis, Scale};
    use crate::grid::source::InMemorySource;

    fn three_bin_source() -> InMemorySource {
        InMemorySource::new(
            vec![
                EnergyBin::new(0.0, 1.0),
                EnergyBin::new(1.0, 2.0),
                EnergyBin::new(2.0, 3.0),
            ],
            vec![ParameterAxis::new("A", vec![0.0, 1.0], 0.0)],
            vec![vec![10.0, 11.0, 12.0], vec![20.0, 21.0, 22.0]],
        )
    }

    fn grid_of(source: &InMemorySource) -> Grid {
        Grid::new(
            source.parameters.clone(),
            source.energy_bins.clone(),
            source.spectra.len(),
        )
        .unwrap()
    }

    #[test]
    fn find_bin_uses_half_open_bins() {
        let source = three_bin_source();
        let grid = grid_of(&source);
        let ex = SpectrumExtractor::new(&grid);
        assert_eq!(ex.find_bin(1.5).unwrap(), 1);
        assert_eq!(ex.find_bin(0.0).unwrap(), 0);
        assert_eq!(ex.find_bin(2.0).unwrap(), 2);
        assert!(matches!(ex.find_bin(3.0), Err(GridError::OutOfRange { .. })));
        assert!(matches!(ex.find_bin(-0.1), Err(GridError::OutOfRange { .. })));
    }

    #[test]
    fn full_extract_returns_stored_row() {
        let mut source = three_bin_source();
        let grid = grid_of(&source);
        let curve = SpectrumExtractor::new(&grid).extract(&mut source, 1, None).unwrap();
        assert_eq!(curve.y, vec![20.0, 21.0, 22.0]);
        assert_eq!(curve.x, vec![0.5, 1.5, 2.5]);
        assert_eq!(curve.hints.x_scale, Scale::Log);
        assert_eq!(curve.hints.y_label, "Count Rate");
    }

    #[test]
    fn range_keeps_half_open_bin_interval() {
        let mut source = three_bin_source();
        let grid = grid_of(&source);
        let ex = SpectrumExtractor::new(&grid);

        // find_bin(1) = 1, find_bin(2.5) = 2 -> bins [1, 2)
        let curve = ex.extract(&mut source, 0, Some((1.0, 2.5))).unwrap();
        assert_eq!(curve.x, vec![1.5]);
        assert_eq!(curve.y, vec![11.0]);

        let curve = ex.extract(&mut source, 0, Some((0.2, 2.9))).unwrap();
        assert_eq!(curve.y, vec![10.0, 11.0]);
    }

    #[test]
    fn range_up_to_top_edge_keeps_last_bins() {
        let mut source = three_bin_source();
        let grid = grid_of(&source);
        let ex = SpectrumExtractor::new(&grid);
        let curve = ex.extract(&mut source, 0, Some((1.0, 3.0))).unwrap();
        assert_eq!(curve.x, vec![1.5, 2.5]);
        assert_eq!(curve.y, vec![11.0, 12.0]);
    }

    #[test]
    fn range_beyond_spectral_axis_fails() {
        let mut source = three_bin_source();
        let grid = grid_of(&source);
        let ex = SpectrumExtractor::new(&grid);
        let err = ex.extract(&mut source, 0, Some((1.0, 3.5))).unwrap_err();
        assert!(matches!(err, GridError::OutOfRange { value } if value == 3.5));
        let err = ex.extract(&mut source, 0, Some((3.0, 3.0))).unwrap_err();
        assert!(matches!(err, GridError::OutOfRange { .. }));
    }

    #[test]
    fn inverted_range_gives_empty_curve() {
        let mut source = three_bin_source();
        let grid = grid_of(&source);
        let ex = SpectrumExtractor::new(&grid);
        assert!(ex.extract(&mut source, 0, Some((2.5, 0.5))).unwrap().is_empty());
        assert!(ex.extract(&mut source, 0, Some((1.2, 1.8))).unwrap().is_empty());
    }

    #[test]
    fn row_outside_table_fails() {
        let mut source = three_bin_source();
        let grid = grid_of(&source);
        let err = SpectrumExtractor::new(&grid).extract(&mut source, 2, None).unwrap_err();
        assert!(matches!(err, GridError::RowOutOfRange { row: 2, rows: 2 }));
    }

    #[test]
    fn short_row_is_reported_as_corrupt() {
        let mut source = three_bin_source();
        source.spectra[1].pop();
        let grid = grid_of(&source);
        let err = SpectrumExtractor::new(&grid).extract(&mut source, 1, None).unwrap_err();
        assert!(matches!(err, GridError::Corrupt(_)));
    }
}
