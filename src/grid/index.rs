//! Parameter-grid indexing.
//!
//! A model grid is a dense rectangular table: one precomputed spectrum for
//! every combination of tabulated parameter values. Rows are stored in C
//! order over the declared parameter list, so the last parameter varies
//! fastest:
//!
//! ```text
//! row = Σ_k index[k] * Π_{j>k} num_values[j]
//! ```
//!
//! Lookup snaps each requested value to its nearest tabulated value
//! *independently per axis* and then flattens the resulting index tuple.
//! This is not a joint nearest-neighbour search over the parameter space;
//! it mirrors how rectangular grids are tabulated, and it costs
//! `O(Σ num_values)` rather than `O(Π num_values)`.

use std::collections::BTreeMap;

use crate::domain::{EnergyBin, Overrides, ParameterAxis};
use crate::error::GridError;

/// Immutable description of a loaded model grid.
#[derive(Debug, Clone)]
pub struct Grid {
    axes: Vec<ParameterAxis>,
    energy_bins: Vec<EnergyBin>,
    row_count: usize,
}

impl Grid {
    /// Build a grid, checking the load-time invariants.
    ///
    /// An axis with zero tabulated values is accepted here (the table is then
    /// empty); lookups on such a grid fail with `GridError::EmptyGrid`.
    pub fn new(
        axes: Vec<ParameterAxis>,
        energy_bins: Vec<EnergyBin>,
        row_count: usize,
    ) -> Result<Self, GridError> {
        let mut expected_rows: usize = 1;
        for (i, axis) in axes.iter().enumerate() {
            if axes[..i].iter().any(|a| a.name == axis.name) {
                return Err(GridError::Corrupt(format!(
                    "parameter '{}' is declared twice",
                    axis.name
                )));
            }
            if axis.num_values != axis.values.len() {
                return Err(GridError::Corrupt(format!(
                    "parameter '{}' declares {} values but tabulates {}",
                    axis.name,
                    axis.num_values,
                    axis.values.len()
                )));
            }
            if axis.values.iter().any(|v| !v.is_finite()) || !axis.initial.is_finite() {
                return Err(GridError::Corrupt(format!(
                    "parameter '{}' has non-finite tabulated or initial values",
                    axis.name
                )));
            }
            expected_rows = expected_rows.checked_mul(axis.num_values).ok_or_else(|| {
                GridError::Corrupt("parameter grid size overflows".to_string())
            })?;
        }

        if expected_rows != row_count {
            return Err(GridError::Corrupt(format!(
                "spectra table has {row_count} rows but the parameter grid implies {expected_rows}"
            )));
        }

        for (i, bin) in energy_bins.iter().enumerate() {
            if !(bin.low.is_finite() && bin.high.is_finite() && bin.low <= bin.high) {
                return Err(GridError::Corrupt(format!(
                    "energy bin {i} has invalid bounds [{}, {})",
                    bin.low, bin.high
                )));
            }
        }
        if let Some(i) = energy_bins.windows(2).position(|w| w[1].low < w[0].high) {
            return Err(GridError::Corrupt(format!(
                "energy bins {i} and {} overlap or are out of order",
                i + 1
            )));
        }

        Ok(Self {
            axes,
            energy_bins,
            row_count,
        })
    }

    pub fn axes(&self) -> &[ParameterAxis] {
        &self.axes
    }

    pub fn axis(&self, name: &str) -> Option<&ParameterAxis> {
        self.axes.iter().find(|a| a.name == name)
    }

    pub fn energy_bins(&self) -> &[EnergyBin] {
        &self.energy_bins
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Axis sizes in declared order.
    pub fn sizes(&self) -> Vec<usize> {
        self.axes.iter().map(|a| a.num_values).collect()
    }

    /// Reject overrides that name unknown parameters or carry non-finite values.
    pub fn check_overrides(&self, overrides: &Overrides) -> Result<(), GridError> {
        for (name, value) in overrides {
            if self.axis(name).is_none() {
                return Err(GridError::InvalidParameter {
                    name: name.clone(),
                    declared: self.declared_names(),
                });
            }
            if !value.is_finite() {
                return Err(GridError::NonFiniteValue { name: name.clone() });
            }
        }
        Ok(())
    }

    fn declared_names(&self) -> String {
        let names: Vec<&str> = self.axes.iter().map(|a| a.name.as_str()).collect();
        names.join(", ")
    }
}

/// Requested parameter values used when a lookup does not override them.
///
/// Starts out as each axis' declared initial value. Lookups never modify it;
/// callers change it explicitly via [`CurrentSelection::apply`].
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentSelection {
    values: BTreeMap<String, f64>,
}

impl CurrentSelection {
    pub fn from_grid(grid: &Grid) -> Self {
        let values = grid
            .axes()
            .iter()
            .map(|a| (a.name.clone(), a.initial))
            .collect();
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Persist validated overrides as the new stored values.
    ///
    /// Either every override is applied or none is.
    pub fn apply(&mut self, grid: &Grid, overrides: &Overrides) -> Result<(), GridError> {
        grid.check_overrides(overrides)?;
        for (name, value) in overrides {
            self.values.insert(name.clone(), *value);
        }
        Ok(())
    }
}

/// The tabulated value a requested parameter value snapped to.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapped {
    pub name: String,
    pub requested: f64,
    pub index: usize,
    pub value: f64,
}

/// Resolves requested parameter values to a row of the spectra table.
#[derive(Debug, Clone, Copy)]
pub struct ParameterGridIndex<'g> {
    grid: &'g Grid,
}

impl<'g> ParameterGridIndex<'g> {
    pub fn new(grid: &'g Grid) -> Self {
        Self { grid }
    }

    /// Flattened row index of the grid point closest (per axis) to the
    /// requested values.
    ///
    /// Parameters missing from `overrides` take their value from `selection`.
    pub fn resolve(
        &self,
        selection: &CurrentSelection,
        overrides: &Overrides,
    ) -> Result<usize, GridError> {
        let snapped = self.snap(selection, overrides)?;
        let indices: Vec<usize> = snapped.iter().map(|s| s.index).collect();
        let row = flatten(&indices, &self.grid.sizes());

        if log::log_enabled!(log::Level::Debug) {
            let parts: Vec<String> = snapped
                .iter()
                .map(|s| format!("{}={} -> {} [{}]", s.name, s.requested, s.value, s.index))
                .collect();
            log::debug!("resolved {} to row {row}", parts.join(", "));
        }

        Ok(row)
    }

    /// Per-axis snapping, in declared axis order.
    pub fn snap(
        &self,
        selection: &CurrentSelection,
        overrides: &Overrides,
    ) -> Result<Vec<Snapped>, GridError> {
        self.grid.check_overrides(overrides)?;

        self.grid
            .axes()
            .iter()
            .map(|axis| {
                let requested = overrides
                    .get(&axis.name)
                    .copied()
                    .or_else(|| selection.get(&axis.name))
                    .unwrap_or(axis.initial);
                let index = nearest_index(&axis.values, requested).ok_or_else(|| {
                    GridError::EmptyGrid {
                        name: axis.name.clone(),
                    }
                })?;
                Ok(Snapped {
                    name: axis.name.clone(),
                    requested,
                    index,
                    value: axis.values[index],
                })
            })
            .collect()
    }
}

/// Index of the tabulated value closest to `requested`.
///
/// Ties go to the lowest index: a later value only wins when it is strictly
/// closer. Returns `None` for an empty slice.
pub fn nearest_index(values: &[f64], requested: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        let dist = (v - requested).abs();
        match best {
            Some((_, best_dist)) if !(dist < best_dist) => {}
            _ => best = Some((i, dist)),
        }
    }
    best.map(|(i, _)| i)
}

/// Row-major (C order) flattening of a multi-dimensional index.
///
/// # Panics
/// Panics in debug builds if `indices` and `sizes` differ in length.
pub fn flatten(indices: &[usize], sizes: &[usize]) -> usize {
    debug_assert_eq!(indices.len(), sizes.len());
    indices
        .iter()
        .zip(sizes)
        .fold(0, |acc, (&index, &size)| acc * size + index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gamma_incl_grid() -> Grid {
        Grid::new(
            vec![
                ParameterAxis::new("Gamma", vec![1.0, 1.5, 2.0], 1.5),
                ParameterAxis::new("Incl", vec![30.0, 60.0, 90.0], 60.0),
            ],
            vec![EnergyBin::new(0.0, 1.0), EnergyBin::new(1.0, 2.0)],
            9,
        )
        .unwrap()
    }

    fn overrides(pairs: &[(&str, f64)]) -> Overrides {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn defaults_resolve_to_row_of_initial_values() {
        let grid = gamma_incl_grid();
        let selection = CurrentSelection::from_grid(&grid);
        let row = ParameterGridIndex::new(&grid)
            .resolve(&selection, &Overrides::new())
            .unwrap();
        assert_eq!(row, 1 * 3 + 1);
    }

    #[test]
    fn override_snaps_to_nearest_tabulated_value() {
        let grid = gamma_incl_grid();
        let selection = CurrentSelection::from_grid(&grid);
        let index = ParameterGridIndex::new(&grid);
        assert_eq!(index.resolve(&selection, &overrides(&[("Gamma", 1.9)])).unwrap(), 7);
        assert_eq!(
            index
                .resolve(&selection, &overrides(&[("Gamma", 1.0), ("Incl", 90.0)]))
                .unwrap(),
            2
        );
    }

    #[test]
    fn exact_tabulated_values_map_to_their_own_index() {
        let grid = gamma_incl_grid();
        let selection = CurrentSelection::from_grid(&grid);
        let index = ParameterGridIndex::new(&grid);
        for (gi, &g) in [1.0, 1.5, 2.0].iter().enumerate() {
            for (ii, &inc) in [30.0, 60.0, 90.0].iter().enumerate() {
                let row = index
                    .resolve(&selection, &overrides(&[("Gamma", g), ("Incl", inc)]))
                    .unwrap();
                assert_eq!(row, gi * 3 + ii);
            }
        }
    }

    #[test]
    fn equidistant_request_picks_lower_index() {
        assert_eq!(nearest_index(&[1.0, 2.0], 1.5), Some(0));
        assert_eq!(nearest_index(&[2.0, 1.0], 1.5), Some(0));
        assert_eq!(nearest_index(&[0.0, 1.0, 2.0, 1.0], 1.0), Some(1));

        let grid = gamma_incl_grid();
        let selection = CurrentSelection::from_grid(&grid);
        let index = ParameterGridIndex::new(&grid);
        let first = index.resolve(&selection, &overrides(&[("Incl", 45.0)])).unwrap();
        for _ in 0..10 {
            assert_eq!(index.resolve(&selection, &overrides(&[("Incl", 45.0)])).unwrap(), first);
        }
        assert_eq!(first, 1 * 3 + 0);
    }

    #[test]
    fn flatten_is_row_major() {
        assert_eq!(flatten(&[], &[]), 0);
        assert_eq!(flatten(&[2], &[5]), 2);
        assert_eq!(flatten(&[1, 2, 3], &[2, 3, 4]), 1 * 12 + 2 * 4 + 3);
    }

    #[test]
    fn unknown_parameter_is_rejected() {
        let grid = gamma_incl_grid();
        let selection = CurrentSelection::from_grid(&grid);
        let err = ParameterGridIndex::new(&grid)
            .resolve(&selection, &overrides(&[("NH", 1.0)]))
            .unwrap_err();
        assert!(matches!(err, GridError::InvalidParameter { ref name, .. } if name == "NH"));
    }

    #[test]
    fn non_finite_override_is_rejected() {
        let grid = gamma_incl_grid();
        let selection = CurrentSelection::from_grid(&grid);
        let err = ParameterGridIndex::new(&grid)
            .resolve(&selection, &overrides(&[("Gamma", f64::NAN)]))
            .unwrap_err();
        assert!(matches!(err, GridError::NonFiniteValue { .. }));
    }

    #[test]
    fn empty_axis_fails_lookup_not_load() {
        let grid = Grid::new(
            vec![
                ParameterAxis::new("A", vec![1.0, 2.0], 1.0),
                ParameterAxis::new("B", vec![], 0.0),
            ],
            vec![],
            0,
        )
        .unwrap();
        let selection = CurrentSelection::from_grid(&grid);
        let err = ParameterGridIndex::new(&grid)
            .resolve(&selection, &Overrides::new())
            .unwrap_err();
        assert!(matches!(err, GridError::EmptyGrid { ref name } if name == "B"));
    }

    #[test]
    fn row_count_mismatch_is_fatal() {
        let err = Grid::new(
            vec![ParameterAxis::new("A", vec![1.0, 2.0], 1.0)],
            vec![EnergyBin::new(0.0, 1.0)],
            3,
        )
        .unwrap_err();
        assert!(matches!(err, GridError::Corrupt(_)));
    }

    #[test]
    fn declared_count_must_match_tabulated_values() {
        let mut axis = ParameterAxis::new("A", vec![1.0, 2.0], 1.0);
        axis.num_values = 3;
        assert!(Grid::new(vec![axis], vec![], 3).is_err());
    }

    #[test]
    fn overlapping_bins_are_fatal() {
        let err = Grid::new(
            vec![ParameterAxis::new("A", vec![1.0], 1.0)],
            vec![EnergyBin::new(0.0, 1.5), EnergyBin::new(1.0, 2.0)],
            1,
        )
        .unwrap_err();
        assert!(matches!(err, GridError::Corrupt(_)));
    }

    #[test]
    fn applied_selection_becomes_new_default() {
        let grid = gamma_incl_grid();
        let mut selection = CurrentSelection::from_grid(&grid);
        let index = ParameterGridIndex::new(&grid);

        // Transient override leaves the stored selection alone.
        index.resolve(&selection, &overrides(&[("Gamma", 1.0)])).unwrap();
        assert_eq!(selection.get("Gamma"), Some(1.5));

        selection.apply(&grid, &overrides(&[("Gamma", 1.0)])).unwrap();
        assert_eq!(index.resolve(&selection, &Overrides::new()).unwrap(), 1);

        assert!(selection.apply(&grid, &overrides(&[("Gamma", 2.0), ("X", 1.0)])).is_err());
        assert_eq!(selection.get("Gamma"), Some(1.0));
    }

    #[test]
    fn snap_reports_tabulated_values() {
        let grid = gamma_incl_grid();
        let selection = CurrentSelection::from_grid(&grid);
        let snapped = ParameterGridIndex::new(&grid)
            .snap(&selection, &overrides(&[("Incl", 80.0)]))
            .unwrap();
        assert_eq!(snapped.len(), 2);
        assert_eq!(snapped[0].name, "Gamma");
        assert_eq!(snapped[0].value, 1.5);
        assert_eq!(snapped[1].requested, 80.0);
        assert_eq!(snapped[1].value, 90.0);
        assert_eq!(snapped[1].index, 2);
    }
}
