//! Formatted terminal output.
//!
//! Formatting lives here so the grid and regression code never prints, and
//! output changes stay localized.

use crate::domain::{Curve, LightCurve};
use crate::gp::{FitReport, Kernel};
use crate::grid::{Grid, Snapped};

/// Parameter axes, energy range and table size of a grid.
pub fn format_parameters(grid: &Grid) -> String {
    let mut out = String::new();

    out.push_str("=== specgrid - model grid ===\n");
    out.push_str(
        format!(
            "{:<16} {:>6} {:>12} {:>12} {:>12}",
            "parameter", "n", "min", "max", "initial"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(&format!("{:-<16} {:-<6} {:-<12} {:-<12} {:-<12}\n", "", "", "", "", ""));

    for axis in grid.axes() {
        let (lo, hi) = range(&axis.values);
        out.push_str(&format!(
            "{:<16} {:>6} {:>12} {:>12} {:>12}\n",
            axis.name,
            axis.num_values,
            fmt_num(lo),
            fmt_num(hi),
            fmt_num(axis.initial)
        ));
    }

    let bins = grid.energy_bins();
    if let (Some(first), Some(last)) = (bins.first(), bins.last()) {
        out.push_str(&format!(
            "\nEnergy: {} bins over [{}, {})\n",
            bins.len(),
            fmt_num(first.low),
            fmt_num(last.high)
        ));
    } else {
        out.push_str("\nEnergy: no bins\n");
    }
    out.push_str(&format!("Spectra: {}\n", grid.row_count()));

    out
}

/// Requested vs. tabulated value for each parameter, plus the chosen row.
pub fn format_selection(snapped: &[Snapped], row: usize) -> String {
    let mut out = String::new();

    out.push_str("Selection:\n");
    for s in snapped {
        let marker = if s.requested == s.value { " " } else { "~" };
        out.push_str(&format!(
            "{marker} {:<16} requested={:<12} used={:<12} (index {})\n",
            s.name,
            fmt_num(s.requested),
            fmt_num(s.value),
            s.index
        ));
    }
    out.push_str(&format!("Spectrum number: {row}\n"));

    out
}

/// Size, energy span and flux range of an extracted spectrum.
pub fn format_spectrum_summary(curve: &Curve) -> String {
    if curve.is_empty() {
        return "Spectrum: empty (energy range selects no bins)\n".to_string();
    }
    let (x_lo, x_hi) = range(&curve.x);
    let (y_lo, y_hi) = range(&curve.y);
    let total: f64 = curve.y.iter().sum();

    format!(
        "Spectrum: {} bins | {} in [{}, {}] | {} in [{}, {}] | sum={}\n",
        curve.len(),
        curve.hints.x_label,
        fmt_num(x_lo),
        fmt_num(x_hi),
        curve.hints.y_label,
        fmt_num(y_lo),
        fmt_num(y_hi),
        fmt_num(total)
    )
}

/// Data summary, kernel and (if any) fit diagnostics of a regression run.
pub fn format_fit_summary(
    data: &LightCurve,
    kernel: &Kernel,
    fit: Option<&FitReport>,
    log_likelihood: f64,
) -> String {
    let mut out = String::new();

    out.push_str("=== specgrid - GP light-curve regression ===\n");
    let (t_lo, t_hi) = range(&data.time);
    out.push_str(&format!(
        "Points: n={} | t=[{}, {}]\n",
        data.len(),
        fmt_num(t_lo),
        fmt_num(t_hi)
    ));
    out.push_str(&format!("Kernel: {kernel}\n"));

    match fit {
        Some(report) => {
            let status = if report.converged { "converged" } else { "NOT converged" };
            out.push_str(&format!(
                "\nFit: {status} ({}) after {} iterations, {} evaluations\n",
                report.message, report.iterations, report.evaluations
            ));
            out.push_str(&format!(
                "ln L: {:.4} -> {:.4}\n",
                report.initial_log_likelihood, report.log_likelihood
            ));
            for (name, value) in &report.parameters {
                out.push_str(&format!("- {name:<24} {value:>12.6}\n"));
            }
        }
        None => {
            out.push_str(&format!("\nFit: skipped | ln L = {log_likelihood:.4}\n"));
        }
    }

    out
}

fn range(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}

fn fmt_num(v: f64) -> String {
    if v != 0.0 && (v.abs() >= 1e5 || v.abs() < 1e-3) {
        format!("{v:.4e}")
    } else {
        format!("{v:.4}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DisplayHints, EnergyBin, ParameterAxis};

    #[test]
    fn parameter_table_lists_every_axis() {
        let grid = Grid::new(
            vec![
                ParameterAxis::new("Gamma", vec![1.5, 2.0, 2.5], 2.0),
                ParameterAxis::new("Incl", vec![30.0, 60.0], 30.0),
            ],
            vec![EnergyBin::new(0.5, 1.0), EnergyBin::new(1.0, 10.0)],
            6,
        )
        .unwrap();
        let text = format_parameters(&grid);
        assert!(text.contains("Gamma"));
        assert!(text.contains("Incl"));
        assert!(text.contains("2 bins"));
        assert!(text.contains("Spectra: 6"));
    }

    #[test]
    fn snapped_values_are_marked() {
        let snapped = vec![
            Snapped {
                name: "Gamma".into(),
                requested: 1.9,
                index: 1,
                value: 2.0,
            },
            Snapped {
                name: "Incl".into(),
                requested: 30.0,
                index: 0,
                value: 30.0,
            },
        ];
        let text = format_selection(&snapped, 2);
        assert!(text.contains("~ Gamma"));
        assert!(text.contains("  Incl"));
        assert!(text.contains("Spectrum number: 2"));
    }

    #[test]
    fn empty_spectrum_summary() {
        let curve = Curve {
            x: vec![],
            y: vec![],
            hints: DisplayHints::spectrum(),
        };
        assert!(format_spectrum_summary(&curve).contains("empty"));
    }

    #[test]
    fn small_numbers_use_scientific_notation() {
        assert_eq!(fmt_num(1e-5), "1.0000e-5");
        assert_eq!(fmt_num(0.0), "0.0000");
        assert_eq!(fmt_num(2.5), "2.5000");
    }
}
