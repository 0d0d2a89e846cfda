//! Fuzzy suitability scoring and combination.
//!
//! Each variable is turned into a score in (0, 1] with a Gaussian response
//! curve centred on the optimal value. Scores are combined by a cell-wise
//! product; a cell missing in any input is missing in the composite.

use habitat_common::Grid;
use tracing::debug;

use crate::error::{GridProcessorError, Result};
use crate::types::VariableSpec;

/// Gaussian response for a single value.
///
/// Exactly 1 at the optimum. Far from the optimum the result is held at the
/// smallest positive `f32` rather than underflowing to zero.
#[inline]
pub fn suitability_score(value: f32, optimal_value: f64, tolerance: f64) -> f32 {
    let d = value as f64 - optimal_value;
    let s = (-(d * d) / (2.0 * tolerance * tolerance)).exp();
    (s as f32).max(f32::MIN_POSITIVE)
}

fn check_tolerance(tolerance: f64) -> Result<()> {
    if tolerance.is_finite() && tolerance > 0.0 {
        Ok(())
    } else {
        Err(GridProcessorError::InvalidTolerance(tolerance))
    }
}

/// Score every valid cell of `grid`.
pub fn score(grid: &Grid, optimal_value: f64, tolerance: f64) -> Result<Grid> {
    check_tolerance(tolerance)?;
    if !optimal_value.is_finite() {
        return Err(GridProcessorError::invalid_parameter(
            "optimal_value",
            format!("must be finite, got {}", optimal_value),
        ));
    }
    Ok(grid.map_valid(|v| suitability_score(v, optimal_value, tolerance)))
}

/// Score a grid with a variable's response-curve parameters.
pub fn score_variable(grid: &Grid, spec: &VariableSpec) -> Result<Grid> {
    spec.validate()?;
    let scored = score(grid, spec.optimal_value, spec.tolerance)?;
    debug!(
        variable = %spec.name,
        optimal = spec.optimal_value,
        tolerance = spec.tolerance,
        valid = scored.valid_count(),
        "Scored variable"
    );
    Ok(scored)
}

/// Cell-wise product of co-registered score grids.
///
/// Factors are multiplied in ascending order per cell so the result does
/// not depend on the order of `grids`.
pub fn combine(grids: &[&Grid]) -> Result<Grid> {
    let first = grids
        .first()
        .ok_or(GridProcessorError::EmptyInput { component: "combine" })?;

    let expected = first.shape();
    for (index, grid) in grids.iter().enumerate().skip(1) {
        if grid.shape() != expected {
            return Err(GridProcessorError::ShapeMismatch {
                component: "combine",
                index,
                expected,
                found: grid.shape(),
            });
        }
    }

    let cells = expected.0 * expected.1;
    let mut factors: Vec<f32> = Vec::with_capacity(grids.len());
    let data = (0..cells)
        .map(|i| {
            factors.clear();
            for grid in grids {
                let v = grid.values()[i];
                if v.is_nan() {
                    return f32::NAN;
                }
                factors.push(v);
            }
            factors.sort_by(f32::total_cmp);
            factors.iter().fold(1.0f64, |acc, &v| acc * v as f64) as f32
        })
        .collect();

    let composite = first.with_values(data)?;
    debug!(
        layers = grids.len(),
        valid = composite.valid_count(),
        "Combined scores"
    );
    Ok(composite)
}

#[cfg(test)]
mod tests {
    use super::*;
    use habitat_common::GeoTransform;

    fn grid(values: Vec<f32>) -> Grid {
        Grid::new(2, 2, values, GeoTransform::north_up(0.0, 2.0, 1.0, 1.0)).unwrap()
    }

    #[test]
    fn test_score_at_optimum_is_one() {
        assert_eq!(suitability_score(6.5, 6.5, 1.0), 1.0);
        assert_eq!(suitability_score(75.0, 75.0, 10.0), 1.0);
    }

    #[test]
    fn test_score_symmetry_and_monotonicity() {
        let below = suitability_score(5.0, 6.5, 1.0);
        let above = suitability_score(8.0, 6.5, 1.0);
        assert_eq!(below, above);
        assert!(suitability_score(7.0, 6.5, 1.0) > above);
    }

    #[test]
    fn test_score_one_sigma() {
        let s = suitability_score(7.5, 6.5, 1.0);
        assert!((s - (-0.5f32).exp()).abs() < 1e-6);
    }

    #[test]
    fn test_score_stays_positive_far_away() {
        let s = suitability_score(1.0e6, 0.0, 1.0);
        assert!(s > 0.0 && s <= 1.0);
    }

    #[test]
    fn test_score_rejects_bad_tolerance() {
        let g = grid(vec![1.0; 4]);
        for tol in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = score(&g, 1.0, tol).unwrap_err();
            assert!(matches!(err, GridProcessorError::InvalidTolerance(_)));
        }
    }

    #[test]
    fn test_score_keeps_nodata() {
        let g = grid(vec![6.5, f32::NAN, 7.5, 6.5]);
        let s = score(&g, 6.5, 1.0).unwrap();
        assert_eq!(s.cell_value(0, 0), Some(1.0));
        assert_eq!(s.cell_value(0, 1), None);
        assert_eq!(s.valid_count(), 3);
    }

    #[test]
    fn test_combine_three_layers() {
        let a = grid(vec![1.0, 1.0, 1.0, 1.0]);
        let b = grid(vec![0.5, 0.5, 0.5, 0.5]);
        let c = grid(vec![0.8, 1.0, 1.0, 1.0]);
        let out = combine(&[&a, &b, &c]).unwrap();
        assert!((out.raw(0, 0) - 0.4).abs() < 1e-6);
        assert_eq!(out.cell_value(0, 1), Some(0.5));
        assert_eq!(out.cell_value(1, 0), Some(0.5));
        assert_eq!(out.cell_value(1, 1), Some(0.5));
    }

    #[test]
    fn test_combine_order_independent() {
        let a = grid(vec![0.3, 0.7, 0.9, 0.11]);
        let b = grid(vec![0.6, 0.2, 0.33, 0.99]);
        let c = grid(vec![0.45, 0.8, 0.123, 0.5]);
        let abc = combine(&[&a, &b, &c]).unwrap();
        let cab = combine(&[&c, &a, &b]).unwrap();
        let bca = combine(&[&b, &c, &a]).unwrap();
        assert_eq!(abc, cab);
        assert_eq!(abc, bca);
    }

    #[test]
    fn test_combine_propagates_nodata() {
        let a = grid(vec![1.0, f32::NAN, 1.0, 1.0]);
        let b = grid(vec![0.5, 0.5, 0.5, f32::NAN]);
        let out = combine(&[&a, &b]).unwrap();
        assert_eq!(out.cell_value(0, 1), None);
        assert_eq!(out.cell_value(1, 1), None);
        assert_eq!(out.valid_count(), 2);
    }

    #[test]
    fn test_combine_errors() {
        assert!(matches!(
            combine(&[]).unwrap_err(),
            GridProcessorError::EmptyInput { component: "combine" }
        ));

        let a = grid(vec![1.0; 4]);
        let b = Grid::filled(3, 3, 1.0, GeoTransform::north_up(0.0, 3.0, 1.0, 1.0)).unwrap();
        assert!(matches!(
            combine(&[&a, &b]).unwrap_err(),
            GridProcessorError::ShapeMismatch { index: 1, .. }
        ));
    }
}
