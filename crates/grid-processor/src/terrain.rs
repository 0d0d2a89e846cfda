//! Terrain derivatives from elevation grids.
//!
//! Both derivatives use Horn's 3×3 finite difference scaled by the cell
//! size. Cells on the grid edge, or with any missing neighbour, are no-data.
//! Geographic grids have their degree cell sizes converted to metres per
//! row, so elevations must be in metres.

use habitat_common::Grid;
use tracing::debug;

use crate::error::Result;

/// Metres per degree of longitude at the equator.
const METRES_PER_DEGREE_LON: f64 = 111_320.0;

/// Metres per degree of latitude.
const METRES_PER_DEGREE_LAT: f64 = 110_540.0;

/// Horn gradient `(dz/dx, dz/dy)` at an interior cell, with `x` growing
/// along columns and `y` along rows. `None` if any neighbour is missing.
fn horn_gradient(grid: &Grid, row: usize, col: usize, res_x: f64, res_y: f64) -> Option<(f64, f64)> {
    let z = |dr: usize, dc: usize| grid.raw(row + dr - 1, col + dc - 1) as f64;

    let (a, b, c) = (z(0, 0), z(0, 1), z(0, 2));
    let (d, e, f) = (z(1, 0), z(1, 1), z(1, 2));
    let (g, h, i) = (z(2, 0), z(2, 1), z(2, 2));

    if [a, b, c, d, e, f, g, h, i].iter().any(|v| v.is_nan()) {
        return None;
    }

    let dz_dx = ((c + 2.0 * f + i) - (a + 2.0 * d + g)) / (8.0 * res_x);
    let dz_dy = ((g + 2.0 * h + i) - (a + 2.0 * b + c)) / (8.0 * res_y);
    Some((dz_dx, dz_dy))
}

/// Compass aspect for a gradient, clockwise from north, in `[0, 360)`.
/// Flat cells have no aspect.
fn gradient_aspect(dz_dx: f64, dz_dy: f64) -> Option<f32> {
    if dz_dx == 0.0 && dz_dy == 0.0 {
        return None;
    }
    let angle = dz_dy.atan2(-dz_dx).to_degrees();
    let aspect = if angle > 90.0 {
        360.0 - angle + 90.0
    } else {
        90.0 - angle
    };
    Some(aspect as f32)
}

fn derive<F>(elevation: &Grid, f: F) -> Result<Grid>
where
    F: Fn(f64, f64) -> Option<f32>,
{
    let (rows, cols) = elevation.shape();
    let (res_x, res_y) = elevation.transform().resolution();
    let geographic = elevation.crs().is_some_and(|crs| crs.is_geographic());
    let mut data = vec![f32::NAN; rows * cols];

    if rows >= 3 && cols >= 3 {
        for row in 1..rows - 1 {
            let (res_x, res_y) = if geographic {
                let (_, lat) = elevation.cell_center(row, 0);
                (
                    res_x * METRES_PER_DEGREE_LON * lat.to_radians().cos(),
                    res_y * METRES_PER_DEGREE_LAT,
                )
            } else {
                (res_x, res_y)
            };
            for col in 1..cols - 1 {
                if let Some(v) = horn_gradient(elevation, row, col, res_x, res_y)
                    .and_then(|(dx, dy)| f(dx, dy))
                {
                    data[row * cols + col] = v;
                }
            }
        }
    }

    Ok(elevation.with_values(data)?)
}

/// Direction of steepest descent in degrees clockwise from north.
///
/// Flat cells (zero gradient) are no-data rather than an arbitrary 0°.
pub fn aspect(elevation: &Grid) -> Result<Grid> {
    let out = derive(elevation, gradient_aspect)?;
    debug!(shape = ?out.shape(), valid = out.valid_count(), "Computed aspect");
    Ok(out)
}

/// Slope angle in degrees. Flat cells have slope 0.
pub fn slope(elevation: &Grid) -> Result<Grid> {
    let out = derive(elevation, |dx, dy| Some(dx.hypot(dy).atan().to_degrees() as f32))?;
    debug!(shape = ?out.shape(), valid = out.valid_count(), "Computed slope");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use habitat_common::{CrsCode, GeoTransform};

    fn dem<F: FnMut(usize, usize) -> f32>(rows: usize, cols: usize, f: F) -> Grid {
        Grid::from_fn(rows, cols, GeoTransform::north_up(0.0, rows as f64, 1.0, 1.0), f).unwrap()
    }

    #[test]
    fn test_aspect_cardinal_directions() {
        // Descending toward the east
        let east = aspect(&dem(5, 5, |_, c| -(c as f32))).unwrap();
        assert_eq!(east.cell_value(2, 2), Some(90.0));

        // Descending toward the west
        let west = aspect(&dem(5, 5, |_, c| c as f32)).unwrap();
        assert_eq!(west.cell_value(2, 2), Some(270.0));

        // Rows grow southward on a north-up grid
        let south = aspect(&dem(5, 5, |r, _| -(r as f32))).unwrap();
        assert_eq!(south.cell_value(2, 2), Some(180.0));

        let north = aspect(&dem(5, 5, |r, _| r as f32)).unwrap();
        assert_eq!(north.cell_value(2, 2), Some(0.0));
    }

    #[test]
    fn test_aspect_diagonal() {
        // Descending toward the south-east
        let se = aspect(&dem(5, 5, |r, c| -((r + c) as f32))).unwrap();
        let v = se.cell_value(2, 2).unwrap();
        assert!((v - 135.0).abs() < 1e-4);
    }

    #[test]
    fn test_edges_are_nodata() {
        let out = aspect(&dem(4, 4, |_, c| c as f32)).unwrap();
        assert_eq!(out.valid_count(), 4);
        assert_eq!(out.cell_value(0, 1), None);
        assert_eq!(out.cell_value(3, 3), None);
    }

    #[test]
    fn test_missing_neighbour_is_nodata() {
        let mut values: Vec<f32> = (0..25).map(|i| (i % 5) as f32).collect();
        values[0] = f32::NAN;
        let g = Grid::new(5, 5, values, GeoTransform::north_up(0.0, 5.0, 1.0, 1.0)).unwrap();
        let out = aspect(&g).unwrap();
        assert_eq!(out.cell_value(1, 1), None);
        assert_eq!(out.cell_value(2, 2), Some(270.0));
    }

    #[test]
    fn test_flat_surface() {
        let flat = dem(5, 5, |_, _| 1500.0);
        assert_eq!(aspect(&flat).unwrap().valid_count(), 0);
        let s = slope(&flat).unwrap();
        assert_eq!(s.valid_count(), 9);
        assert_eq!(s.cell_value(2, 2), Some(0.0));
    }

    #[test]
    fn test_slope_scales_with_cell_size() {
        // Rise of 1 per 1-unit cell is 45°
        let unit = slope(&dem(3, 3, |_, c| c as f32)).unwrap();
        assert!((unit.raw(1, 1) - 45.0).abs() < 1e-4);

        let coarse = Grid::from_fn(3, 3, GeoTransform::north_up(0.0, 3.0, 10.0, 10.0), |_, c| {
            c as f32 * 10.0
        })
        .unwrap();
        assert!((slope(&coarse).unwrap().raw(1, 1) - 45.0).abs() < 1e-4);
    }

    #[test]
    fn test_geographic_cell_size_in_metres() {
        // 0.001° cells at 40°N rising 10 m per cell eastward
        let t = GeoTransform::north_up(-105.0015, 40.0015, 0.001, 0.001);
        let g = Grid::from_fn(3, 3, t, |_, c| 1600.0 + c as f32 * 10.0)
            .unwrap()
            .with_crs(CrsCode::Epsg4326);

        let dx = 0.001 * METRES_PER_DEGREE_LON * 40f64.to_radians().cos();
        let expected = (10.0 / dx).atan().to_degrees();
        let s = slope(&g).unwrap().raw(1, 1) as f64;
        assert!((s - expected).abs() < 1e-3, "slope {}", s);
        assert!(s > 6.0 && s < 7.0);
    }

    #[test]
    fn test_geographic_aspect_accounts_for_latitude() {
        // Equal rise per cell in both directions; longitude cells are
        // shorter at 60°N so the x gradient dominates.
        let t = GeoTransform::north_up(-105.0, 60.0, 0.01, 0.01);
        let g = Grid::from_fn(5, 5, t, |r, c| -((r + c) as f32))
            .unwrap()
            .with_crs(CrsCode::Epsg4326);
        let v = aspect(&g).unwrap().raw(2, 2);
        assert!(v > 90.0 && v < 135.0, "aspect {}", v);

        let projected = Grid::from_fn(5, 5, t, |r, c| -((r + c) as f32)).unwrap();
        assert!((aspect(&projected).unwrap().raw(2, 2) - 135.0).abs() < 1e-4);
    }

    #[test]
    fn test_small_grid_is_all_nodata() {
        let out = aspect(&dem(2, 2, |r, c| (r + c) as f32)).unwrap();
        assert_eq!(out.valid_count(), 0);
    }
}
