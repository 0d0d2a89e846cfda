//! Helpers for projected-climate grids.
//!
//! Downscaled climate products store longitude on 0..360 and temperature in
//! Kelvin; these put them on the conventions the rest of the model uses and
//! collapse a run of time slices into one composite.

use habitat_common::{GeoTransform, Grid};
use tracing::{debug, warn};

use crate::error::{GridProcessorError, Result};

/// Map a 0..360 longitude onto -180..180.
pub fn convert_longitude(lon: f64) -> f64 {
    if lon > 180.0 {
        lon - 360.0
    } else {
        lon
    }
}

pub fn kelvin_to_fahrenheit(kelvin: f32) -> f32 {
    (kelvin as f64 * 1.8 - 459.67) as f32
}

/// Convert every valid cell from Kelvin to Fahrenheit.
pub fn grid_to_fahrenheit(grid: &Grid) -> Grid {
    grid.map_valid(kelvin_to_fahrenheit)
}

/// Move a grid that lies entirely east of the antimeridian on a 0..360
/// longitude axis onto -180..180.
///
/// Grids already in range are returned unchanged. Grids straddling 180°
/// cannot be shifted as one block and are also returned unchanged.
pub fn shift_longitudes(grid: &Grid) -> Result<Grid> {
    if grid.crs().is_some_and(|crs| !crs.is_geographic()) {
        return Err(GridProcessorError::invalid_parameter(
            "grid",
            "longitude shift needs a geographic grid",
        ));
    }

    let extent = grid.extent();
    if extent.max_x <= 180.0 {
        return Ok(grid.clone());
    }
    if extent.min_x < 180.0 {
        warn!(
            min_x = extent.min_x,
            max_x = extent.max_x,
            "Grid straddles 180° longitude, leaving it unshifted"
        );
        return Ok(grid.clone());
    }

    let t = grid.transform();
    let shifted = GeoTransform {
        x_origin: t.x_origin - 360.0,
        ..*t
    };
    let (rows, cols) = grid.shape();
    let mut out = Grid::new(rows, cols, grid.values().to_vec(), shifted)?;
    if let Some(crs) = grid.crs() {
        out = out.with_crs(crs);
    }
    if let Some(nodata) = grid.nodata() {
        out = out.with_nodata(nodata);
    }
    Ok(out)
}

/// Cell-wise mean over co-registered time slices.
///
/// Missing slices are skipped; a cell is missing only when every slice is.
pub fn mean_composite(slices: &[&Grid]) -> Result<Grid> {
    let first = slices
        .first()
        .ok_or(GridProcessorError::EmptyInput { component: "composite" })?;

    let expected = first.shape();
    for (index, slice) in slices.iter().enumerate().skip(1) {
        if slice.shape() != expected {
            return Err(GridProcessorError::ShapeMismatch {
                component: "composite",
                index,
                expected,
                found: slice.shape(),
            });
        }
    }

    let cells = expected.0 * expected.1;
    let data = (0..cells)
        .map(|i| {
            let (sum, n) = slices
                .iter()
                .map(|g| g.values()[i])
                .filter(|v| !v.is_nan())
                .fold((0.0f64, 0usize), |(s, n), v| (s + v as f64, n + 1));
            if n == 0 {
                f32::NAN
            } else {
                (sum / n as f64) as f32
            }
        })
        .collect();

    let composite = first.with_values(data)?;
    debug!(slices = slices.len(), valid = composite.valid_count(), "Built climate composite");
    Ok(composite)
}
