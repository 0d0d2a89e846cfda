//! Test data generators for synthetic site rasters.
//!
//! These generators create predictable, verifiable grids: raw value
//! patterns, georeferenced grids, and elevation surfaces with known aspect.

use habitat_common::{CrsCode, GeoTransform, Grid};

/// Creates a test grid with predictable values.
///
/// Each cell value is calculated as: `col * 1000 + row`
///
/// This makes it easy to verify that data is being read/written correctly
/// by checking that grid[row][col] == col * 1000 + row.
///
/// # Example
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(10, 5);
/// assert_eq!(grid.len(), 50); // 10 * 5
/// assert_eq!(grid[0], 0.0);   // col=0, row=0 -> 0*1000 + 0
/// assert_eq!(grid[1], 1000.0); // col=1, row=0 -> 1*1000 + 0
/// assert_eq!(grid[10], 1.0);  // col=0, row=1 -> 0*1000 + 1
/// ```
pub fn create_test_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 1000 + row) as f32);
        }
    }
    data
}

/// Creates a test grid with temperature-like values in Kelvin.
///
/// The values range from approximately 280K to 310K, warming from the
/// top-left to the bottom-right.
pub fn create_temperature_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let x_factor = col as f32 / width.max(1) as f32;
            let y_factor = row as f32 / height.max(1) as f32;
            data.push(280.0 + (x_factor * 15.0) + (y_factor * 15.0));
        }
    }
    data
}

/// Creates a grid filled with a constant value.
pub fn create_constant_grid(width: usize, height: usize, value: f32) -> Vec<f32> {
    vec![value; width * height]
}

/// Creates a grid with NaN values at specified positions.
///
/// # Arguments
///
/// * `width` - Number of columns
/// * `height` - Number of rows
/// * `nan_positions` - List of (col, row) positions that should be NaN
///
/// # Returns
///
/// A `Vec<f32>` with NaN at specified positions, zeros elsewhere.
pub fn create_grid_with_nans(
    width: usize,
    height: usize,
    nan_positions: &[(usize, usize)],
) -> Vec<f32> {
    let mut data = vec![0.0f32; width * height];
    for &(col, row) in nan_positions {
        if col < width && row < height {
            data[row * width + col] = f32::NAN;
        }
    }
    data
}

/// Wraps row-major values in a north-up grid whose upper-left corner is
/// `origin` with square cells of size `res`.
///
/// Panics if `data` does not match the shape.
pub fn georeferenced(
    data: Vec<f32>,
    width: usize,
    height: usize,
    origin: (f64, f64),
    res: f64,
    crs: CrsCode,
) -> Grid {
    let transform = GeoTransform::north_up(origin.0, origin.1, res, res);
    Grid::new(height, width, data, transform)
        .expect("generator shape mismatch")
        .with_crs(crs)
}

/// Unit-cell grid anchored at `(0, height)` in Web Mercator.
pub fn unit_grid(data: Vec<f32>, width: usize, height: usize) -> Grid {
    georeferenced(data, width, height, (0.0, height as f64), 1.0, CrsCode::Epsg3857)
}

/// A score grid of constant value.
pub fn create_score_grid(width: usize, height: usize, score: f32) -> Grid {
    unit_grid(create_constant_grid(width, height, score), width, height)
}

/// A plane rising by `rise_east` per column and `rise_south` per row.
pub fn create_tilted_dem(width: usize, height: usize, rise_east: f32, rise_south: f32) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push(1000.0 + col as f32 * rise_east + row as f32 * rise_south);
        }
    }
    data
}

/// An east-rising plane with a flat square plateau.
///
/// The plateau covers `size`×`size` cells starting at `(row, col)` and sits
/// at `level`.
pub fn create_flat_patch_dem(
    width: usize,
    height: usize,
    patch: (usize, usize),
    size: usize,
    level: f32,
) -> Vec<f32> {
    let mut data = create_tilted_dem(width, height, 10.0, 0.0);
    for row in patch.0..(patch.0 + size).min(height) {
        for col in patch.1..(patch.1 + size).min(width) {
            data[row * width + col] = level;
        }
    }
    data
}

/// A cone peaking at the grid centre, falling `drop` per cell of distance.
///
/// Every interior cell faces away from the peak, so aspect covers all
/// compass directions.
pub fn create_cone_dem(width: usize, height: usize, peak: f32, drop: f32) -> Vec<f32> {
    let center_x = (width as f32 - 1.0) / 2.0;
    let center_y = (height as f32 - 1.0) / 2.0;
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let dx = col as f32 - center_x;
            let dy = row as f32 - center_y;
            data.push(peak - (dx * dx + dy * dy).sqrt() * drop);
        }
    }
    data
}

/// Creates RGBA pixel data for a simple test pattern.
///
/// Creates a gradient pattern useful for testing PNG encoding.
pub fn create_test_rgba_pixels(width: usize, height: usize) -> Vec<u8> {
    let mut pixels = Vec::with_capacity(width * height * 4);
    for y in 0..height {
        for x in 0..width {
            let r = ((x as f32 / width as f32) * 255.0) as u8;
            let g = ((y as f32 / height as f32) * 255.0) as u8;
            pixels.extend_from_slice(&[r, g, 128, 255]);
        }
    }
    pixels
}
