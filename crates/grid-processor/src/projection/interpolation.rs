//! Interpolation kernels for grid resampling.
//!
//! The slice kernels take cell-centre coordinates: `(x, y) = (0, 0)` is the
//! centre of the upper-left cell. [`sample_grid`] converts the edge-based
//! fractional indices produced by [`habitat_common::GeoTransform::invert`].

use habitat_common::Grid;

use crate::types::InterpolationMethod;

/// Nearest neighbor interpolation.
///
/// Returns the value of the nearest grid point.
pub fn nearest_interpolate(data: &[f32], width: usize, height: usize, x: f64, y: f64) -> f32 {
    let col = x.round();
    let row = y.round();

    if col < 0.0 || row < 0.0 || col >= width as f64 || row >= height as f64 {
        return f32::NAN;
    }

    data[row as usize * width + col as usize]
}

/// Bilinear interpolation.
///
/// Smoothly interpolates between the four nearest grid points. Any corner
/// that carries weight and is NaN makes the result NaN.
pub fn bilinear_interpolate(data: &[f32], width: usize, height: usize, x: f64, y: f64) -> f32 {
    if x < 0.0 || y < 0.0 || x > (width - 1) as f64 || y > (height - 1) as f64 {
        return f32::NAN;
    }

    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);

    let xf = x - x0 as f64;
    let yf = y - y0 as f64;

    let corners = [
        (data[y0 * width + x0], (1.0 - xf) * (1.0 - yf)),
        (data[y0 * width + x1], xf * (1.0 - yf)),
        (data[y1 * width + x0], (1.0 - xf) * yf),
        (data[y1 * width + x1], xf * yf),
    ];

    let mut sum = 0.0f64;
    for (v, w) in corners {
        if w == 0.0 {
            continue;
        }
        if v.is_nan() {
            return f32::NAN;
        }
        sum += v as f64 * w;
    }
    sum as f32
}

/// Bicubic interpolation.
///
/// Uses 16 surrounding points for smoother interpolation.
pub fn cubic_interpolate(data: &[f32], width: usize, height: usize, x: f64, y: f64) -> f32 {
    if x < 0.0 || y < 0.0 || x > (width - 1) as f64 || y > (height - 1) as f64 {
        return f32::NAN;
    }

    let xi = x.floor() as i64;
    let yi = y.floor() as i64;

    let xf = (x - xi as f64) as f32;
    let yf = (y - yi as f64) as f32;

    // Sample 4x4 grid of points
    let mut values = [[0.0f32; 4]; 4];

    for j in 0..4 {
        for i in 0..4 {
            let px = (xi + i - 1).clamp(0, width as i64 - 1) as usize;
            let py = (yi + j - 1).clamp(0, height as i64 - 1) as usize;
            let v = data[py * width + px];

            // If any value is NaN, fall back to bilinear
            if v.is_nan() {
                return bilinear_interpolate(data, width, height, x, y);
            }
            values[j as usize][i as usize] = v;
        }
    }

    // Cubic interpolation along x for each row
    let mut row_values = [0.0f32; 4];
    for j in 0..4 {
        row_values[j] = cubic_1d(values[j][0], values[j][1], values[j][2], values[j][3], xf);
    }

    // Cubic interpolation along y
    cubic_1d(row_values[0], row_values[1], row_values[2], row_values[3], yf)
}

/// 1D cubic interpolation using Catmull-Rom spline.
fn cubic_1d(p0: f32, p1: f32, p2: f32, p3: f32, t: f32) -> f32 {
    let t2 = t * t;
    let t3 = t2 * t;

    // Catmull-Rom coefficients
    let a = -0.5 * p0 + 1.5 * p1 - 1.5 * p2 + 0.5 * p3;
    let b = p0 - 2.5 * p1 + 2.0 * p2 - 0.5 * p3;
    let c = -0.5 * p0 + 0.5 * p2;
    let d = p1;

    a * t3 + b * t2 + c * t + d
}

/// Sample `grid` at edge-based fractional indices `(col, row)`.
///
/// Points outside the grid footprint are NaN. Inside the footprint, points
/// in the outer half-cell are clamped to the edge cell centres so the
/// smooth kernels still cover the whole grid.
pub fn sample_grid(grid: &Grid, col: f64, row: f64, method: InterpolationMethod) -> f32 {
    let (rows, cols) = grid.shape();
    if !col.is_finite()
        || !row.is_finite()
        || col < 0.0
        || row < 0.0
        || col >= cols as f64
        || row >= rows as f64
    {
        return f32::NAN;
    }

    let data = grid.values();
    match method {
        InterpolationMethod::Nearest => grid.raw(row as usize, col as usize),
        InterpolationMethod::Bilinear | InterpolationMethod::Cubic => {
            let x = (col - 0.5).clamp(0.0, (cols - 1) as f64);
            let y = (row - 0.5).clamp(0.0, (rows - 1) as f64);
            if method == InterpolationMethod::Bilinear {
                bilinear_interpolate(data, cols, rows, x, y)
            } else {
                cubic_interpolate(data, cols, rows, x, y)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use habitat_common::GeoTransform;

    #[test]
    fn test_nearest_interpolate() {
        let data: Vec<f32> = vec![
            1.0, 2.0, 3.0,
            4.0, 5.0, 6.0,
            7.0, 8.0, 9.0,
        ];

        assert_eq!(nearest_interpolate(&data, 3, 3, 0.0, 0.0), 1.0);
        assert_eq!(nearest_interpolate(&data, 3, 3, 1.0, 1.0), 5.0);
        assert_eq!(nearest_interpolate(&data, 3, 3, 0.4, 0.4), 1.0);
        assert_eq!(nearest_interpolate(&data, 3, 3, 0.6, 0.6), 5.0);
        assert!(nearest_interpolate(&data, 3, 3, 3.0, 0.0).is_nan());
    }

    #[test]
    fn test_bilinear_interpolate() {
        let data: Vec<f32> = vec![
            1.0, 2.0,
            3.0, 4.0,
        ];

        // Corners
        assert_eq!(bilinear_interpolate(&data, 2, 2, 0.0, 0.0), 1.0);
        assert_eq!(bilinear_interpolate(&data, 2, 2, 1.0, 0.0), 2.0);
        assert_eq!(bilinear_interpolate(&data, 2, 2, 0.0, 1.0), 3.0);
        assert_eq!(bilinear_interpolate(&data, 2, 2, 1.0, 1.0), 4.0);

        // Center
        let center = bilinear_interpolate(&data, 2, 2, 0.5, 0.5);
        assert!((center - 2.5).abs() < 0.001);
    }

    #[test]
    fn test_bilinear_with_nan() {
        let data: Vec<f32> = vec![
            1.0, f32::NAN,
            3.0, 4.0,
        ];

        // Should return NaN when a weighted corner is NaN
        assert!(bilinear_interpolate(&data, 2, 2, 0.5, 0.5).is_nan());
        // An exact hit on a valid cell ignores its NaN neighbour
        assert_eq!(bilinear_interpolate(&data, 2, 2, 0.0, 1.0), 3.0);
    }

    #[test]
    fn test_cubic_reproduces_linear_ramp() {
        let data: Vec<f32> = (0..16).map(|i| (i % 4) as f32).collect();
        let v = cubic_interpolate(&data, 4, 4, 1.5, 1.5);
        assert!((v - 1.5).abs() < 1e-5);
    }

    #[test]
    fn test_sample_grid_edges() {
        let t = GeoTransform::north_up(0.0, 2.0, 1.0, 1.0);
        let grid = Grid::new(2, 2, vec![1.0, 2.0, 3.0, 4.0], t).unwrap();

        assert_eq!(sample_grid(&grid, 0.1, 0.1, InterpolationMethod::Nearest), 1.0);
        assert_eq!(sample_grid(&grid, 1.9, 1.9, InterpolationMethod::Nearest), 4.0);
        // Outer half-cell clamps to the corner centre
        assert_eq!(sample_grid(&grid, 0.1, 0.1, InterpolationMethod::Bilinear), 1.0);
        assert!((sample_grid(&grid, 1.0, 1.0, InterpolationMethod::Bilinear) - 2.5).abs() < 1e-6);
        assert!(sample_grid(&grid, 2.0, 0.5, InterpolationMethod::Bilinear).is_nan());
        assert!(sample_grid(&grid, -0.01, 0.5, InterpolationMethod::Nearest).is_nan());
    }
}
