//! Georeferenced 2D grids.
//!
//! A [`Grid`] is an immutable row-major block of `f32` cells with an affine
//! [`GeoTransform`], an optional CRS and an optional source nodata marker.
//! Missing cells are stored as NaN; a declared nodata sentinel is recorded
//! so codecs can write it back, but the sentinel values themselves are
//! normalised to NaN when the grid is built.

use crate::error::{GridError, GridResult};
use crate::{BoundingBox, CrsCode};
use serde::{Deserialize, Serialize};

/// Affine transform from (col, row) array space to map coordinates.
///
/// Coefficients follow the GDAL ordering:
///
/// ```text
/// x = x_origin + col * pixel_width  + row * row_rotation
/// y = y_origin + col * col_rotation + row * pixel_height
/// ```
///
/// `(col, row) = (0, 0)` is the upper-left corner of the upper-left cell, so
/// cell centres sit at half-integer offsets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub x_origin: f64,
    pub pixel_width: f64,
    pub row_rotation: f64,
    pub y_origin: f64,
    pub col_rotation: f64,
    /// Negative for north-up grids.
    pub pixel_height: f64,
}

impl GeoTransform {
    /// North-up transform anchored at the upper-left corner `(x_origin, y_origin)`.
    ///
    /// `res_x` and `res_y` are positive cell sizes.
    pub fn north_up(x_origin: f64, y_origin: f64, res_x: f64, res_y: f64) -> Self {
        Self {
            x_origin,
            pixel_width: res_x,
            row_rotation: 0.0,
            y_origin,
            col_rotation: 0.0,
            pixel_height: -res_y,
        }
    }

    /// Build from the six GDAL coefficients.
    pub fn from_gdal(c: [f64; 6]) -> Self {
        Self {
            x_origin: c[0],
            pixel_width: c[1],
            row_rotation: c[2],
            y_origin: c[3],
            col_rotation: c[4],
            pixel_height: c[5],
        }
    }

    /// The six GDAL coefficients.
    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.x_origin,
            self.pixel_width,
            self.row_rotation,
            self.y_origin,
            self.col_rotation,
            self.pixel_height,
        ]
    }

    fn determinant(&self) -> f64 {
        self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation
    }

    /// A transform is usable when it is finite and invertible.
    pub fn is_invertible(&self) -> bool {
        let det = self.determinant();
        self.to_gdal().iter().all(|c| c.is_finite()) && det.is_finite() && det != 0.0
    }

    /// True when there is no rotation term.
    pub fn is_north_up(&self) -> bool {
        self.row_rotation == 0.0 && self.col_rotation == 0.0
    }

    /// Map fractional array coordinates to map coordinates.
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.x_origin + col * self.pixel_width + row * self.row_rotation,
            self.y_origin + col * self.col_rotation + row * self.pixel_height,
        )
    }

    /// Map coordinates back to fractional `(col, row)`.
    ///
    /// Callers must only use this on invertible transforms; [`Grid`]
    /// construction guarantees it.
    pub fn invert(&self, x: f64, y: f64) -> (f64, f64) {
        let det = self.determinant();
        let dx = x - self.x_origin;
        let dy = y - self.y_origin;
        let col = (self.pixel_height * dx - self.row_rotation * dy) / det;
        let row = (-self.col_rotation * dx + self.pixel_width * dy) / det;
        (col, row)
    }

    /// Cell size along each array axis, always positive.
    pub fn resolution(&self) -> (f64, f64) {
        (
            self.pixel_width.hypot(self.col_rotation),
            self.row_rotation.hypot(self.pixel_height),
        )
    }

    /// Coefficient-wise comparison with a relative tolerance.
    pub fn approx_eq(&self, other: &GeoTransform, rel_tol: f64) -> bool {
        self.to_gdal()
            .iter()
            .zip(other.to_gdal().iter())
            .all(|(a, b)| (a - b).abs() <= rel_tol * a.abs().max(b.abs()).max(1.0))
    }
}

/// An immutable georeferenced 2D grid of `f32` cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
    transform: GeoTransform,
    crs: Option<CrsCode>,
    nodata: Option<f32>,
}

impl Grid {
    /// Create a grid from row-major cell values.
    ///
    /// NaN cells are treated as no-data.
    pub fn new(rows: usize, cols: usize, data: Vec<f32>, transform: GeoTransform) -> GridResult<Self> {
        if rows == 0 || cols == 0 {
            return Err(GridError::EmptyGrid { rows, cols });
        }
        if data.len() != rows * cols {
            return Err(GridError::DataLength {
                expected: rows * cols,
                actual: data.len(),
            });
        }
        if !transform.is_invertible() {
            return Err(GridError::SingularTransform(transform.to_gdal()));
        }

        Ok(Self {
            rows,
            cols,
            data,
            transform,
            crs: None,
            nodata: None,
        })
    }

    /// Create a grid by evaluating `f(row, col)` for every cell.
    pub fn from_fn<F>(rows: usize, cols: usize, transform: GeoTransform, mut f: F) -> GridResult<Self>
    where
        F: FnMut(usize, usize) -> f32,
    {
        let mut data = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            for col in 0..cols {
                data.push(f(row, col));
            }
        }
        Self::new(rows, cols, data, transform)
    }

    /// Create a grid with every cell set to `value`.
    pub fn filled(rows: usize, cols: usize, value: f32, transform: GeoTransform) -> GridResult<Self> {
        Self::new(rows, cols, vec![value; rows * cols], transform)
    }

    /// Attach (or replace) the CRS label.
    pub fn with_crs(mut self, crs: CrsCode) -> Self {
        self.crs = Some(crs);
        self
    }

    /// Declare a nodata sentinel. Cells equal to it become missing.
    pub fn with_nodata(mut self, nodata: f32) -> Self {
        if !nodata.is_nan() {
            for v in self.data.iter_mut() {
                if *v == nodata {
                    *v = f32::NAN;
                }
            }
        }
        self.nodata = Some(nodata);
        self
    }

    /// Build a grid on the same lattice with new cell values.
    pub fn with_values(&self, data: Vec<f32>) -> GridResult<Self> {
        if data.len() != self.data.len() {
            return Err(GridError::DataLength {
                expected: self.data.len(),
                actual: data.len(),
            });
        }
        Ok(Self {
            rows: self.rows,
            cols: self.cols,
            data,
            transform: self.transform,
            crs: self.crs,
            nodata: self.nodata,
        })
    }

    /// Apply `f` to every valid cell; missing cells stay missing.
    pub fn map_valid<F>(&self, f: F) -> Self
    where
        F: Fn(f32) -> f32,
    {
        let data = self
            .data
            .iter()
            .map(|&v| if v.is_nan() { f32::NAN } else { f(v) })
            .collect();
        Self {
            data,
            ..self.clone_header()
        }
    }

    fn clone_header(&self) -> Self {
        Self {
            rows: self.rows,
            cols: self.cols,
            data: Vec::new(),
            transform: self.transform,
            crs: self.crs,
            nodata: self.nodata,
        }
    }

    /// `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn crs(&self) -> Option<CrsCode> {
        self.crs
    }

    /// The nodata sentinel declared by the source, if any.
    pub fn nodata(&self) -> Option<f32> {
        self.nodata
    }

    /// Row-major cell values, NaN for missing cells.
    pub fn values(&self) -> &[f32] {
        &self.data
    }

    /// Value of a cell, or `None` for no-data or out-of-range indices.
    pub fn cell_value(&self, row: usize, col: usize) -> Option<f32> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        let v = self.data[row * self.cols + col];
        if v.is_nan() {
            None
        } else {
            Some(v)
        }
    }

    /// Raw cell value (NaN for missing). Panics on out-of-range indices.
    #[inline]
    pub fn raw(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.cols + col]
    }

    /// Map coordinates of a cell centre.
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        self.transform.apply(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Cell containing the map coordinate, if any.
    pub fn coord_to_cell(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let (col, row) = self.transform.invert(x, y);
        if !col.is_finite() || !row.is_finite() {
            return None;
        }
        let (col, row) = (col.floor(), row.floor());
        if col < 0.0 || row < 0.0 || col >= self.cols as f64 || row >= self.rows as f64 {
            return None;
        }
        Some((row as usize, col as usize))
    }

    /// Spatial footprint `(xmin, ymin, xmax, ymax)` from the transform.
    pub fn extent(&self) -> BoundingBox {
        let (c, r) = (self.cols as f64, self.rows as f64);
        let corners = [
            self.transform.apply(0.0, 0.0),
            self.transform.apply(c, 0.0),
            self.transform.apply(0.0, r),
            self.transform.apply(c, r),
        ];
        // Four corners always exist, so the fallback is never taken.
        BoundingBox::from_points(&corners).unwrap_or(BoundingBox::new(0.0, 0.0, 0.0, 0.0))
    }

    /// Number of cells holding a value.
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| !v.is_nan()).count()
    }

    /// Same shape, transform (within float tolerance) and CRS.
    pub fn is_co_registered(&self, other: &Grid) -> bool {
        self.shape() == other.shape()
            && self.crs == other.crs
            && self.transform.approx_eq(&other.transform, 1e-9)
    }
}

/// A decoded N-dimensional array with georeferencing, before it is
/// accepted as a 2D [`Grid`].
#[derive(Debug, Clone)]
pub struct RawRaster {
    pub dims: Vec<String>,
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
    pub transform: GeoTransform,
    pub crs: Option<CrsCode>,
    pub nodata: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Y,
    X,
    Other,
}

fn classify_dim(name: &str) -> Axis {
    match name.to_lowercase().as_str() {
        "y" | "lat" | "latitude" | "row" | "rows" => Axis::Y,
        "x" | "lon" | "longitude" | "col" | "cols" => Axis::X,
        _ => Axis::Other,
    }
}

impl TryFrom<RawRaster> for Grid {
    type Error = GridError;

    /// Squeeze length-1 non-spatial dimensions and require exactly one
    /// `y` axis followed by one `x` axis.
    fn try_from(raw: RawRaster) -> Result<Self, Self::Error> {
        let unsupported = || GridError::UnsupportedShape {
            dims: raw.dims.clone(),
            shape: raw.shape.clone(),
        };

        if raw.dims.len() != raw.shape.len() {
            return Err(unsupported());
        }

        let mut rows = None;
        let mut cols = None;
        for (name, &len) in raw.dims.iter().zip(&raw.shape) {
            match classify_dim(name) {
                Axis::Y if rows.is_none() && cols.is_none() => rows = Some(len),
                Axis::X if rows.is_some() && cols.is_none() => cols = Some(len),
                Axis::Other if len == 1 => {}
                _ => return Err(unsupported()),
            }
        }

        let (Some(rows), Some(cols)) = (rows, cols) else {
            return Err(unsupported());
        };

        let mut grid = Grid::new(rows, cols, raw.data, raw.transform)?;
        if let Some(crs) = raw.crs {
            grid = grid.with_crs(crs);
        }
        if let Some(nodata) = raw.nodata {
            grid = grid.with_nodata(nodata);
        }
        Ok(grid)
    }
}

impl From<&Grid> for RawRaster {
    fn from(grid: &Grid) -> Self {
        RawRaster {
            dims: vec!["y".to_string(), "x".to_string()],
            shape: vec![grid.rows, grid.cols],
            data: grid.data.clone(),
            transform: grid.transform,
            crs: grid.crs,
            nodata: grid.nodata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_transform() -> GeoTransform {
        GeoTransform::north_up(0.0, 3.0, 1.0, 1.0)
    }

    #[test]
    fn test_extent_from_transform() {
        let grid = Grid::filled(3, 4, 1.0, unit_transform()).unwrap();
        let extent = grid.extent();
        assert_eq!(extent, BoundingBox::new(0.0, 0.0, 4.0, 3.0));
    }

    #[test]
    fn test_cell_center_and_lookup() {
        let grid = Grid::from_fn(3, 4, unit_transform(), |r, c| (r * 10 + c) as f32).unwrap();
        assert_eq!(grid.cell_center(0, 0), (0.5, 2.5));
        assert_eq!(grid.coord_to_cell(3.2, 0.1), Some((2, 3)));
        assert_eq!(grid.coord_to_cell(4.5, 1.0), None);
        assert_eq!(grid.cell_value(2, 3), Some(23.0));
        assert_eq!(grid.cell_value(3, 0), None);
    }

    #[test]
    fn test_nodata_sentinel_is_normalised() {
        let grid = Grid::new(1, 3, vec![1.0, -9999.0, 3.0], unit_transform())
            .unwrap()
            .with_nodata(-9999.0);
        assert_eq!(grid.cell_value(0, 1), None);
        assert_eq!(grid.valid_count(), 2);
        assert_eq!(grid.nodata(), Some(-9999.0));
    }

    #[test]
    fn test_rejects_bad_shapes() {
        assert!(matches!(
            Grid::new(2, 2, vec![0.0; 3], unit_transform()),
            Err(GridError::DataLength { expected: 4, actual: 3 })
        ));
        assert!(matches!(
            Grid::new(0, 2, vec![], unit_transform()),
            Err(GridError::EmptyGrid { .. })
        ));
        let singular = GeoTransform::from_gdal([0.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
        assert!(matches!(
            Grid::new(1, 1, vec![0.0], singular),
            Err(GridError::SingularTransform(_))
        ));
    }

    #[test]
    fn test_rotated_transform_inverts() {
        let t = GeoTransform::from_gdal([10.0, 2.0, 0.5, 20.0, 0.25, -2.0]);
        let (x, y) = t.apply(3.5, 1.25);
        let (c, r) = t.invert(x, y);
        assert!((c - 3.5).abs() < 1e-9);
        assert!((r - 1.25).abs() < 1e-9);
    }

    #[test]
    fn test_raw_squeeze_band_dimension() {
        let raw = RawRaster {
            dims: vec!["band".into(), "y".into(), "x".into()],
            shape: vec![1, 2, 2],
            data: vec![1.0, 2.0, 3.0, 4.0],
            transform: unit_transform(),
            crs: Some(CrsCode::Epsg4326),
            nodata: None,
        };
        let grid = Grid::try_from(raw).unwrap();
        assert_eq!(grid.shape(), (2, 2));
        assert_eq!(grid.crs(), Some(CrsCode::Epsg4326));
    }

    #[test]
    fn test_raw_rejects_multiband() {
        let raw = RawRaster {
            dims: vec!["band".into(), "y".into(), "x".into()],
            shape: vec![2, 1, 2],
            data: vec![1.0, 2.0, 3.0, 4.0],
            transform: unit_transform(),
            crs: None,
            nodata: None,
        };
        assert!(matches!(
            Grid::try_from(raw),
            Err(GridError::UnsupportedShape { .. })
        ));
    }

    #[test]
    fn test_raw_rejects_transposed_axes() {
        let raw = RawRaster {
            dims: vec!["x".into(), "y".into()],
            shape: vec![2, 2],
            data: vec![1.0; 4],
            transform: unit_transform(),
            crs: None,
            nodata: None,
        };
        assert!(Grid::try_from(raw).is_err());
    }
}
