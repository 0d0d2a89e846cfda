//! Reprojection of grids onto a target lattice.
//!
//! The aligner never does projection math itself; it hands each grid and
//! the reference lattice to a [`Reprojector`]. [`WarpReprojector`] is the
//! in-process implementation backed by the `projection` crate.

use habitat_common::{BoundingBox, CrsCode, GeoTransform, Grid};
use projection::CrsTransform;
use rayon::prelude::*;
use tracing::debug;

use super::interpolation::sample_grid;
use crate::error::{GridProcessorError, Result};
use crate::types::InterpolationMethod;

/// The lattice a grid is resampled onto: shape, transform and CRS.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetGrid {
    pub rows: usize,
    pub cols: usize,
    pub transform: GeoTransform,
    pub crs: CrsCode,
}

impl TargetGrid {
    /// Lattice of an existing grid, labelled with `crs`.
    pub fn from_grid(grid: &Grid, crs: CrsCode) -> Self {
        let (rows, cols) = grid.shape();
        Self {
            rows,
            cols,
            transform: *grid.transform(),
            crs,
        }
    }

    /// True when `grid` already sits exactly on this lattice.
    pub fn matches(&self, grid: &Grid) -> bool {
        grid.shape() == (self.rows, self.cols)
            && grid.crs() == Some(self.crs)
            && grid.transform().approx_eq(&self.transform, 1e-12)
    }
}

/// Enclosing box of `bbox` after transforming it from `from` to `to`.
///
/// Corners and edge midpoints are sampled; the supported CRS pairs map
/// meridians and parallels to straight axis-aligned lines.
pub fn transform_bounds(bbox: &BoundingBox, from: CrsCode, to: CrsCode) -> Result<BoundingBox> {
    let transform = CrsTransform::new(from, to);
    if transform.is_identity() {
        return Ok(*bbox);
    }

    let (cx, cy) = bbox.center();
    let samples = [
        (bbox.min_x, bbox.min_y),
        (bbox.min_x, bbox.max_y),
        (bbox.max_x, bbox.min_y),
        (bbox.max_x, bbox.max_y),
        (cx, bbox.min_y),
        (cx, bbox.max_y),
        (bbox.min_x, cy),
        (bbox.max_x, cy),
    ];
    let points = samples
        .iter()
        .map(|&(x, y)| {
            transform
                .apply(x, y)
                .map_err(|e| GridProcessorError::Projection(e.to_string()))
        })
        .collect::<Result<Vec<_>>>()?;

    BoundingBox::from_points(&points)
        .ok_or_else(|| GridProcessorError::invalid_parameter("bbox", "no points to transform"))
}

/// Capability that reprojects and resamples a grid onto a target lattice.
///
/// Implementations must return a grid with exactly the target's shape,
/// transform and CRS, and mark cells with no source coverage as no-data.
pub trait Reprojector: Send + Sync {
    fn reproject_resample(
        &self,
        source: &Grid,
        target: &TargetGrid,
        method: InterpolationMethod,
    ) -> Result<Grid>;
}

/// Inverse-mapping warper.
///
/// Each target cell centre is transformed into the source CRS, located in
/// the source array through the inverse geotransform and sampled with the
/// requested kernel.
#[derive(Debug, Clone, Copy, Default)]
pub struct WarpReprojector;

impl Reprojector for WarpReprojector {
    fn reproject_resample(
        &self,
        source: &Grid,
        target: &TargetGrid,
        method: InterpolationMethod,
    ) -> Result<Grid> {
        let source_crs = source.crs().ok_or_else(|| GridProcessorError::CrsUndefined {
            component: "reproject",
            name: "source".to_string(),
        })?;

        if target.matches(source) {
            return Ok(source.clone());
        }

        let transform = CrsTransform::new(target.crs, source_crs);
        let mut output = vec![f32::NAN; target.rows * target.cols];

        // Rows are warped independently on the rayon pool
        let outside: usize = output
            .par_chunks_mut(target.cols.max(1))
            .enumerate()
            .map(|(row, out_row)| {
                let mut outside = 0usize;
                for (col, cell) in out_row.iter_mut().enumerate() {
                    let (x, y) = target.transform.apply(col as f64 + 0.5, row as f64 + 0.5);
                    let Ok((sx, sy)) = transform.apply(x, y) else {
                        outside += 1;
                        continue;
                    };
                    let (scol, srow) = source.transform().invert(sx, sy);
                    *cell = sample_grid(source, scol, srow, method);
                }
                outside
            })
            .sum();

        debug!(
            source_shape = ?source.shape(),
            target_shape = ?(target.rows, target.cols),
            from = %source_crs,
            to = %target.crs,
            method = %method,
            outside_projection = outside,
            "Reprojected grid"
        );

        let mut grid = Grid::new(target.rows, target.cols, output, target.transform)?
            .with_crs(target.crs);
        if let Some(nodata) = source.nodata() {
            grid = grid.with_nodata(nodata);
        }
        Ok(grid)
    }
}
