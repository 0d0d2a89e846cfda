//! Mosaicking of adjacent tiles into one grid.
//!
//! Tiles are placed on a north-up lattice that uses the first tile's cell
//! size and is anchored at the upper-left corner of the union of all tile
//! footprints. Each output cell centre is looked up in every tile through
//! the tile's inverse transform; overlaps are resolved by [`OverlapPolicy`].

use habitat_common::{BoundingBox, GeoTransform, Grid};
use tracing::{debug, instrument};

use crate::config::{GridProcessorConfig, DEFAULT_MERGE_BUFFER};
use crate::error::{GridProcessorError, Result};
use crate::types::OverlapPolicy;

/// Slack used when turning extents into whole cell counts.
const CELL_EPSILON: f64 = 1e-9;

/// Merges tile sets according to a buffer and overlap policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridMerger {
    buffer: f64,
    policy: OverlapPolicy,
}

impl Default for GridMerger {
    fn default() -> Self {
        Self {
            buffer: DEFAULT_MERGE_BUFFER,
            policy: OverlapPolicy::LastWins,
        }
    }
}

impl GridMerger {
    pub fn new(buffer: f64, policy: OverlapPolicy) -> Self {
        Self { buffer, policy }
    }

    pub fn from_config(config: &GridProcessorConfig) -> Self {
        Self::new(config.merge_buffer, config.overlap_policy)
    }

    pub fn buffer(&self) -> f64 {
        self.buffer
    }

    pub fn policy(&self) -> OverlapPolicy {
        self.policy
    }

    /// Mosaic `tiles` into one grid, optionally clipped to `target`
    /// expanded by the buffer.
    #[instrument(skip(self, tiles), fields(tiles = tiles.len()))]
    pub fn merge(&self, tiles: &[Grid], target: Option<&BoundingBox>) -> Result<Grid> {
        let first = tiles
            .first()
            .ok_or(GridProcessorError::EmptyInput { component: "merge" })?;

        if !(self.buffer.is_finite() && self.buffer >= 0.0) {
            return Err(GridProcessorError::invalid_parameter(
                "buffer",
                format!("must be finite and >= 0, got {}", self.buffer),
            ));
        }

        let expected = first.crs();
        for (index, tile) in tiles.iter().enumerate().skip(1) {
            if tile.crs() != expected {
                return Err(GridProcessorError::CrsMismatch {
                    index,
                    expected,
                    found: tile.crs(),
                });
            }
        }

        let union = tiles
            .iter()
            .skip(1)
            .fold(first.extent(), |acc, t| acc.union(&t.extent()));
        let (res_x, res_y) = first.transform().resolution();

        let total_cols = cell_count(union.width(), res_x);
        let total_rows = cell_count(union.height(), res_y);

        // Window of the union lattice covered by the output.
        let (col0, col1, row0, row1) = match target {
            None => (0, total_cols, 0, total_rows),
            Some(bbox) => {
                let buffered = bbox.expand(self.buffer);
                let clip = union.intersection(&buffered).ok_or_else(|| {
                    GridProcessorError::out_of_bounds(
                        format!("{:?}", buffered),
                        format!("{:?}", union),
                    )
                })?;
                let col0 = snap_down((clip.min_x - union.min_x) / res_x);
                let col1 = snap_up((clip.max_x - union.min_x) / res_x).min(total_cols);
                let row0 = snap_down((union.max_y - clip.max_y) / res_y);
                let row1 = snap_up((union.max_y - clip.min_y) / res_y).min(total_rows);
                (col0, col1.max(col0 + 1), row0, row1.max(row0 + 1))
            }
        };

        let rows = row1 - row0;
        let cols = col1 - col0;
        let transform = GeoTransform::north_up(
            union.min_x + col0 as f64 * res_x,
            union.max_y - row0 as f64 * res_y,
            res_x,
            res_y,
        );

        let mut data = vec![f32::NAN; rows * cols];
        for tile in tiles {
            self.place(tile, &transform, rows, cols, &mut data);
        }

        let mut mosaic = Grid::new(rows, cols, data, transform)?;
        if let Some(crs) = expected {
            mosaic = mosaic.with_crs(crs);
        }
        if let Some(nodata) = first.nodata() {
            mosaic = mosaic.with_nodata(nodata);
        }

        debug!(
            rows,
            cols,
            valid = mosaic.valid_count(),
            policy = ?self.policy,
            "Merged tiles"
        );

        Ok(mosaic)
    }

    fn place(&self, tile: &Grid, transform: &GeoTransform, rows: usize, cols: usize, out: &mut [f32]) {
        let (res_x, res_y) = (transform.pixel_width, -transform.pixel_height);
        let ext = tile.extent();

        // Output cells whose centres may fall inside the tile.
        let c_start = snap_down((ext.min_x - transform.x_origin) / res_x - 0.5).min(cols);
        let c_end = snap_up((ext.max_x - transform.x_origin) / res_x + 0.5).min(cols);
        let r_start = snap_down((transform.y_origin - ext.max_y) / res_y - 0.5).min(rows);
        let r_end = snap_up((transform.y_origin - ext.min_y) / res_y + 0.5).min(rows);

        for row in r_start..r_end {
            for col in c_start..c_end {
                let (x, y) = transform.apply(col as f64 + 0.5, row as f64 + 0.5);
                let Some((tr, tc)) = tile.coord_to_cell(x, y) else {
                    continue;
                };
                let Some(v) = tile.cell_value(tr, tc) else {
                    continue;
                };
                let cell = &mut out[row * cols + col];
                match self.policy {
                    OverlapPolicy::LastWins => *cell = v,
                    OverlapPolicy::FirstWins => {
                        if cell.is_nan() {
                            *cell = v;
                        }
                    }
                }
            }
        }
    }
}

/// Mosaic with the default buffer and last-wins overlap policy.
pub fn merge_tiles(tiles: &[Grid], target: Option<&BoundingBox>) -> Result<Grid> {
    GridMerger::default().merge(tiles, target)
}

fn cell_count(extent: f64, res: f64) -> usize {
    snap_up(extent / res).max(1)
}

fn snap_down(v: f64) -> usize {
    (v + CELL_EPSILON).floor().max(0.0) as usize
}

fn snap_up(v: f64) -> usize {
    (v - CELL_EPSILON).ceil().max(0.0) as usize
}
