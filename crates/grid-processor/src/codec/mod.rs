//! Reading and writing grids.
//!
//! A codec must round-trip a grid's CRS, transform, nodata marker and `f32`
//! cell values exactly.

mod zarr;

use std::path::Path;

use habitat_common::{Grid, RawRaster};

use crate::error::Result;

pub use zarr::{GridAttributes, ZarrGridCodec};

/// Storage format for georeferenced grids.
pub trait GridCodec: Send + Sync {
    /// Load the stored array as-is, with all of its dimensions.
    fn load_raw(&self, source: &Path) -> Result<RawRaster>;

    /// Load a 2D grid, squeezing length-1 non-spatial dimensions.
    fn load_grid(&self, source: &Path) -> Result<Grid> {
        Ok(Grid::try_from(self.load_raw(source)?)?)
    }

    /// Write `grid` to `destination`, replacing any grid already there.
    fn save_grid(&self, grid: &Grid, destination: &Path) -> Result<()>;
}
