//! Common types shared across the habitat suitability workspace.

pub mod bbox;
pub mod crs;
pub mod error;
pub mod grid;
pub mod layer;
pub mod tile;

pub use bbox::BoundingBox;
pub use crs::CrsCode;
pub use error::{GridError, GridResult};
pub use grid::{GeoTransform, Grid, RawRaster};
pub use layer::LayerStack;
pub use tile::{tiles_for_bounds, DegreeTile};
