//! Integer-degree tiles.
//!
//! Many gridded soil and elevation products are published as one file per
//! 1°×1° cell, named by the cell's lower-left corner.

use crate::BoundingBox;
use serde::{Deserialize, Serialize};

/// A 1°×1° tile identified by its lower-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DegreeTile {
    /// Western edge (degrees longitude)
    pub lon: i32,
    /// Southern edge (degrees latitude)
    pub lat: i32,
}

impl DegreeTile {
    pub fn new(lon: i32, lat: i32) -> Self {
        Self { lon, lat }
    }

    /// Footprint of the tile in degrees.
    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::new(
            self.lon as f64,
            self.lat as f64,
            (self.lon + 1) as f64,
            (self.lat + 1) as f64,
        )
    }
}

/// Enumerate every integer-degree tile intersecting `bounds`.
///
/// The ranges are `floor(min)..ceil(max)` (half-open), so an edge lying
/// exactly on an integer coordinate selects the tile inside the box and not
/// the one that merely touches it. Tiles are ordered by longitude, then
/// latitude.
pub fn tiles_for_bounds(bounds: &BoundingBox) -> Vec<DegreeTile> {
    if !bounds.is_valid() {
        return Vec::new();
    }

    let min_lon = bounds.min_x.floor() as i32;
    let min_lat = bounds.min_y.floor() as i32;
    let max_lon = bounds.max_x.ceil() as i32;
    let max_lat = bounds.max_y.ceil() as i32;

    let mut tiles = Vec::new();
    for lon in min_lon..max_lon {
        for lat in min_lat..max_lat {
            tiles.push(DegreeTile::new(lon, lat));
        }
    }
    tiles
}
