//! Coordinate reference system transformations.
//!
//! Implements the handful of projections the suitability pipeline needs from scratch
//! without external dependencies.

pub mod mercator;
pub mod transform;

pub use mercator::WebMercator;
pub use transform::{CrsTransform, ProjectionError};
