//! Projection utilities for grid processing.
//!
//! This module handles resampling kernels and the reprojection capability
//! used to put every input grid on a common lattice.

pub mod interpolation;
pub mod reproject;

pub use interpolation::{bilinear_interpolate, cubic_interpolate, nearest_interpolate, sample_grid};
pub use reproject::{transform_bounds, Reprojector, TargetGrid, WarpReprojector};
