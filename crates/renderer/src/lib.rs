//! Image rendering for suitability and site grids.
//!
//! - Colormaps (viridis, terrain, greys) and color parsing
//! - An explicit [`RenderContext`] per call: colormap, nodata color, value
//!   range and optional site boundary
//! - PNG encoding (indexed or RGBA)

pub mod error;
pub mod gradient;
pub mod png;
pub mod render;

pub use error::{RenderError, Result};
pub use gradient::{Color, Colormap};
pub use render::{render_grid, render_pixels, RenderContext, RgbaImage};
