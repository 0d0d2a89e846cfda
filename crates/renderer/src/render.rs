//! Grid rendering with an explicit per-call context.

use habitat_common::{BoundingBox, Grid};
use tracing::debug;

use crate::error::{RenderError, Result};
use crate::gradient::{render_values, Color, Colormap};
use crate::png::create_png_auto;

/// Largest pixel block per grid cell.
pub const MAX_SCALE: usize = 16;

/// Everything needed to turn one grid into an image.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderContext {
    pub colormap: Colormap,
    /// Color of cells without a value
    pub nodata_color: Color,
    /// Values mapped to the ends of the colormap; the grid's finite
    /// minimum and maximum when `None`
    pub value_range: Option<(f32, f32)>,
    /// Site outline in the grid's CRS
    pub boundary: Option<BoundingBox>,
    pub boundary_color: Color,
    /// Pixels per cell along each axis
    pub scale: usize,
}

impl Default for RenderContext {
    fn default() -> Self {
        Self {
            colormap: Colormap::Viridis,
            nodata_color: Color::transparent(),
            value_range: None,
            boundary: None,
            boundary_color: Color::rgb(0, 0, 0),
            scale: 1,
        }
    }
}

impl RenderContext {
    pub fn new(colormap: Colormap) -> Self {
        Self {
            colormap,
            ..Default::default()
        }
    }

    pub fn with_nodata_color(mut self, color: Color) -> Self {
        self.nodata_color = color;
        self
    }

    pub fn with_range(mut self, min: f32, max: f32) -> Self {
        self.value_range = Some((min, max));
        self
    }

    pub fn with_boundary(mut self, boundary: BoundingBox, color: Color) -> Self {
        self.boundary = Some(boundary);
        self.boundary_color = color;
        self
    }

    pub fn with_scale(mut self, scale: usize) -> Self {
        self.scale = scale;
        self
    }

    /// The range used for `grid`: the explicit one, else the finite extremes.
    pub fn resolve_range(&self, grid: &Grid) -> Result<(f32, f32)> {
        let (min, max) = match self.value_range {
            Some(range) => range,
            None => grid
                .values()
                .iter()
                .filter(|v| v.is_finite())
                .fold(None, |acc: Option<(f32, f32)>, &v| match acc {
                    None => Some((v, v)),
                    Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
                })
                .unwrap_or((0.0, 1.0)),
        };
        if !(min.is_finite() && max.is_finite() && min <= max) {
            return Err(RenderError::InvalidRange { min, max });
        }
        Ok((min, max))
    }
}

/// An RGBA image.
#[derive(Debug, Clone, PartialEq)]
pub struct RgbaImage {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u8>,
}

impl RgbaImage {
    /// Pixel at `(x, y)` as `[r, g, b, a]`.
    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y * self.width + x) * 4;
        Some([
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ])
    }

    fn put(&mut self, x: i64, y: i64, color: Color) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let i = (y as usize * self.width + x as usize) * 4;
        self.pixels[i..i + 4].copy_from_slice(&[color.r, color.g, color.b, color.a]);
    }

    /// Bresenham line between two pixel positions; off-image points are
    /// skipped.
    fn line(&mut self, (x0, y0): (i64, i64), (x1, y1): (i64, i64), color: Color) {
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let (mut x, mut y, mut err) = (x0, y0, dx + dy);
        loop {
            self.put(x, y, color);
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }
}

/// Colormap `grid` into RGBA pixels, one `scale`×`scale` block per cell,
/// with the boundary drawn on top.
pub fn render_pixels(ctx: &RenderContext, grid: &Grid) -> Result<RgbaImage> {
    let (rows, cols) = grid.shape();
    if rows == 0 || cols == 0 {
        return Err(RenderError::EmptyGrid);
    }
    if ctx.scale == 0 || ctx.scale > MAX_SCALE {
        return Err(RenderError::InvalidScale(ctx.scale));
    }
    let (min, max) = ctx.resolve_range(grid)?;

    let cells = render_values(grid.values(), min, max, ctx.nodata_color, |t| {
        ctx.colormap.color_at(t)
    });

    let scale = ctx.scale;
    let (width, height) = (cols * scale, rows * scale);
    let pixels = if scale == 1 {
        cells
    } else {
        let mut out = Vec::with_capacity(width * height * 4);
        for row in cells.chunks_exact(cols * 4) {
            let mut line = Vec::with_capacity(width * 4);
            for px in row.chunks_exact(4) {
                for _ in 0..scale {
                    line.extend_from_slice(px);
                }
            }
            for _ in 0..scale {
                out.extend_from_slice(&line);
            }
        }
        out
    };

    let mut image = RgbaImage {
        width,
        height,
        pixels,
    };

    if let Some(bbox) = ctx.boundary {
        draw_boundary(&mut image, grid, &bbox, scale, ctx.boundary_color);
    }

    Ok(image)
}

fn draw_boundary(image: &mut RgbaImage, grid: &Grid, bbox: &BoundingBox, scale: usize, color: Color) {
    let to_pixel = |x: f64, y: f64| {
        let (col, row) = grid.transform().invert(x, y);
        let snap = |v: f64, n: usize| {
            let p = (v * scale as f64).floor() as i64;
            // An edge exactly on the far side of the grid lands on the last pixel.
            if p == n as i64 {
                p - 1
            } else {
                p
            }
        };
        (snap(col, image.width), snap(row, image.height))
    };

    let corners = [
        to_pixel(bbox.min_x, bbox.max_y),
        to_pixel(bbox.max_x, bbox.max_y),
        to_pixel(bbox.max_x, bbox.min_y),
        to_pixel(bbox.min_x, bbox.min_y),
    ];
    for i in 0..4 {
        image.line(corners[i], corners[(i + 1) % 4], color);
    }
}

/// Render `grid` to PNG bytes.
pub fn render_grid(ctx: &RenderContext, grid: &Grid) -> Result<Vec<u8>> {
    let image = render_pixels(ctx, grid)?;
    let png = create_png_auto(&image.pixels, image.width, image.height)?;
    debug!(
        width = image.width,
        height = image.height,
        colormap = %ctx.colormap,
        bytes = png.len(),
        "Rendered grid"
    );
    Ok(png)
}
