//! Color ramps for gridded values.

use std::fmt;

/// Color value in RGBA format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn transparent() -> Self {
        Self { r: 0, g: 0, b: 0, a: 0 }
    }

    /// Parse `#RRGGBB`, `#RRGGBBAA` or one of a few color names.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix('#') {
            return hex_to_rgba(hex);
        }
        let color = match s.to_lowercase().as_str() {
            "black" => Self::rgb(0, 0, 0),
            "white" => Self::rgb(255, 255, 255),
            "red" => Self::rgb(255, 0, 0),
            "green" => Self::rgb(0, 128, 0),
            "blue" => Self::rgb(0, 0, 255),
            "yellow" => Self::rgb(255, 255, 0),
            "gray" | "grey" => Self::rgb(128, 128, 128),
            "lightblue" => Self::rgb(173, 216, 230),
            "transparent" | "none" => Self::transparent(),
            _ => return hex_to_rgba(s),
        };
        Some(color)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
    }
}

/// Parse hex color digits (no leading `#`) to RGBA
fn hex_to_rgba(hex: &str) -> Option<Color> {
    if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    let a = if hex.len() == 8 { channel(6)? } else { 255 };
    Some(Color::new(channel(0)?, channel(2)?, channel(4)?, a))
}

/// Linear color interpolation
pub fn interpolate_color(color1: Color, color2: Color, t: f32) -> Color {
    let t = t.clamp(0.0, 1.0);
    let t_inv = 1.0 - t;
    let mix = |a: u8, b: u8| ((a as f32 * t_inv) + (b as f32 * t)).round() as u8;

    Color::new(
        mix(color1.r, color2.r),
        mix(color1.g, color2.g),
        mix(color1.b, color2.b),
        mix(color1.a, color2.a),
    )
}

/// A color at a normalized position in a ramp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorStop {
    pub position: f32,
    pub color: Color,
}

const fn stop(position: f32, r: u8, g: u8, b: u8) -> ColorStop {
    ColorStop {
        position,
        color: Color::rgb(r, g, b),
    }
}

const VIRIDIS: [ColorStop; 9] = [
    stop(0.0, 68, 1, 84),
    stop(0.125, 71, 44, 122),
    stop(0.25, 59, 81, 139),
    stop(0.375, 44, 113, 142),
    stop(0.5, 33, 144, 141),
    stop(0.625, 39, 173, 129),
    stop(0.75, 92, 200, 99),
    stop(0.875, 170, 220, 50),
    stop(1.0, 253, 231, 37),
];

const TERRAIN: [ColorStop; 6] = [
    stop(0.0, 51, 51, 153),
    stop(0.15, 0, 153, 255),
    stop(0.25, 0, 204, 102),
    stop(0.5, 255, 255, 153),
    stop(0.75, 128, 92, 84),
    stop(1.0, 255, 255, 255),
];

const GREYS: [ColorStop; 2] = [stop(0.0, 255, 255, 255), stop(1.0, 0, 0, 0)];

/// Named color ramps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Colormap {
    #[default]
    Viridis,
    Terrain,
    Greys,
}

impl Colormap {
    /// Parse from string (case-insensitive), falling back to viridis.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "terrain" => Self::Terrain,
            "greys" | "grays" | "gray" | "grey" => Self::Greys,
            _ => Self::Viridis,
        }
    }

    pub fn stops(&self) -> &'static [ColorStop] {
        match self {
            Self::Viridis => &VIRIDIS,
            Self::Terrain => &TERRAIN,
            Self::Greys => &GREYS,
        }
    }

    /// Color for a normalized value; `t` is clamped to `[0, 1]`.
    pub fn color_at(&self, t: f32) -> Color {
        let stops = self.stops();
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };

        let upper = stops
            .iter()
            .position(|s| s.position >= t)
            .unwrap_or(stops.len() - 1);
        if upper == 0 {
            return stops[0].color;
        }
        let (lo, hi) = (stops[upper - 1], stops[upper]);
        let span = hi.position - lo.position;
        interpolate_color(lo.color, hi.color, (t - lo.position) / span)
    }
}

impl fmt::Display for Colormap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Viridis => write!(f, "viridis"),
            Self::Terrain => write!(f, "terrain"),
            Self::Greys => write!(f, "greys"),
        }
    }
}

/// Map values to RGBA pixels.
///
/// Values are normalized against `[min_val, max_val]`; NaN cells get
/// `nodata`.
pub fn render_values<F>(
    data: &[f32],
    min_val: f32,
    max_val: f32,
    nodata: Color,
    color_fn: F,
) -> Vec<u8>
where
    F: Fn(f32) -> Color,
{
    let mut pixels = vec![0u8; data.len() * 4];

    let range = max_val - min_val;
    let range = if range.abs() < f32::EPSILON { 1.0 } else { range };

    for (pixel, &value) in pixels.chunks_exact_mut(4).zip(data) {
        let color = if value.is_nan() {
            nodata
        } else {
            color_fn(((value - min_val) / range).clamp(0.0, 1.0))
        };
        pixel.copy_from_slice(&[color.r, color.g, color.b, color.a]);
    }

    pixels
}
