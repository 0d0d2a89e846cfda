//! Spherical (Web) Mercator projection, EPSG:3857.
//!
//! Geographic coordinates are treated as points on a sphere with the WGS84
//! semi-major axis, as Web Mercator prescribes. The projection is undefined
//! at the poles, so latitudes are limited to the usual ±85.0511° square.

use std::f64::consts::PI;

/// WGS84 semi-major axis (meters), used as the sphere radius.
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// Latitude at which the Web Mercator square ends.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Half the width of the projected world (meters).
pub const MAX_EXTENT: f64 = PI * EARTH_RADIUS;

/// Web Mercator forward/inverse math.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebMercator;

impl WebMercator {
    /// Project lon/lat (degrees) to x/y (meters).
    ///
    /// Returns `None` outside the projection's latitude range.
    pub fn forward(&self, lon_deg: f64, lat_deg: f64) -> Option<(f64, f64)> {
        if !lon_deg.is_finite() || !lat_deg.is_finite() || lat_deg.abs() > MAX_LATITUDE {
            return None;
        }
        let x = EARTH_RADIUS * lon_deg.to_radians();
        let lat = lat_deg.to_radians();
        let y = EARTH_RADIUS * (PI / 4.0 + lat / 2.0).tan().ln();
        Some((x, y))
    }

    /// Unproject x/y (meters) to lon/lat (degrees).
    pub fn inverse(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        let lon = (x / EARTH_RADIUS).to_degrees();
        let lat = (2.0 * (y / EARTH_RADIUS).exp().atan() - PI / 2.0).to_degrees();
        Some((lon, lat))
    }
}
