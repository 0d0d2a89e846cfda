//! Point transforms between supported coordinate reference systems.

use habitat_common::CrsCode;

use crate::mercator::WebMercator;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProjectionError {
    #[error("point ({x}, {y}) is outside the domain of {crs}")]
    OutOfDomain { x: f64, y: f64, crs: CrsCode },
}

/// A transform from one CRS to another.
///
/// NAD83 (EPSG:4269) and WGS84 (EPSG:4326) are treated as the same datum;
/// they differ by about a metre over CONUS, well below the resolution of the
/// layers this workspace combines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrsTransform {
    from: CrsCode,
    to: CrsCode,
}

impl CrsTransform {
    pub fn new(from: CrsCode, to: CrsCode) -> Self {
        Self { from, to }
    }

    pub fn source(&self) -> CrsCode {
        self.from
    }

    pub fn target(&self) -> CrsCode {
        self.to
    }

    /// True when coordinates pass through unchanged.
    pub fn is_identity(&self) -> bool {
        self.from == self.to || (self.from.is_geographic() && self.to.is_geographic())
    }

    /// Transform one point.
    pub fn apply(&self, x: f64, y: f64) -> Result<(f64, f64), ProjectionError> {
        if self.is_identity() {
            return Ok((x, y));
        }

        let out = match (self.from, self.to) {
            (from, CrsCode::Epsg3857) if from.is_geographic() => WebMercator.forward(x, y),
            (CrsCode::Epsg3857, to) if to.is_geographic() => WebMercator.inverse(x, y),
            _ => None,
        };

        out.ok_or(ProjectionError::OutOfDomain {
            x,
            y,
            crs: self.from,
        })
    }

    /// The reverse transform.
    pub fn inverse(&self) -> CrsTransform {
        CrsTransform::new(self.to, self.from)
    }
}
