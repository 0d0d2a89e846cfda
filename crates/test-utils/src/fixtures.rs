//! Common test fixtures for habitat model tests.

/// Common bounding box definitions for testing, as
/// `(min_x, min_y, max_x, max_y)`.
pub mod bbox {
    /// A grassland site on the Colorado Front Range spanning four
    /// 1°×1° tiles.
    pub const FRONT_RANGE: (f64, f64, f64, f64) = (-105.5, 39.5, -104.3, 40.2);

    /// A site inside a single tile.
    pub const SINGLE_TILE: (f64, f64, f64, f64) = (-105.8, 39.2, -105.3, 39.7);

    /// Edges exactly on integer degrees.
    pub const ALIGNED: (f64, f64, f64, f64) = (-106.0, 39.0, -104.0, 40.0);

    /// Continental United States, the MACA domain.
    pub const CONUS: (f64, f64, f64, f64) = (-124.8, 25.1, -67.0, 49.4);

    /// Invalid bbox (min > max)
    pub const INVALID: (f64, f64, f64, f64) = (10.0, 10.0, 5.0, 5.0);
}

/// Response-curve parameters used by the reference model.
pub mod variables {
    /// `(name, optimal, tolerance)`
    pub type Curve = (&'static str, f64, f64);

    pub const ELEVATION: Curve = ("elevation", 1600.0, 400.0);
    pub const SOIL_PH: Curve = ("soil_ph", 6.5, 1.0);
    pub const ASPECT: Curve = ("aspect", 180.0, 90.0);
    pub const MAX_TEMP: Curve = ("max_temp", 75.0, 10.0);

    pub const ALL: [Curve; 4] = [ELEVATION, MAX_TEMP, ASPECT, SOIL_PH];
}

/// Common CRS identifiers.
pub mod crs {
    /// WGS84 geographic
    pub const EPSG_4326: &str = "EPSG:4326";

    /// NAD83 geographic, used by many US soil products
    pub const EPSG_4269: &str = "EPSG:4269";

    /// Web Mercator
    pub const EPSG_3857: &str = "EPSG:3857";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_boxes_are_ordered() {
        for (min_x, min_y, max_x, max_y) in [bbox::FRONT_RANGE, bbox::SINGLE_TILE, bbox::ALIGNED] {
            assert!(min_x < max_x && min_y < max_y);
        }
    }

    #[test]
    fn test_tolerances_positive() {
        assert!(variables::ALL.iter().all(|(_, _, tol)| *tol > 0.0));
    }
}
