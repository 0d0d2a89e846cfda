//! Tile providers: where the raw rasters for a site come from.
//!
//! A provider turns a site request into the list of sources that cover it.
//! Remote providers only format URLs; fetching is left to the caller.

use std::fmt;
use std::path::{Path, PathBuf};

use habitat_common::{tiles_for_bounds, BoundingBox};
use tracing::debug;

use crate::error::{GridProcessorError, Result};

/// Root of the POLARIS soil property archive.
pub const POLARIS_BASE_URL: &str = "http://hydrology.cee.duke.edu/POLARIS/PROPERTIES/v1.0";

/// Root of the MACA v2 downscaled climate archive.
pub const MACA_BASE_URL: &str =
    "http://thredds.northwestknowledge.net:8080/thredds/fileServer/MACAV2";

/// A request for the data covering a site.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileRequest {
    /// Site bounds in the provider's native coordinates.
    pub bounds: BoundingBox,
}

impl TileRequest {
    pub fn new(bounds: BoundingBox) -> Self {
        Self { bounds }
    }
}

/// Location of one raw raster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TileSource {
    Url(String),
    Path(PathBuf),
}

impl TileSource {
    /// Last path component, used to name local copies.
    pub fn file_name(&self) -> Option<String> {
        match self {
            Self::Url(url) => url
                .rsplit('/')
                .next()
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            Self::Path(path) => path.file_name().map(|n| n.to_string_lossy().into_owned()),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Url(_))
    }
}

impl fmt::Display for TileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => write!(f, "{}", url),
            Self::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Something that can list the sources covering a site.
pub trait TileProvider: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    fn fetch_tiles(&self, request: &TileRequest) -> Result<Vec<TileSource>>;
}

/// POLARIS soil properties, published as one GeoTIFF per 1°×1° tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolarisProvider {
    base_url: String,
    property: String,
    statistic: String,
    depth: String,
}

impl PolarisProvider {
    /// `property` e.g. `ph`, `statistic` e.g. `mean`, `depth` e.g. `60_100`.
    pub fn new(
        property: impl Into<String>,
        statistic: impl Into<String>,
        depth: impl Into<String>,
    ) -> Self {
        Self {
            base_url: POLARIS_BASE_URL.to_string(),
            property: property.into(),
            statistic: statistic.into(),
            depth: depth.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    fn tile_url(&self, lon: i32, lat: i32) -> String {
        format!(
            "{}/{}/{}/{}/lat{}{}_lon{}{}.tif",
            self.base_url,
            self.property,
            self.statistic,
            self.depth,
            lat,
            lat + 1,
            lon,
            lon + 1
        )
    }
}

impl TileProvider for PolarisProvider {
    fn name(&self) -> &str {
        "polaris"
    }

    fn fetch_tiles(&self, request: &TileRequest) -> Result<Vec<TileSource>> {
        if !request.bounds.is_valid() {
            return Err(GridProcessorError::invalid_parameter(
                "bounds",
                format!("{:?} is not a valid box", request.bounds),
            ));
        }
        let sources: Vec<TileSource> = tiles_for_bounds(&request.bounds)
            .into_iter()
            .map(|t| TileSource::Url(self.tile_url(t.lon, t.lat)))
            .collect();
        debug!(provider = self.name(), tiles = sources.len(), "Enumerated tiles");
        Ok(sources)
    }
}

/// MACA v2 monthly CONUS projections, one file per 5-year time slice.
///
/// Files cover the whole of CONUS, so the request bounds only matter for
/// the later clip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacaProvider {
    base_url: String,
    variable: String,
    gcm: String,
    scenario: String,
    time_slices: Vec<i32>,
}

impl MacaProvider {
    /// Maximum temperature (`tasmax`) for a GCM and emissions scenario.
    pub fn new(gcm: impl Into<String>, scenario: impl Into<String>, time_slices: Vec<i32>) -> Self {
        Self {
            base_url: MACA_BASE_URL.to_string(),
            variable: "tasmax".to_string(),
            gcm: gcm.into(),
            scenario: scenario.into(),
            time_slices,
        }
    }

    pub fn with_variable(mut self, variable: impl Into<String>) -> Self {
        self.variable = variable.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn gcm(&self) -> &str {
        &self.gcm
    }

    fn slice_url(&self, start_year: i32) -> String {
        format!(
            "{base}/{gcm}/macav2metdata_{var}_{gcm}_r1i1p1_{scenario}_{start}_{end}_CONUS_monthly.nc",
            base = self.base_url,
            gcm = self.gcm,
            var = self.variable,
            scenario = self.scenario,
            start = start_year,
            end = start_year + 4,
        )
    }
}

impl TileProvider for MacaProvider {
    fn name(&self) -> &str {
        "maca"
    }

    fn fetch_tiles(&self, _request: &TileRequest) -> Result<Vec<TileSource>> {
        if self.time_slices.is_empty() {
            return Err(GridProcessorError::invalid_parameter(
                "time_slices",
                "at least one time slice is required",
            ));
        }
        let sources: Vec<TileSource> = self
            .time_slices
            .iter()
            .map(|&start| TileSource::Url(self.slice_url(start)))
            .collect();
        debug!(provider = self.name(), gcm = %self.gcm, slices = sources.len(), "Enumerated time slices");
        Ok(sources)
    }
}

/// Tiles already on disk, e.g. SRTM granules (`*.hgt.zip`) fetched by a
/// separate tool or Zarr stores (`*.zarr`). Matching directories are not
/// descended into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalDirProvider {
    dir: PathBuf,
    suffix: String,
}

impl LocalDirProvider {
    pub fn new(dir: impl AsRef<Path>, suffix: impl Into<String>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            suffix: suffix.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl TileProvider for LocalDirProvider {
    fn name(&self) -> &str {
        "local"
    }

    fn fetch_tiles(&self, _request: &TileRequest) -> Result<Vec<TileSource>> {
        let mut sources = Vec::new();
        let mut walker = walkdir::WalkDir::new(&self.dir).min_depth(1).into_iter();
        while let Some(entry) = walker.next() {
            let entry = entry.map_err(|e| GridProcessorError::storage(e.to_string()))?;
            if !entry.file_name().to_string_lossy().ends_with(&self.suffix) {
                continue;
            }
            // Directory stores such as `*.zarr` are one tile each.
            if entry.file_type().is_dir() {
                walker.skip_current_dir();
            }
            sources.push(TileSource::Path(entry.into_path()));
        }
        sources.sort();
        debug!(
            provider = self.name(),
            dir = %self.dir.display(),
            files = sources.len(),
            "Listed local tiles"
        );
        Ok(sources)
    }
}
