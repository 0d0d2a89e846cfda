//! Configuration for the grid processor.

use habitat_common::CrsCode;
use serde::{Deserialize, Serialize};

use crate::types::{InterpolationMethod, OverlapPolicy, VariableKind, VariableSpec};

/// Default margin added around a site box before clipping tiles, in the
/// grid's native units. Keeps reprojection from sampling empty edges.
pub const DEFAULT_MERGE_BUFFER: f64 = 0.025;

/// Configuration for the grid processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridProcessorConfig {
    /// Margin added around the target box when mosaicking tiles.
    pub merge_buffer: f64,

    /// Overlap resolution for mosaics.
    pub overlap_policy: OverlapPolicy,

    /// CRS assigned to grids that declare none. `None` makes such grids an error.
    pub default_crs: Option<CrsCode>,

    /// Resampling used for categorical variables.
    pub categorical_interpolation: InterpolationMethod,

    /// Resampling used for continuous variables.
    pub continuous_interpolation: InterpolationMethod,

    /// Align and score variables on the rayon pool.
    pub parallel_variables: bool,

    /// Chunk dimension for Zarr files (square chunks).
    pub zarr_chunk_size: usize,

    /// Compression codec for Zarr files.
    pub zarr_compression: ZarrCompression,

    /// Compression level (1-9).
    pub zarr_compression_level: u8,

    /// Enable byte shuffle filter for better compression.
    pub zarr_shuffle: bool,
}

impl Default for GridProcessorConfig {
    fn default() -> Self {
        Self {
            merge_buffer: DEFAULT_MERGE_BUFFER,
            overlap_policy: OverlapPolicy::LastWins,
            default_crs: Some(CrsCode::Epsg3857),
            categorical_interpolation: InterpolationMethod::Nearest,
            continuous_interpolation: InterpolationMethod::Bilinear,
            parallel_variables: false,
            zarr_chunk_size: 512,
            zarr_compression: ZarrCompression::BloscZstd,
            zarr_compression_level: 5,
            zarr_shuffle: true,
        }
    }
}

impl GridProcessorConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("MERGE_BUFFER") {
            if let Ok(buffer) = val.parse() {
                config.merge_buffer = buffer;
            }
        }

        if let Ok(val) = std::env::var("OVERLAP_POLICY") {
            config.overlap_policy = OverlapPolicy::from_str(&val);
        }

        if let Ok(val) = std::env::var("DEFAULT_CRS") {
            config.default_crs = match val.to_lowercase().as_str() {
                "" | "none" => None,
                _ => CrsCode::parse(&val).ok().or(config.default_crs),
            };
        }

        if let Ok(val) = std::env::var("CATEGORICAL_RESAMPLING") {
            config.categorical_interpolation = InterpolationMethod::from_str(&val);
        }

        if let Ok(val) = std::env::var("CONTINUOUS_RESAMPLING") {
            config.continuous_interpolation = InterpolationMethod::from_str(&val);
        }

        if let Ok(val) = std::env::var("PARALLEL_VARIABLES") {
            config.parallel_variables = val.to_lowercase() == "true" || val == "1";
        }

        if let Ok(val) = std::env::var("ZARR_CHUNK_SIZE") {
            if let Ok(size) = val.parse() {
                config.zarr_chunk_size = size;
            }
        }

        if let Ok(val) = std::env::var("ZARR_COMPRESSION") {
            config.zarr_compression = ZarrCompression::from_str(&val);
        }

        if let Ok(val) = std::env::var("ZARR_COMPRESSION_LEVEL") {
            if let Ok(level) = val.parse() {
                config.zarr_compression_level = level;
            }
        }

        if let Ok(val) = std::env::var("ZARR_SHUFFLE") {
            config.zarr_shuffle = val.to_lowercase() == "true" || val == "1";
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.merge_buffer.is_finite() && self.merge_buffer >= 0.0) {
            return Err("merge_buffer must be finite and >= 0".to_string());
        }

        if self.zarr_chunk_size == 0 {
            return Err("zarr_chunk_size must be > 0".to_string());
        }

        if self.zarr_compression_level == 0 || self.zarr_compression_level > 9 {
            return Err("zarr_compression_level must be 1-9".to_string());
        }

        Ok(())
    }

    /// Resampling for a variable: its explicit override, else its kind's default.
    pub fn interpolation_for(&self, spec: &VariableSpec) -> InterpolationMethod {
        spec.interpolation.unwrap_or(match spec.kind {
            VariableKind::Categorical => self.categorical_interpolation,
            VariableKind::Continuous => self.continuous_interpolation,
        })
    }
}

/// Compression codec for Zarr files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZarrCompression {
    /// No compression.
    None,
    /// Blosc with LZ4.
    BloscLz4,
    /// Blosc with Zstd (recommended).
    #[default]
    BloscZstd,
}

impl ZarrCompression {
    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "none" => Self::None,
            "lz4" | "blosc_lz4" => Self::BloscLz4,
            _ => Self::BloscZstd,
        }
    }

    /// Get the codec name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::BloscLz4 => "blosc_lz4",
            Self::BloscZstd => "blosc_zstd",
        }
    }
}

impl std::fmt::Display for ZarrCompression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GridProcessorConfig::default();
        assert_eq!(config.merge_buffer, 0.025);
        assert_eq!(config.overlap_policy, OverlapPolicy::LastWins);
        assert_eq!(config.default_crs, Some(CrsCode::Epsg3857));
        assert_eq!(config.categorical_interpolation, InterpolationMethod::Nearest);
        assert_eq!(config.continuous_interpolation, InterpolationMethod::Bilinear);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = GridProcessorConfig::default();
        config.merge_buffer = -0.1;
        assert!(config.validate().is_err());

        config = GridProcessorConfig::default();
        config.zarr_chunk_size = 0;
        assert!(config.validate().is_err());

        config = GridProcessorConfig::default();
        config.zarr_compression_level = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_interpolation_for_variable() {
        let config = GridProcessorConfig::default();
        let soil = VariableSpec::new("soil_ph", 6.5, 1.0).unwrap();
        let temp = VariableSpec::new("max_temp", 75.0, 10.0).unwrap().continuous();
        let forced = soil.clone().with_interpolation(InterpolationMethod::Cubic);

        assert_eq!(config.interpolation_for(&soil), InterpolationMethod::Nearest);
        assert_eq!(config.interpolation_for(&temp), InterpolationMethod::Bilinear);
        assert_eq!(config.interpolation_for(&forced), InterpolationMethod::Cubic);
    }

    #[test]
    fn test_partial_config_deserializes_with_defaults() {
        let config: GridProcessorConfig =
            serde_json::from_str(r#"{"overlap_policy":"first_wins","default_crs":"EPSG:4326"}"#)
                .unwrap();
        assert_eq!(config.overlap_policy, OverlapPolicy::FirstWins);
        assert_eq!(config.default_crs, Some(CrsCode::Epsg4326));
        assert_eq!(config.zarr_chunk_size, 512);
    }

    #[test]
    fn test_zarr_compression_from_str() {
        assert_eq!(ZarrCompression::from_str("none"), ZarrCompression::None);
        assert_eq!(ZarrCompression::from_str("lz4"), ZarrCompression::BloscLz4);
        assert_eq!(ZarrCompression::from_str("BLOSC_ZSTD"), ZarrCompression::BloscZstd);
        assert_eq!(ZarrCompression::from_str("invalid"), ZarrCompression::BloscZstd);
    }
}
