//! Zarr V3 grid codec.
//!
//! Each grid is one `[rows, cols]` float32 array in a filesystem store,
//! NaN fill, with its georeferencing in the array attributes.

use std::path::Path;
use std::sync::Arc;

use habitat_common::{CrsCode, GeoTransform, Grid, RawRaster};
use serde::{Deserialize, Serialize};
use tracing::debug;
use zarrs::array::codec::bytes_to_bytes::blosc::{
    BloscCodec, BloscCompressionLevel, BloscCompressor, BloscShuffleMode,
};
use zarrs::array::{Array, ArrayBuilder, DataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs_filesystem::FilesystemStore;

use super::GridCodec;
use crate::config::{GridProcessorConfig, ZarrCompression};
use crate::error::{GridProcessorError, Result};

/// Georeferencing stored in the Zarr array attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridAttributes {
    /// GDAL-ordered affine coefficients.
    pub transform: [f64; 6],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crs: Option<CrsCode>,
    /// Source nodata sentinel. A NaN sentinel is implied by the fill value
    /// and not stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodata: Option<f32>,
    #[serde(default)]
    pub dims: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl GridAttributes {
    fn for_grid(grid: &Grid, name: Option<String>) -> Self {
        Self {
            transform: grid.transform().to_gdal(),
            crs: grid.crs(),
            nodata: grid.nodata().filter(|v| !v.is_nan()),
            dims: vec!["y".to_string(), "x".to_string()],
            name,
        }
    }

    fn to_map(&self) -> Result<serde_json::Map<String, serde_json::Value>> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            _ => Err(GridProcessorError::codec("attributes did not serialize to an object")),
        }
    }
}

/// Zarr V3 codec backed by a filesystem store.
#[derive(Debug, Clone)]
pub struct ZarrGridCodec {
    chunk_size: usize,
    compression: ZarrCompression,
    compression_level: u8,
    shuffle: bool,
}

impl Default for ZarrGridCodec {
    fn default() -> Self {
        Self::new(&GridProcessorConfig::default())
    }
}

impl ZarrGridCodec {
    /// Create a codec with the chunking and compression from `config`.
    pub fn new(config: &GridProcessorConfig) -> Self {
        Self {
            chunk_size: config.zarr_chunk_size.max(1),
            compression: config.zarr_compression,
            compression_level: config.zarr_compression_level,
            shuffle: config.zarr_shuffle,
        }
    }

    fn open_store(path: &Path) -> Result<Arc<FilesystemStore>> {
        let store = FilesystemStore::new(path)
            .map_err(|e| GridProcessorError::storage(format!("{}: {}", path.display(), e)))?;
        Ok(Arc::new(store))
    }

    /// Create the compression codec based on configuration.
    fn create_compression_codec(
        &self,
    ) -> Result<Arc<dyn zarrs::array::codec::BytesToBytesCodecTraits>> {
        let level = BloscCompressionLevel::try_from(self.compression_level)
            .map_err(|_| GridProcessorError::Config("Invalid compression level".to_string()))?;

        let shuffle = if self.shuffle {
            BloscShuffleMode::Shuffle
        } else {
            BloscShuffleMode::NoShuffle
        };

        // typesize is required when shuffle is enabled
        let typesize = if self.shuffle { Some(4) } else { None };

        let compressor = match self.compression {
            ZarrCompression::None => {
                return Err(GridProcessorError::Config(
                    "No compression configured".to_string(),
                ))
            }
            ZarrCompression::BloscLz4 => BloscCompressor::LZ4,
            ZarrCompression::BloscZstd => BloscCompressor::Zstd,
        };

        let codec = BloscCodec::new(compressor, level, None, shuffle, typesize)
            .map_err(|e| GridProcessorError::Config(e.to_string()))?;

        Ok(Arc::new(codec))
    }

    /// Clear an existing array at `path`. Refuses to touch directories
    /// that do not hold a Zarr array.
    fn clear_existing(path: &Path) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }
        if !path.join("zarr.json").is_file() {
            return Err(GridProcessorError::storage(format!(
                "{} exists and is not a Zarr array",
                path.display()
            )));
        }
        std::fs::remove_dir_all(path)?;
        Ok(())
    }
}

impl GridCodec for ZarrGridCodec {
    fn load_raw(&self, source: &Path) -> Result<RawRaster> {
        let store = Self::open_store(source)?;
        let array = Array::open(store, "/")
            .map_err(|e| GridProcessorError::codec(format!("{}: {}", source.display(), e)))?;

        let attrs: GridAttributes =
            serde_json::from_value(serde_json::Value::Object(array.attributes().clone()))?;

        let shape: Vec<u64> = array.shape().to_vec();
        let subset = ArraySubset::new_with_start_shape(vec![0; shape.len()], shape.clone())
            .map_err(|e| GridProcessorError::codec(e.to_string()))?;
        let data: Vec<f32> = array
            .retrieve_array_subset_elements(&subset)
            .map_err(|e| GridProcessorError::codec(e.to_string()))?;

        let dims = if attrs.dims.len() == shape.len() {
            attrs.dims
        } else {
            default_dims(shape.len())
        };

        debug!(
            path = %source.display(),
            shape = ?shape,
            name = attrs.name.as_deref().unwrap_or(""),
            "Loaded Zarr array"
        );

        Ok(RawRaster {
            dims,
            shape: shape.iter().map(|&n| n as usize).collect(),
            data,
            transform: GeoTransform::from_gdal(attrs.transform),
            crs: attrs.crs,
            nodata: attrs.nodata,
        })
    }

    fn save_grid(&self, grid: &Grid, destination: &Path) -> Result<()> {
        Self::clear_existing(destination)?;
        std::fs::create_dir_all(destination)?;
        let store = Self::open_store(destination)?;

        let name = destination
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned());
        let attrs = GridAttributes::for_grid(grid, name).to_map()?;

        let (rows, cols) = grid.shape();
        let chunk_grid: zarrs::array::ChunkGrid = vec![
            rows.min(self.chunk_size) as u64,
            cols.min(self.chunk_size) as u64,
        ]
        .try_into()
        .map_err(|e| GridProcessorError::Config(format!("{:?}", e)))?;

        let mut binding = ArrayBuilder::new(
            vec![rows as u64, cols as u64],
            DataType::Float32,
            chunk_grid,
            FillValue::from(f32::NAN),
        );
        let mut builder = binding.attributes(attrs);

        if self.compression != ZarrCompression::None {
            let codec = self.create_compression_codec()?;
            builder = builder.bytes_to_bytes_codecs(vec![codec]);
        }

        let array = builder
            .build(store, "/")
            .map_err(|e| GridProcessorError::storage(e.to_string()))?;

        array
            .store_metadata()
            .map_err(|e| GridProcessorError::storage(e.to_string()))?;

        let subset = ArraySubset::new_with_start_shape(vec![0, 0], vec![rows as u64, cols as u64])
            .map_err(|e| GridProcessorError::storage(e.to_string()))?;

        array
            .store_array_subset_elements(&subset, grid.values())
            .map_err(|e| GridProcessorError::storage(e.to_string()))?;

        debug!(
            path = %destination.display(),
            rows,
            cols,
            compression = %self.compression,
            "Saved Zarr array"
        );
        Ok(())
    }
}

fn default_dims(ndim: usize) -> Vec<String> {
    let mut dims: Vec<String> = (0..ndim.saturating_sub(2)).map(|i| format!("dim_{}", i)).collect();
    dims.extend(["y", "x"].iter().map(|s| s.to_string()).take(ndim.min(2)));
    dims
}
