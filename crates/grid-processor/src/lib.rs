//! Habitat suitability grid processing.
//!
//! This crate turns raw raster layers for a site into a habitat
//! suitability composite:
//!
//! - **Merge**: mosaic adjacent tiles and clip them to the site
//! - **Align**: reproject every layer onto one reference lattice
//! - **Score**: map each layer to a fuzzy suitability score in (0, 1]
//! - **Combine**: multiply the scores cell by cell
//!
//! # Architecture
//!
//! ```text
//! TileProvider ──► tiles ──► GridMerger ──► site grids
//!                                              │
//!              elevation ──► terrain::aspect ──┤
//!                                              ▼
//!                             GridAligner (Reprojector)
//!                                              │
//!                                              ▼
//!                             score per variable
//!                                              │
//!                                              ▼
//!                             combine ──► composite ──► GridCodec
//! ```
//!
//! # Example
//!
//! ```ignore
//! use grid_processor::{GridProcessorConfig, ModelVariable, SuitabilityModel, VariableSpec};
//!
//! let model = SuitabilityModel::from_config(GridProcessorConfig::from_env())?;
//! let ph = VariableSpec::new("soil_ph", 6.5, 1.0)?;
//! let output = model.run(&elevation, &[ModelVariable::new(&ph, &soil)])?;
//! ```

pub mod align;
pub mod climate;
pub mod codec;
pub mod config;
pub mod error;
pub mod merge;
pub mod pipeline;
pub mod projection;
pub mod provider;
pub mod suitability;
pub mod terrain;
pub mod types;

// Re-export commonly used types at crate root
pub use align::{AlignInput, GridAligner};
pub use codec::{GridAttributes, GridCodec, ZarrGridCodec};
pub use config::{GridProcessorConfig, ZarrCompression, DEFAULT_MERGE_BUFFER};
pub use error::{GridProcessorError, Result};
pub use merge::{merge_tiles, GridMerger};
pub use pipeline::{ModelOutput, ModelVariable, SuitabilityModel};
pub use projection::{transform_bounds, Reprojector, TargetGrid, WarpReprojector};
pub use provider::{
    LocalDirProvider, MacaProvider, PolarisProvider, TileProvider, TileRequest, TileSource,
};
pub use suitability::{combine, score, score_variable, suitability_score};
pub use types::{InterpolationMethod, OverlapPolicy, VariableKind, VariableSpec};

pub use habitat_common::{BoundingBox, CrsCode, GeoTransform, Grid, LayerStack, RawRaster};
