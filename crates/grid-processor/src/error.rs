//! Error types for grid processing.

use habitat_common::{CrsCode, GridError};
use thiserror::Error;

/// Errors that can occur while harmonizing and scoring grids.
#[derive(Error, Debug)]
pub enum GridProcessorError {
    /// An operation that needs at least one grid received none.
    #[error("{component}: no input grids")]
    EmptyInput { component: &'static str },

    /// Tiles of one mosaic carry different CRS labels.
    #[error("merge: tile {index} has CRS {found:?}, expected {expected:?}")]
    CrsMismatch {
        index: usize,
        expected: Option<CrsCode>,
        found: Option<CrsCode>,
    },

    /// A grid has no CRS and no default is configured.
    #[error("{component}: grid '{name}' has no CRS and no default CRS is configured")]
    CrsUndefined {
        component: &'static str,
        name: String,
    },

    /// Input is not a 2D single-band grid with y/x axes.
    #[error("unsupported grid shape {shape:?} with dims {dims:?}: only 2D/3D single-band grids with y/x axes are supported")]
    UnsupportedGridShape { dims: Vec<String>, shape: Vec<usize> },

    /// Response-curve tolerance must be finite and positive.
    #[error("score: tolerance must be finite and > 0, got {0}")]
    InvalidTolerance(f64),

    /// Grids that must share a lattice do not.
    #[error("{component}: grid {index} has shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        component: &'static str,
        index: usize,
        expected: (usize, usize),
        found: (usize, usize),
    },

    /// Invalid argument value.
    #[error("invalid parameter '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    /// The requested region does not overlap the data.
    #[error("requested region {requested} is outside grid bounds {grid}")]
    OutOfBounds { requested: String, grid: String },

    /// Grid construction failed.
    #[error("invalid grid: {0}")]
    Grid(String),

    /// Coordinate transformation failure.
    #[error("projection error: {0}")]
    Projection(String),

    /// Encoding/decoding failure in a grid codec.
    #[error("codec error: {0}")]
    Codec(String),

    /// Storage/IO error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// A pipeline stage failed.
    #[error("{stage} stage failed")]
    Stage {
        stage: &'static str,
        #[source]
        source: Box<GridProcessorError>,
    },
}

impl GridProcessorError {
    /// Create an InvalidParameter error.
    pub fn invalid_parameter(param: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            param: param.into(),
            message: message.into(),
        }
    }

    /// Create an OutOfBounds error.
    pub fn out_of_bounds(requested: impl Into<String>, grid: impl Into<String>) -> Self {
        Self::OutOfBounds {
            requested: requested.into(),
            grid: grid.into(),
        }
    }

    /// Create a Codec error.
    pub fn codec(msg: impl Into<String>) -> Self {
        Self::Codec(msg.into())
    }

    /// Create a Storage error.
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Wrap this error with the name of the pipeline stage it came from.
    pub fn in_stage(self, stage: &'static str) -> Self {
        Self::Stage {
            stage,
            source: Box::new(self),
        }
    }

    /// The innermost error, looking through stage wrappers.
    pub fn kind(&self) -> &GridProcessorError {
        match self {
            Self::Stage { source, .. } => source.kind(),
            other => other,
        }
    }

    /// The outermost stage name, if the error was raised inside the pipeline.
    pub fn stage(&self) -> Option<&'static str> {
        match self {
            Self::Stage { stage, .. } => Some(stage),
            _ => None,
        }
    }
}

impl From<GridError> for GridProcessorError {
    fn from(err: GridError) -> Self {
        match err {
            GridError::UnsupportedShape { dims, shape } => {
                Self::UnsupportedGridShape { dims, shape }
            }
            other => Self::Grid(other.to_string()),
        }
    }
}

impl From<std::io::Error> for GridProcessorError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for GridProcessorError {
    fn from(err: serde_json::Error) -> Self {
        Self::Codec(err.to_string())
    }
}

/// Result type for grid processor operations.
pub type Result<T> = std::result::Result<T, GridProcessorError>;
