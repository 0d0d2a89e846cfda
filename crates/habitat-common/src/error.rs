//! Error types for grid construction and validation.

use thiserror::Error;

/// Result type alias using GridError.
pub type GridResult<T> = Result<T, GridError>;

/// Errors raised while building or combining grid values.
#[derive(Debug, Error)]
pub enum GridError {
    #[error("grid has zero rows or columns ({rows}x{cols})")]
    EmptyGrid { rows: usize, cols: usize },

    #[error("cell buffer holds {actual} values but shape requires {expected}")]
    DataLength { expected: usize, actual: usize },

    #[error("geotransform is singular or non-finite: {0:?}")]
    SingularTransform([f64; 6]),

    #[error("unsupported grid shape {shape:?} with dims {dims:?}: only 2D grids with y/x axes are supported")]
    UnsupportedShape { dims: Vec<String>, shape: Vec<usize> },

    #[error("layer '{name}' is not co-registered with the stack")]
    NotCoRegistered { name: String },

    #[error("duplicate layer name: {0}")]
    DuplicateLayer(String),
}
