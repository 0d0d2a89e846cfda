//! Error types for rendering.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("grid has no cells to render")]
    EmptyGrid,

    #[error("invalid value range [{min}, {max}]")]
    InvalidRange { min: f32, max: f32 },

    #[error("invalid scale {0}: must be between 1 and {max}", max = crate::render::MAX_SCALE)]
    InvalidScale(usize),

    #[error("unknown color '{0}'")]
    UnknownColor(String),

    #[error("pixel buffer has {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },

    #[error("PNG encoding failed: {0}")]
    Encode(String),
}

pub type Result<T> = std::result::Result<T, RenderError>;
