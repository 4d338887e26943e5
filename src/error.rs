use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by detection, slice editing and extraction.
#[derive(Debug, Error)]
pub enum SlicerError {
    // -- Parameters --
    #[error("invalid parameter configuration: {0}")]
    InvalidConfiguration(String),

    #[error("unknown parameter: {0}")]
    NotFound(String),

    #[error("value {value} rejected for parameter {name}")]
    InvalidValue { name: String, value: f64 },

    #[error("malformed parameter file: {0}")]
    Json(#[from] serde_json::Error),

    // -- Detection --
    #[error("no image loaded")]
    NoImageLoaded,

    #[error("operation cancelled")]
    Cancelled,

    // -- Geometry / extraction --
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode image: {0}")]
    Decode(String),

    // -- Image catalog --
    #[error("no images available in {}", .0.display())]
    NoImages(PathBuf),

    #[error("this is the first image")]
    AtFirstImage,

    #[error("this is the last image")]
    AtLastImage,
}

pub type Result<T> = std::result::Result<T, SlicerError>;
