//! Error types for carview

use thiserror::Error;

/// Main error type for carview operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Failed to load asset {url}: {message}")]
    AssetLoad { url: String, message: String },

    #[error("Invalid calibration: {0}")]
    InvalidCalibration(String),

    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("Visualization error: {0}")]
    Visualization(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl Error {
    /// Wrap any error as an asset load failure for `url`
    pub fn asset_load(url: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Error::AssetLoad {
            url: url.into(),
            message: err.to_string(),
        }
    }
}

/// Result type alias for carview operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(feature = "gpu")]
impl From<wgpu::SurfaceError> for Error {
    fn from(e: wgpu::SurfaceError) -> Self {
        Error::Gpu(e.to_string())
    }
}

#[cfg(feature = "gpu")]
impl From<wgpu::CreateSurfaceError> for Error {
    fn from(e: wgpu::CreateSurfaceError) -> Self {
        Error::Gpu(e.to_string())
    }
}
