//! Error types for the image similarity tool
//!
//! This module defines the error types used throughout the library. Per-file
//! failures are wrapped in [`SimilarityError::InFile`] so the offending file
//! name travels with the error.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main error type for the image similarity tool
#[derive(Error, Debug)]
pub enum SimilarityError {
    /// General I/O error
    #[error("IO error: {0}")]
    Io(String),

    /// The file could not be decoded as an image
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// Pixel buffer size does not match the claimed dimensions and layout
    #[error("Raster of {len} bytes does not match {width}x{height} with 3 or 4 channels")]
    InvalidRaster { width: u32, height: u32, len: usize },

    /// A configuration value makes the requested operation impossible
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The persisted fingerprint cache exists but cannot be parsed
    #[error("Fingerprint cache '{}' is corrupt: {message}. Run `cache clear` to discard it.", path.display())]
    CacheCorrupt { path: PathBuf, message: String },

    /// The fingerprint cache could not be written
    #[error("Failed to write fingerprint cache '{}': {message}", path.display())]
    CacheWrite { path: PathBuf, message: String },

    /// Two fingerprints taken with the same configuration differ in length
    #[error("Fingerprints not same size ({left} vs {right} sample points)")]
    FingerprintSizeMismatch { left: usize, right: usize },

    /// Not enough comparison scores to pick the k-th smallest
    #[error("Not enough comparison candidates for '{subject}': need {required}, have {available}")]
    InsufficientCandidates {
        subject: String,
        required: usize,
        available: usize,
    },

    /// Worker pool misuse or a job that could not complete
    #[error("Worker pool error: {0}")]
    Pool(String),

    /// Any of the above, attributed to a specific file
    #[error("{}: {source}", path.display())]
    InFile {
        path: PathBuf,
        #[source]
        source: Box<SimilarityError>,
    },
}

impl SimilarityError {
    /// Attach the offending file to this error
    pub fn in_file(self, path: &Path) -> Self {
        match self {
            already @ SimilarityError::InFile { .. } => already,
            other => SimilarityError::InFile {
                path: path.to_path_buf(),
                source: Box::new(other),
            },
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, SimilarityError>;

impl From<std::io::Error> for SimilarityError {
    fn from(err: std::io::Error) -> Self {
        SimilarityError::Io(err.to_string())
    }
}

impl From<image::ImageError> for SimilarityError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::IoError(io) => SimilarityError::Io(io.to_string()),
            other => SimilarityError::Decode(other.to_string()),
        }
    }
}
