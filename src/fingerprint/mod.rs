//! Perceptual fingerprint module
//!
//! This module turns decoded pixel data into a compact colour fingerprint and
//! a noise score.
//!
//! # Submodules
//!
//! - `raster` - Decoded pixel buffers (3 or 4 channels) and the image decoder
//! - `sampler` - Grid sampling that produces the fingerprint
//! - `noise` - Pixel-to-pixel variation scoring

pub mod noise;
pub mod raster;
pub mod sampler;

pub use noise::noise_score;
pub use raster::{PixelLayout, Raster};
pub use sampler::{
    compute_fingerprint, compute_fingerprint_with_rng, fingerprint_image, Color, Fingerprint,
    FingerprintConfig, Sample, SamplePoint, MAX_ACCURACY,
};
