//! Image Similarity Library
//!
//! Finds visually near-duplicate raster images in a folder. Each image is
//! reduced to a small grid of randomly sampled average colours (its
//! fingerprint) plus a noise score. Every image is then compared against every
//! other one, and pairs that are far closer than the image's typical close
//! neighbour are reported.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - [`core`] - Configuration, error handling, and file enumeration
//! - [`fingerprint`] - Raster decoding, grid sampling, and noise scoring
//! - [`cache`] - Content hashing and the persistent fingerprint cache
//! - [`pool`] - Bounded worker pool for fingerprint computation
//! - [`duplicate`] - Pairwise scoring, divergence selection, and the run pipeline
//! - [`diagnostics`] - Injected progress and noise-score sinks
//! - [`cli`] - Command-line interface (only used by the binary)
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use image_similarity::core::config::Config;
//! use image_similarity::duplicate::DuplicateFinder;
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load_default()?;
//!     let report = DuplicateFinder::new(config).run_comparison(Path::new("D:/Photos"))?;
//!
//!     for pair in &report.pairs {
//!         println!("{} ~ {} ({})", pair.file_a, pair.file_b, pair.raw_diff_score);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Fingerprinting Directly
//!
//! ```rust,no_run
//! use image_similarity::fingerprint::{fingerprint_image, FingerprintConfig};
//!
//! let bytes = std::fs::read("photo.png").unwrap();
//! let (fingerprint, noise) = fingerprint_image(&bytes, &FingerprintConfig::default()).unwrap();
//! println!("{} samples, noise {:.2}", fingerprint.len(), noise);
//! ```

pub mod cache;
pub mod cli;
pub mod core;
pub mod diagnostics;
pub mod duplicate;
pub mod fingerprint;
pub mod pool;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
