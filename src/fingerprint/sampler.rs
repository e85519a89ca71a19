//! Grid sampling fingerprint
//!
//! The image is divided into a grid of roughly `accuracy_x` by `accuracy_y`
//! blocks. For each block a fixed number of pixels is drawn at random and their
//! colours averaged, giving one [`Sample`] per block. The sequence of samples,
//! in row-major order, is the image's [`Fingerprint`].
//!
//! The number of samples depends only on the image dimensions and the
//! [`FingerprintConfig`]; the colours vary slightly between runs because the
//! pixels are picked at random.

use crate::core::error::{Result, SimilarityError};
use crate::fingerprint::noise::noise_score;
use crate::fingerprint::raster::Raster;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Accuracy values above this are treated as this
pub const MAX_ACCURACY: u32 = 100;

/// Parameters that control how a fingerprint is sampled
///
/// Two fingerprints are only comparable, and a cached fingerprint only
/// reusable, when they were produced with equal configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct FingerprintConfig {
    /// Blocks across the image
    pub accuracy_x: u32,
    /// Blocks down the image
    pub accuracy_y: u32,
    /// Random pixels averaged per block
    pub passes_per_block: u32,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            accuracy_x: 10,
            accuracy_y: 10,
            passes_per_block: 25,
        }
    }
}

impl FingerprintConfig {
    pub fn new(accuracy_x: u32, accuracy_y: u32, passes_per_block: u32) -> Self {
        Self {
            accuracy_x,
            accuracy_y,
            passes_per_block,
        }
    }

    /// Copy of this configuration with both accuracies capped at [`MAX_ACCURACY`]
    pub fn clamped(&self) -> Self {
        Self {
            accuracy_x: self.accuracy_x.min(MAX_ACCURACY),
            accuracy_y: self.accuracy_y.min(MAX_ACCURACY),
            passes_per_block: self.passes_per_block,
        }
    }

    /// Reject values that would make sampling impossible
    pub fn validate(&self) -> Result<()> {
        if self.accuracy_x == 0 || self.accuracy_y == 0 {
            return Err(SimilarityError::InvalidConfig(format!(
                "fingerprint accuracy must be at least 1 (got {}x{})",
                self.accuracy_x, self.accuracy_y
            )));
        }
        if self.passes_per_block == 0 {
            return Err(SimilarityError::InvalidConfig(
                "passes_per_block must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Centre of a sampled block, in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SamplePoint {
    pub x: u32,
    pub y: u32,
}

/// An 8-bit RGB colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Sum of the absolute per-channel differences
    pub fn manhattan_distance(&self, other: &Color) -> u32 {
        self.r.abs_diff(other.r) as u32
            + self.g.abs_diff(other.g) as u32
            + self.b.abs_diff(other.b) as u32
    }
}

/// One block of a fingerprint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub point: SamplePoint,
    pub color: Color,
}

/// Row-major sequence of block samples
pub type Fingerprint = Vec<Sample>;

/// Sampling grid along one axis
#[derive(Debug, Clone, Copy)]
struct Axis {
    step: u32,
    cells: u32,
}

impl Axis {
    /// `step = dim / accuracy` (at least one pixel); cells stop once a block would pass the edge
    fn new(dim: u32, accuracy: u32) -> Self {
        let step = (dim / accuracy).max(1);
        Self {
            step,
            cells: dim / step,
        }
    }

    fn origin(&self, cell: u32) -> u32 {
        cell * self.step
    }

    fn centre(&self, cell: u32) -> u32 {
        self.origin(cell) + self.step / 2
    }
}

/// Compute a fingerprint and noise score using the thread-local RNG
pub fn compute_fingerprint(raster: &Raster, config: &FingerprintConfig) -> Result<(Fingerprint, f64)> {
    compute_fingerprint_with_rng(raster, config, &mut rand::thread_rng())
}

/// Compute a fingerprint and noise score, drawing sample positions from `rng`
pub fn compute_fingerprint_with_rng<R: Rng + ?Sized>(
    raster: &Raster,
    config: &FingerprintConfig,
    rng: &mut R,
) -> Result<(Fingerprint, f64)> {
    config.validate()?;
    let config = config.clamped();

    let x_axis = Axis::new(raster.width(), config.accuracy_x);
    let y_axis = Axis::new(raster.height(), config.accuracy_y);
    let passes = config.passes_per_block;
    let divisor = passes as u64;

    let mut fingerprint = Vec::with_capacity((x_axis.cells * y_axis.cells) as usize);

    for row in 0..y_axis.cells {
        for col in 0..x_axis.cells {
            let (mut r, mut g, mut b) = (0u64, 0u64, 0u64);

            // uniform over the block, i.e. centre + [-step/2, step/2)
            for _ in 0..passes {
                let x = x_axis.origin(col) + rng.gen_range(0..x_axis.step);
                let y = y_axis.origin(row) + rng.gen_range(0..y_axis.step);
                let [pr, pg, pb] = raster.rgb_at(x, y);
                r += pr as u64;
                g += pg as u64;
                b += pb as u64;
            }

            fingerprint.push(Sample {
                point: SamplePoint {
                    x: x_axis.centre(col),
                    y: y_axis.centre(row),
                },
                color: Color::new((r / divisor) as u8, (g / divisor) as u8, (b / divisor) as u8),
            });
        }
    }

    Ok((fingerprint, noise_score(raster)))
}

/// Decode encoded image bytes and fingerprint them
pub fn fingerprint_image(bytes: &[u8], config: &FingerprintConfig) -> Result<(Fingerprint, f64)> {
    let raster = Raster::decode(bytes)?;
    compute_fingerprint(&raster, config)
}
