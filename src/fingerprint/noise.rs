//! Noise scoring
//!
//! The noise score measures how much neighbouring pixels differ. Flat images
//! score close to zero; photographs with grain or fine texture score high.

use crate::fingerprint::raster::Raster;

/// Sum of `|dR| + |dG| + |dB|` between horizontally adjacent pixels, divided by
/// the number of pixels in the raster
///
/// Pixels are only compared within a row. An empty raster scores 0.
pub fn noise_score(raster: &Raster) -> f64 {
    let pixel_count = raster.pixel_count();
    if pixel_count == 0 {
        return 0.0;
    }

    let stride = raster.layout().channels();
    let total: u64 = raster
        .rows()
        .map(|row| {
            row.chunks_exact(stride)
                .zip(row.chunks_exact(stride).skip(1))
                .map(|(left, right)| {
                    left[..3]
                        .iter()
                        .zip(&right[..3])
                        .map(|(a, b)| a.abs_diff(*b) as u64)
                        .sum::<u64>()
                })
                .sum::<u64>()
        })
        .sum();

    total as f64 / pixel_count as f64
}
