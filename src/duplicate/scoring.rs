//! Pairwise comparison scores
//!
//! The score between two images is the summed per-channel colour distance of
//! their fingerprints, scaled down by the square root of the larger noise
//! score. A score of exactly 0 is reserved for byte-identical files.

use crate::cache::ContentHash;
use crate::core::error::{Result, SimilarityError};
use crate::fingerprint::Fingerprint;
use rayon::prelude::*;
use std::path::PathBuf;

/// Stands in for a noise of exactly zero so the divisor stays positive
pub const NOISE_FLOOR: f64 = f64::MIN_POSITIVE;

/// Everything known about one image during a run
#[derive(Debug, Clone)]
pub struct ImageRecord {
    /// Identifier, relative to the scan root
    pub name: String,
    pub path: PathBuf,
    pub hash: ContentHash,
    pub fingerprint: Fingerprint,
    pub noise_score: f64,
}

/// Score of one image against the subject of a [`RankedScores`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredPair {
    pub other: String,
    pub score: u64,
}

/// All scores for one image, largest difference first
#[derive(Debug, Clone)]
pub struct RankedScores {
    pub subject: String,
    pub scores: Vec<ScoredPair>,
}

/// Sum of `|dR| + |dG| + |dB|` over corresponding samples
pub fn raw_difference(a: &Fingerprint, b: &Fingerprint) -> Result<u64> {
    if a.len() != b.len() {
        return Err(SimilarityError::FingerprintSizeMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    Ok(a.iter()
        .zip(b.iter())
        .map(|(left, right)| left.color.manhattan_distance(&right.color) as u64)
        .sum())
}

/// Scale a raw difference by `1 / sqrt(max(noise_a, noise_b))`, truncating
///
/// Noise below 1 amplifies the difference. When both images are perfectly
/// flat any non-zero difference saturates at `u64::MAX`.
pub fn adjust_score_for_noise(raw: u64, noise_a: f64, noise_b: f64) -> u64 {
    let noise = noise_a.max(noise_b).max(NOISE_FLOOR);
    (raw as f64 / noise.sqrt()) as u64
}

/// Score two images; 0 means identical content, anything else is at least 1
pub fn comparison_score(a: &ImageRecord, b: &ImageRecord) -> Result<u64> {
    if a.hash == b.hash {
        return Ok(0);
    }

    let raw = raw_difference(&a.fingerprint, &b.fingerprint).map_err(|e| e.in_file(&a.path))?;
    Ok(adjust_score_for_noise(raw, a.noise_score, b.noise_score).max(1))
}

/// Scores of `records[index]` against every other record, largest first
pub fn rank_for(index: usize, records: &[ImageRecord]) -> Result<RankedScores> {
    let subject = &records[index];
    let mut scores = Vec::with_capacity(records.len().saturating_sub(1));

    for (other_index, other) in records.iter().enumerate() {
        if other_index == index {
            continue;
        }
        scores.push(ScoredPair {
            other: other.name.clone(),
            score: comparison_score(subject, other)?,
        });
    }

    // stable, so equal scores keep input order
    scores.sort_by(|a, b| b.score.cmp(&a.score));

    Ok(RankedScores {
        subject: subject.name.clone(),
        scores,
    })
}

/// Ranked score lists for every record, computed in parallel
pub fn rank_all(records: &[ImageRecord]) -> Result<Vec<RankedScores>> {
    (0..records.len())
        .into_par_iter()
        .map(|index| rank_for(index, records))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::{Color, Sample, SamplePoint};

    fn fingerprint(colors: &[[u8; 3]]) -> Fingerprint {
        colors
            .iter()
            .enumerate()
            .map(|(i, [r, g, b])| Sample {
                point: SamplePoint { x: i as u32, y: 0 },
                color: Color::new(*r, *g, *b),
            })
            .collect()
    }

    fn record(name: &str, hash: u64, colors: &[[u8; 3]], noise: f64) -> ImageRecord {
        ImageRecord {
            name: name.to_string(),
            path: PathBuf::from(name),
            hash: ContentHash(hash),
            fingerprint: fingerprint(colors),
            noise_score: noise,
        }
    }

    #[test]
    fn test_raw_difference() {
        let a = fingerprint(&[[0, 0, 0], [10, 20, 30]]);
        let b = fingerprint(&[[1, 2, 3], [20, 10, 30]]);
        assert_eq!(raw_difference(&a, &b).unwrap(), 6 + 20);
    }

    #[test]
    fn test_size_mismatch() {
        let a = fingerprint(&[[0, 0, 0]]);
        let b = fingerprint(&[[0, 0, 0], [0, 0, 0]]);
        assert!(matches!(
            raw_difference(&a, &b),
            Err(SimilarityError::FingerprintSizeMismatch { left: 1, right: 2 })
        ));

        let err = comparison_score(&record("a", 1, &[[0, 0, 0]], 4.0), &record("b", 2, &[], 4.0))
            .unwrap_err();
        assert!(err.to_string().contains("Fingerprints not same size"));
    }

    #[test]
    fn test_same_hash_scores_zero() {
        let a = record("a.png", 7, &[[0, 0, 0]], 3.0);
        let b = record("copy.png", 7, &[[255, 255, 255]], 3.0);
        assert_eq!(comparison_score(&a, &b).unwrap(), 0);
    }

    #[test]
    fn test_different_hash_never_zero() {
        let a = record("a.png", 1, &[[5, 5, 5]], 3.0);
        let b = record("b.png", 2, &[[5, 5, 5]], 3.0);
        assert_eq!(comparison_score(&a, &b).unwrap(), 1);
    }

    #[test]
    fn test_noise_adjustment() {
        assert_eq!(adjust_score_for_noise(100, 4.0, 1.0), 50);
        assert_eq!(adjust_score_for_noise(100, 1.0, 25.0), 20);
        // clean images are amplified
        assert_eq!(adjust_score_for_noise(100, 0.25, 0.0), 200);
        assert_eq!(adjust_score_for_noise(30, 0.04, 0.04), 150);
        assert_eq!(adjust_score_for_noise(100, 0.0, 0.0), u64::MAX);
        assert_eq!(adjust_score_for_noise(0, 0.0, 0.0), 0);
    }

    #[test]
    fn test_flat_images_with_different_content_never_zero() {
        let a = record("a.png", 1, &[[5, 5, 5]], 0.0);
        let b = record("b.png", 2, &[[5, 5, 5]], 0.0);
        assert_eq!(comparison_score(&a, &b).unwrap(), 1);
    }

    #[test]
    fn test_low_noise_pair_is_not_a_duplicate() {
        use crate::duplicate::selector::{select_for, SelectionPolicy};

        // x and a are clean; the rest are noisy and equally far from x
        let mut records = vec![
            record("x", 1, &[[0, 0, 0]], 0.04),
            record("a", 2, &[[30, 0, 0]], 0.04),
        ];
        for (i, name) in ["b", "c", "d", "e"].iter().enumerate() {
            records.push(record(name, 10 + i as u64, &[[200, 0, 0]], 4.0));
        }

        let ranked = rank_for(0, &records).unwrap();
        let scores: Vec<u64> = ranked.scores.iter().map(|s| s.score).collect();
        assert_eq!(scores, vec![150, 100, 100, 100, 100]);

        let pairs = select_for(&ranked, &SelectionPolicy::default()).unwrap();
        assert!(pairs.is_empty());
    }

    #[test]
    fn test_noise_adjustment_non_increasing() {
        let raw = 12_345;
        let mut previous = u64::MAX;
        for step in 0..200 {
            let noise = step as f64 * 0.37;
            let adjusted = adjust_score_for_noise(raw, noise, noise / 2.0);
            assert!(adjusted <= previous);
            previous = adjusted;
        }
    }

    #[test]
    fn test_rank_for_sorted_descending_and_skips_self() {
        let records = vec![
            record("a", 1, &[[0, 0, 0]], 1.0),
            record("b", 2, &[[10, 0, 0]], 1.0),
            record("c", 3, &[[90, 0, 0]], 1.0),
            record("d", 1, &[[0, 0, 0]], 1.0),
        ];

        let ranked = rank_for(0, &records).unwrap();
        assert_eq!(ranked.subject, "a");
        let order: Vec<(&str, u64)> = ranked
            .scores
            .iter()
            .map(|s| (s.other.as_str(), s.score))
            .collect();
        assert_eq!(order, vec![("c", 90), ("b", 10), ("d", 0)]);
    }

    #[test]
    fn test_rank_all_covers_every_record() {
        let records: Vec<_> = (0..6u8)
            .map(|i| record(&format!("img{}", i), i as u64, &[[i * 10, 0, 0]], 1.0))
            .collect();

        let ranked = rank_all(&records).unwrap();
        assert_eq!(ranked.len(), 6);
        for (i, list) in ranked.iter().enumerate() {
            assert_eq!(list.subject, format!("img{}", i));
            assert_eq!(list.scores.len(), 5);
            assert!(list.scores.windows(2).all(|w| w[0].score >= w[1].score));
        }
    }
}
