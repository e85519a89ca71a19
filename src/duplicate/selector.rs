//! Divergence-ratio duplicate selection
//!
//! For each image, the k-th smallest score in its ranked list acts as the
//! "typical close neighbour" distance. Any neighbour whose score is smaller
//! than that by more than the tolerance factor is reported:
//!
//! ```text
//! nth   = scores[len - k]
//! ratio = nth / score
//! flag when score == 0 or ratio > tolerance
//! ```
//!
//! Because every image is evaluated on its own, `(a, b)` and `(b, a)` can
//! both be reported; [`dedupe_pairs`] keeps one per unordered pair.

use crate::core::error::{Result, SimilarityError};
use crate::duplicate::scoring::RankedScores;
use serde::Serialize;
use std::collections::BTreeMap;

/// Parameters of the divergence test
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionPolicy {
    /// Upper bound on duplicates per image (k)
    pub expected_max_duplicates: usize,
    /// Ratio above which a neighbour is flagged
    pub divergence_tolerance: f64,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            expected_max_duplicates: 4,
            divergence_tolerance: 1.8,
        }
    }
}

/// Two images judged to be near-duplicates
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicatePair {
    pub file_a: String,
    pub file_b: String,
    /// Noise-adjusted difference; 0 when the files have identical content
    pub raw_diff_score: u64,
}

impl DuplicatePair {
    /// Files with identical content
    pub fn is_binary_same(&self) -> bool {
        self.raw_diff_score == 0
    }
}

/// Apply the divergence test to one image's ranked list
pub fn select_for(ranked: &RankedScores, policy: &SelectionPolicy) -> Result<Vec<DuplicatePair>> {
    let k = policy.expected_max_duplicates;
    let len = ranked.scores.len();
    if k == 0 || k > len {
        return Err(SimilarityError::InsufficientCandidates {
            subject: ranked.subject.clone(),
            required: k.max(1),
            available: len,
        });
    }

    let nth = ranked.scores[len - k].score as f64;

    Ok(ranked
        .scores
        .iter()
        .filter(|pair| pair.score == 0 || nth / pair.score as f64 > policy.divergence_tolerance)
        .map(|pair| DuplicatePair {
            file_a: ranked.subject.clone(),
            file_b: pair.other.clone(),
            raw_diff_score: pair.score,
        })
        .collect())
}

/// Select over every ranked list and remove reciprocal pairs
pub fn select_all(ranked: &[RankedScores], policy: &SelectionPolicy) -> Result<Vec<DuplicatePair>> {
    let mut pairs = Vec::new();
    for list in ranked {
        pairs.extend(select_for(list, policy)?);
    }
    Ok(dedupe_pairs(pairs))
}

/// Keep one pair per unordered `(file, file)` combination
///
/// Pairs are canonicalized so `file_a <= file_b`; when both directions carry
/// different scores the smaller one wins. The result is sorted by score, then
/// by file names, independent of input order.
pub fn dedupe_pairs(pairs: Vec<DuplicatePair>) -> Vec<DuplicatePair> {
    let mut unique: BTreeMap<(String, String), u64> = BTreeMap::new();

    for pair in pairs {
        let key = if pair.file_a <= pair.file_b {
            (pair.file_a, pair.file_b)
        } else {
            (pair.file_b, pair.file_a)
        };
        unique
            .entry(key)
            .and_modify(|score| *score = (*score).min(pair.raw_diff_score))
            .or_insert(pair.raw_diff_score);
    }

    let mut result: Vec<DuplicatePair> = unique
        .into_iter()
        .map(|((file_a, file_b), raw_diff_score)| DuplicatePair {
            file_a,
            file_b,
            raw_diff_score,
        })
        .collect();
    result.sort_by(|a, b| {
        a.raw_diff_score
            .cmp(&b.raw_diff_score)
            .then_with(|| a.file_a.cmp(&b.file_a))
            .then_with(|| a.file_b.cmp(&b.file_b))
    });
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duplicate::scoring::ScoredPair;
    use std::collections::HashSet;

    fn ranked(subject: &str, scores: &[(&str, u64)]) -> RankedScores {
        let mut scores: Vec<ScoredPair> = scores
            .iter()
            .map(|(other, score)| ScoredPair {
                other: other.to_string(),
                score: *score,
            })
            .collect();
        scores.sort_by(|a, b| b.score.cmp(&a.score));
        RankedScores {
            subject: subject.to_string(),
            scores,
        }
    }

    fn pair(a: &str, b: &str, score: u64) -> DuplicatePair {
        DuplicatePair {
            file_a: a.to_string(),
            file_b: b.to_string(),
            raw_diff_score: score,
        }
    }

    #[test]
    fn test_default_policy() {
        let policy = SelectionPolicy::default();
        assert_eq!(policy.expected_max_duplicates, 4);
        assert_eq!(policy.divergence_tolerance, 1.8);
    }

    #[test]
    fn test_flags_outlier_close_neighbour() {
        // ascending: 10, 100, 110, 120, 130 -> with k = 4, nth = 120
        let list = ranked(
            "x",
            &[("a", 130), ("b", 120), ("c", 110), ("d", 100), ("e", 10)],
        );
        let found = select_for(&list, &SelectionPolicy::default()).unwrap();
        assert_eq!(found, vec![pair("x", "e", 10)]);
    }

    #[test]
    fn test_ratio_must_exceed_tolerance() {
        // nth = 90 (k = 2), 90 / 50 = 1.8 is not > 1.8
        let list = ranked("x", &[("a", 200), ("b", 90), ("c", 50)]);
        let policy = SelectionPolicy {
            expected_max_duplicates: 2,
            divergence_tolerance: 1.8,
        };
        assert!(select_for(&list, &policy).unwrap().is_empty());

        let list = ranked("x", &[("a", 200), ("b", 90), ("c", 49)]);
        assert_eq!(select_for(&list, &policy).unwrap(), vec![pair("x", "c", 49)]);
    }

    #[test]
    fn test_zero_is_always_duplicate() {
        // nth = 0 as well, so only the zero-score entry qualifies
        let list = ranked("x", &[("a", 500), ("b", 400), ("c", 0)]);
        let policy = SelectionPolicy {
            expected_max_duplicates: 1,
            divergence_tolerance: 1.8,
        };
        assert_eq!(select_for(&list, &policy).unwrap(), vec![pair("x", "c", 0)]);
    }

    #[test]
    fn test_uniform_population_reports_nothing() {
        let list = ranked("x", &[("a", 100), ("b", 101), ("c", 99), ("d", 100), ("e", 98)]);
        assert!(select_for(&list, &SelectionPolicy::default()).unwrap().is_empty());
    }

    #[test]
    fn test_insufficient_candidates() {
        let list = ranked("x", &[("a", 1), ("b", 2), ("c", 3)]);
        let err = select_for(&list, &SelectionPolicy::default()).unwrap_err();
        assert!(matches!(
            err,
            SimilarityError::InsufficientCandidates {
                required: 4,
                available: 3,
                ..
            }
        ));

        let zero_k = SelectionPolicy {
            expected_max_duplicates: 0,
            divergence_tolerance: 1.8,
        };
        assert!(select_for(&list, &zero_k).is_err());
    }

    #[test]
    fn test_dedupe_symmetric_pairs() {
        let pairs = vec![
            pair("b", "a", 3),
            pair("a", "b", 3),
            pair("c", "a", 0),
            pair("a", "c", 0),
            pair("d", "e", 7),
        ];
        let result = dedupe_pairs(pairs);
        assert_eq!(
            result,
            vec![pair("a", "c", 0), pair("a", "b", 3), pair("d", "e", 7)]
        );
    }

    #[test]
    fn test_dedupe_is_order_independent() {
        let forward = vec![pair("a", "b", 5), pair("b", "a", 5), pair("c", "b", 2)];
        let mut backward = forward.clone();
        backward.reverse();
        assert_eq!(dedupe_pairs(forward), dedupe_pairs(backward));
    }

    #[test]
    fn test_select_all_unique_unordered_pairs() {
        let lists = vec![
            ranked("a", &[("b", 0), ("c", 300), ("d", 310), ("e", 320)]),
            ranked("b", &[("a", 0), ("c", 300), ("d", 305), ("e", 330)]),
            ranked("c", &[("a", 300), ("b", 300), ("d", 20), ("e", 310)]),
            ranked("d", &[("a", 310), ("b", 305), ("c", 20), ("e", 300)]),
        ];
        let result = select_all(&lists, &SelectionPolicy::default()).unwrap();

        let keys: HashSet<(String, String)> = result
            .iter()
            .map(|p| (p.file_a.clone(), p.file_b.clone()))
            .collect();
        assert_eq!(keys.len(), result.len());
        assert_eq!(result, vec![pair("a", "b", 0), pair("c", "d", 20)]);
    }
}
