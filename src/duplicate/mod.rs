//! Duplicate detection module
//!
//! This module compares fingerprints pairwise and picks out pairs that are
//! unusually close relative to the rest of the population.
//!
//! # Submodules
//!
//! - `scoring` - Noise-adjusted pairwise scores and per-image ranked lists
//! - `selector` - Divergence-ratio selection and symmetric pair removal
//! - `finder` - The full scan, fingerprint, cache and compare pipeline

pub mod finder;
pub mod scoring;
pub mod selector;

pub use finder::{find_pairs, ComparisonReport, DuplicateFinder, FileFailure, RunStats};
pub use scoring::{
    adjust_score_for_noise, comparison_score, rank_all, rank_for, raw_difference, ImageRecord,
    RankedScores, ScoredPair, NOISE_FLOOR,
};
pub use selector::{dedupe_pairs, select_all, select_for, DuplicatePair, SelectionPolicy};
