//! End-to-end comparison run
//!
//! [`DuplicateFinder::run_comparison`] drives one run over a folder:
//!
//! 1. enumerate candidates and hash their contents
//! 2. reuse cached fingerprints whose config matches, queue the rest on the
//!    [`WorkPool`]
//! 3. gather computed records on a collector thread, feeding the cache's
//!    write buffer as they arrive
//! 4. once the pool drains, persist the cache
//! 5. score every pair and apply the divergence test

use crate::cache::{hash_file, CacheEntry, ContentHash, FingerprintCache};
use crate::core::config::Config;
use crate::core::error::{Result, SimilarityError};
use crate::core::scanner::{Candidate, Scanner};
use crate::diagnostics::{DiagnosticsSink, NoProgress, ProgressSink};
use crate::duplicate::scoring::{rank_all, ImageRecord};
use crate::duplicate::selector::{select_all, DuplicatePair, SelectionPolicy};
use crate::fingerprint::{fingerprint_image, FingerprintConfig};
use crate::pool::WorkPool;
use crossbeam_channel::{unbounded, Sender};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

/// Counters for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Files found under the root
    pub candidates: usize,
    /// Fingerprints reused from the cache
    pub cache_hits: usize,
    /// Fingerprints computed during this run
    pub computed: usize,
    /// Files that could not be hashed, read, or decoded
    pub failed: usize,
}

/// A file that was skipped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub name: String,
    pub error: String,
}

/// Result of [`DuplicateFinder::run_comparison`]
#[derive(Debug, Clone, Default, Serialize)]
pub struct ComparisonReport {
    /// Duplicate pairs sorted by score, then names
    pub pairs: Vec<DuplicatePair>,
    pub stats: RunStats,
    /// Skipped files, sorted by name
    pub failures: Vec<FileFailure>,
    /// Set when the cache could not be saved; `pairs` are still valid
    pub cache_save_error: Option<String>,
}

/// What a fingerprint job hands to the collector
enum JobOutcome {
    Computed(ImageRecord),
    Failed { name: String, error: SimilarityError },
}

/// Finds near-duplicate images in a folder
pub struct DuplicateFinder {
    config: Config,
    use_cache: bool,
    progress: Arc<dyn ProgressSink>,
    diagnostics: Option<Arc<dyn DiagnosticsSink>>,
}

impl DuplicateFinder {
    pub fn new(config: Config) -> Self {
        let use_cache = config.cache.enabled;
        Self {
            config,
            use_cache,
            progress: Arc::new(NoProgress),
            diagnostics: None,
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticsSink>) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    /// Enable or disable the persistent cache for this finder
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.use_cache = enabled;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run a full comparison over `root`
    pub fn run_comparison(&self, root: &Path) -> Result<ComparisonReport> {
        let started = Instant::now();
        let fp_config = self.config.fingerprint;
        fp_config.validate()?;
        let mut policy = self.config.comparison.to_policy();
        if !(policy.divergence_tolerance.is_finite() && policy.divergence_tolerance > 0.0) {
            return Err(SimilarityError::InvalidConfig(format!(
                "divergence_tolerance must be a positive number (got {})",
                policy.divergence_tolerance
            )));
        }

        let candidates = Scanner::new(&self.config.scan)
            .with_skip_dir(self.config.cache.directory.clone())
            .scan(root)?;
        info!(
            "Found {} candidate files in {}",
            candidates.len(),
            root.display()
        );

        let cache = if self.use_cache {
            let path = self.config.cache.cache_file_for(root);
            Some(Arc::new(FingerprintCache::open(path)?))
        } else {
            None
        };

        let mut report = ComparisonReport {
            stats: RunStats {
                candidates: candidates.len(),
                ..RunStats::default()
            },
            ..ComparisonReport::default()
        };

        self.progress.start(candidates.len());
        let (records, failures) = self.collect_records(&candidates, fp_config, cache.as_deref())?;
        self.progress.finish();

        report.stats.cache_hits = records.len() - records.iter().filter(|(_, computed)| *computed).count();
        report.stats.computed = records.len() - report.stats.cache_hits;
        report.stats.failed = failures.len();
        report.failures = failures;

        if let Some(cache) = &cache {
            match cache.save() {
                Ok(count) => info!("Saved {} fingerprints to {}", count, cache.path().display()),
                Err(e) => {
                    error!("{}", e);
                    report.cache_save_error = Some(e.to_string());
                }
            }
        }

        let records: Vec<ImageRecord> = records.into_iter().map(|(record, _)| record).collect();
        info!(
            "Fingerprinted {} files ({} cached, {} computed, {} failed) in {:.1?}",
            records.len(),
            report.stats.cache_hits,
            report.stats.computed,
            report.stats.failed,
            started.elapsed()
        );

        if records.len() < 2 {
            info!("Fewer than two images, nothing to compare");
            return Ok(report);
        }

        let available = records.len() - 1;
        if policy.expected_max_duplicates > available {
            warn!(
                "expected_max_duplicates {} exceeds the {} other images available, using {}",
                policy.expected_max_duplicates, available, available
            );
            policy.expected_max_duplicates = available;
        }
        if policy.expected_max_duplicates == 0 {
            return Err(SimilarityError::InvalidConfig(
                "expected_max_duplicates must be at least 1".to_string(),
            ));
        }

        report.pairs = find_pairs(&records, &policy)?;
        info!(
            "Found {} duplicate pairs among {} images in {:.1?}",
            report.pairs.len(),
            records.len(),
            started.elapsed()
        );

        Ok(report)
    }

    /// Fingerprint every candidate, returning records (flagged when freshly
    /// computed) sorted by name, and the files that failed
    fn collect_records(
        &self,
        candidates: &[Candidate],
        fp_config: FingerprintConfig,
        cache: Option<&FingerprintCache>,
    ) -> Result<(Vec<(ImageRecord, bool)>, Vec<FileFailure>)> {
        let fail_fast = self.config.scan.fail_fast;
        let mut records = Vec::with_capacity(candidates.len());
        let mut failures = Vec::new();
        let mut first_error: Option<SimilarityError> = None;

        let pool = WorkPool::new(self.config.workers.max_workers)?;
        let (tx, rx) = unbounded::<JobOutcome>();
        let abort = Arc::new(AtomicBool::new(false));
        let mut submitted = HashSet::new();

        let collected = thread::scope(|scope| -> Result<Vec<JobOutcome>> {
            let collector = scope.spawn(move || {
                let mut outcomes = Vec::new();
                for outcome in rx.iter() {
                    if let (JobOutcome::Computed(record), Some(cache)) = (&outcome, cache) {
                        cache.put(CacheEntry {
                            hash: record.hash,
                            fingerprint: record.fingerprint.clone(),
                            config: fp_config,
                            noise_score: record.noise_score,
                        });
                    }
                    outcomes.push(outcome);
                }
                outcomes
            });

            for candidate in candidates {
                let hash = match hash_file(&candidate.path) {
                    Ok(hash) => hash,
                    Err(e) => {
                        self.progress.increment(1);
                        if fail_fast {
                            abort.store(true, Ordering::SeqCst);
                            first_error = Some(e.in_file(&candidate.path));
                            break;
                        }
                        warn!("Skipping {}: {}", candidate.name, e);
                        failures.push(FileFailure {
                            name: candidate.name.clone(),
                            error: e.to_string(),
                        });
                        continue;
                    }
                };

                if let Some(entry) = cache
                    .filter(|cache| cache.is_cached(hash, &fp_config))
                    .and_then(|cache| cache.load(hash))
                {
                    debug!("Cache hit: {}", candidate.name);
                    records.push((
                        ImageRecord {
                            name: candidate.name.clone(),
                            path: candidate.path.clone(),
                            hash,
                            fingerprint: entry.fingerprint.clone(),
                            noise_score: entry.noise_score,
                        },
                        false,
                    ));
                    if let Some(cache) = cache {
                        cache.put(entry);
                    }
                    self.progress.increment(1);
                    continue;
                }

                debug!("Cache miss: {}", candidate.name);
                submitted.insert(candidate.name.clone());
                let job = FingerprintJob {
                    candidate: candidate.clone(),
                    hash,
                    config: fp_config,
                    results: tx.clone(),
                    progress: Arc::clone(&self.progress),
                    diagnostics: self.diagnostics.clone(),
                    abort: Arc::clone(&abort),
                    fail_fast,
                };
                pool.submit(move || job.run())?;
            }

            pool.mark_no_more_work();
            pool.wait_for_drain();
            drop(tx);

            collector
                .join()
                .map_err(|_| SimilarityError::Pool("collector thread panicked".to_string()))
        })?;
        pool.join();

        if let Some(e) = first_error {
            return Err(e);
        }

        let mut compute_errors = Vec::new();
        for outcome in collected {
            match outcome {
                JobOutcome::Computed(record) => {
                    submitted.remove(&record.name);
                    records.push((record, true));
                }
                JobOutcome::Failed { name, error } => {
                    submitted.remove(&name);
                    compute_errors.push((name, error));
                }
            }
        }

        // jobs that neither reported nor failed were lost to a panic or an abort
        if !abort.load(Ordering::SeqCst) {
            for name in submitted {
                let error = SimilarityError::Pool("fingerprint job panicked".to_string());
                compute_errors.push((name, error));
            }
        }

        compute_errors.sort_by(|a, b| a.0.cmp(&b.0));
        if fail_fast {
            if let Some((name, error)) = compute_errors.into_iter().next() {
                return Err(error.in_file(Path::new(&name)));
            }
        } else {
            for (name, error) in compute_errors {
                warn!("Skipping {}: {}", name, error);
                failures.push(FileFailure {
                    name,
                    error: error.to_string(),
                });
            }
        }

        records.sort_by(|a, b| a.0.name.cmp(&b.0.name));
        failures.sort_by(|a, b| a.name.cmp(&b.name));
        Ok((records, failures))
    }
}

/// Score every pair and select duplicates
pub fn find_pairs(records: &[ImageRecord], policy: &SelectionPolicy) -> Result<Vec<DuplicatePair>> {
    let ranked = rank_all(records)?;
    select_all(&ranked, policy)
}

/// Fingerprint computation for one cache miss
struct FingerprintJob {
    candidate: Candidate,
    hash: ContentHash,
    config: FingerprintConfig,
    results: Sender<JobOutcome>,
    progress: Arc<dyn ProgressSink>,
    diagnostics: Option<Arc<dyn DiagnosticsSink>>,
    abort: Arc<AtomicBool>,
    fail_fast: bool,
}

impl FingerprintJob {
    fn run(self) {
        if self.abort.load(Ordering::SeqCst) {
            return;
        }

        let outcome = match self.compute() {
            Ok(record) => {
                if let Some(diagnostics) = &self.diagnostics {
                    diagnostics.record_noise_score(&record.name, record.noise_score);
                }
                JobOutcome::Computed(record)
            }
            Err(error) => {
                if self.fail_fast {
                    self.abort.store(true, Ordering::SeqCst);
                }
                JobOutcome::Failed {
                    name: self.candidate.name.clone(),
                    error,
                }
            }
        };

        // the collector only goes away after the pool has drained
        let _ = self.results.send(outcome);
        self.progress.increment(1);
    }

    fn compute(&self) -> Result<ImageRecord> {
        let bytes = fs::read(&self.candidate.path)
            .map_err(|e| SimilarityError::Io(format!("Failed to read file: {}", e)))?;
        let (fingerprint, noise_score) = fingerprint_image(&bytes, &self.config)?;

        Ok(ImageRecord {
            name: self.candidate.name.clone(),
            path: self.candidate.path.clone(),
            hash: self.hash,
            fingerprint,
            noise_score,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::NoiseScoreLog;
    use image::{ImageFormat, RgbImage};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::path::PathBuf;
    use std::sync::atomic::AtomicU64;
    use tempfile::TempDir;

    struct CountingProgress {
        total: AtomicU64,
    }

    impl ProgressSink for CountingProgress {
        fn increment(&self, count: u64) {
            self.total.fetch_add(count, Ordering::SeqCst);
        }
    }

    fn noise_png(path: &Path, seed: u64) {
        noise_png_sized(path, seed, 64);
    }

    fn noise_png_sized(path: &Path, seed: u64, size: u32) {
        let mut rng = StdRng::seed_from_u64(seed);
        let image = RgbImage::from_fn(size, size, |_, _| image::Rgb([rng.gen(), rng.gen(), rng.gen()]));
        image.save_with_format(path, ImageFormat::Png).unwrap();
    }

    /// Five images; 1 and 2 are byte-identical
    fn population() -> TempDir {
        let temp = TempDir::new().unwrap();
        noise_png(&temp.path().join("img1.png"), 1);
        fs::copy(temp.path().join("img1.png"), temp.path().join("img2.png")).unwrap();
        noise_png(&temp.path().join("img3.png"), 3);
        noise_png(&temp.path().join("img4.png"), 4);
        noise_png(&temp.path().join("img5.png"), 5);
        temp
    }

    fn cache_file(temp: &TempDir) -> PathBuf {
        temp.path().join(".duplicate_detection").join("cache.json")
    }

    #[test]
    fn test_identical_copies_are_the_only_pair() {
        let temp = population();
        let progress = Arc::new(CountingProgress {
            total: AtomicU64::new(0),
        });
        let finder = DuplicateFinder::new(Config::default()).with_progress(progress.clone());

        let report = finder.run_comparison(temp.path()).unwrap();

        assert_eq!(
            report.pairs,
            vec![DuplicatePair {
                file_a: "img1.png".to_string(),
                file_b: "img2.png".to_string(),
                raw_diff_score: 0,
            }]
        );
        assert_eq!(report.stats.candidates, 5);
        assert_eq!(report.stats.computed, 5);
        assert_eq!(report.stats.cache_hits, 0);
        assert!(report.failures.is_empty());
        assert!(report.cache_save_error.is_none());
        assert_eq!(progress.total.load(Ordering::SeqCst), 5);
        assert!(cache_file(&temp).exists());
    }

    #[test]
    fn test_second_run_uses_cache() {
        let temp = population();
        DuplicateFinder::new(Config::default())
            .run_comparison(temp.path())
            .unwrap();

        let report = DuplicateFinder::new(Config::default())
            .run_comparison(temp.path())
            .unwrap();
        assert_eq!(report.stats.cache_hits, 5);
        assert_eq!(report.stats.computed, 0);
        assert_eq!(report.pairs.len(), 1);

        // hits are carried into the rewritten store
        let cache = FingerprintCache::open(cache_file(&temp)).unwrap();
        assert_eq!(cache.len(), 4);
    }

    #[test]
    fn test_changed_config_recomputes_and_overwrites() {
        let temp = population();
        let mut config = Config::default();
        config.fingerprint = FingerprintConfig::new(10, 10, 25);
        DuplicateFinder::new(config.clone())
            .run_comparison(temp.path())
            .unwrap();

        config.fingerprint = FingerprintConfig::new(20, 10, 25);
        let report = DuplicateFinder::new(config)
            .run_comparison(temp.path())
            .unwrap();
        assert_eq!(report.stats.cache_hits, 0);
        assert_eq!(report.stats.computed, 5);

        let hash = hash_file(&temp.path().join("img3.png")).unwrap();
        let cache = FingerprintCache::open(cache_file(&temp)).unwrap();
        assert_eq!(
            cache.load(hash).unwrap().config,
            FingerprintConfig::new(20, 10, 25)
        );
    }

    #[test]
    fn test_disabled_cache_writes_nothing() {
        let temp = population();
        let report = DuplicateFinder::new(Config::default())
            .with_cache(false)
            .run_comparison(temp.path())
            .unwrap();
        assert_eq!(report.pairs.len(), 1);
        assert!(!cache_file(&temp).exists());
    }

    #[test]
    fn test_undecodable_file_is_skipped() {
        let temp = population();
        fs::write(temp.path().join("broken.png"), b"not a png at all").unwrap();
        let log = Arc::new(NoiseScoreLog::new());

        let report = DuplicateFinder::new(Config::default())
            .with_diagnostics(log.clone())
            .run_comparison(temp.path())
            .unwrap();

        assert_eq!(report.stats.candidates, 6);
        assert_eq!(report.stats.failed, 1);
        assert_eq!(report.failures[0].name, "broken.png");
        assert_eq!(report.pairs.len(), 1);
        assert_eq!(log.records().len(), 5);
    }

    #[test]
    fn test_fail_fast_aborts() {
        let temp = population();
        fs::write(temp.path().join("broken.png"), b"not a png at all").unwrap();
        let mut config = Config::default();
        config.scan.fail_fast = true;

        let err = DuplicateFinder::new(config)
            .run_comparison(temp.path())
            .unwrap_err();
        assert!(matches!(err, SimilarityError::InFile { .. }));
        assert!(err.to_string().contains("broken.png"));
    }

    #[test]
    fn test_corrupt_cache_is_fatal() {
        let temp = population();
        fs::create_dir_all(cache_file(&temp).parent().unwrap()).unwrap();
        fs::write(cache_file(&temp), "{ garbage").unwrap();

        let err = DuplicateFinder::new(Config::default())
            .run_comparison(temp.path())
            .unwrap_err();
        assert!(matches!(err, SimilarityError::CacheCorrupt { .. }));
    }

    #[test]
    fn test_sizes_with_the_same_grid_compare() {
        let temp = TempDir::new().unwrap();
        // 60 and 64 px both give a 10x10 grid at accuracy 10
        noise_png_sized(&temp.path().join("large.png"), 1, 64);
        noise_png_sized(&temp.path().join("small.png"), 2, 60);
        noise_png_sized(&temp.path().join("other.png"), 3, 64);

        let report = DuplicateFinder::new(Config::default())
            .run_comparison(temp.path())
            .unwrap();
        assert_eq!(report.stats.computed, 3);
        assert!(report.failures.is_empty());
    }

    #[test]
    fn test_sizes_with_different_grids_abort() {
        let temp = TempDir::new().unwrap();
        // 64 px gives 10x10 samples, 25 px gives 12x12
        noise_png_sized(&temp.path().join("a.png"), 1, 64);
        noise_png_sized(&temp.path().join("b.png"), 2, 25);
        noise_png_sized(&temp.path().join("c.png"), 3, 64);

        let err = DuplicateFinder::new(Config::default())
            .run_comparison(temp.path())
            .unwrap_err();
        match err {
            SimilarityError::InFile { source, .. } => assert!(matches!(
                *source,
                SimilarityError::FingerprintSizeMismatch { .. }
            )),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_single_image_has_no_pairs() {
        let temp = TempDir::new().unwrap();
        noise_png(&temp.path().join("only.png"), 9);
        let report = DuplicateFinder::new(Config::default())
            .run_comparison(temp.path())
            .unwrap();
        assert!(report.pairs.is_empty());
        assert_eq!(report.stats.computed, 1);
    }

    #[test]
    fn test_excluded_extensions_are_not_candidates() {
        let temp = population();
        fs::write(temp.path().join("readme.txt"), b"hello").unwrap();
        let report = DuplicateFinder::new(Config::default())
            .run_comparison(temp.path())
            .unwrap();
        assert_eq!(report.stats.candidates, 5);
        assert!(report.failures.is_empty());
    }
}
