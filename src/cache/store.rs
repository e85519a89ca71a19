//! Persistent fingerprint cache
//!
//! Entries are keyed by [`ContentHash`] and remember the [`FingerprintConfig`]
//! they were computed with. An entry only counts as a hit when that config is
//! equal to the one requested, so changing any sampling parameter invalidates
//! every entry.
//!
//! The cache has two sides:
//!
//! - a read snapshot loaded once at [`FingerprintCache::open`] and never
//!   modified afterwards
//! - a write buffer filled through [`FingerprintCache::put`] while workers
//!   finish, and persisted by [`FingerprintCache::save`]
//!
//! `save` replaces the file with the write buffer only, so entries for files
//! that were not seen during the run are dropped.

use crate::cache::content::ContentHash;
use crate::core::error::{Result, SimilarityError};
use crate::fingerprint::{Color, Fingerprint, FingerprintConfig, Sample, SamplePoint};
use chrono::{DateTime, TimeZone, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// A cached fingerprint together with the parameters that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub hash: ContentHash,
    pub fingerprint: Fingerprint,
    pub config: FingerprintConfig,
    pub noise_score: f64,
}

/// Summary of a persisted store, for `cache stats`
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Location of the store
    pub path: PathBuf,
    /// Whether the store file exists
    pub exists: bool,
    /// Number of entries
    pub entries: usize,
    /// When the store was last written
    pub created_at: Option<DateTime<Utc>>,
    /// Entry count per fingerprint configuration, most common first
    pub configs: Vec<(FingerprintConfig, usize)>,
}

/// Content-addressed fingerprint cache
#[derive(Debug)]
pub struct FingerprintCache {
    path: PathBuf,
    snapshot: HashMap<ContentHash, CacheEntry>,
    pending: Mutex<HashMap<ContentHash, CacheEntry>>,
}

impl FingerprintCache {
    /// Open the store at `path`
    ///
    /// A missing file gives an empty cache. A file that exists but cannot be
    /// read or parsed is a [`SimilarityError::CacheCorrupt`] error.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let snapshot = match read_store(&path)? {
            Some(store) => {
                let entries: HashMap<_, _> = store
                    .entries
                    .into_iter()
                    .map(|stored| {
                        let entry = stored.into_entry();
                        (entry.hash, entry)
                    })
                    .collect();
                info!(
                    "Loaded {} cached fingerprints from {}",
                    entries.len(),
                    path.display()
                );
                entries
            }
            None => HashMap::new(),
        };

        Ok(Self {
            path,
            snapshot,
            pending: Mutex::new(HashMap::new()),
        })
    }

    /// A cache that starts empty regardless of what is on disk
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            snapshot: HashMap::new(),
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entries in the read snapshot
    pub fn len(&self) -> usize {
        self.snapshot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }

    /// Entries waiting to be saved
    pub fn pending_len(&self) -> usize {
        self.pending_map().len()
    }

    /// True when an entry exists for `hash` and was computed with `config`
    pub fn is_cached(&self, hash: ContentHash, config: &FingerprintConfig) -> bool {
        self.snapshot
            .get(&hash)
            .is_some_and(|entry| entry.config == *config)
    }

    /// A copy of the snapshot entry for `hash`
    pub fn load(&self, hash: ContentHash) -> Option<CacheEntry> {
        self.snapshot.get(&hash).cloned()
    }

    /// Record an entry for the next [`save`](Self::save)
    ///
    /// Does not affect [`is_cached`](Self::is_cached) or [`load`](Self::load).
    pub fn put(&self, entry: CacheEntry) {
        self.pending_map().insert(entry.hash, entry);
    }

    /// Replace the store with the entries put during this run
    ///
    /// Creates the store directory if needed and writes through a temporary
    /// file, so a failed write leaves the previous store intact. Returns the
    /// number of entries written.
    pub fn save(&self) -> Result<usize> {
        let mut entries: Vec<StoredEntry> = self
            .pending_map()
            .values()
            .map(StoredEntry::from_entry)
            .collect();
        entries.sort_by_key(|entry| entry.hash);
        let count = entries.len();

        let store = StoreFile {
            version: StoreFile::CURRENT_VERSION,
            created_at: Utc::now().timestamp(),
            entries,
        };

        let json = serde_json::to_string_pretty(&store)
            .map_err(|e| self.write_error(format!("failed to serialize cache: {}", e)))?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| self.write_error(format!("failed to create cache directory: {}", e)))?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, json)
            .map_err(|e| self.write_error(format!("failed to write cache file: {}", e)))?;
        fs::rename(&temp_path, &self.path)
            .map_err(|e| self.write_error(format!("failed to replace cache file: {}", e)))?;

        debug!("Saved {} fingerprints to {}", count, self.path.display());
        Ok(count)
    }

    /// Delete the store at `path`. Returns whether a file was removed.
    pub fn clear(path: &Path) -> Result<bool> {
        match fs::remove_file(path) {
            Ok(()) => {
                info!("Removed fingerprint cache {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(SimilarityError::Io(format!(
                "Failed to remove {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Describe the store at `path` without keeping it open
    pub fn stats(path: &Path) -> Result<CacheStats> {
        let mut stats = CacheStats {
            path: path.to_path_buf(),
            exists: path.exists(),
            entries: 0,
            created_at: None,
            configs: Vec::new(),
        };

        let Some(store) = read_store(path)? else {
            return Ok(stats);
        };

        let mut counts: HashMap<FingerprintConfig, usize> = HashMap::new();
        for entry in &store.entries {
            *counts.entry(entry.sampler.config()).or_default() += 1;
        }

        let mut configs: Vec<_> = counts.into_iter().collect();
        configs.sort_by(|(a, a_count), (b, b_count)| {
            b_count.cmp(a_count).then_with(|| {
                (a.accuracy_x, a.accuracy_y, a.passes_per_block).cmp(&(
                    b.accuracy_x,
                    b.accuracy_y,
                    b.passes_per_block,
                ))
            })
        });

        stats.entries = store.entries.len();
        stats.created_at = Utc.timestamp_opt(store.created_at, 0).single();
        stats.configs = configs;
        Ok(stats)
    }

    fn pending_map(&self) -> MutexGuard<'_, HashMap<ContentHash, CacheEntry>> {
        // a panic while holding the lock cannot leave the map half-updated
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_error(&self, message: String) -> SimilarityError {
        SimilarityError::CacheWrite {
            path: self.path.clone(),
            message,
        }
    }
}

/// Read and parse a store. `Ok(None)` when there is nothing usable to load.
fn read_store(path: &Path) -> Result<Option<StoreFile>> {
    let json = match fs::read_to_string(path) {
        Ok(json) => json,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(corrupt(path, format!("cannot read file: {}", e))),
    };

    let header: VersionHeader =
        serde_json::from_str(&json).map_err(|e| corrupt(path, e.to_string()))?;
    if header.version != StoreFile::CURRENT_VERSION {
        warn!(
            "Ignoring fingerprint cache {} with format version {} (expected {})",
            path.display(),
            header.version,
            StoreFile::CURRENT_VERSION
        );
        return Ok(None);
    }

    let store: StoreFile = serde_json::from_str(&json).map_err(|e| corrupt(path, e.to_string()))?;
    Ok(Some(store))
}

fn corrupt(path: &Path, message: String) -> SimilarityError {
    SimilarityError::CacheCorrupt {
        path: path.to_path_buf(),
        message,
    }
}

// On-disk format

#[derive(Deserialize)]
struct VersionHeader {
    version: u32,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreFile {
    version: u32,
    created_at: i64,
    entries: Vec<StoredEntry>,
}

impl StoreFile {
    const CURRENT_VERSION: u32 = 1;
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    hash: u64,
    sampler: StoredSampler,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredSampler {
    accuracy_x: u32,
    accuracy_y: u32,
    passes_per_block: u32,
    noise_score: f64,
    fingerprint: Vec<StoredSample>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredSample {
    point: StoredPoint,
    color: StoredColor,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredPoint {
    x: u32,
    y: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredColor {
    r: u8,
    g: u8,
    b: u8,
    #[serde(default = "opaque")]
    a: u8,
}

fn opaque() -> u8 {
    255
}

impl StoredSampler {
    fn config(&self) -> FingerprintConfig {
        FingerprintConfig::new(self.accuracy_x, self.accuracy_y, self.passes_per_block)
    }
}

impl StoredEntry {
    fn from_entry(entry: &CacheEntry) -> Self {
        Self {
            hash: entry.hash.value(),
            sampler: StoredSampler {
                accuracy_x: entry.config.accuracy_x,
                accuracy_y: entry.config.accuracy_y,
                passes_per_block: entry.config.passes_per_block,
                noise_score: entry.noise_score,
                fingerprint: entry
                    .fingerprint
                    .iter()
                    .map(|sample| StoredSample {
                        point: StoredPoint {
                            x: sample.point.x,
                            y: sample.point.y,
                        },
                        color: StoredColor {
                            r: sample.color.r,
                            g: sample.color.g,
                            b: sample.color.b,
                            a: opaque(),
                        },
                    })
                    .collect(),
            },
        }
    }

    fn into_entry(self) -> CacheEntry {
        let config = self.sampler.config();
        CacheEntry {
            hash: ContentHash(self.hash),
            config,
            noise_score: self.sampler.noise_score,
            fingerprint: self
                .sampler
                .fingerprint
                .into_iter()
                .map(|sample| Sample {
                    point: SamplePoint {
                        x: sample.point.x,
                        y: sample.point.y,
                    },
                    color: Color::new(sample.color.r, sample.color.g, sample.color.b),
                })
                .collect(),
        }
    }
}
