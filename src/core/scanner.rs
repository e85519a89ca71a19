//! Candidate file enumeration
//!
//! Walks the scanned folder and returns every regular file that is not
//! excluded by extension. The cache directory is never descended into.

use crate::core::config::ScanConfig;
use crate::core::error::{Result, SimilarityError};
use log::{trace, warn};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// A file found under the scan root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Absolute (or root-joined) path used for reading
    pub path: PathBuf,
    /// Path relative to the scan root with `/` separators; the image identifier
    pub name: String,
}

/// Enumerates candidate files under a root folder
#[derive(Debug, Clone)]
pub struct Scanner {
    recursive: bool,
    follow_symlinks: bool,
    excluded_extensions: Vec<String>,
    skip_dir: Option<String>,
}

impl Scanner {
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            recursive: config.recursive,
            follow_symlinks: config.follow_symlinks,
            excluded_extensions: config
                .excluded_extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            skip_dir: None,
        }
    }

    /// Never descend into directories with this name (the cache directory)
    pub fn with_skip_dir(mut self, name: impl Into<String>) -> Self {
        self.skip_dir = Some(name.into());
        self
    }

    /// List candidates under `root`, sorted by name
    pub fn scan(&self, root: &Path) -> Result<Vec<Candidate>> {
        if !root.is_dir() {
            return Err(SimilarityError::Io(format!(
                "Folder does not exist: {}",
                root.display()
            )));
        }

        let walker = WalkDir::new(root)
            .follow_links(self.follow_symlinks)
            .max_depth(if self.recursive { usize::MAX } else { 1 });

        let mut candidates = Vec::new();
        for entry in walker.into_iter().filter_entry(|e| !self.is_skipped_dir(e)) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            // with follow_links off a symlink reports its own type here
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if self.is_excluded(path) {
                trace!("Excluded by extension: {}", path.display());
                continue;
            }

            let Ok(relative) = path.strip_prefix(root) else {
                continue;
            };
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            candidates.push(Candidate {
                path: path.to_path_buf(),
                name,
            });
        }

        candidates.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(candidates)
    }

    fn is_skipped_dir(&self, entry: &DirEntry) -> bool {
        entry.depth() > 0
            && entry.file_type().is_dir()
            && self
                .skip_dir
                .as_deref()
                .is_some_and(|skip| entry.file_name() == skip)
    }

    fn is_excluded(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .is_some_and(|ext| self.excluded_extensions.contains(&ext))
    }
}
