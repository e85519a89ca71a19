//! Injected progress and diagnostics sinks
//!
//! The comparison pipeline never prints. Callers that want feedback pass in a
//! [`ProgressSink`] (one tick per file) and optionally a [`DiagnosticsSink`]
//! that receives the noise score of every freshly computed fingerprint.

use log::debug;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

/// Receives one increment per file once it is accounted for
pub trait ProgressSink: Send + Sync {
    /// Called with the total number of files before any work starts
    fn start(&self, _total: usize) {}

    fn increment(&self, count: u64);

    /// Called once when every file has been accounted for
    fn finish(&self) {}
}

/// A progress sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn increment(&self, _count: u64) {}
}

/// Receives per-file measurements produced while fingerprinting
pub trait DiagnosticsSink: Send + Sync {
    fn record_noise_score(&self, file: &str, score: f64);
}

/// Collects noise scores and writes them as `file,score` lines
#[derive(Debug, Default)]
pub struct NoiseScoreLog {
    records: Mutex<Vec<(String, f64)>>,
}

impl NoiseScoreLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded scores, sorted by file name
    pub fn records(&self) -> Vec<(String, f64)> {
        let mut records = self
            .records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        records.sort_by(|a, b| a.0.cmp(&b.0));
        records
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        for (file, score) in self.records() {
            writeln!(writer, "{},{}", file, score)?;
        }
        Ok(())
    }

    pub fn write_file(&self, path: &Path) -> std::io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()
    }
}

impl DiagnosticsSink for NoiseScoreLog {
    fn record_noise_score(&self, file: &str, score: f64) {
        debug!("Noise score {}: {:.3}", file, score);
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((file.to_string(), score));
    }
}
