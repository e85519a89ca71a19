//! Progress bar utilities for CLI output
//!
//! Key features:
//! - A fingerprinting progress bar driven through [`ProgressSink`]
//! - Consistent console message helpers
//! - A dual console/file writer for logging

use crate::diagnostics::ProgressSink;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::time::{Duration, Instant};

// ============================================================================
// Styles - Consistent visual appearance
// ============================================================================

/// Get the progress bar style for fingerprinting
fn progress_bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("  {spinner:.green} [{bar:40.cyan/dim}] {pos}/{len} ({percent}%) {msg}")
        .unwrap()
        .progress_chars("━━╾─")
}

/// Get the style for completed progress bars
fn completed_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("  ✓ [{bar:40.green/dim}] {pos}/{len} ({percent}%) {msg}")
        .unwrap()
        .progress_chars("━━━")
}

// ============================================================================
// Console output helpers
// ============================================================================

/// Print a header section with a box
pub fn print_header(title: &str) {
    let width = 68;
    let title_padded = format!("{:^width$}", title, width = width - 4);
    println!();
    println!("╔{}╗", "═".repeat(width - 2));
    println!("║{}║", title_padded);
    println!("╚{}╝", "═".repeat(width - 2));
    println!();
}

/// Print a success message with checkmark
pub fn print_success(msg: &str) {
    println!("  ✓ {}", msg);
}

/// Print an info message with bullet
pub fn print_info(msg: &str) {
    println!("  • {}", msg);
}

/// Print a warning message
pub fn print_warning(msg: &str) {
    println!("  ⚠ {}", msg);
}

// ============================================================================
// Fingerprinting progress
// ============================================================================

/// Progress bar that advances once per file
pub struct FingerprintProgress {
    progress_bar: ProgressBar,
    start_time: Instant,
}

impl FingerprintProgress {
    pub fn new() -> Self {
        let progress_bar = ProgressBar::new(0);
        progress_bar.set_style(progress_bar_style());
        progress_bar.set_message("Fingerprinting...");

        Self {
            progress_bar,
            start_time: Instant::now(),
        }
    }

    /// A bar that draws nothing (used for `--json`)
    pub fn hidden() -> Self {
        Self {
            progress_bar: ProgressBar::hidden(),
            start_time: Instant::now(),
        }
    }
}

impl Default for FingerprintProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for FingerprintProgress {
    fn start(&self, total: usize) {
        self.progress_bar.set_length(total as u64);
        self.progress_bar.enable_steady_tick(Duration::from_millis(100));
    }

    fn increment(&self, count: u64) {
        self.progress_bar.inc(count);
    }

    fn finish(&self) {
        self.progress_bar.set_style(completed_style());
        self.progress_bar.finish_with_message(format!(
            "Fingerprinted in {}",
            format_duration(self.start_time.elapsed())
        ));
    }
}

// ============================================================================
// Utility functions
// ============================================================================

/// Format duration as human-readable string
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        format!("{}h {}m", hours, mins)
    } else if secs >= 60 {
        let mins = secs / 60;
        let secs = secs % 60;
        format!("{}m {}s", mins, secs)
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}

// ============================================================================
// Dual writer for file + console logging
// ============================================================================

/// A writer that writes to both console and file
///
/// Used for logging to both stderr and a log file simultaneously.
pub struct DualWriter {
    pub console: std::io::Stderr,
    pub file: std::fs::File,
}

impl Write for DualWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let _ = self.console.write(buf);
        self.file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let _ = self.console.flush();
        self.file.flush()
    }
}
