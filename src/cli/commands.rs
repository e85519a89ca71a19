//! Command handler implementations
//!
//! This module contains the implementation of all CLI commands.

use crate::cache::FingerprintCache;
use crate::cli::args::{Args, CacheCommands, Commands, ScanArgs};
use crate::cli::progress::{
    format_duration, print_header, print_info, print_success, print_warning, FingerprintProgress,
};
use crate::core::config::{get_config_path, init_config, Config};
use crate::diagnostics::{DiagnosticsSink, NoiseScoreLog, ProgressSink};
use crate::duplicate::{ComparisonReport, DuplicateFinder};
use anyhow::{anyhow, Context, Result};
use log::info;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Run the appropriate command based on CLI arguments
pub fn run_command(args: &Args, config: &Config) -> Result<()> {
    match &args.command {
        Commands::Scan(scan_args) => {
            let config = apply_scan_overrides(config.clone(), scan_args);
            run_scan(&config, scan_args)?;
        }
        Commands::Cache { cache_command } => match cache_command {
            CacheCommands::Stats { directory } => cache_stats(config, directory)?,
            CacheCommands::Clear { directory } => cache_clear(config, directory)?,
        },
        Commands::Config { path, reset } => {
            handle_config_command(*path, *reset)?;
        }
        Commands::GenerateConfig { output } => {
            generate_config_file(output.clone())?;
        }
        Commands::ShowConfig => {
            show_config(config);
        }
    }

    Ok(())
}

/// Apply `scan` command-line options on top of the loaded configuration
pub fn apply_scan_overrides(mut config: Config, args: &ScanArgs) -> Config {
    if args.recursive {
        config.scan.recursive = true;
    }
    if args.fail_fast {
        config.scan.fail_fast = true;
    }
    if let Some(x) = args.accuracy_x {
        config.fingerprint.accuracy_x = x;
    }
    if let Some(y) = args.accuracy_y {
        config.fingerprint.accuracy_y = y;
    }
    if let Some(passes) = args.passes {
        config.fingerprint.passes_per_block = passes;
    }
    if let Some(workers) = args.workers {
        config.workers.max_workers = workers;
    }
    if let Some(k) = args.expected_duplicates {
        config.comparison.expected_max_duplicates = k;
    }
    if let Some(tolerance) = args.tolerance {
        config.comparison.divergence_tolerance = tolerance;
    }
    if args.no_cache {
        config.cache.enabled = false;
    }
    config
}

/// Scan a folder and print the duplicate pairs
pub fn run_scan(config: &Config, args: &ScanArgs) -> Result<()> {
    let directory = &args.directory;
    if !directory.is_dir() {
        return Err(anyhow!("Not a directory: {}", directory.display()));
    }

    let start = Instant::now();
    let progress: Arc<dyn ProgressSink> = if args.json {
        Arc::new(FingerprintProgress::hidden())
    } else {
        print_header("IMAGE SIMILARITY SCAN");
        print_info(&format!("Folder: {}", directory.display()));
        print_info(&format!(
            "Fingerprint: {}x{} blocks, {} passes per block",
            config.fingerprint.accuracy_x,
            config.fingerprint.accuracy_y,
            config.fingerprint.passes_per_block
        ));
        println!();
        Arc::new(FingerprintProgress::new())
    };

    let noise_log = args.noise_log.as_ref().map(|_| Arc::new(NoiseScoreLog::new()));

    let mut finder = DuplicateFinder::new(config.clone()).with_progress(progress);
    if let Some(log) = &noise_log {
        finder = finder.with_diagnostics(Arc::clone(log) as Arc<dyn DiagnosticsSink>);
    }

    let report = finder
        .run_comparison(directory)
        .with_context(|| format!("Comparison of {} failed", directory.display()))?;

    if let (Some(log), Some(path)) = (&noise_log, &args.noise_log) {
        log.write_file(path)
            .with_context(|| format!("Failed to write noise log {}", path.display()))?;
        info!("Noise scores written to {}", path.display());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, start);
    }

    Ok(())
}

/// Print a scan report as text
fn print_report(report: &ComparisonReport, start: Instant) {
    println!();
    if report.pairs.is_empty() {
        print_success("No duplicates found");
    } else {
        println!("  Duplicates:");
        for pair in &report.pairs {
            if pair.is_binary_same() {
                println!("    {} duplicates {} (binary same)", pair.file_a, pair.file_b);
            } else {
                println!(
                    "    {} duplicates {} (score {})",
                    pair.file_a, pair.file_b, pair.raw_diff_score
                );
            }
        }
    }

    if !report.failures.is_empty() {
        println!();
        for failure in &report.failures {
            print_warning(&format!("Skipped {}: {}", failure.name, failure.error));
        }
    }

    if let Some(error) = &report.cache_save_error {
        print_warning(&format!("Fingerprint cache was not saved: {}", error));
    }

    let stats = &report.stats;
    println!();
    print_info(&format!(
        "{} files, {} from cache, {} computed, {} skipped",
        stats.candidates, stats.cache_hits, stats.computed, stats.failed
    ));
    print_info(&format!(
        "{} duplicate pairs in {}",
        report.pairs.len(),
        format_duration(start.elapsed())
    ));
}

/// Handle `cache stats`
pub fn cache_stats(config: &Config, directory: &Path) -> Result<()> {
    let path = config.cache.cache_file_for(directory);
    let stats = FingerprintCache::stats(&path)?;

    println!("Cache file: {}", stats.path.display());
    if !stats.exists {
        println!("  (no cache yet)");
        return Ok(());
    }

    println!("  entries: {}", stats.entries);
    if let Some(created) = stats.created_at {
        println!("  written: {}", created.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    for (fingerprint, count) in &stats.configs {
        let marker = if *fingerprint == config.fingerprint {
            " (current)"
        } else {
            ""
        };
        println!(
            "  {}x{} blocks, {} passes: {} entries{}",
            fingerprint.accuracy_x,
            fingerprint.accuracy_y,
            fingerprint.passes_per_block,
            count,
            marker
        );
    }

    Ok(())
}

/// Handle `cache clear`
pub fn cache_clear(config: &Config, directory: &Path) -> Result<()> {
    let path = config.cache.cache_file_for(directory);
    if FingerprintCache::clear(&path)? {
        print_success(&format!("Removed {}", path.display()));
    } else {
        print_info(&format!("No cache at {}", path.display()));
    }
    Ok(())
}

/// Handle the `config` command - show path or reset the config file
pub fn handle_config_command(show_path: bool, reset: bool) -> Result<()> {
    if reset {
        let path = init_config(true)?;
        info!("Created fresh config file at: {}", path.display());
        return Ok(());
    }

    let path = Config::get_active_config_path();
    if show_path {
        println!("{}", path.display());
        return Ok(());
    }

    if path.exists() {
        info!("Config file: {}", path.display());
    } else {
        info!("Config file would be created at: {}", path.display());
        if let Some(standard) = get_config_path() {
            info!(
                "Run 'image-similarity config --reset' to create {}",
                standard.display()
            );
        }
    }
    info!("Run 'image-similarity show-config' to see the active settings.");

    Ok(())
}

/// Generate a configuration file at the specified or default location
pub fn generate_config_file(output: Option<PathBuf>) -> Result<()> {
    let output_path = match output {
        Some(path) => {
            std::fs::write(&path, Config::generate_default_config())
                .with_context(|| format!("Failed to write {}", path.display()))?;
            path
        }
        None => init_config(false)?,
    };

    info!("Configuration file: {}", output_path.display());
    info!("Edit this file to customize the comparison settings.");

    Ok(())
}

/// Show the current configuration settings
pub fn show_config(config: &Config) {
    let config_path = Config::get_active_config_path();
    info!("Configuration file: {}", config_path.display());
    if !config_path.exists() {
        info!("(Using default settings - no config file found)");
    }
    info!("");
    info!("Current Configuration:");
    info!("----------------------");
    info!("[scan]");
    info!("  recursive = {}", config.scan.recursive);
    info!("  follow_symlinks = {}", config.scan.follow_symlinks);
    info!("  excluded_extensions = {:?}", config.scan.excluded_extensions);
    info!("  fail_fast = {}", config.scan.fail_fast);
    info!("");
    info!("[fingerprint]");
    info!("  accuracy_x = {}", config.fingerprint.accuracy_x);
    info!("  accuracy_y = {}", config.fingerprint.accuracy_y);
    info!("  passes_per_block = {}", config.fingerprint.passes_per_block);
    info!("");
    info!("[comparison]");
    info!(
        "  expected_max_duplicates = {}",
        config.comparison.expected_max_duplicates
    );
    info!(
        "  divergence_tolerance = {}",
        config.comparison.divergence_tolerance
    );
    info!("");
    info!("[workers]");
    info!("  max_workers = {}", config.workers.max_workers);
    info!("");
    info!("[cache]");
    info!("  enabled = {}", config.cache.enabled);
    info!("  directory = \"{}\"", config.cache.directory);
    info!("  file_name = \"{}\"", config.cache.file_name);
    info!("");
    info!("[logging]");
    info!("  level = \"{}\"", config.logging.level);
    info!("  log_to_file = {}", config.logging.log_to_file);
    info!("  log_file = \"{}\"", config.logging.log_file.display());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::FingerprintConfig;
    use tempfile::TempDir;

    #[test]
    fn test_overrides_only_touch_given_values() {
        let args = ScanArgs {
            directory: PathBuf::from("."),
            accuracy_x: Some(30),
            tolerance: Some(2.0),
            no_cache: true,
            ..ScanArgs::default()
        };
        let config = apply_scan_overrides(Config::default(), &args);

        assert_eq!(config.fingerprint, FingerprintConfig::new(30, 10, 25));
        assert_eq!(config.comparison.divergence_tolerance, 2.0);
        assert_eq!(config.comparison.expected_max_duplicates, 4);
        assert!(!config.cache.enabled);
        assert!(!config.scan.recursive);
    }

    #[test]
    fn test_cache_clear_without_cache() {
        let temp = TempDir::new().unwrap();
        assert!(cache_clear(&Config::default(), temp.path()).is_ok());
        assert!(cache_stats(&Config::default(), temp.path()).is_ok());
    }

    #[test]
    fn test_scan_rejects_missing_directory() {
        let temp = TempDir::new().unwrap();
        let args = ScanArgs {
            directory: temp.path().join("missing"),
            json: true,
            ..ScanArgs::default()
        };
        assert!(run_scan(&Config::default(), &args).is_err());
    }
}
