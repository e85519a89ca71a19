//! Command-line argument definitions
//!
//! This module defines all CLI arguments and subcommands using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Find visually near-duplicate images in a folder
#[derive(Parser, Debug)]
#[command(name = "image-similarity")]
#[command(version)]
#[command(about = "Find visually near-duplicate images using sampled colour fingerprints", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level: error, warn, info, debug, trace (overrides config)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compare every image in a folder and report near-duplicate pairs
    Scan(ScanArgs),

    /// Inspect or clear the fingerprint cache of a folder
    Cache {
        #[command(subcommand)]
        cache_command: CacheCommands,
    },

    /// Show or reset the configuration file
    ///
    /// The config file is stored at:
    /// - Windows: %APPDATA%\image_similarity\config.toml
    /// - Linux/macOS: ~/.config/image_similarity/config.toml
    Config {
        /// Show the config file path
        #[arg(long)]
        path: bool,

        /// Reset config to defaults (creates a fresh config file)
        #[arg(long)]
        reset: bool,
    },

    /// Generate a configuration file at a specific location
    GenerateConfig {
        /// Output path for the config file (defaults to standard location)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show current configuration
    ShowConfig,
}

/// Arguments of the `scan` command; every option overrides the config file
#[derive(clap::Args, Debug, Default)]
pub struct ScanArgs {
    /// Folder to scan
    pub directory: PathBuf,

    /// Include subdirectories
    #[arg(short, long)]
    pub recursive: bool,

    /// Sample blocks across each image (max 100)
    #[arg(long, value_name = "N")]
    pub accuracy_x: Option<u32>,

    /// Sample blocks down each image (max 100)
    #[arg(long, value_name = "N")]
    pub accuracy_y: Option<u32>,

    /// Random pixels averaged per block
    #[arg(long, value_name = "N")]
    pub passes: Option<u32>,

    /// Maximum fingerprints computed at the same time
    #[arg(short, long, value_name = "N")]
    pub workers: Option<usize>,

    /// Expected maximum number of duplicates per image (k)
    #[arg(short = 'k', long, value_name = "K")]
    pub expected_duplicates: Option<usize>,

    /// Divergence ratio above which a neighbour is reported
    #[arg(short, long, value_name = "RATIO")]
    pub tolerance: Option<f64>,

    /// Neither read nor write the fingerprint cache
    #[arg(long)]
    pub no_cache: bool,

    /// Abort on the first unreadable or undecodable file
    #[arg(long)]
    pub fail_fast: bool,

    /// Write `file,noise_score` lines for every computed fingerprint
    #[arg(long, value_name = "FILE")]
    pub noise_log: Option<PathBuf>,

    /// Print the report as JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Show how many fingerprints are cached and with which settings
    Stats {
        /// Scanned folder whose cache to inspect
        directory: PathBuf,
    },

    /// Delete the cache (also recovers from a corrupt cache file)
    Clear {
        /// Scanned folder whose cache to delete
        directory: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_scan_overrides() {
        let args = Args::parse_from([
            "image-similarity",
            "scan",
            "photos",
            "--recursive",
            "--accuracy-x",
            "20",
            "-k",
            "3",
            "--tolerance",
            "2.5",
            "--no-cache",
            "--json",
        ]);

        let Commands::Scan(scan) = args.command else {
            panic!("expected scan command");
        };
        assert_eq!(scan.directory, PathBuf::from("photos"));
        assert!(scan.recursive);
        assert_eq!(scan.accuracy_x, Some(20));
        assert_eq!(scan.accuracy_y, None);
        assert_eq!(scan.expected_duplicates, Some(3));
        assert_eq!(scan.tolerance, Some(2.5));
        assert!(scan.no_cache);
        assert!(scan.json);
    }

    #[test]
    fn test_cache_subcommands() {
        let args = Args::parse_from(["image-similarity", "-l", "debug", "cache", "clear", "pics"]);
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(matches!(
            args.command,
            Commands::Cache {
                cache_command: CacheCommands::Clear { .. }
            }
        ));
    }
}
