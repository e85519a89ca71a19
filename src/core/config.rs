//! Configuration module for the image similarity tool
//!
//! Supports loading configuration from a TOML file.
//! Configuration is stored in a standard location:
//! - Windows: %APPDATA%\image_similarity\config.toml
//! - Linux/macOS: ~/.config/image_similarity/config.toml

use crate::duplicate::SelectionPolicy;
use crate::fingerprint::FingerprintConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Application name used for config directory
const APP_NAME: &str = "image_similarity";

/// Default config file name
const CONFIG_FILE_NAME: &str = "config.toml";

/// Local config files checked before the standard location
const LOCAL_CONFIG_PATHS: &[&str] = &["./config.toml", "./image_similarity.toml"];

/// Get the standard configuration directory for the application.
///
/// Returns:
/// - Windows: %APPDATA%\image_similarity
/// - Linux/macOS: ~/.config/image_similarity
pub fn get_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA")
            .ok()
            .map(|appdata| PathBuf::from(appdata).join(APP_NAME))
    }

    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .ok()
            .map(|home| PathBuf::from(home).join(".config").join(APP_NAME))
    }
}

/// Get the standard configuration file path.
pub fn get_config_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// Write the default template to the standard location if nothing is there yet.
///
/// With `reset` the existing file is overwritten. Returns the config path.
pub fn init_config(reset: bool) -> Result<PathBuf, ConfigError> {
    let config_dir = get_config_dir().ok_or(ConfigError::ConfigDirNotFound)?;

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)
            .map_err(|e| ConfigError::WriteError(config_dir.clone(), e.to_string()))?;
    }

    let config_path = config_dir.join(CONFIG_FILE_NAME);
    if reset || !config_path.exists() {
        fs::write(&config_path, Config::generate_default_config())
            .map_err(|e| ConfigError::WriteError(config_path.clone(), e.to_string()))?;
    }

    Ok(config_path)
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Which files are considered
    pub scan: ScanConfig,

    /// Fingerprint sampling parameters
    pub fingerprint: FingerprintConfig,

    /// Duplicate selection parameters
    pub comparison: ComparisonConfig,

    /// Worker pool sizing
    pub workers: WorkerConfig,

    /// Fingerprint cache settings
    pub cache: CacheConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// File enumeration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Include subdirectories of the scanned folder
    pub recursive: bool,

    /// Follow symbolic links while walking
    pub follow_symlinks: bool,

    /// Extensions (without dot, case-insensitive) that are never decoded
    pub excluded_extensions: Vec<String>,

    /// Abort the whole run on the first unreadable or undecodable file
    pub fail_fast: bool,
}

/// Duplicate selection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparisonConfig {
    /// How many duplicates of one image are expected at most (k)
    pub expected_max_duplicates: usize,

    /// Divergence ratio above which a neighbour counts as a duplicate
    pub divergence_tolerance: f64,
}

/// Worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Maximum number of fingerprints computed at the same time
    pub max_workers: usize,
}

/// Fingerprint cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Reuse and persist fingerprints between runs
    pub enabled: bool,

    /// Cache directory, relative to the scanned folder
    pub directory: String,

    /// Cache file name inside `directory`
    pub file_name: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log to file
    pub log_to_file: bool,

    /// Log file path
    pub log_file: PathBuf,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            recursive: false,
            follow_symlinks: false,
            excluded_extensions: ["au3", "7z", "txt", "json", "ini", "db"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
            fail_fast: false,
        }
    }
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            expected_max_duplicates: 4,
            divergence_tolerance: 1.8,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { max_workers: 6 }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: ".duplicate_detection".to_string(),
            file_name: "cache.json".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_to_file: false,
            log_file: PathBuf::from("./image_similarity.log"),
        }
    }
}

impl ComparisonConfig {
    /// Convert to the selector's policy
    pub fn to_policy(&self) -> SelectionPolicy {
        SelectionPolicy {
            expected_max_duplicates: self.expected_max_duplicates,
            divergence_tolerance: self.divergence_tolerance,
        }
    }
}

impl CacheConfig {
    /// Full path of the cache file for a scanned folder
    pub fn cache_file_for(&self, root: &Path) -> PathBuf {
        root.join(&self.directory).join(&self.file_name)
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e.to_string()))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;

        Ok(config)
    }

    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./config.toml
    /// 2. ./image_similarity.toml
    /// 3. Standard config location
    ///
    /// If no config file is found, returns default configuration.
    pub fn load_default() -> Result<Self, ConfigError> {
        for path in LOCAL_CONFIG_PATHS.iter().map(PathBuf::from) {
            if path.exists() {
                return Self::load(&path);
            }
        }

        if let Some(config_path) = get_config_path() {
            if config_path.exists() {
                return Self::load(&config_path);
            }
        }

        Ok(Self::default())
    }

    /// Get the path where the config file is (or would be) located.
    pub fn get_active_config_path() -> PathBuf {
        for path in LOCAL_CONFIG_PATHS.iter().map(PathBuf::from) {
            if path.exists() {
                return path;
            }
        }

        get_config_path().unwrap_or_else(|| PathBuf::from("./config.toml"))
    }

    /// Generate a default config file with comments
    pub fn generate_default_config() -> String {
        include_str!("../../config.example.toml").to_string()
    }
}

/// Configuration error types
#[derive(Debug)]
pub enum ConfigError {
    /// Configuration file was not found at the specified path
    FileNotFound(PathBuf),
    /// Failed to read the configuration file
    ReadError(PathBuf, String),
    /// Failed to parse the configuration file (invalid TOML)
    ParseError(PathBuf, String),
    /// Failed to write configuration file
    WriteError(PathBuf, String),
    /// Could not determine config directory
    ConfigDirNotFound,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => {
                write!(f, "Configuration file not found: {}", path.display())
            }
            ConfigError::ReadError(path, err) => {
                write!(
                    f,
                    "Failed to read config file '{}': {}",
                    path.display(),
                    err
                )
            }
            ConfigError::ParseError(path, err) => {
                write!(
                    f,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    err
                )
            }
            ConfigError::WriteError(path, err) => {
                write!(
                    f,
                    "Failed to write config file '{}': {}",
                    path.display(),
                    err
                )
            }
            ConfigError::ConfigDirNotFound => {
                write!(f, "Could not determine configuration directory")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
