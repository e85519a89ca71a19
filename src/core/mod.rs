//! Core functionality module
//!
//! Configuration, error types, and candidate file enumeration shared by the
//! fingerprinting and comparison stages.
//!
//! # Submodules
//!
//! - `config` - Configuration loading, saving, and management
//! - `error` - Error types and result aliases
//! - `scanner` - Walks the scanned folder for candidate files

pub mod config;
pub mod error;
pub mod scanner;
