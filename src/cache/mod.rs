//! Fingerprint cache module
//!
//! Fingerprints are expensive to compute, so they are persisted between runs
//! and looked up by file content.
//!
//! # Submodules
//!
//! - `content` - SHA-256 based content identifiers
//! - `store` - The on-disk cache with config-aware hit detection

pub mod content;
pub mod store;

pub use content::{hash_bytes, hash_file, ContentHash};
pub use store::{CacheEntry, CacheStats, FingerprintCache};
