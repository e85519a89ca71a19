//! Content identifiers
//!
//! Files are identified by what they contain, not where they live: the
//! identifier is the first eight bytes of the SHA-256 digest of the file
//! contents, read as a big-endian `u64`.

use crate::core::error::{Result, SimilarityError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Buffer size for streaming hash computation (64KB)
const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Content-derived identifier of a file, used as the cache key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(pub u64);

impl ContentHash {
    fn from_digest(digest: &[u8]) -> Self {
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        ContentHash(u64::from_be_bytes(prefix))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Hash a file's contents using streaming reads
pub fn hash_file(path: &Path) -> Result<ContentHash> {
    let file = File::open(path)
        .map_err(|e| SimilarityError::Io(format!("Failed to open file: {}", e)))?;

    let mut reader = BufReader::with_capacity(HASH_BUFFER_SIZE, file);
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];

    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .map_err(|e| SimilarityError::Io(format!("Failed to read file: {}", e)))?;

        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
    }

    Ok(ContentHash::from_digest(&hasher.finalize()))
}

/// Hash in-memory bytes
pub fn hash_bytes(data: &[u8]) -> ContentHash {
    ContentHash::from_digest(&Sha256::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_known_digest_prefix() {
        // sha256("abc") = ba7816bf8f01cfea...
        assert_eq!(hash_bytes(b"abc"), ContentHash(0xba78_16bf_8f01_cfea));
        assert_eq!(hash_bytes(b"abc").to_string(), "ba7816bf8f01cfea");
    }

    #[test]
    fn test_equal_content_equal_hash() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a.png");
        let b = temp.path().join("nested_copy.bin");
        fs::write(&a, b"same bytes").unwrap();
        fs::write(&b, b"same bytes").unwrap();

        assert_eq!(hash_file(&a).unwrap(), hash_file(&b).unwrap());
        assert_eq!(hash_file(&a).unwrap(), hash_bytes(b"same bytes"));
    }

    #[test]
    fn test_same_length_different_content() {
        assert_ne!(hash_bytes(b"aaaa"), hash_bytes(b"aaab"));
    }

    #[test]
    fn test_large_file_matches_in_memory_hash() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("big.bin");
        let data: Vec<u8> = (0..(HASH_BUFFER_SIZE * 3 + 17)).map(|i| (i % 251) as u8).collect();
        fs::write(&path, &data).unwrap();

        assert_eq!(hash_file(&path).unwrap(), hash_bytes(&data));
    }

    #[test]
    fn test_missing_file() {
        let temp = TempDir::new().unwrap();
        let err = hash_file(&temp.path().join("nope.png")).unwrap_err();
        assert!(matches!(err, SimilarityError::Io(_)));
    }
}
