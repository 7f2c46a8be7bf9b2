//! # Hasher Module
//!
//! Content fingerprints for change detection and exact-duplicate detection.
//!
//! ## How It Works
//! 1. Stat the file (size + modification time)
//! 2. Stream the content through BLAKE3 in 64 KiB chunks
//! 3. Compare digests; cheap size/mtime checks short-circuit first
//!
//! ## Example
//! ```rust,ignore
//! use photo_indexer::core::hasher::{fingerprint, files_equal};
//!
//! let fp = fingerprint(&path)?;
//! println!("{} ({} bytes)", fp.hash, fp.size);
//! ```

mod duplicates;

pub use duplicates::{group_by_digest, size_buckets, DigestGroup};

use crate::error::HashError;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;
use std::time::SystemTime;

/// Read buffer size for streaming digests
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Content hash plus the file stamp it was computed against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Hex-encoded 256-bit BLAKE3 digest
    pub hash: String,
    /// File size in bytes
    pub size: u64,
    /// Last modified time
    pub modified: SystemTime,
}

fn io_error(path: &Path, source: std::io::Error) -> HashError {
    HashError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Stat a path, rejecting anything that is not a regular file
fn regular_file_stamp(path: &Path) -> Result<(u64, SystemTime), HashError> {
    let metadata = fs::metadata(path).map_err(|e| io_error(path, e))?;
    if !metadata.is_file() {
        return Err(HashError::NotAFile {
            path: path.to_path_buf(),
        });
    }
    let modified = metadata.modified().map_err(|e| io_error(path, e))?;
    Ok((metadata.len(), modified))
}

/// Stream a file's content into a hex digest.
///
/// Memory use is one fixed buffer regardless of file size.
pub fn content_hash(path: &Path) -> Result<String, HashError> {
    let file = File::open(path).map_err(|e| io_error(path, e))?;
    let mut reader = BufReader::with_capacity(CHUNK_SIZE, file);
    let mut hasher = blake3::Hasher::new();

    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        let bytes_read = reader.read(&mut buffer).map_err(|e| io_error(path, e))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize().to_hex().to_string())
}

/// Compute the fingerprint of a regular file
pub fn fingerprint(path: &Path) -> Result<Fingerprint, HashError> {
    let (size, modified) = regular_file_stamp(path)?;
    let hash = content_hash(path)?;
    Ok(Fingerprint {
        hash,
        size,
        modified,
    })
}

/// Check whether two files are identical.
///
/// Files whose size or modification time differ are reported unequal
/// without reading their content; otherwise full digests are compared.
pub fn files_equal(a: &Path, b: &Path) -> Result<bool, HashError> {
    let (size_a, modified_a) = regular_file_stamp(a)?;
    let (size_b, modified_b) = regular_file_stamp(b)?;

    if size_a != size_b || modified_a != modified_b {
        return Ok(false);
    }

    Ok(content_hash(a)? == content_hash(b)?)
}
