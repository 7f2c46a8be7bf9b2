//! # Error Module
//!
//! Error types for the photo indexer.
//!
//! ## Policy
//! - Metadata decode failures never surface here; they degrade to an empty record
//! - Thumbnail `NotFound`/`Decode`/`Io` errors are fatal to one item only
//! - `ConfigError` is a defect in configuration or calling code and always propagates
//! - A root that is not a directory degrades a scan to a no-op, not an error

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("Scanning error: {0}")]
    Scan(#[from] ScanError),

    #[error("Hashing error: {0}")]
    Hash(#[from] HashError),

    #[error("Thumbnail error: {0}")]
    Thumbnail(#[from] ThumbnailError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors that occur while walking a root
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("Permission denied accessing: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("Failed to read directory {path}: {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Scan was cancelled")]
    Cancelled,
}

/// Errors that occur while fingerprinting files
#[derive(Error, Debug)]
pub enum HashError {
    #[error("Not a regular file: {path}")]
    NotAFile { path: PathBuf },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that occur while producing thumbnails
#[derive(Error, Debug)]
pub enum ThumbnailError {
    #[error("Source image not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Failed to decode image {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("Failed to write thumbnail {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Configuration defects
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unknown thumbnail size label '{label}' (expected small, medium or large)")]
    UnknownSizeLabel { label: String },

    #[error("No maximum dimension configured for size label '{label}'")]
    MissingSizeBound { label: String },

    #[error("Required path is not configured: {name}")]
    MissingPath { name: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Errors raised by an item store backend
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to open store at {path}: {reason}")]
    OpenFailed { path: PathBuf, reason: String },

    #[error("Store query failed: {0}")]
    QueryFailed(String),

    #[error("Store corruption detected at {path}. Delete this file and rescan.")]
    Corrupted { path: PathBuf },

    #[error("Item {id} does not exist")]
    ItemNotFound { id: i64 },
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::QueryFailed(e.to_string())
    }
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, IndexerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_error_includes_path() {
        let error = ScanError::DirectoryNotFound {
            path: PathBuf::from("/photos/vacation"),
        };
        assert!(error.to_string().contains("/photos/vacation"));
    }

    #[test]
    fn decode_error_includes_path_and_reason() {
        let error = ThumbnailError::Decode {
            path: PathBuf::from("/photos/broken.jpg"),
            reason: "invalid JPEG".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("/photos/broken.jpg"));
        assert!(message.contains("invalid JPEG"));
    }

    #[test]
    fn thumbnail_config_error_is_transparent() {
        let error = ThumbnailError::from(ConfigError::UnknownSizeLabel {
            label: "huge".to_string(),
        });
        assert!(matches!(error, ThumbnailError::Config(_)));
        assert!(error.to_string().starts_with("Unknown thumbnail size label 'huge'"));
    }

    #[test]
    fn store_corruption_suggests_recovery() {
        let error = StoreError::Corrupted {
            path: PathBuf::from("/data/index.db"),
        };
        assert!(error.to_string().contains("Delete this file"));
    }
}
