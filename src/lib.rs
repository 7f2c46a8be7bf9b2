//! # Photo Indexer
//!
//! Keeps an index of a large, changing photo collection up to date.
//!
//! ## What It Does
//! - Discovers files under configured roots and notices additions,
//!   modifications and removals between scans
//! - Fingerprints file content for change and duplicate detection
//! - Extracts camera, capture time and GPS metadata from EXIF
//! - Renders cached thumbnails at small/medium/large tiers
//!
//! ## Architecture
//! - `core` - The indexing engine (scanner, hasher, metadata, thumbnails,
//!   batch runner, pipeline) and the store contract it commits to
//! - `config` - TOML configuration
//! - `events` - Progress reporting over channels
//! - `error` - Error types

pub mod config;
pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use config::IndexerConfig;
pub use crate::core::pipeline::Indexer;
pub use error::{IndexerError, Result};

/// Initialize tracing for the library
///
/// This should be called by the application entry point. Honors `RUST_LOG`
/// and defaults to warnings only. Calling it twice is harmless.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
