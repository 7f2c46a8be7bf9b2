//! # Core Module
//!
//! The indexing engine.
//!
//! ## Modules
//! - `hasher` - Content fingerprints and exact-duplicate grouping
//! - `metadata` - EXIF extraction into a normalized record
//! - `thumbnail` - Cached thumbnails at named size tiers
//! - `scanner` - Discovers files and reconciles them with the store
//! - `batch` - Bounded, failure-isolating batch execution
//! - `pipeline` - Orchestrates scan, index and dedup
//! - `store` - The record store contract and its backends

pub mod batch;
pub mod hasher;
pub mod metadata;
pub mod pipeline;
pub mod scanner;
pub mod store;
pub mod thumbnail;

// Re-export commonly used types
pub use batch::{BatchReport, BatchRunner, CancellationToken};
pub use hasher::{DigestGroup, Fingerprint};
pub use metadata::MetadataRecord;
pub use pipeline::{Indexer, IndexReport, RunReport, ScanReport};
pub use scanner::{DiscoveredFile, Reconciliation, Scanner};
pub use store::{InMemoryStore, Item, ItemId, Root, RootId, SqliteStore, Store};
pub use thumbnail::{SizeLabel, ThumbnailCache, ThumbnailSource};
