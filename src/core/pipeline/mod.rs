//! # Pipeline Module
//!
//! Orchestrates indexing end to end.
//!
//! ## Stages
//! 1. **Scan** - Reconcile every enabled root with the store
//! 2. **Index** - For each pending item: extract metadata, ensure
//!    thumbnails, commit both in one store call
//! 3. **Deduplicate** (on demand) - Fingerprint items that share a size
//!    and group identical content
//!
//! ## Failure Isolation
//! An item whose source is gone or undecodable is marked with thumbnail
//! status `error` and the run continues. Configuration errors abort the run.
//!
//! ## Parallelism
//! Indexing uses [`BatchRunner`](crate::core::batch::BatchRunner) with a
//! bounded rayon pool.

mod executor;

pub use executor::{Indexer, IndexerBuilder};

use crate::core::scanner::Reconciliation;
use crate::core::store::{ItemId, RootId};
use serde::Serialize;
use std::path::PathBuf;

/// Outcome of scanning every root
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    /// Roots that were enabled when the scan ran
    pub roots_scanned: usize,
    /// Applied reconciliation per root
    pub roots: Vec<(RootId, Reconciliation)>,
    /// Scan stopped before every root was visited
    pub cancelled: bool,
}

impl ScanReport {
    pub fn new_items(&self) -> usize {
        self.roots.iter().map(|(_, r)| r.new.len()).sum()
    }

    pub fn changed_items(&self) -> usize {
        self.roots.iter().map(|(_, r)| r.changed.len()).sum()
    }

    pub fn missing_items(&self) -> usize {
        self.roots.iter().map(|(_, r)| r.missing.len()).sum()
    }

    pub fn reappeared_items(&self) -> usize {
        self.roots.iter().map(|(_, r)| r.reappeared.len()).sum()
    }
}

/// One item that could not be indexed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexFailure {
    pub item_id: ItemId,
    pub message: String,
}

/// Outcome of an indexing pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexReport {
    /// Items that needed indexing when the pass started
    pub pending: usize,
    /// Items committed successfully
    pub indexed: usize,
    /// Items marked with thumbnail status `error`
    pub failures: Vec<IndexFailure>,
    /// Thumbnail files written during the pass
    pub thumbnails_generated: usize,
    /// Cumulative processed count after each batch
    pub progress: Vec<usize>,
    pub cancelled: bool,
}

/// Outcome of a full scan + index run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub scan: ScanReport,
    pub index: IndexReport,
    pub duration_ms: u64,
}

/// Active items with identical content
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemDuplicateGroup {
    /// Shared content digest
    pub hash: String,
    /// Size of each member in bytes
    pub size: u64,
    /// Members ordered by identity
    pub items: Vec<ItemId>,
    /// Absolute paths of the members, same order as `items`
    pub paths: Vec<PathBuf>,
}

impl ItemDuplicateGroup {
    /// Bytes that could be reclaimed by keeping a single copy
    pub fn wasted_bytes(&self) -> u64 {
        self.size * (self.items.len().saturating_sub(1) as u64)
    }
}
