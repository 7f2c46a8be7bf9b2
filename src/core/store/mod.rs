//! # Store Module
//!
//! The record store the indexing core reads from and commits to.
//!
//! Items reference their root by [`RootId`] and metadata is keyed by
//! [`ItemId`], so no record holds a live reference to another.
//!
//! ## Backends
//! - `SqliteStore` - Persistent storage using SQLite
//! - `InMemoryStore` - For testing and embedding

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;
pub use traits::Store;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;

/// Identity of a configured root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RootId(pub i64);

/// Identity of an indexed item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub i64);

impl fmt::Display for RootId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A directory tree to index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Root {
    pub id: RootId,
    /// Absolute path of the tree
    pub path: PathBuf,
    /// Display name
    pub name: String,
    /// Disabled roots are skipped by scans but keep their items
    pub enabled: bool,
}

/// Lifecycle of an item's file on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Active,
    Missing,
}

/// Readiness of an item's thumbnails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThumbStatus {
    None,
    Ready,
    Error,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Active => "active",
            ItemStatus::Missing => "missing",
        }
    }

    /// Parse a stored status; anything unrecognised counts as active
    pub fn parse(s: &str) -> Self {
        match s {
            "missing" => ItemStatus::Missing,
            _ => ItemStatus::Active,
        }
    }
}

impl ThumbStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThumbStatus::None => "none",
            ThumbStatus::Ready => "ready",
            ThumbStatus::Error => "error",
        }
    }

    /// Parse a stored status; anything unrecognised needs regeneration
    pub fn parse(s: &str) -> Self {
        match s {
            "ready" => ThumbStatus::Ready,
            "error" => ThumbStatus::Error,
            _ => ThumbStatus::None,
        }
    }
}

/// One tracked photo file under a root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub root_id: RootId,
    /// Root-relative path with `/` separators; the reconciliation key
    pub relative_path: String,
    pub filename: String,
    /// File size in bytes
    pub size: u64,
    /// Modification time in unix seconds
    pub mtime: i64,
    pub status: ItemStatus,
    pub taken_at: Option<NaiveDateTime>,
    pub thumb_status: ThumbStatus,
    /// Hex content digest, computed lazily
    pub content_hash: Option<String>,
}

impl Item {
    /// Whether the coordinator still has work to do for this item
    pub fn needs_indexing(&self) -> bool {
        self.status == ItemStatus::Active
            && (self.thumb_status != ThumbStatus::Ready || self.taken_at.is_none())
    }
}

/// A file to be inserted as a new item
#[derive(Debug, Clone, PartialEq)]
pub struct NewItem {
    pub root_id: RootId,
    pub relative_path: String,
    pub filename: String,
    pub size: u64,
    pub mtime: i64,
}

/// Availability history of a root across scans
#[derive(Debug, Clone, PartialEq)]
pub struct RootScanState {
    pub root_id: RootId,
    /// Scans in a row that found the root path unavailable
    pub consecutive_unavailable: u32,
    /// When the root was last walked successfully
    pub last_scan_at: Option<SystemTime>,
}

impl RootScanState {
    pub fn new(root_id: RootId) -> Self {
        Self {
            root_id,
            consecutive_unavailable: 0,
            last_scan_at: None,
        }
    }
}
