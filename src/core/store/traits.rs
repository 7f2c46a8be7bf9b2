//! Store backend trait definition.

use super::{Item, ItemId, ItemStatus, NewItem, Root, RootId, RootScanState, ThumbStatus};
use crate::core::metadata::MetadataRecord;
use crate::error::StoreError;
use chrono::NaiveDateTime;
use std::path::Path;

/// Trait for item store backends
///
/// This is the whole contract between the indexing core and persistence.
/// Implementations must be safe to call from several workers at once.
pub trait Store: Send + Sync {
    /// Register a root, or return the existing one with the same path
    fn add_root(&self, path: &Path, name: &str, enabled: bool) -> Result<Root, StoreError>;

    /// Enable or disable a root
    fn set_root_enabled(&self, id: RootId, enabled: bool) -> Result<(), StoreError>;

    /// All roots ordered by identity
    fn roots(&self) -> Result<Vec<Root>, StoreError>;

    /// Look up a single root
    fn root(&self, id: RootId) -> Result<Option<Root>, StoreError>;

    /// All items of a root, in any status, ordered by identity
    fn items_for_root(&self, root_id: RootId) -> Result<Vec<Item>, StoreError>;

    /// Look up an item by its reconciliation key
    fn find_item(&self, root_id: RootId, relative_path: &str)
        -> Result<Option<Item>, StoreError>;

    /// Look up an item by identity
    fn item(&self, id: ItemId) -> Result<Option<Item>, StoreError>;

    /// Insert a new active item with no thumbnails
    fn insert_item(&self, item: NewItem) -> Result<ItemId, StoreError>;

    /// Record a new size/mtime for an item and forget its stale content hash
    fn update_file_stamp(&self, id: ItemId, size: u64, mtime: i64) -> Result<(), StoreError>;

    /// Set the lifecycle status of an item
    fn set_status(&self, id: ItemId, status: ItemStatus) -> Result<(), StoreError>;

    /// Set the thumbnail readiness of an item
    fn set_thumb_status(&self, id: ItemId, status: ThumbStatus) -> Result<(), StoreError>;

    /// Record the content digest of an item
    fn set_content_hash(&self, id: ItemId, hash: &str) -> Result<(), StoreError>;

    /// Metadata record of an item, if one was ever extracted
    fn metadata(&self, id: ItemId) -> Result<Option<MetadataRecord>, StoreError>;

    /// Replace the metadata record of an item wholesale
    fn upsert_metadata(&self, id: ItemId, record: &MetadataRecord) -> Result<(), StoreError>;

    /// Commit a successfully indexed item in one step: metadata,
    /// capture timestamp and thumbnail status `Ready`
    fn commit_indexed(
        &self,
        id: ItemId,
        record: &MetadataRecord,
        taken_at: Option<NaiveDateTime>,
    ) -> Result<(), StoreError>;

    /// Active items of enabled roots whose thumbnails are not ready or
    /// that have no capture timestamp, ordered by identity
    fn items_needing_index(&self) -> Result<Vec<Item>, StoreError>;

    /// Availability history of a root
    fn scan_state(&self, root_id: RootId) -> Result<Option<RootScanState>, StoreError>;

    /// Replace the availability history of a root
    fn set_scan_state(&self, state: &RootScanState) -> Result<(), StoreError>;
}
