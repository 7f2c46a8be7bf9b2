//! In-memory store backend.

use super::{
    Item, ItemId, ItemStatus, NewItem, Root, RootId, RootScanState, Store, ThumbStatus,
};
use crate::core::metadata::MetadataRecord;
use crate::error::StoreError;
use chrono::NaiveDateTime;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct Tables {
    roots: BTreeMap<RootId, Root>,
    items: BTreeMap<ItemId, Item>,
    keys: HashMap<(RootId, String), ItemId>,
    metadata: HashMap<ItemId, MetadataRecord>,
    scan_state: HashMap<RootId, RootScanState>,
    next_root: i64,
    next_item: i64,
}

impl Tables {
    fn item_mut(&mut self, id: ItemId) -> Result<&mut Item, StoreError> {
        self.items
            .get_mut(&id)
            .ok_or(StoreError::ItemNotFound { id: id.0 })
    }
}

/// In-memory store backend
///
/// Useful for testing and for short-lived indexing runs.
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables.read().map_err(|_| StoreError::Corrupted {
            path: PathBuf::from("memory"),
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables.write().map_err(|_| StoreError::Corrupted {
            path: PathBuf::from("memory"),
        })
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for InMemoryStore {
    fn add_root(&self, path: &Path, name: &str, enabled: bool) -> Result<Root, StoreError> {
        let mut tables = self.write()?;

        if let Some(existing) = tables.roots.values().find(|r| r.path == path) {
            return Ok(existing.clone());
        }

        tables.next_root += 1;
        let root = Root {
            id: RootId(tables.next_root),
            path: path.to_path_buf(),
            name: name.to_string(),
            enabled,
        };
        tables.roots.insert(root.id, root.clone());
        Ok(root)
    }

    fn set_root_enabled(&self, id: RootId, enabled: bool) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        if let Some(root) = tables.roots.get_mut(&id) {
            root.enabled = enabled;
        }
        Ok(())
    }

    fn roots(&self) -> Result<Vec<Root>, StoreError> {
        Ok(self.read()?.roots.values().cloned().collect())
    }

    fn root(&self, id: RootId) -> Result<Option<Root>, StoreError> {
        Ok(self.read()?.roots.get(&id).cloned())
    }

    fn items_for_root(&self, root_id: RootId) -> Result<Vec<Item>, StoreError> {
        Ok(self
            .read()?
            .items
            .values()
            .filter(|item| item.root_id == root_id)
            .cloned()
            .collect())
    }

    fn find_item(
        &self,
        root_id: RootId,
        relative_path: &str,
    ) -> Result<Option<Item>, StoreError> {
        let tables = self.read()?;
        Ok(tables
            .keys
            .get(&(root_id, relative_path.to_string()))
            .and_then(|id| tables.items.get(id))
            .cloned())
    }

    fn item(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        Ok(self.read()?.items.get(&id).cloned())
    }

    fn insert_item(&self, new: NewItem) -> Result<ItemId, StoreError> {
        let mut tables = self.write()?;

        let key = (new.root_id, new.relative_path.clone());
        if tables.keys.contains_key(&key) {
            return Err(StoreError::QueryFailed(format!(
                "item already exists: {}",
                new.relative_path
            )));
        }

        tables.next_item += 1;
        let id = ItemId(tables.next_item);
        tables.items.insert(
            id,
            Item {
                id,
                root_id: new.root_id,
                relative_path: new.relative_path,
                filename: new.filename,
                size: new.size,
                mtime: new.mtime,
                status: ItemStatus::Active,
                taken_at: None,
                thumb_status: ThumbStatus::None,
                content_hash: None,
            },
        );
        tables.keys.insert(key, id);
        Ok(id)
    }

    fn update_file_stamp(&self, id: ItemId, size: u64, mtime: i64) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        let item = tables.item_mut(id)?;
        item.size = size;
        item.mtime = mtime;
        item.content_hash = None;
        Ok(())
    }

    fn set_status(&self, id: ItemId, status: ItemStatus) -> Result<(), StoreError> {
        self.write()?.item_mut(id)?.status = status;
        Ok(())
    }

    fn set_thumb_status(&self, id: ItemId, status: ThumbStatus) -> Result<(), StoreError> {
        self.write()?.item_mut(id)?.thumb_status = status;
        Ok(())
    }

    fn set_content_hash(&self, id: ItemId, hash: &str) -> Result<(), StoreError> {
        self.write()?.item_mut(id)?.content_hash = Some(hash.to_string());
        Ok(())
    }

    fn metadata(&self, id: ItemId) -> Result<Option<MetadataRecord>, StoreError> {
        Ok(self.read()?.metadata.get(&id).cloned())
    }

    fn upsert_metadata(&self, id: ItemId, record: &MetadataRecord) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        tables.item_mut(id)?;
        tables.metadata.insert(id, record.clone());
        Ok(())
    }

    fn commit_indexed(
        &self,
        id: ItemId,
        record: &MetadataRecord,
        taken_at: Option<NaiveDateTime>,
    ) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        let item = tables.item_mut(id)?;
        item.taken_at = taken_at;
        item.thumb_status = ThumbStatus::Ready;
        tables.metadata.insert(id, record.clone());
        Ok(())
    }

    fn items_needing_index(&self) -> Result<Vec<Item>, StoreError> {
        let tables = self.read()?;
        Ok(tables
            .items
            .values()
            .filter(|item| item.needs_indexing())
            .filter(|item| tables.roots.get(&item.root_id).is_some_and(|r| r.enabled))
            .cloned()
            .collect())
    }

    fn scan_state(&self, root_id: RootId) -> Result<Option<RootScanState>, StoreError> {
        Ok(self.read()?.scan_state.get(&root_id).cloned())
    }

    fn set_scan_state(&self, state: &RootScanState) -> Result<(), StoreError> {
        self.write()?
            .scan_state
            .insert(state.root_id, state.clone());
        Ok(())
    }
}
