//! Diff between a fresh walk and the items already known for a root.

use super::DiscoveredFile;
use crate::core::store::{Item, ItemId, ItemStatus};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// A discovered file that matches a known item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KnownFile {
    pub id: ItemId,
    pub file: DiscoveredFile,
    /// Size or mtime differs from what the store holds
    pub stamp_changed: bool,
}

/// Outcome of reconciling one root
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    /// Files with no item yet
    pub new: Vec<DiscoveredFile>,
    /// Active items whose size or mtime changed
    pub changed: Vec<KnownFile>,
    /// Missing items that are present again
    pub reappeared: Vec<KnownFile>,
    /// Active items no longer present
    pub missing: Vec<ItemId>,
    /// Active items present with the same stamp
    pub unchanged: usize,
    /// Missing items still absent
    pub still_missing: usize,
}

impl Reconciliation {
    /// Whether applying this would touch the store
    pub fn is_noop(&self) -> bool {
        self.new.is_empty()
            && self.changed.is_empty()
            && self.reappeared.is_empty()
            && self.missing.is_empty()
    }
}

/// Reconcile a walk against the known items of the same root.
///
/// Pure: nothing is read from disk or written to the store. Output lists
/// follow the order of `discovered` (new, changed, reappeared) and of
/// `known` (missing).
pub fn reconcile(known: &[Item], discovered: Vec<DiscoveredFile>) -> Reconciliation {
    let by_key: HashMap<&str, &Item> = known
        .iter()
        .map(|item| (item.relative_path.as_str(), item))
        .collect();

    let mut result = Reconciliation::default();
    let mut seen: HashSet<ItemId> = HashSet::with_capacity(discovered.len());

    for file in discovered {
        let Some(item) = by_key.get(file.relative_path.as_str()) else {
            result.new.push(file);
            continue;
        };
        seen.insert(item.id);

        let stamp_changed = item.size != file.size || item.mtime != file.mtime;
        match item.status {
            ItemStatus::Missing => result.reappeared.push(KnownFile {
                id: item.id,
                file,
                stamp_changed,
            }),
            ItemStatus::Active if stamp_changed => result.changed.push(KnownFile {
                id: item.id,
                file,
                stamp_changed,
            }),
            ItemStatus::Active => result.unchanged += 1,
        }
    }

    for item in known {
        if seen.contains(&item.id) {
            continue;
        }
        match item.status {
            ItemStatus::Active => result.missing.push(item.id),
            ItemStatus::Missing => result.still_missing += 1,
        }
    }

    result
}
