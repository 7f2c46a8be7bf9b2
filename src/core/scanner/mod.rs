//! # Scanner Module
//!
//! Discovers photo files under a root and reconciles them with the store.
//!
//! ## How It Works
//! 1. Walk the root (regular files only, extension allow-list, no symlinks)
//! 2. Diff the walk against the root's known items (pure, see [`reconcile`])
//! 3. Apply the diff: insert new items, refresh changed stamps, flip
//!    reappeared items back to active and absent items to missing
//!
//! Items are keyed by `(root, relative path)` and never deleted. A root that
//! is disabled or not reachable leaves its items untouched unless the
//! unavailable-root policy says otherwise.
//!
//! ## Example
//! ```rust,ignore
//! let scanner = Scanner::new(ExtensionFilter::new(["jpg", "png"]));
//! let diff = scanner.scan(&root, store.as_ref())?;
//! println!("{} new, {} missing", diff.new.len(), diff.missing.len());
//! ```

mod filter;
mod reconcile;
mod walker;

pub use filter::ExtensionFilter;
pub use reconcile::{reconcile, KnownFile, Reconciliation};
pub use walker::{relative_key, unix_seconds, walk_root, WalkResult};

use crate::core::store::{ItemStatus, NewItem, Root, RootScanState, Store, ThumbStatus};
use crate::error::Result;
use crate::events::{Event, EventSender, ScanEvent, ScanSummary};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// A file found by a walk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredFile {
    /// Root-relative POSIX path, the stable key
    pub relative_path: String,
    pub filename: String,
    pub size: u64,
    /// Modification time in unix seconds
    pub mtime: i64,
}

/// Walks roots and applies reconciliations to a store
pub struct Scanner {
    filter: ExtensionFilter,
    missing_after_unavailable_scans: Option<u32>,
    reset_changed_thumbnails: bool,
    events: Option<EventSender>,
}

impl Scanner {
    pub fn new(filter: ExtensionFilter) -> Self {
        Self {
            filter,
            missing_after_unavailable_scans: None,
            reset_changed_thumbnails: false,
            events: None,
        }
    }

    /// Mark a root's items missing once it was unavailable this many scans in a row
    pub fn missing_after_unavailable_scans(mut self, scans: Option<u32>) -> Self {
        self.missing_after_unavailable_scans = scans;
        self
    }

    /// Reset the thumbnail status of changed files so they are regenerated
    pub fn reset_changed_thumbnails(mut self, reset: bool) -> Self {
        self.reset_changed_thumbnails = reset;
        self
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    fn emit(&self, event: ScanEvent) {
        if let Some(sender) = &self.events {
            sender.send(Event::Scan(event));
        }
    }

    /// Scan one root and apply the result to the store.
    ///
    /// Returns the applied reconciliation; an empty one when the root was
    /// skipped.
    pub fn scan(&self, root: &Root, store: &dyn Store) -> Result<Reconciliation> {
        if !root.enabled {
            debug!("Skipping disabled root {}", root.path.display());
            self.emit(ScanEvent::Skipped {
                root: root.path.clone(),
                reason: "disabled".to_string(),
            });
            return Ok(Reconciliation::default());
        }

        self.emit(ScanEvent::Started {
            root: root.path.clone(),
        });

        let walk = match walk_root(&root.path, &self.filter, self.events.as_ref()) {
            Ok(walk) => walk,
            Err(e) => {
                warn!("Root {} is unavailable: {}", root.path.display(), e);
                self.emit(ScanEvent::Skipped {
                    root: root.path.clone(),
                    reason: e.to_string(),
                });
                return self.handle_unavailable(root, store);
            }
        };

        for error in &walk.errors {
            warn!("Skipped entry under {}: {}", root.path.display(), error);
        }

        let known = store.items_for_root(root.id)?;
        let mut diff = reconcile(&known, walk.files);

        // Items under a directory we could not list are not known to be gone
        if !walk.unreadable_dirs.is_empty() {
            let deferred: Vec<_> = known
                .iter()
                .filter(|item| diff.missing.contains(&item.id))
                .filter(|item| {
                    walk.unreadable_dirs.iter().any(|dir| {
                        item.relative_path
                            .strip_prefix(dir.as_str())
                            .is_some_and(|rest| rest.starts_with('/'))
                    })
                })
                .map(|item| item.id)
                .collect();
            diff.missing.retain(|id| !deferred.contains(id));
            diff.unchanged += deferred.len();
        }

        self.apply(root, &diff, store)?;

        let mut state = store
            .scan_state(root.id)?
            .unwrap_or_else(|| RootScanState::new(root.id));
        state.consecutive_unavailable = 0;
        state.last_scan_at = Some(SystemTime::now());
        store.set_scan_state(&state)?;

        info!(
            "Scanned {}: {} new, {} changed, {} reappeared, {} missing, {} unchanged",
            root.path.display(),
            diff.new.len(),
            diff.changed.len(),
            diff.reappeared.len(),
            diff.missing.len(),
            diff.unchanged
        );
        self.emit(ScanEvent::Completed(summarize(root, &diff)));

        Ok(diff)
    }

    fn apply(&self, root: &Root, diff: &Reconciliation, store: &dyn Store) -> Result<()> {
        for file in &diff.new {
            let id = store.insert_item(NewItem {
                root_id: root.id,
                relative_path: file.relative_path.clone(),
                filename: file.filename.clone(),
                size: file.size,
                mtime: file.mtime,
            })?;
            debug!("New item {} at {}", id, file.relative_path);
        }

        for known in &diff.changed {
            store.update_file_stamp(known.id, known.file.size, known.file.mtime)?;
            if self.reset_changed_thumbnails {
                store.set_thumb_status(known.id, ThumbStatus::None)?;
            }
            debug!("Item {} changed on disk", known.id);
        }

        for known in &diff.reappeared {
            store.set_status(known.id, ItemStatus::Active)?;
            if known.stamp_changed {
                store.update_file_stamp(known.id, known.file.size, known.file.mtime)?;
                if self.reset_changed_thumbnails {
                    store.set_thumb_status(known.id, ThumbStatus::None)?;
                }
            }
            debug!("Item {} reappeared", known.id);
        }

        for id in &diff.missing {
            store.set_status(*id, ItemStatus::Missing)?;
            debug!("Item {} is missing", id);
        }

        Ok(())
    }

    /// Record an unavailable scan and apply the policy, if any
    fn handle_unavailable(&self, root: &Root, store: &dyn Store) -> Result<Reconciliation> {
        let mut state = store
            .scan_state(root.id)?
            .unwrap_or_else(|| RootScanState::new(root.id));
        state.consecutive_unavailable = state.consecutive_unavailable.saturating_add(1);
        store.set_scan_state(&state)?;

        let mut diff = Reconciliation::default();
        let Some(threshold) = self.missing_after_unavailable_scans else {
            return Ok(diff);
        };
        if state.consecutive_unavailable < threshold {
            return Ok(diff);
        }

        for item in store.items_for_root(root.id)? {
            match item.status {
                ItemStatus::Active => {
                    store.set_status(item.id, ItemStatus::Missing)?;
                    diff.missing.push(item.id);
                }
                ItemStatus::Missing => diff.still_missing += 1,
            }
        }
        if !diff.missing.is_empty() {
            warn!(
                "Root {} unavailable for {} scans, marked {} items missing",
                root.path.display(),
                state.consecutive_unavailable,
                diff.missing.len()
            );
        }
        Ok(diff)
    }
}

fn summarize(root: &Root, diff: &Reconciliation) -> ScanSummary {
    ScanSummary {
        root: root.path.clone(),
        new: diff.new.len(),
        changed: diff.changed.len(),
        reappeared: diff.reappeared.len(),
        missing: diff.missing.len(),
        unchanged: diff.unchanged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::{InMemoryStore, ItemId};
    use crate::events::EventChannel;
    use std::fs;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str, content: &[u8]) {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn scanner() -> Scanner {
        Scanner::new(ExtensionFilter::new(["jpg", "png"]))
    }

    fn setup() -> (TempDir, InMemoryStore, Root) {
        let dir = TempDir::new().unwrap();
        let store = InMemoryStore::new();
        let root = store.add_root(dir.path(), "test", true).unwrap();
        (dir, store, root)
    }

    #[test]
    fn first_scan_inserts_active_items() {
        let (dir, store, root) = setup();
        touch(dir.path(), "a.jpg", b"aa");
        touch(dir.path(), "sub/b.png", b"bbb");
        touch(dir.path(), "skip.txt", b"x");

        let diff = scanner().scan(&root, &store).unwrap();
        assert_eq!(diff.new.len(), 2);

        let items = store.items_for_root(root.id).unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.status == ItemStatus::Active));
        assert!(items.iter().all(|i| i.thumb_status == ThumbStatus::None));
        assert!(store.find_item(root.id, "sub/b.png").unwrap().is_some());
    }

    #[test]
    fn rescan_of_unchanged_tree_changes_nothing() {
        let (dir, store, root) = setup();
        touch(dir.path(), "a.jpg", b"aa");
        touch(dir.path(), "b.jpg", b"bb");

        scanner().scan(&root, &store).unwrap();
        let before = store.items_for_root(root.id).unwrap();

        let diff = scanner().scan(&root, &store).unwrap();
        assert!(diff.is_noop());
        assert_eq!(diff.unchanged, 2);
        assert_eq!(store.items_for_root(root.id).unwrap(), before);
    }

    #[test]
    fn deleted_file_goes_missing_and_returns_with_same_id() {
        let (dir, store, root) = setup();
        touch(dir.path(), "a.jpg", b"aa");
        scanner().scan(&root, &store).unwrap();
        let id = store.find_item(root.id, "a.jpg").unwrap().unwrap().id;

        fs::remove_file(dir.path().join("a.jpg")).unwrap();
        let diff = scanner().scan(&root, &store).unwrap();
        assert_eq!(diff.missing, vec![id]);
        assert_eq!(store.item(id).unwrap().unwrap().status, ItemStatus::Missing);

        let diff = scanner().scan(&root, &store).unwrap();
        assert!(diff.missing.is_empty());
        assert_eq!(diff.still_missing, 1);

        touch(dir.path(), "a.jpg", b"aa");
        let diff = scanner().scan(&root, &store).unwrap();
        assert_eq!(diff.reappeared.len(), 1);
        assert_eq!(store.items_for_root(root.id).unwrap().len(), 1);
        assert_eq!(store.item(id).unwrap().unwrap().status, ItemStatus::Active);
    }

    #[test]
    fn modified_file_refreshes_stamp_and_clears_hash() {
        let (dir, store, root) = setup();
        touch(dir.path(), "a.jpg", b"aa");
        scanner().scan(&root, &store).unwrap();
        let id = store.find_item(root.id, "a.jpg").unwrap().unwrap().id;
        store.set_content_hash(id, "abc").unwrap();

        touch(dir.path(), "a.jpg", b"longer content");
        let diff = scanner().scan(&root, &store).unwrap();

        assert_eq!(diff.changed.len(), 1);
        let item = store.item(id).unwrap().unwrap();
        assert_eq!(item.size, 14);
        assert_eq!(item.content_hash, None);
    }

    #[test]
    fn changed_files_keep_thumb_status_unless_reset_requested() {
        let (dir, store, root) = setup();
        touch(dir.path(), "a.jpg", b"aa");
        scanner().scan(&root, &store).unwrap();
        let id = store.find_item(root.id, "a.jpg").unwrap().unwrap().id;
        store.set_thumb_status(id, ThumbStatus::Ready).unwrap();

        touch(dir.path(), "a.jpg", b"aaa");
        scanner().scan(&root, &store).unwrap();
        assert_eq!(store.item(id).unwrap().unwrap().thumb_status, ThumbStatus::Ready);

        touch(dir.path(), "a.jpg", b"aaaa");
        scanner()
            .reset_changed_thumbnails(true)
            .scan(&root, &store)
            .unwrap();
        assert_eq!(store.item(id).unwrap().unwrap().thumb_status, ThumbStatus::None);
    }

    #[test]
    fn disabled_root_is_skipped() {
        let (dir, store, root) = setup();
        touch(dir.path(), "a.jpg", b"aa");
        store.set_root_enabled(root.id, false).unwrap();
        let root = store.root(root.id).unwrap().unwrap();

        let diff = scanner().scan(&root, &store).unwrap();
        assert_eq!(diff, Reconciliation::default());
        assert!(store.items_for_root(root.id).unwrap().is_empty());
    }

    #[test]
    fn unavailable_root_keeps_items_by_default() {
        let (dir, store, root) = setup();
        touch(dir.path(), "a.jpg", b"aa");
        scanner().scan(&root, &store).unwrap();

        let unplugged = Root {
            path: dir.path().join("not-mounted"),
            ..root.clone()
        };
        for _ in 0..5 {
            let diff = scanner().scan(&unplugged, &store).unwrap();
            assert!(diff.is_noop());
        }

        let items = store.items_for_root(root.id).unwrap();
        assert!(items.iter().all(|i| i.status == ItemStatus::Active));
        assert_eq!(
            store.scan_state(root.id).unwrap().unwrap().consecutive_unavailable,
            5
        );
    }

    #[test]
    fn unavailable_root_policy_marks_missing_at_threshold() {
        let (dir, store, root) = setup();
        touch(dir.path(), "a.jpg", b"aa");
        touch(dir.path(), "b.jpg", b"bb");
        scanner().scan(&root, &store).unwrap();

        let unplugged = Root {
            path: dir.path().join("not-mounted"),
            ..root.clone()
        };
        let scanner = scanner().missing_after_unavailable_scans(Some(2));

        assert!(scanner.scan(&unplugged, &store).unwrap().missing.is_empty());
        assert_eq!(scanner.scan(&unplugged, &store).unwrap().missing.len(), 2);

        // Back online: counter resets and items reappear
        let diff = scanner.scan(&root, &store).unwrap();
        assert_eq!(diff.reappeared.len(), 2);
        assert_eq!(
            store.scan_state(root.id).unwrap().unwrap().consecutive_unavailable,
            0
        );
    }

    #[test]
    fn reports_completion_event() {
        let (dir, store, root) = setup();
        touch(dir.path(), "a.jpg", b"aa");
        let (sender, receiver) = EventChannel::new();

        scanner().with_events(sender).scan(&root, &store).unwrap();

        let summaries: Vec<ScanSummary> = receiver
            .drain()
            .into_iter()
            .filter_map(|e| match e {
                Event::Scan(ScanEvent::Completed(s)) => Some(s),
                _ => None,
            })
            .collect();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].new, 1);
    }

    #[test]
    fn mtime_only_change_is_detected() {
        let (dir, store, root) = setup();
        touch(dir.path(), "a.jpg", b"aa");
        scanner().scan(&root, &store).unwrap();

        let path = dir.path().join("a.jpg");
        let later = SystemTime::now() + Duration::from_secs(3600);
        fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(later)
            .unwrap();

        let diff = scanner().scan(&root, &store).unwrap();
        assert_eq!(diff.changed.len(), 1);
        assert_eq!(diff.changed[0].id, ItemId(1));
    }
}
