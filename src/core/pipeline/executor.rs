//! Indexer implementation.

use super::{IndexFailure, IndexReport, ItemDuplicateGroup, RunReport, ScanReport};
use crate::config::IndexerConfig;
use crate::core::batch::{BatchRunner, CancellationToken};
use crate::core::hasher::{content_hash, group_by_digest, size_buckets};
use crate::core::metadata::{extract_metadata, guess_taken_at};
use crate::core::scanner::{ExtensionFilter, Scanner};
use crate::core::store::{
    Item, ItemId, ItemStatus, Root, RootId, SqliteStore, Store, ThumbStatus,
};
use crate::core::thumbnail::{ThumbnailCache, ThumbnailSource};
use crate::error::{IndexerError, Result, StoreError, ThumbnailError};
use crate::events::{
    null_sender, Event, EventSender, IndexEvent, PipelineEvent, PipelinePhase, PipelineSummary,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Builder for an [`Indexer`]
pub struct IndexerBuilder {
    config: IndexerConfig,
    store: Option<Arc<dyn Store>>,
    events: Option<EventSender>,
    cancellation: Option<CancellationToken>,
}

impl IndexerBuilder {
    /// Use this store instead of opening `config.database`
    pub fn store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    /// Send progress events to this sender
    pub fn events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Stop runs when this token is cancelled
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Validate the configuration and build the indexer
    pub fn build(self) -> Result<Indexer> {
        self.config.validate()?;

        let store: Arc<dyn Store> = match self.store {
            Some(store) => store,
            None => Arc::new(SqliteStore::open(&self.config.database)?),
        };

        let filter = ExtensionFilter::new(&self.config.extensions)
            .with_hidden(self.config.include_hidden);
        let events = self.events.unwrap_or_else(null_sender);
        let scanner = Scanner::new(filter)
            .missing_after_unavailable_scans(self.config.missing_after_unavailable_scans)
            .reset_changed_thumbnails(self.config.reindex_changed)
            .with_events(events.clone());
        let thumbnails = ThumbnailCache::new(&self.config.cache_dir, self.config.thumbnails.clone());

        Ok(Indexer {
            config: self.config,
            store,
            scanner,
            thumbnails,
            events,
            cancellation: self.cancellation.unwrap_or_default(),
        })
    }
}

/// Coordinates scanning, indexing and deduplication over one store
pub struct Indexer {
    config: IndexerConfig,
    store: Arc<dyn Store>,
    scanner: Scanner,
    thumbnails: ThumbnailCache,
    events: EventSender,
    cancellation: CancellationToken,
}

impl Indexer {
    /// Start building an indexer for a configuration
    pub fn builder(config: IndexerConfig) -> IndexerBuilder {
        IndexerBuilder {
            config,
            store: None,
            events: None,
            cancellation: None,
        }
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn thumbnails(&self) -> &ThumbnailCache {
        &self.thumbnails
    }

    /// Register the configured roots with the store.
    ///
    /// Roots are matched by path; the enabled flag follows the configuration.
    /// Roots known to the store but absent from the configuration are left
    /// as they are.
    pub fn sync_roots(&self) -> Result<Vec<Root>> {
        let mut roots = Vec::with_capacity(self.config.roots.len());
        for configured in &self.config.roots {
            let root = self.store.add_root(
                &configured.path,
                &configured.display_name(),
                configured.enabled,
            )?;
            if root.enabled != configured.enabled {
                self.store.set_root_enabled(root.id, configured.enabled)?;
            }
            roots.push(Root {
                enabled: configured.enabled,
                ..root
            });
        }
        Ok(roots)
    }

    /// Scan every enabled root in the store
    pub fn scan_all(&self) -> Result<ScanReport> {
        let mut report = ScanReport::default();

        for root in self.store.roots()? {
            if !root.enabled {
                continue;
            }
            if self.cancellation.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let diff = self.scanner.scan(&root, self.store.as_ref())?;
            report.roots_scanned += 1;

            if self.config.reindex_changed {
                let stale = diff
                    .changed
                    .iter()
                    .chain(diff.reappeared.iter().filter(|k| k.stamp_changed))
                    .map(|k| k.id);
                for id in stale {
                    let removed = self.thumbnails.invalidate(id)?;
                    debug!("Invalidated {} thumbnails of changed item {}", removed, id);
                }
            }

            report.roots.push((root.id, diff));
        }

        info!(
            "Scanned {} roots: {} new, {} changed, {} missing",
            report.roots_scanned,
            report.new_items(),
            report.changed_items(),
            report.missing_items()
        );
        Ok(report)
    }

    /// Index every active item whose thumbnails or capture time are missing
    pub fn index_pending(&self) -> Result<IndexReport> {
        let pending = self.store.items_needing_index()?;
        let roots: HashMap<RootId, Root> = self
            .store
            .roots()?
            .into_iter()
            .map(|root| (root.id, root))
            .collect();

        let abort = self.cancellation.child();
        let generated = AtomicUsize::new(0);

        let runner = BatchRunner::new(self.config.batch_size)
            .workers(self.config.workers)
            .events(self.events.clone())
            .cancellation(abort.clone());

        let batch = runner.run(&pending, |item| {
            match self.index_item(item, &roots) {
                Ok(count) => {
                    generated.fetch_add(count, Ordering::Relaxed);
                    Ok(())
                }
                Err(e) => {
                    if matches!(e, IndexerError::Config(_)) {
                        abort.cancel();
                    } else {
                        self.mark_failed(item.id, &e);
                    }
                    Err(e)
                }
            }
        });

        let mut report = IndexReport {
            pending: pending.len(),
            indexed: batch.succeeded,
            thumbnails_generated: generated.load(Ordering::Relaxed),
            progress: batch.progress,
            cancelled: batch.cancelled,
            ..Default::default()
        };

        for failure in batch.failures {
            if let IndexerError::Config(e) = failure.error {
                return Err(IndexerError::Config(e));
            }
            report.failures.push(IndexFailure {
                item_id: pending[failure.index].id,
                message: failure.error.to_string(),
            });
        }

        info!(
            "Indexed {}/{} items ({} failed, {} thumbnails written)",
            report.indexed,
            report.pending,
            report.failures.len(),
            report.thumbnails_generated
        );
        Ok(report)
    }

    /// Scan all roots, then index what is pending
    pub fn run(&self) -> Result<RunReport> {
        let start = Instant::now();
        self.events.send(Event::Pipeline(PipelineEvent::Started));

        match self.run_phases() {
            Ok(mut report) => {
                report.duration_ms = start.elapsed().as_millis() as u64;
                if report.scan.cancelled || report.index.cancelled {
                    self.events.send(Event::Pipeline(PipelineEvent::Cancelled));
                } else {
                    self.events.send(Event::Pipeline(PipelineEvent::Completed {
                        summary: PipelineSummary {
                            roots_scanned: report.scan.roots_scanned,
                            new_items: report.scan.new_items(),
                            missing_items: report.scan.missing_items(),
                            indexed: report.index.indexed,
                            failed: report.index.failures.len(),
                            duration_ms: report.duration_ms,
                        },
                    }));
                }
                Ok(report)
            }
            Err(e) => {
                self.events.send(Event::Pipeline(PipelineEvent::Error {
                    message: e.to_string(),
                }));
                Err(e)
            }
        }
    }

    fn run_phases(&self) -> Result<RunReport> {
        self.events.send(Event::Pipeline(PipelineEvent::PhaseChanged {
            phase: PipelinePhase::Scanning,
        }));
        let scan = self.scan_all()?;
        if scan.cancelled || self.cancellation.is_cancelled() {
            return Ok(RunReport {
                scan: ScanReport {
                    cancelled: true,
                    ..scan
                },
                ..Default::default()
            });
        }

        self.events.send(Event::Pipeline(PipelineEvent::PhaseChanged {
            phase: PipelinePhase::Indexing,
        }));
        let index = self.index_pending()?;

        Ok(RunReport {
            scan,
            index,
            duration_ms: 0,
        })
    }

    /// Group active items with identical content.
    ///
    /// Only items that share a size with another active item are hashed;
    /// computed hashes are stored so later calls skip them.
    pub fn find_duplicates(&self) -> Result<Vec<ItemDuplicateGroup>> {
        self.events.send(Event::Pipeline(PipelineEvent::PhaseChanged {
            phase: PipelinePhase::Deduplicating,
        }));

        let roots: HashMap<RootId, Root> = self
            .store
            .roots()?
            .into_iter()
            .map(|root| (root.id, root))
            .collect();

        let mut active = Vec::new();
        for root in roots.values() {
            for item in self.store.items_for_root(root.id)? {
                if item.status == ItemStatus::Active {
                    active.push((item.size, item));
                }
            }
        }
        let by_size = size_buckets(active);

        let unhashed: Vec<&Item> = by_size
            .values()
            .flatten()
            .filter(|item| item.content_hash.is_none())
            .collect();

        let hashed: Mutex<HashMap<ItemId, String>> = Default::default();
        let runner = BatchRunner::new(self.config.batch_size)
            .workers(self.config.workers)
            .cancellation(self.cancellation.clone());
        let batch = runner.run(&unhashed, |item| -> Result<()> {
            let path = item_path(&roots, item)?;
            let hash = content_hash(&path)?;
            self.store.set_content_hash(item.id, &hash)?;
            if let Ok(mut map) = hashed.lock() {
                map.insert(item.id, hash);
            }
            Ok(())
        });
        for failure in &batch.failures {
            warn!(
                "Could not hash item {}: {}",
                unhashed[failure.index].id, failure.error
            );
        }
        let hashed = hashed.into_inner().unwrap_or_default();

        let digests = by_size.values().flatten().filter_map(|item| {
            let hash = item
                .content_hash
                .clone()
                .or_else(|| hashed.get(&item.id).cloned())?;
            Some((hash, item.size, item))
        });

        let mut groups = Vec::new();
        for group in group_by_digest(digests) {
            let mut members = group.members;
            members.sort_by_key(|item| item.id);
            let paths = members
                .iter()
                .map(|item| item_path(&roots, item))
                .collect::<Result<Vec<_>>>()?;
            groups.push(ItemDuplicateGroup {
                hash: group.hash,
                size: group.size,
                items: members.iter().map(|item| item.id).collect(),
                paths,
            });
        }

        info!("Found {} duplicate groups", groups.len());
        Ok(groups)
    }

    /// Extract, render and commit one item. Returns the number of
    /// thumbnails written.
    fn index_item(&self, item: &Item, roots: &HashMap<RootId, Root>) -> Result<usize> {
        let path = item_path(roots, item)?;

        let record = extract_metadata(&path);
        let source = ThumbnailSource::new(item.id, &path)
            .with_orientation(Some(record.orientation.unwrap_or(1)));
        let outcome = self.thumbnails.ensure(&source, None).map_err(|e| match e {
            ThumbnailError::Config(config) => IndexerError::Config(config),
            other => IndexerError::Thumbnail(other),
        })?;

        let taken_at = guess_taken_at(&path, &record);
        self.store.commit_indexed(item.id, &record, taken_at)?;

        debug!(
            "Indexed item {} ({} thumbnails generated)",
            item.id,
            outcome.generated.len()
        );
        self.events.send(Event::Index(IndexEvent::Indexed {
            item_id: item.id.0,
            generated: outcome.generated.iter().map(|l| l.to_string()).collect(),
        }));
        Ok(outcome.generated.len())
    }

    fn mark_failed(&self, id: ItemId, error: &IndexerError) {
        warn!("Failed to index item {}: {}", id, error);
        if let Err(e) = self.store.set_thumb_status(id, ThumbStatus::Error) {
            warn!("Could not record failure of item {}: {}", id, e);
        }
        self.events.send(Event::Index(IndexEvent::Failed {
            item_id: id.0,
            message: error.to_string(),
        }));
    }
}

/// Absolute path of an item's file
fn item_path(roots: &HashMap<RootId, Root>, item: &Item) -> Result<PathBuf> {
    let root = roots.get(&item.root_id).ok_or_else(|| {
        StoreError::QueryFailed(format!(
            "item {} references unknown root {}",
            item.id, item.root_id
        ))
    })?;
    Ok(item
        .relative_path
        .split('/')
        .fold(root.path.clone(), |path, part| path.join(part)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RootConfig;
    use crate::core::store::InMemoryStore;
    use crate::core::thumbnail::SizeLabel;
    use crate::events::EventChannel;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    struct Fixture {
        photos: TempDir,
        cache: TempDir,
        store: Arc<InMemoryStore>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                photos: TempDir::new().unwrap(),
                cache: TempDir::new().unwrap(),
                store: Arc::new(InMemoryStore::new()),
            }
        }

        fn config(&self) -> IndexerConfig {
            IndexerConfig {
                roots: vec![RootConfig::new(self.photos.path())],
                database: self.cache.path().join("unused.db"),
                cache_dir: self.cache.path().to_path_buf(),
                batch_size: 2,
                workers: 2,
                ..IndexerConfig::default()
            }
        }

        fn indexer(&self, config: IndexerConfig) -> Indexer {
            let indexer = Indexer::builder(config)
                .store(self.store.clone())
                .build()
                .unwrap();
            indexer.sync_roots().unwrap();
            indexer
        }

        fn image(&self, relative: &str, width: u32, height: u32) -> PathBuf {
            let path = self.photos.path().join(relative);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            let img = RgbImage::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 128]));
            img.save_with_format(&path, ImageFormat::Png).unwrap();
            path
        }

        fn item(&self, relative: &str) -> Item {
            let root = self.store.roots().unwrap()[0].clone();
            self.store.find_item(root.id, relative).unwrap().unwrap()
        }
    }

    #[test]
    fn run_indexes_new_items() {
        let fx = Fixture::new();
        fx.image("a.png", 600, 400);
        fx.image("nested/b.png", 300, 300);
        let indexer = fx.indexer(fx.config());

        let report = indexer.run().unwrap();

        assert_eq!(report.scan.new_items(), 2);
        assert_eq!(report.index.indexed, 2);
        assert_eq!(report.index.thumbnails_generated, 6);
        assert!(report.index.failures.is_empty());

        let item = fx.item("nested/b.png");
        assert_eq!(item.thumb_status, ThumbStatus::Ready);
        assert!(item.taken_at.is_some());
        assert!(fx.store.metadata(item.id).unwrap().is_some());
        assert!(indexer
            .thumbnails()
            .thumbnail_path(item.id, "small")
            .unwrap()
            .is_file());
    }

    #[test]
    fn second_run_has_nothing_to_do() {
        let fx = Fixture::new();
        fx.image("a.png", 64, 64);
        let indexer = fx.indexer(fx.config());

        indexer.run().unwrap();
        let report = indexer.run().unwrap();

        assert_eq!(report.scan.new_items(), 0);
        assert_eq!(report.index.pending, 0);
        assert_eq!(report.index.thumbnails_generated, 0);
    }

    #[test]
    fn corrupt_item_is_isolated() {
        let fx = Fixture::new();
        fx.image("good.png", 64, 64);
        fs::write(fx.photos.path().join("bad.jpg"), b"not an image").unwrap();
        fx.image("later.png", 64, 64);
        let indexer = fx.indexer(fx.config());

        let report = indexer.run().unwrap();

        assert_eq!(report.index.indexed, 2);
        assert_eq!(report.index.failures.len(), 1);
        let bad = fx.item("bad.jpg");
        assert_eq!(report.index.failures[0].item_id, bad.id);
        assert_eq!(bad.thumb_status, ThumbStatus::Error);
        assert!(fx.store.metadata(bad.id).unwrap().is_none());
        assert_eq!(fx.item("later.png").thumb_status, ThumbStatus::Ready);
    }

    #[test]
    fn vanished_source_marks_error() {
        let fx = Fixture::new();
        let path = fx.image("a.png", 32, 32);
        let indexer = fx.indexer(fx.config());
        indexer.scan_all().unwrap();

        fs::remove_file(path).unwrap();
        let report = indexer.index_pending().unwrap();

        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].message.contains("not found"));
        assert_eq!(fx.item("a.png").thumb_status, ThumbStatus::Error);
    }

    #[test]
    fn configured_tiers_only() {
        let fx = Fixture::new();
        fx.image("a.png", 64, 64);
        let mut config = fx.config();
        config.thumbnails.sizes.remove(&SizeLabel::Large);
        let indexer = fx.indexer(config);

        let report = indexer.run().unwrap();
        assert_eq!(report.index.thumbnails_generated, 2);
    }

    #[test]
    fn cancelled_run_stops_before_indexing() {
        let fx = Fixture::new();
        fx.image("a.png", 32, 32);
        let token = CancellationToken::new();
        let indexer = Indexer::builder(fx.config())
            .store(fx.store.clone())
            .cancellation(token.clone())
            .build()
            .unwrap();
        indexer.sync_roots().unwrap();

        token.cancel();
        let report = indexer.run().unwrap();

        assert!(report.scan.cancelled);
        assert_eq!(report.index.indexed, 0);
    }

    #[test]
    fn changed_file_keeps_thumbnail_by_default() {
        let fx = Fixture::new();
        fx.image("a.png", 64, 64);
        let indexer = fx.indexer(fx.config());
        indexer.run().unwrap();
        let id = fx.item("a.png").id;
        let thumb = indexer.thumbnails().thumbnail_path(id, "small").unwrap();

        fx.image("a.png", 128, 32);
        let report = indexer.run().unwrap();

        assert_eq!(report.scan.changed_items(), 1);
        assert!(thumb.is_file());
        assert_eq!(fx.item("a.png").thumb_status, ThumbStatus::Ready);
        assert_eq!(report.index.thumbnails_generated, 0);
    }

    #[test]
    fn changed_file_is_rerendered_when_configured() {
        let fx = Fixture::new();
        fx.image("a.png", 64, 64);
        let mut config = fx.config();
        config.reindex_changed = true;
        let indexer = fx.indexer(config);
        indexer.run().unwrap();

        fx.image("a.png", 128, 32);
        let report = indexer.run().unwrap();

        assert_eq!(report.index.indexed, 1);
        assert_eq!(report.index.thumbnails_generated, 3);
        let id = fx.item("a.png").id;
        let thumb = image::open(indexer.thumbnails().thumbnail_path(id, "small").unwrap()).unwrap();
        assert_eq!((thumb.width(), thumb.height()), (128, 32));
    }

    #[test]
    fn duplicates_group_identical_content() {
        let fx = Fixture::new();
        let original = fx.image("a.png", 20, 20);
        fs::create_dir_all(fx.photos.path().join("copy")).unwrap();
        fs::copy(&original, fx.photos.path().join("copy").join("a.png")).unwrap();
        fx.image("other.png", 200, 150);
        let indexer = fx.indexer(fx.config());
        indexer.scan_all().unwrap();

        let groups = indexer.find_duplicates().unwrap();

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].items.len(), 2);
        assert_eq!(groups[0].paths[0], original);
        assert!(fx.item("copy/a.png").content_hash.is_some());
        assert!(fx.item("other.png").content_hash.is_none());
    }

    #[test]
    fn emits_pipeline_events() {
        let fx = Fixture::new();
        fx.image("a.png", 16, 16);
        let (sender, receiver) = EventChannel::new();
        let indexer = Indexer::builder(fx.config())
            .store(fx.store.clone())
            .events(sender)
            .build()
            .unwrap();
        indexer.sync_roots().unwrap();

        indexer.run().unwrap();
        let events = receiver.drain();

        assert!(matches!(events.first(), Some(Event::Pipeline(PipelineEvent::Started))));
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::Index(IndexEvent::Indexed { .. }))));
        assert!(matches!(
            events.last(),
            Some(Event::Pipeline(PipelineEvent::Completed { .. }))
        ));
    }

    #[test]
    fn invalid_config_is_rejected_at_build() {
        let fx = Fixture::new();
        let mut config = fx.config();
        config.batch_size = 0;
        assert!(matches!(
            Indexer::builder(config).store(fx.store.clone()).build(),
            Err(IndexerError::Config(_))
        ));
    }

    #[test]
    fn sync_roots_follows_enabled_flag() {
        let fx = Fixture::new();
        fx.indexer(fx.config());
        assert!(fx.store.roots().unwrap()[0].enabled);

        let mut config = fx.config();
        config.roots[0].enabled = false;
        fx.indexer(config);
        assert!(!fx.store.roots().unwrap()[0].enabled);
        assert_eq!(fx.store.roots().unwrap().len(), 1);
    }

    #[test]
    fn item_paths_join_posix_keys() {
        let mut roots = HashMap::new();
        roots.insert(
            RootId(1),
            Root {
                id: RootId(1),
                path: PathBuf::from("/photos"),
                name: "photos".into(),
                enabled: true,
            },
        );
        let item = Item {
            id: ItemId(1),
            root_id: RootId(1),
            relative_path: "2023/a.jpg".into(),
            filename: "a.jpg".into(),
            size: 0,
            mtime: 0,
            status: ItemStatus::Active,
            taken_at: None,
            thumb_status: ThumbStatus::None,
            content_hash: None,
        };
        assert_eq!(
            item_path(&roots, &item).unwrap(),
            Path::new("/photos").join("2023").join("a.jpg")
        );
    }
}
