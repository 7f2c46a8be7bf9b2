//! # Thumbnail Module
//!
//! Cached, downscaled JPEG renditions of indexed photos at named size tiers.
//!
//! ## How It Works
//! 1. Each `(item, tier)` pair maps to one deterministic file:
//!    `{cache_dir}/thumbs/{item_id}_{tier}.jpg`
//! 2. `ensure` returns files that already exist and generates the rest
//! 3. The source is decoded once, turned upright, then scaled down per tier
//! 4. Output goes to a temp file in the same directory and is renamed into place
//!
//! ## Example
//! ```rust,ignore
//! let cache = ThumbnailCache::new(&config.cache_dir, config.thumbnails.clone());
//! let outcome = cache.ensure(&ThumbnailSource::new(item.id, path), Some(&["small"]))?;
//! println!("{}", outcome.paths[&SizeLabel::Small].display());
//! ```

mod orientation;

pub use orientation::apply_orientation;

use crate::config::ThumbnailConfig;
use crate::core::metadata::read_orientation;
use crate::core::store::ItemId;
use crate::error::{ConfigError, ThumbnailError};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView, ImageError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tempfile::NamedTempFile;
use tracing::debug;

/// Subdirectory of the cache directory holding thumbnails
pub const THUMBS_DIR: &str = "thumbs";

/// Named thumbnail resolution class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeLabel {
    Small,
    Medium,
    Large,
}

impl SizeLabel {
    pub const ALL: [SizeLabel; 3] = [SizeLabel::Small, SizeLabel::Medium, SizeLabel::Large];

    pub fn as_str(&self) -> &'static str {
        match self {
            SizeLabel::Small => "small",
            SizeLabel::Medium => "medium",
            SizeLabel::Large => "large",
        }
    }

    /// Max dimension used when a configuration does not override it
    pub fn default_bound(&self) -> u32 {
        match self {
            SizeLabel::Small => 256,
            SizeLabel::Medium => 512,
            SizeLabel::Large => 1024,
        }
    }
}

impl fmt::Display for SizeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SizeLabel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "small" => Ok(SizeLabel::Small),
            "medium" => Ok(SizeLabel::Medium),
            "large" => Ok(SizeLabel::Large),
            other => Err(ConfigError::UnknownSizeLabel {
                label: other.to_string(),
            }),
        }
    }
}

/// What a thumbnail is generated from
#[derive(Debug, Clone, PartialEq)]
pub struct ThumbnailSource {
    pub item_id: ItemId,
    /// Absolute path of the source image
    pub path: PathBuf,
    /// EXIF orientation; read from the file when not known
    pub orientation: Option<u16>,
}

impl ThumbnailSource {
    pub fn new(item_id: ItemId, path: impl Into<PathBuf>) -> Self {
        Self {
            item_id,
            path: path.into(),
            orientation: None,
        }
    }

    pub fn with_orientation(mut self, orientation: Option<u16>) -> Self {
        self.orientation = orientation;
        self
    }
}

/// Result of [`ThumbnailCache::ensure`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnsureOutcome {
    /// Artifact path for every requested tier
    pub paths: BTreeMap<SizeLabel, PathBuf>,
    /// Tiers that had to be generated by this call
    pub generated: Vec<SizeLabel>,
}

/// Thumbnail cache rooted at a cache directory
#[derive(Debug, Clone)]
pub struct ThumbnailCache {
    thumbs_dir: PathBuf,
    config: ThumbnailConfig,
}

impl ThumbnailCache {
    pub fn new(cache_dir: &Path, config: ThumbnailConfig) -> Self {
        Self {
            thumbs_dir: cache_dir.join(THUMBS_DIR),
            config,
        }
    }

    /// Directory holding every artifact
    pub fn thumbs_dir(&self) -> &Path {
        &self.thumbs_dir
    }

    /// Deterministic artifact path for an item and tier. No I/O.
    pub fn thumbnail_path(&self, item_id: ItemId, label: &str) -> Result<PathBuf, ConfigError> {
        let label: SizeLabel = label.parse()?;
        Ok(self.path_for(item_id, label))
    }

    fn path_for(&self, item_id: ItemId, label: SizeLabel) -> PathBuf {
        self.thumbs_dir.join(format!("{}_{}.jpg", item_id, label))
    }

    /// Resolve requested labels to tiers with their bounds, before any I/O
    fn resolve_labels(&self, labels: Option<&[&str]>) -> Result<Vec<(SizeLabel, u32)>, ConfigError> {
        let requested: Vec<SizeLabel> = match labels {
            Some(labels) => labels
                .iter()
                .map(|l| l.parse())
                .collect::<Result<_, ConfigError>>()?,
            None => self.config.sizes.keys().copied().collect(),
        };

        let mut resolved = Vec::with_capacity(requested.len());
        for label in requested {
            let bound = self
                .config
                .sizes
                .get(&label)
                .copied()
                .ok_or_else(|| ConfigError::MissingSizeBound {
                    label: label.to_string(),
                })?;
            if !resolved.iter().any(|(l, _)| *l == label) {
                resolved.push((label, bound));
            }
        }
        Ok(resolved)
    }

    /// Return the artifacts for the requested tiers (default: every
    /// configured tier), generating the ones that do not exist yet.
    pub fn ensure(
        &self,
        source: &ThumbnailSource,
        labels: Option<&[&str]>,
    ) -> Result<EnsureOutcome, ThumbnailError> {
        let tiers = self.resolve_labels(labels)?;

        let mut outcome = EnsureOutcome::default();
        let mut missing = Vec::new();
        for (label, bound) in tiers {
            let path = self.path_for(source.item_id, label);
            if !path.is_file() {
                missing.push((label, bound, path.clone()));
            }
            outcome.paths.insert(label, path);
        }

        if missing.is_empty() {
            return Ok(outcome);
        }

        let upright = self.load_upright(source)?;
        fs::create_dir_all(&self.thumbs_dir).map_err(|e| ThumbnailError::Io {
            path: self.thumbs_dir.clone(),
            source: e,
        })?;

        for (label, bound, path) in missing {
            let scaled = downscale(&upright, bound);
            self.write_jpeg(&scaled, &path)?;
            debug!(
                "Generated {} thumbnail for item {} ({}x{})",
                label,
                source.item_id,
                scaled.width(),
                scaled.height()
            );
            outcome.generated.push(label);
        }

        Ok(outcome)
    }

    /// Remove every artifact of an item. Returns how many files were removed.
    pub fn invalidate(&self, item_id: ItemId) -> Result<usize, ThumbnailError> {
        let mut removed = 0;
        for label in SizeLabel::ALL {
            let path = self.path_for(item_id, label);
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(ThumbnailError::Io { path, source: e }),
            }
        }
        Ok(removed)
    }

    fn load_upright(&self, source: &ThumbnailSource) -> Result<DynamicImage, ThumbnailError> {
        let path = &source.path;
        if !path.is_file() {
            return Err(ThumbnailError::NotFound { path: path.clone() });
        }

        let image = image::ImageReader::open(path)
            .and_then(|reader| reader.with_guessed_format())
            .map_err(|e| ThumbnailError::Io {
                path: path.clone(),
                source: e,
            })?
            .decode()
            .map_err(|e| match e {
                ImageError::IoError(source) if source.kind() == std::io::ErrorKind::NotFound => {
                    ThumbnailError::NotFound { path: path.clone() }
                }
                other => ThumbnailError::Decode {
                    path: path.clone(),
                    reason: other.to_string(),
                },
            })?;

        let orientation = source.orientation.or_else(|| read_orientation(path));
        Ok(match orientation {
            Some(o) => apply_orientation(image, o),
            None => image,
        })
    }

    fn write_jpeg(&self, image: &DynamicImage, target: &Path) -> Result<(), ThumbnailError> {
        let io_error = |source: std::io::Error| ThumbnailError::Io {
            path: target.to_path_buf(),
            source,
        };

        let mut bytes = Vec::new();
        JpegEncoder::new_with_quality(&mut bytes, self.config.quality)
            .encode_image(&image.to_rgb8())
            .map_err(|e| io_error(std::io::Error::other(e.to_string())))?;

        let mut temp = NamedTempFile::new_in(&self.thumbs_dir).map_err(io_error)?;
        temp.write_all(&bytes).map_err(io_error)?;
        temp.persist(target).map_err(|e| io_error(e.error))?;
        Ok(())
    }
}

/// Scale down to fit a square bound, preserving aspect ratio. Images
/// already within the bound are returned unchanged.
fn downscale(image: &DynamicImage, bound: u32) -> DynamicImage {
    let (width, height) = image.dimensions();
    if width <= bound && height <= bound {
        image.clone()
    } else {
        image.thumbnail(bound, bound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::test_images::write_jpeg_with_exif;
    use image::{ImageFormat, Rgb, RgbImage};
    use tempfile::TempDir;

    fn cache(dir: &TempDir) -> ThumbnailCache {
        ThumbnailCache::new(dir.path(), ThumbnailConfig::default())
    }

    fn write_png(dir: &TempDir, name: &str, width: u32, height: u32) -> PathBuf {
        let path = dir.path().join(name);
        let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 90]));
        img.save_with_format(&path, ImageFormat::Png).unwrap();
        path
    }

    #[test]
    fn path_is_deterministic_and_pure() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);

        let first = cache.thumbnail_path(ItemId(7), "small").unwrap();
        let second = cache.thumbnail_path(ItemId(7), "small").unwrap();

        assert_eq!(first, second);
        assert_eq!(first, dir.path().join("thumbs").join("7_small.jpg"));
        assert!(!dir.path().join("thumbs").exists());
    }

    #[test]
    fn unknown_label_is_a_config_error_everywhere() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        let source = ThumbnailSource::new(ItemId(1), write_png(&dir, "a.png", 10, 10));

        assert!(matches!(
            cache.thumbnail_path(ItemId(1), "huge"),
            Err(ConfigError::UnknownSizeLabel { .. })
        ));
        assert!(matches!(
            cache.ensure(&source, Some(&["small", "huge"])),
            Err(ThumbnailError::Config(ConfigError::UnknownSizeLabel { .. }))
        ));
        assert!(!dir.path().join("thumbs").exists());
    }

    #[test]
    fn label_without_bound_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let mut config = ThumbnailConfig::default();
        config.sizes.remove(&SizeLabel::Large);
        let cache = ThumbnailCache::new(dir.path(), config);
        let source = ThumbnailSource::new(ItemId(1), write_png(&dir, "a.png", 10, 10));

        assert!(matches!(
            cache.ensure(&source, Some(&["large"])),
            Err(ThumbnailError::Config(ConfigError::MissingSizeBound { .. }))
        ));
        // Default request covers configured tiers only
        let outcome = cache.ensure(&source, None).unwrap();
        assert_eq!(outcome.generated, vec![SizeLabel::Small, SizeLabel::Medium]);
    }

    #[test]
    fn second_ensure_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        let source = ThumbnailSource::new(ItemId(3), write_png(&dir, "a.png", 800, 600));

        let first = cache.ensure(&source, Some(&["small", "medium"])).unwrap();
        assert_eq!(first.generated, vec![SizeLabel::Small, SizeLabel::Medium]);

        let modified = fs::metadata(&first.paths[&SizeLabel::Small])
            .unwrap()
            .modified()
            .unwrap();

        let second = cache.ensure(&source, Some(&["small", "medium"])).unwrap();
        assert!(second.generated.is_empty());
        assert_eq!(first.paths, second.paths);
        assert_eq!(
            fs::metadata(&second.paths[&SizeLabel::Small])
                .unwrap()
                .modified()
                .unwrap(),
            modified
        );
    }

    #[test]
    fn generated_thumbnail_fits_bound_and_keeps_aspect() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        let source = ThumbnailSource::new(ItemId(4), write_png(&dir, "wide.png", 1000, 500));

        let outcome = cache.ensure(&source, Some(&["small"])).unwrap();
        let thumb = image::open(&outcome.paths[&SizeLabel::Small]).unwrap();

        assert_eq!(thumb.dimensions(), (256, 128));
    }

    #[test]
    fn small_sources_are_never_upscaled() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        let source = ThumbnailSource::new(ItemId(5), write_png(&dir, "tiny.png", 40, 30));

        let outcome = cache.ensure(&source, Some(&["large"])).unwrap();
        let thumb = image::open(&outcome.paths[&SizeLabel::Large]).unwrap();

        assert_eq!(thumb.dimensions(), (40, 30));
    }

    #[test]
    fn orientation_is_applied_before_resize() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        let source = ThumbnailSource::new(ItemId(6), write_png(&dir, "side.png", 600, 300))
            .with_orientation(Some(6));

        let outcome = cache.ensure(&source, Some(&["small"])).unwrap();
        let thumb = image::open(&outcome.paths[&SizeLabel::Small]).unwrap();

        assert_eq!(thumb.dimensions(), (128, 256));
    }

    #[test]
    fn orientation_is_read_from_exif_when_not_given() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        let path = dir.path().join("camera.jpg");
        let orientation = exif::Field {
            tag: exif::Tag::Orientation,
            ifd_num: exif::In::PRIMARY,
            value: exif::Value::Short(vec![6]),
        };
        write_jpeg_with_exif(&path, 40, 20, &[orientation]);
        let source = ThumbnailSource::new(ItemId(11), &path);
        assert_eq!(source.orientation, None);

        let outcome = cache.ensure(&source, Some(&["small"])).unwrap();
        let thumb = image::open(&outcome.paths[&SizeLabel::Small]).unwrap().to_rgb8();

        // Stored landscape with red on the left; upright it is portrait with red on top
        assert_eq!(thumb.dimensions(), (20, 40));
        let top = thumb.get_pixel(10, 5);
        let bottom = thumb.get_pixel(10, 34);
        assert!(top[0] > 200 && top[2] < 80, "top pixel {:?}", top);
        assert!(bottom[2] > 200 && bottom[0] < 80, "bottom pixel {:?}", bottom);
    }

    #[test]
    fn missing_source_is_not_found() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        let source = ThumbnailSource::new(ItemId(8), dir.path().join("gone.jpg"));

        assert!(matches!(
            cache.ensure(&source, None),
            Err(ThumbnailError::NotFound { .. })
        ));
    }

    #[test]
    fn corrupt_source_is_a_decode_error() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        let path = dir.path().join("broken.jpg");
        fs::write(&path, b"definitely not a jpeg").unwrap();

        let result = cache.ensure(&ThumbnailSource::new(ItemId(9), path), None);
        assert!(matches!(result, Err(ThumbnailError::Decode { .. })));
    }

    #[test]
    fn invalidate_removes_all_tiers() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        let source = ThumbnailSource::new(ItemId(10), write_png(&dir, "a.png", 300, 300));

        let outcome = cache.ensure(&source, None).unwrap();
        assert_eq!(outcome.generated.len(), 3);

        assert_eq!(cache.invalidate(ItemId(10)).unwrap(), 3);
        assert!(outcome.paths.values().all(|p| !p.exists()));
        assert_eq!(cache.invalidate(ItemId(10)).unwrap(), 0);
    }

    #[test]
    fn labels_parse_case_sensitively() {
        assert_eq!("medium".parse::<SizeLabel>().unwrap(), SizeLabel::Medium);
        assert!("Medium".parse::<SizeLabel>().is_err());
    }
}
