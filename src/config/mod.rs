//! Configuration for the indexer.
//!
//! Loaded from TOML; every field has a default so a partial file is valid.
//! Relative `database` and `cache_dir` paths resolve against the directory
//! of the file that was loaded.

mod validate;

use crate::core::thumbnail::SizeLabel;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "photo-indexer";

/// A configured directory tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootConfig {
    pub path: PathBuf,
    /// Display name; the last path component when omitted
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl RootConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            name: None,
            enabled: true,
        }
    }

    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            self.path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.path.to_string_lossy().into_owned())
        })
    }
}

fn default_true() -> bool {
    true
}

/// Thumbnail tiers and encoding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailConfig {
    /// Max dimension per tier
    pub sizes: BTreeMap<SizeLabel, u32>,
    /// JPEG quality (1-100)
    pub quality: u8,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            sizes: SizeLabel::ALL
                .iter()
                .map(|label| (*label, label.default_bound()))
                .collect(),
            quality: 85,
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Trees to index
    pub roots: Vec<RootConfig>,
    /// SQLite database file
    pub database: PathBuf,
    /// Directory for generated artifacts
    pub cache_dir: PathBuf,
    /// Allowed file extensions, case-insensitive
    pub extensions: Vec<String>,
    /// Index dot-files and files inside dot-directories (on by default)
    pub include_hidden: bool,
    pub thumbnails: ThumbnailConfig,
    /// Items per batch
    pub batch_size: usize,
    /// Worker threads per batch
    pub workers: usize,
    /// Mark a root's items missing after this many unavailable scans in a row
    pub missing_after_unavailable_scans: Option<u32>,
    /// Drop and regenerate thumbnails of files whose size or mtime changed
    pub reindex_changed: bool,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR);
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR);

        Self {
            roots: Vec::new(),
            database: data_dir.join("index.db"),
            cache_dir,
            extensions: ["jpg", "jpeg", "png", "webp", "gif", "bmp", "tif", "tiff"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
            include_hidden: true,
            thumbnails: ThumbnailConfig::default(),
            batch_size: 50,
            workers: 4,
            missing_after_unavailable_scans: None,
            reindex_changed: false,
        }
    }
}

impl IndexerConfig {
    /// Load from the default location, falling back to defaults when absent
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load and validate a single TOML file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let table = read_table(path)?.ok_or_else(|| ConfigError::Read {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
        })?;
        Self::from_table(table, path)
    }

    /// Load a defaults file with a user file laid over it.
    ///
    /// Top-level keys of the user file replace those of the defaults file
    /// wholesale. Either file may be absent.
    pub fn load_layered(defaults: &Path, user: &Path) -> Result<Self, ConfigError> {
        let mut merged = read_table(defaults)?.unwrap_or_default();
        if let Some(overrides) = read_table(user)? {
            for (key, value) in overrides {
                merged.insert(key, value);
            }
        }
        Self::from_table(merged, user)
    }

    /// `config.toml` in the platform config directory
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    /// Serialize to pretty TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    fn from_table(table: toml::Table, source: &Path) -> Result<Self, ConfigError> {
        let mut config: IndexerConfig =
            toml::Value::Table(table)
                .try_into()
                .map_err(|e| ConfigError::Parse {
                    path: source.to_path_buf(),
                    source: e,
                })?;
        if let Some(base) = source.parent() {
            config.resolve_relative_to(base);
        }
        config.validate()?;
        Ok(config)
    }

    /// Anchor relative paths at `base`
    pub fn resolve_relative_to(&mut self, base: &Path) {
        for path in [&mut self.database, &mut self.cache_dir] {
            if !path.as_os_str().is_empty() && path.is_relative() {
                *path = base.join(&*path);
            }
        }
        for root in &mut self.roots {
            if root.path.is_relative() {
                root.path = base.join(&root.path);
            }
        }
    }
}

fn read_table(path: &Path) -> Result<Option<toml::Table>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    let table = toml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(Some(table))
}
