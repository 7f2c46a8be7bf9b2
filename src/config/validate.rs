//! Range checks on loaded configuration.

use crate::error::ConfigError;

use super::IndexerConfig;

impl IndexerConfig {
    /// Validate values that deserialize fine but cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.as_os_str().is_empty() {
            return Err(ConfigError::MissingPath {
                name: "database".into(),
            });
        }
        if self.cache_dir.as_os_str().is_empty() {
            return Err(ConfigError::MissingPath {
                name: "cache_dir".into(),
            });
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be > 0".into()));
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be > 0".into()));
        }
        if self.extensions.iter().all(|e| e.trim_start_matches('.').is_empty()) {
            return Err(ConfigError::Invalid(
                "extensions must name at least one file type".into(),
            ));
        }
        if let Some((label, _)) = self.thumbnails.sizes.iter().find(|(_, bound)| **bound == 0) {
            return Err(ConfigError::Invalid(format!(
                "thumbnails.sizes.{} must be > 0",
                label
            )));
        }
        if !(1..=100).contains(&self.thumbnails.quality) {
            return Err(ConfigError::Invalid(
                "thumbnails.quality must be between 1 and 100".into(),
            ));
        }
        if self.missing_after_unavailable_scans == Some(0) {
            return Err(ConfigError::Invalid(
                "missing_after_unavailable_scans must be > 0 when set".into(),
            ));
        }
        for root in &self.roots {
            if root.path.as_os_str().is_empty() {
                return Err(ConfigError::MissingPath {
                    name: "roots.path".into(),
                });
            }
        }
        Ok(())
    }
}
