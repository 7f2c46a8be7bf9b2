//! File filtering logic for the scanner.

use std::collections::HashSet;
use std::path::Path;

/// Decides which files under a root are indexed
#[derive(Debug, Clone)]
pub struct ExtensionFilter {
    /// Lowercased extensions without the leading dot
    extensions: HashSet<String>,
    /// Whether to include hidden files and directories
    include_hidden: bool,
}

impl ExtensionFilter {
    /// Create a filter from an allow-list. Entries are matched
    /// case-insensitively and may be written with or without a leading dot.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Self {
            extensions,
            include_hidden: false,
        }
    }

    /// Include hidden files (starting with .)
    pub fn with_hidden(mut self, include: bool) -> Self {
        self.include_hidden = include;
        self
    }

    pub fn includes_hidden(&self) -> bool {
        self.include_hidden
    }

    /// Whether a file or directory name is hidden
    pub fn is_hidden(name: &str) -> bool {
        name.starts_with('.')
    }

    /// Check whether a file should be indexed
    pub fn accepts(&self, path: &Path) -> bool {
        if !self.include_hidden {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if Self::is_hidden(name) {
                    return false;
                }
            }
        }

        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => self.extensions.contains(&ext.to_lowercase()),
            None => false,
        }
    }
}
