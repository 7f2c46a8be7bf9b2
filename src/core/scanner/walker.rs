//! Directory walking implementation using walkdir.

use super::{filter::ExtensionFilter, DiscoveredFile};
use crate::error::ScanError;
use crate::events::{Event, EventSender, ScanEvent};
use std::path::{Component, Path};
use std::time::{SystemTime, UNIX_EPOCH};
use walkdir::WalkDir;

/// Everything found under one root
#[derive(Debug, Default)]
pub struct WalkResult {
    /// Matching regular files, sorted by relative path
    pub files: Vec<DiscoveredFile>,
    /// Entries that could not be read (non-fatal)
    pub errors: Vec<ScanError>,
    /// Relative paths of subdirectories whose content could not be listed
    pub unreadable_dirs: Vec<String>,
}

/// Seconds since the epoch, negative for pre-epoch stamps
pub fn unix_seconds(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    }
}

/// Root-relative path with `/` separators. `None` for paths that are not
/// valid UTF-8 or not under the root.
pub fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            _ => return None,
        }
    }
    Some(parts.join("/"))
}

fn walk_error(root: &Path, e: walkdir::Error) -> ScanError {
    let path = e.path().unwrap_or(root).to_path_buf();
    if e.io_error().map(|io| io.kind()) == Some(std::io::ErrorKind::PermissionDenied) {
        ScanError::PermissionDenied { path }
    } else {
        ScanError::ReadDirectory {
            path,
            source: std::io::Error::other(e.to_string()),
        }
    }
}

/// Walk a root recursively, collecting indexable regular files.
///
/// Symbolic links are not followed and are never reported as files. A root
/// that cannot be listed at all is an error; unreadable entries below it are
/// collected in [`WalkResult::errors`].
pub fn walk_root(
    root: &Path,
    filter: &ExtensionFilter,
    events: Option<&EventSender>,
) -> Result<WalkResult, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::DirectoryNotFound {
            path: root.to_path_buf(),
        });
    }

    let mut result = WalkResult::default();
    let include_hidden = filter.includes_hidden();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || include_hidden
                || !entry
                    .file_name()
                    .to_str()
                    .map(ExtensionFilter::is_hidden)
                    .unwrap_or(false)
        });

    for entry_result in walker {
        let entry = match entry_result {
            Ok(entry) => entry,
            Err(e) => {
                if e.depth() == 0 {
                    return Err(walk_error(root, e));
                }
                if let Some(key) = e.path().and_then(|p| relative_key(root, p)) {
                    result.unreadable_dirs.push(key);
                }
                let error = walk_error(root, e);
                if let Some(sender) = events {
                    sender.send(Event::Scan(ScanEvent::Error {
                        path: error_path(&error, root),
                        message: error.to_string(),
                    }));
                }
                result.errors.push(error);
                continue;
            }
        };

        if !entry.file_type().is_file() || !filter.accepts(entry.path()) {
            continue;
        }

        let Some(relative_path) = relative_key(root, entry.path()) else {
            let error = ScanError::ReadDirectory {
                path: entry.path().to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "file name is not valid UTF-8",
                ),
            };
            result.errors.push(error);
            continue;
        };

        match entry.metadata() {
            Ok(metadata) => {
                let mtime = metadata.modified().map(unix_seconds).unwrap_or(0);
                result.files.push(DiscoveredFile {
                    filename: entry.file_name().to_string_lossy().into_owned(),
                    relative_path,
                    size: metadata.len(),
                    mtime,
                });
            }
            Err(e) => {
                let error = walk_error(root, e);
                if let Some(sender) = events {
                    sender.send(Event::Scan(ScanEvent::Error {
                        path: entry.path().to_path_buf(),
                        message: error.to_string(),
                    }));
                }
                result.errors.push(error);
            }
        }
    }

    result
        .files
        .sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(result)
}

fn error_path(error: &ScanError, root: &Path) -> std::path::PathBuf {
    match error {
        ScanError::PermissionDenied { path }
        | ScanError::ReadDirectory { path, .. }
        | ScanError::DirectoryNotFound { path } => path.clone(),
        ScanError::Cancelled => root.to_path_buf(),
    }
}
