//! Local tree enumeration and remote path mapping.

use crate::error::{DeployError, DeployResult};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// A regular file found under the sync root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalFile {
    /// Absolute (or caller-rooted) path on disk.
    pub path: PathBuf,
    /// Path below the sync root, always `/`-separated.
    pub relative: String,
    pub size: u64,
}

impl LocalFile {
    /// Builds a record for a single file placed directly under the remote
    /// root, keyed by its file name.
    pub fn standalone(path: impl Into<PathBuf>) -> DeployResult<Self> {
        let path = path.into();
        let meta = std::fs::metadata(&path).map_err(|_| DeployError::FileMissing(path.clone()))?;
        if !meta.is_file() {
            return Err(DeployError::FileMissing(path));
        }
        let relative = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| DeployError::FileMissing(path.clone()))?;
        Ok(Self {
            path,
            relative,
            size: meta.len(),
        })
    }
}

/// Recursive scanner over a sync root.
pub struct TreeScanner {
    root: PathBuf,
    excludes: Vec<PathBuf>,
}

impl TreeScanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            excludes: Vec::new(),
        }
    }

    /// Leaves a specific local path out of the enumeration.
    #[must_use]
    pub fn exclude(mut self, path: impl Into<PathBuf>) -> Self {
        self.excludes.push(path.into());
        self
    }

    /// Collects every regular file under the root, sorted by relative path.
    pub fn scan(&self) -> DeployResult<Vec<LocalFile>> {
        if !self.root.exists() {
            return Err(DeployError::SyncRootMissing(self.root.clone()));
        }
        if !self.root.is_dir() {
            return Err(DeployError::NotADirectory(self.root.clone()));
        }

        let excludes: Vec<PathBuf> = self
            .excludes
            .iter()
            .map(|p| p.canonicalize().unwrap_or_else(|_| p.clone()))
            .collect();

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    return Err(DeployError::Scan {
                        root: self.root.clone(),
                        message: e.to_string(),
                    });
                }
                Err(e) => {
                    warn!("skipping unreadable entry: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if !excludes.is_empty() {
                let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
                if excludes.contains(&canonical) {
                    debug!("excluded {}", path.display());
                    continue;
                }
            }
            let Ok(rel) = path.strip_prefix(&self.root) else {
                continue;
            };
            let size = match entry.metadata() {
                Ok(meta) => meta.len(),
                Err(e) => {
                    warn!("skipping {}: {e}", path.display());
                    continue;
                }
            };
            files.push(LocalFile {
                path: path.to_path_buf(),
                relative: to_slash(rel),
                size,
            });
        }

        files.sort_by(|a, b| a.relative.cmp(&b.relative));
        debug!("enumerated {} files under {}", files.len(), self.root.display());
        Ok(files)
    }
}

/// Joins path components with `/` regardless of platform.
fn to_slash(rel: &Path) -> String {
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Maps a relative path onto the remote root.
pub fn remote_target_path(remote_root: &str, relative: &str) -> String {
    let relative = relative.trim_start_matches('/');
    let root = remote_root.trim_end_matches('/');
    format!("{root}/{relative}")
}

/// Directory part of a remote path, or `None` for entries at `/`.
pub fn remote_parent(remote_path: &str) -> Option<&str> {
    match remote_path.rfind('/') {
        Some(0) | None => None,
        Some(idx) => Some(&remote_path[..idx]),
    }
}
