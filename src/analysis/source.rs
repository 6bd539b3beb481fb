//! Where the analyzer reads and lists files from.
//!
//! Reads happen on blocking worker threads, so the trait is synchronous.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use ignore::WalkBuilder;
use tokio_util::sync::CancellationToken;

use crate::error::{HybridError, Result};

/// Which files a workspace listing skips.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Directory names skipped at any depth.
    pub exclude_dirs: Vec<String>,
    pub max_file_bytes: u64,
}

impl ListOptions {
    fn excludes(&self, dir_name: &std::ffi::OsStr) -> bool {
        self.exclude_dirs.iter().any(|name| dir_name == name.as_str())
    }
}

pub trait SourceReader: Send + Sync {
    fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Last modification time, when the backend knows it.
    fn modified(&self, _path: &Path) -> Option<DateTime<Utc>> {
        None
    }

    /// Every regular file under `root`, sorted. Defaults to walking the
    /// local filesystem.
    fn list(&self, root: &Path, options: &ListOptions, cancel: &CancellationToken) -> Result<Vec<PathBuf>> {
        walk_files(root, options, cancel)
    }
}

/// Filesystem walk honouring ignore files, excluded directory names and the
/// size limit.
fn walk_files(root: &Path, options: &ListOptions, cancel: &CancellationToken) -> Result<Vec<PathBuf>> {
    let filter = options.clone();
    let mut builder = WalkBuilder::new(root);
    builder
        .hidden(false)
        .git_ignore(true)
        .git_exclude(true)
        .require_git(false)
        .filter_entry(move |entry| {
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            !(is_dir && filter.excludes(entry.file_name()))
        });

    let mut files = Vec::new();
    for entry in builder.build() {
        if cancel.is_cancelled() {
            return Err(HybridError::Cancelled);
        }
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let path = entry.path();
        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        if size > options.max_file_bytes {
            tracing::debug!(file = %path.display(), size, "Skipping oversized file");
            continue;
        }
        files.push(path.to_path_buf());
    }
    files.sort();
    Ok(files)
}

/// Reads straight from the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsSource;

impl SourceReader for FsSource {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        Ok(std::fs::read(path)?)
    }

    fn modified(&self, path: &Path) -> Option<DateTime<Utc>> {
        std::fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from)
    }
}

/// In-memory files, for tests and editor buffers that are not yet saved.
#[derive(Debug, Default)]
pub struct MemorySource {
    files: RwLock<HashMap<PathBuf, Vec<u8>>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) {
        let mut files = self.files.write().unwrap_or_else(|e| e.into_inner());
        files.insert(path.into(), contents.into());
    }
}

impl SourceReader for MemorySource {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let files = self.files.read().unwrap_or_else(|e| e.into_inner());
        files.get(path).cloned().ok_or_else(|| {
            HybridError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not in memory source", path.display()),
            ))
        })
    }

    fn list(&self, root: &Path, options: &ListOptions, cancel: &CancellationToken) -> Result<Vec<PathBuf>> {
        if cancel.is_cancelled() {
            return Err(HybridError::Cancelled);
        }
        let files = self.files.read().unwrap_or_else(|e| e.into_inner());
        let mut listed: Vec<PathBuf> = files
            .iter()
            .filter(|(_, contents)| (contents.len() as u64) <= options.max_file_bytes)
            .filter_map(|(path, _)| {
                let relative = path.strip_prefix(root).ok()?;
                let in_excluded_dir = relative
                    .parent()
                    .is_some_and(|dirs| dirs.iter().any(|dir| options.excludes(dir)));
                (!in_excluded_dir).then(|| path.clone())
            })
            .collect();
        listed.sort();
        Ok(listed)
    }
}
