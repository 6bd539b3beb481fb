//! Structured logging and input hygiene.
//!
//! - [`init_logging`]: one-time structured logging setup with `RUST_LOG` support
//! - [`validate_path`]: keeps query file paths inside the workspace root

use std::path::{Component, Path, PathBuf};

use tracing_subscriber::EnvFilter;

use crate::error::{HybridError, Result};

/// Initialize structured logging with `RUST_LOG` environment variable support.
///
/// Defaults to `hybrid_context=info` when `RUST_LOG` is not set. Safe to
/// call more than once.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("hybrid_context=info"));

    // try_init so double-init in tests doesn't panic
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}

/// Resolve `path` against `root` and reject anything that escapes it.
///
/// Existing paths are canonicalized so symlinks cannot leave the root.
/// Paths that do not exist yet (a semantic query may name a document the
/// index knows but the disk does not) are normalized lexically.
pub fn validate_path(path: &str, root: &Path) -> Result<PathBuf> {
    if path.trim().is_empty() {
        return Err(HybridError::InvalidQuery("empty file path".into()));
    }
    let requested = root.join(path);

    if requested.exists() {
        let canonical = requested.canonicalize()?;
        let root_canonical = root.canonicalize().map_err(|e| {
            HybridError::InvalidQuery(format!("invalid workspace root {}: {e}", root.display()))
        })?;
        if !canonical.starts_with(&root_canonical) {
            return Err(escape_error(path));
        }
        return Ok(canonical);
    }

    let normalized = normalize_lexically(&requested).ok_or_else(|| escape_error(path))?;
    let root_normalized = normalize_lexically(root).unwrap_or_else(|| root.to_path_buf());
    if !normalized.starts_with(&root_normalized) {
        return Err(escape_error(path));
    }
    Ok(normalized)
}

fn escape_error(path: &str) -> HybridError {
    HybridError::InvalidQuery(format!("path traversal detected: {path} escapes workspace root"))
}

/// Fold `.` and `..` without touching the filesystem. Returns `None` when
/// `..` would climb above the first component.
fn normalize_lexically(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    Some(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
