//! Size-based rotation for per-link engine logs.
//!
//! Rotates `link-<id>.log` when it exceeds 1 MiB, keeping at most 3 numbered
//! copies:
//!   link-3.log → link-3.log.1 → link-3.log.2 → link-3.log.3
//!
//! Runs in the spawning process before each spawn, so an engine process always
//! starts with a bounded log file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Maximum log file size before rotation (1 MiB).
pub const MAX_LOG_BYTES: u64 = 1024 * 1024;

/// Maximum number of rotated backup files to keep.
pub const MAX_ROTATED_FILES: usize = 3;

/// Rotate `log_path` if its size exceeds `max_bytes`.
///
/// Returns `true` if rotation occurred, `false` if the file was under the
/// threshold or did not exist yet. Missing rotated copies are silently skipped.
pub fn rotate_if_needed(log_path: &Path, max_bytes: u64, max_files: usize) -> io::Result<bool> {
    let size = match fs::metadata(log_path) {
        Ok(meta) => meta.len(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };

    if size < max_bytes {
        return Ok(false);
    }

    // Drop the oldest copy so the cap holds.
    let oldest = numbered_path(log_path, max_files);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }

    // Shift existing rotated copies up by one.
    for n in (1..max_files).rev() {
        let src = numbered_path(log_path, n);
        let dst = numbered_path(log_path, n + 1);
        if src.exists() {
            fs::rename(&src, &dst)?;
        }
    }

    // Live log → .1, then a fresh empty file for the next process.
    fs::rename(log_path, numbered_path(log_path, 1))?;
    let _ = fs::OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(log_path)?;

    Ok(true)
}

/// Rotate one link's log, logging failure instead of blocking the spawn.
pub fn rotate_link_log(log_path: &Path) {
    match rotate_if_needed(log_path, MAX_LOG_BYTES, MAX_ROTATED_FILES) {
        Ok(true) => tracing::info!(path = %log_path.display(), "link log rotated"),
        Ok(false) => {}
        Err(err) => {
            tracing::warn!(path = %log_path.display(), error = %err, "log rotation failed")
        }
    }
}

/// Path of the `n`-th rotated copy of `base` (e.g. `link-3.log.2`).
fn numbered_path(base: &Path, n: usize) -> PathBuf {
    let name = base
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("link.log");
    base.with_file_name(format!("{name}.{n}"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
