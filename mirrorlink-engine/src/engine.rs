//! The poll/diff/mirror loop for one link.
//!
//! ## Cycle protocol
//!
//! 1. Verify the destination root is reachable (fatal otherwise).
//! 2. Re-resolve the read spec to the current source set.
//! 3. Copy every new or changed file (fingerprint compare), creating
//!    intermediate destination directories as needed.
//! 4. Delete mirror files whose source vanished; prune directories that are
//!    now empty and strictly inside the mirrored tree.
//! 5. Refresh the in-memory file record.
//!
//! Single-file failures are transient: logged at warn, skipped for the cycle,
//! retried on the next one. Only an unreachable destination root ends the loop.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::EngineError;
use crate::fingerprint::{FileRecord, Fingerprint};
use crate::matcher::PathMatcher;

/// Default pause between poll cycles. A tunable, not a contract.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Everything the engine needs to mirror one link.
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    pub read_spec: String,
    /// Directory the read spec is resolved against; mirror layout is computed
    /// relative to this.
    pub base_dir: PathBuf,
    pub recursive: bool,
    /// Destination root of the mirror.
    pub write_path: PathBuf,
    pub wipe_dest: bool,
    pub skip_presave: bool,
}

/// Counters for one pass over the source set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub copied: usize,
    pub unchanged: usize,
    pub deleted: usize,
    /// Files skipped this cycle due to transient I/O failures.
    pub skipped: usize,
}

/// The mirroring loop for one link. Single-threaded and synchronous; copy and
/// delete I/O block the loop for their duration.
pub struct MirrorEngine {
    matcher: PathMatcher,
    layout_root: PathBuf,
    dest: PathBuf,
    wipe_dest: bool,
    skip_presave: bool,
    records: FileRecord,
}

impl MirrorEngine {
    pub fn new(config: MirrorConfig) -> Result<Self, EngineError> {
        let matcher = PathMatcher::new(&config.read_spec, &config.base_dir, config.recursive)?;
        Ok(Self {
            matcher,
            layout_root: config.base_dir,
            dest: config.write_path,
            wipe_dest: config.wipe_dest,
            skip_presave: config.skip_presave,
            records: FileRecord::new(),
        })
    }

    /// Startup pass: optional recursive destination wipe, then seed the file
    /// record — copying everything unless `skip_presave`, in which case the
    /// current state is fingerprinted but not pushed (subsequent edits still
    /// sync).
    pub fn prepare(&mut self) -> Result<CycleSummary, EngineError> {
        fs::create_dir_all(&self.dest).map_err(|source| EngineError::DestinationUnavailable {
            path: self.dest.clone(),
            source,
        })?;

        if self.wipe_dest {
            fs::remove_dir_all(&self.dest).map_err(|source| {
                EngineError::DestinationUnavailable {
                    path: self.dest.clone(),
                    source,
                }
            })?;
            fs::create_dir_all(&self.dest).map_err(|source| {
                EngineError::DestinationUnavailable {
                    path: self.dest.clone(),
                    source,
                }
            })?;
            tracing::info!(dest = %self.dest.display(), "wiped destination");
        }

        let mut summary = CycleSummary::default();
        for src in self.sources()? {
            let fingerprint = match Fingerprint::of(&src) {
                Ok(fp) => fp,
                Err(err) => {
                    tracing::warn!(path = %src.display(), error = %err, "cannot stat source, skipping");
                    summary.skipped += 1;
                    continue;
                }
            };
            if self.skip_presave {
                self.records.insert(src, fingerprint);
                continue;
            }
            if self.copy_to_mirror(&src) {
                summary.copied += 1;
                self.records.insert(src, fingerprint);
            } else {
                summary.skipped += 1;
            }
        }
        Ok(summary)
    }

    /// One poll cycle. See the module docs for the protocol.
    pub fn cycle(&mut self) -> Result<CycleSummary, EngineError> {
        // Destination root gone (device unplugged) is fatal, checked once per
        // cycle before any per-file work.
        fs::metadata(&self.dest).map_err(|source| EngineError::DestinationUnavailable {
            path: self.dest.clone(),
            source,
        })?;

        let sources = self.sources()?;
        let mut next = FileRecord::new();
        let mut summary = CycleSummary::default();

        for src in &sources {
            let fingerprint = match Fingerprint::of(src) {
                Ok(fp) => fp,
                Err(err) => {
                    // Stat blip: keep the previous record so the mirror copy
                    // is not treated as deleted.
                    tracing::warn!(path = %src.display(), error = %err, "cannot stat source, skipping");
                    summary.skipped += 1;
                    if let Some(old) = self.records.get(src) {
                        next.insert(src.clone(), *old);
                    }
                    continue;
                }
            };

            match self.records.get(src) {
                Some(old) if *old == fingerprint => {
                    summary.unchanged += 1;
                    next.insert(src.clone(), fingerprint);
                }
                previous => {
                    if self.copy_to_mirror(src) {
                        summary.copied += 1;
                        next.insert(src.clone(), fingerprint);
                    } else {
                        summary.skipped += 1;
                        // Keep the stale record (if any) so a changed file is
                        // retried as changed, and a new file as new.
                        if let Some(old) = previous {
                            next.insert(src.clone(), *old);
                        }
                    }
                }
            }
        }

        // Sources that vanished since the previous cycle: remove the mirror
        // copy and prune directories left empty inside the mirrored tree.
        let removed: Vec<PathBuf> = self
            .records
            .keys()
            .filter(|src| !sources.contains(*src))
            .cloned()
            .collect();
        for src in removed {
            if self.delete_from_mirror(&src) {
                summary.deleted += 1;
            } else {
                summary.skipped += 1;
                // Retry the deletion next cycle.
                if let Some(old) = self.records.get(&src) {
                    next.insert(src, *old);
                }
            }
        }

        self.records = next;
        Ok(summary)
    }

    /// Destination paths of every file currently tracked, in sorted order.
    /// This is the set of mirror files the engine considers its own.
    pub fn tracked_destinations(&self) -> BTreeSet<PathBuf> {
        self.records.keys().map(|src| self.mirror_path(src)).collect()
    }

    /// Current source set. A literal spec that has disappeared mid-run is an
    /// empty set here — the mirror copy gets deleted like any other vanished
    /// source; start-time existence is validated by the caller.
    fn sources(&self) -> Result<BTreeSet<PathBuf>, EngineError> {
        match self.matcher.resolve() {
            Ok(set) => Ok(set),
            Err(EngineError::ReadSpecNotFound { .. }) => Ok(BTreeSet::new()),
            Err(err) => Err(err),
        }
    }

    /// Destination path for a source file, preserving its position relative
    /// to the layout root. Sources outside the root (should not happen —
    /// validated at start) fall back to their bare file name.
    fn mirror_path(&self, src: &Path) -> PathBuf {
        match src.strip_prefix(&self.layout_root) {
            Ok(rel) => self.dest.join(rel),
            Err(_) => self.dest.join(src.file_name().unwrap_or(src.as_os_str())),
        }
    }

    /// Copy one file into the mirror. Transient failures are logged and
    /// reported as `false`; the caller decides how to record them.
    fn copy_to_mirror(&self, src: &Path) -> bool {
        let dest_file = self.mirror_path(src);
        if let Some(parent) = dest_file.parent() {
            if let Err(err) = fs::create_dir_all(parent) {
                tracing::warn!(path = %parent.display(), error = %err, "cannot create mirror directory");
                return false;
            }
        }
        match fs::copy(src, &dest_file) {
            Ok(_) => {
                tracing::debug!(src = %src.display(), dest = %dest_file.display(), "mirrored");
                true
            }
            Err(err) => {
                tracing::warn!(src = %src.display(), error = %err, "copy failed, skipping this cycle");
                false
            }
        }
    }

    /// Remove one file from the mirror, then prune now-empty ancestor
    /// directories strictly inside the mirrored tree. Directories outside the
    /// destination root — or the root itself — are never touched.
    fn delete_from_mirror(&self, src: &Path) -> bool {
        let dest_file = self.mirror_path(src);
        if dest_file.exists() {
            if let Err(err) = fs::remove_file(&dest_file) {
                tracing::warn!(path = %dest_file.display(), error = %err, "delete failed, retrying next cycle");
                return false;
            }
            tracing::debug!(path = %dest_file.display(), "removed from mirror");
        }

        let mut dir = dest_file.parent();
        while let Some(current) = dir {
            if current == self.dest || !current.starts_with(&self.dest) {
                break;
            }
            match fs::read_dir(current) {
                Ok(mut entries) => {
                    if entries.next().is_none() {
                        if fs::remove_dir(current).is_err() {
                            break;
                        }
                    } else {
                        break;
                    }
                }
                _ => break,
            }
            dir = current.parent();
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
