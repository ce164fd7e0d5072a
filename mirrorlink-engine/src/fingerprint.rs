//! File-change fingerprints.
//!
//! A fingerprint is the comparison key deciding copy-needed vs unchanged
//! between poll cycles: modification time plus byte size. It is held only in
//! memory, per running engine, and rebuilt from a fresh scan every cycle.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Last-observed state of one source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint {
    pub modified: SystemTime,
    pub len: u64,
}

impl Fingerprint {
    /// Stat the file. Errors bubble to the caller, which treats them as a
    /// transient skip for the cycle.
    pub fn of(path: &Path) -> io::Result<Self> {
        let meta = std::fs::metadata(path)?;
        Ok(Self {
            modified: meta.modified()?,
            len: meta.len(),
        })
    }
}

/// Source path → last-observed fingerprint, for one running engine.
pub type FileRecord = BTreeMap<PathBuf, Fingerprint>;
