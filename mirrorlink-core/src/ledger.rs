//! Per-file write ledger: which mirror files are claimed by which link.
//!
//! Every engine process publishes the destination paths it currently tracks,
//! so `mirrorlink ledger` can answer "what is writing where" across links.
//! Stored as YAML at `~/.mirrorlink/ledger.yaml` with its own lockfile,
//! mutated under the same locked read-modify-write discipline as the
//! registry. Entries are released when their link stops.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::RegistryError;
use crate::registry::{self, RegistryLock};
use crate::types::LinkId;

pub const LEDGER_FILE: &str = "ledger.yaml";
pub const LEDGER_LOCK_FILE: &str = "ledger.lock";

/// One claimed mirror file: where it is written, by which link, from which
/// engine process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub write_path: PathBuf,
    pub link_id: LinkId,
    pub pid: u32,
}

/// `<home>/.mirrorlink/ledger.yaml` — pure, no I/O.
pub fn ledger_path_at(home: &Path) -> PathBuf {
    home.join(".mirrorlink").join(LEDGER_FILE)
}

fn lock_path_at(home: &Path) -> PathBuf {
    home.join(".mirrorlink").join(LEDGER_LOCK_FILE)
}

/// Load all entries, sorted by link id then write path. A missing file is an
/// empty ledger.
pub fn load_at(home: &Path) -> Result<Vec<LedgerEntry>, RegistryError> {
    let path = ledger_path_at(home);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let contents = fs::read_to_string(&path)?;
    let mut entries: Vec<LedgerEntry> =
        serde_yaml::from_str(&contents).map_err(|e| RegistryError::Parse { path, source: e })?;
    entries.sort_by(|a, b| (a.link_id, &a.write_path).cmp(&(b.link_id, &b.write_path)));
    Ok(entries)
}

fn save_at(home: &Path, entries: &[LedgerEntry]) -> Result<(), RegistryError> {
    registry::app_dir_at(home)?;
    let path = ledger_path_at(home);
    let tmp = path.with_file_name(format!("{LEDGER_FILE}.tmp"));
    let yaml = serde_yaml::to_string(entries)?;
    fs::write(&tmp, yaml)?;
    registry::set_file_permissions(&tmp)?;
    fs::rename(&tmp, &path)?;
    Ok(())
}

fn mutate_at(
    home: &Path,
    f: impl FnOnce(&mut Vec<LedgerEntry>) -> Result<(), RegistryError>,
) -> Result<(), RegistryError> {
    registry::app_dir_at(home)?;
    let _lock = RegistryLock::acquire_path(lock_path_at(home))?;
    let mut entries = load_at(home)?;
    f(&mut entries)?;
    save_at(home, &entries)
}

/// Replace one link's entries with its current destination set. Called by the
/// engine process each time its tracked set changes.
pub fn sync_link_at(
    home: &Path,
    id: LinkId,
    pid: u32,
    write_paths: &BTreeSet<PathBuf>,
) -> Result<(), RegistryError> {
    mutate_at(home, |entries| {
        entries.retain(|e| e.link_id != id);
        entries.extend(write_paths.iter().map(|path| LedgerEntry {
            write_path: path.clone(),
            link_id: id,
            pid,
        }));
        Ok(())
    })
}

/// Drop every entry a link holds. Called when the link stops, cleanly or not.
pub fn release_link_at(home: &Path, id: LinkId) -> Result<(), RegistryError> {
    mutate_at(home, |entries| {
        entries.retain(|e| e.link_id != id);
        Ok(())
    })
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
