//! Removable-device discovery for write paths given without `--path`.
//!
//! Resolution order: the `MIRRORLINK_DEVICE` environment variable when set,
//! otherwise the first directory under the platform's removable-media roots.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

pub const DEVICE_ENV: &str = "MIRRORLINK_DEVICE";

/// Mount point the write path is joined onto when `--path` is not given.
pub fn find_device() -> Result<PathBuf> {
    if let Some(path) = std::env::var_os(DEVICE_ENV) {
        let path = PathBuf::from(path);
        if !path.is_dir() {
            bail!(
                "{DEVICE_ENV} points at '{}', which is not a directory",
                path.display()
            );
        }
        return Ok(path);
    }

    match find_device_in(&media_roots()) {
        Some(path) => Ok(path),
        None => bail!(
            "no connected device found; plug one in, set {DEVICE_ENV}, \
             or pass --path to use the write path as given"
        ),
    }
}

/// First mounted directory under any of the candidate roots, in order.
fn find_device_in(roots: &[PathBuf]) -> Option<PathBuf> {
    for root in roots {
        let Ok(entries) = std::fs::read_dir(root) else {
            continue;
        };
        let mut mounts: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        mounts.sort();
        if let Some(first) = mounts.into_iter().next() {
            return Some(first);
        }
    }
    None
}

fn media_roots() -> Vec<PathBuf> {
    let mut roots = vec![PathBuf::from("/Volumes")];
    if let Ok(user) = std::env::var("USER") {
        roots.push(Path::new("/media").join(&user));
        roots.push(Path::new("/run/media").join(&user));
    }
    roots
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn picks_first_mount_under_first_root_with_entries() {
        let empty = TempDir::new().unwrap();
        let media = TempDir::new().unwrap();
        std::fs::create_dir(media.path().join("SDCARD")).unwrap();
        std::fs::create_dir(media.path().join("USB0")).unwrap();

        let found = find_device_in(&[
            empty.path().to_path_buf(),
            media.path().to_path_buf(),
        ]);
        assert_eq!(found, Some(media.path().join("SDCARD")));
    }

    #[test]
    fn files_under_a_root_are_not_mounts() {
        let media = TempDir::new().unwrap();
        std::fs::write(media.path().join("notes.txt"), "x").unwrap();
        assert_eq!(find_device_in(&[media.path().to_path_buf()]), None);
    }

    #[test]
    fn missing_roots_yield_nothing() {
        assert_eq!(
            find_device_in(&[PathBuf::from("/definitely/not/a/root")]),
            None
        );
    }
}
