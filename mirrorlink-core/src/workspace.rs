//! Named workspace snapshots of link definitions.
//!
//! # Storage layout
//!
//! ```text
//! ~/.mirrorlink/
//!   workspaces/<name>.yaml   (one file per saved workspace — mode 0600)
//!   current_workspace        (plain-text name, empty when the registry no
//!                             longer matches any snapshot)
//! ```
//!
//! A workspace captures link *definitions* only — process identifiers, active
//! state, and the one-shot wipe/skip flags are stripped on save. Loading
//! materializes fresh, inactive records; it never spawns anything.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::RegistryError;
use crate::registry;
use crate::types::{Link, LinkId, Workspace, WorkspaceName};

pub const WORKSPACES_DIR: &str = "workspaces";
pub const CURRENT_WORKSPACE_FILE: &str = "current_workspace";

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.mirrorlink/workspaces/` — creates the directory if absent.
pub fn workspaces_dir_at(home: &Path) -> Result<PathBuf, RegistryError> {
    let dir = registry::app_dir_at(home)?.join(WORKSPACES_DIR);
    if !dir.exists() {
        fs::create_dir_all(&dir)?;
    }
    Ok(dir)
}

/// `<home>/.mirrorlink/workspaces/<name>.yaml` — pure, no I/O.
pub fn workspace_path_at(home: &Path, name: &WorkspaceName) -> PathBuf {
    home.join(".mirrorlink")
        .join(WORKSPACES_DIR)
        .join(format!("{}.yaml", name.0))
}

fn current_path_at(home: &Path) -> PathBuf {
    home.join(".mirrorlink").join(CURRENT_WORKSPACE_FILE)
}

// ---------------------------------------------------------------------------
// 2. Current workspace name
// ---------------------------------------------------------------------------

/// The name of the workspace the registry was last loaded from, if any.
pub fn current_at(home: &Path) -> Result<Option<WorkspaceName>, RegistryError> {
    let path = current_path_at(home);
    if !path.exists() {
        return Ok(None);
    }
    let name = fs::read_to_string(&path)?;
    let name = name.trim();
    if name.is_empty() {
        Ok(None)
    } else {
        Ok(Some(WorkspaceName::from(name.to_owned())))
    }
}

/// `current_at` convenience wrapper.
pub fn current() -> Result<Option<WorkspaceName>, RegistryError> {
    current_at(&registry::home()?)
}

/// Record (or blank, with `None`) the current workspace name. Starting or
/// clearing a link blanks it — the registry no longer matches the snapshot.
pub fn set_current_at(home: &Path, name: Option<&WorkspaceName>) -> Result<(), RegistryError> {
    registry::app_dir_at(home)?;
    let contents = name.map(|n| n.0.as_str()).unwrap_or("");
    fs::write(current_path_at(home), contents)?;
    Ok(())
}

/// `set_current_at` convenience wrapper.
pub fn set_current(name: Option<&WorkspaceName>) -> Result<(), RegistryError> {
    set_current_at(&registry::home()?, name)
}

// ---------------------------------------------------------------------------
// 3. Save / load
// ---------------------------------------------------------------------------

/// Snapshot all current link definitions under `name`.
///
/// Fails with [`RegistryError::WorkspaceExists`] if the name is taken and
/// `overwrite` is false, and with [`RegistryError::NothingToSave`] when the
/// registry is empty.
pub fn save_at(home: &Path, name: &WorkspaceName, overwrite: bool) -> Result<(), RegistryError> {
    let path = workspace_path_at(home, name);
    if path.exists() && !overwrite {
        return Err(RegistryError::WorkspaceExists { name: name.clone() });
    }

    let registry = registry::load_at(home)?;
    if registry.links.is_empty() {
        return Err(RegistryError::NothingToSave);
    }

    let workspace = Workspace {
        name: name.clone(),
        links: registry.links.iter().map(|l| l.config.stripped()).collect(),
        created_at: Utc::now(),
    };

    write_workspace(home, &path, &workspace)?;
    set_current_at(home, Some(name))?;
    Ok(())
}

/// `save_at` convenience wrapper.
pub fn save(name: &WorkspaceName, overwrite: bool) -> Result<(), RegistryError> {
    save_at(&registry::home()?, name, overwrite)
}

/// Read a snapshot without touching the registry.
pub fn read_at(home: &Path, name: &WorkspaceName) -> Result<Workspace, RegistryError> {
    let path = workspace_path_at(home, name);
    if !path.exists() {
        return Err(RegistryError::WorkspaceNotFound { name: name.clone() });
    }
    let contents = fs::read_to_string(&path)?;
    serde_yaml::from_str(&contents).map_err(|e| RegistryError::Parse { path, source: e })
}

/// Replace the registry content with the snapshot's definitions.
///
/// All-or-nothing: fails with [`RegistryError::RegistryNotEmpty`] if the
/// registry holds any link (active or not) and mutates nothing in that case.
/// Materialized links get fresh identifiers and start inactive — loading
/// defines, it does not spawn.
pub fn load_at(home: &Path, name: &WorkspaceName) -> Result<Vec<Link>, RegistryError> {
    let workspace = read_at(home, name)?;

    let links = registry::mutate_at(home, |registry| {
        if !registry.links.is_empty() {
            return Err(RegistryError::RegistryNotEmpty);
        }
        let mut created = Vec::with_capacity(workspace.links.len());
        for config in &workspace.links {
            let id = LinkId(registry.next_id);
            registry.next_id += 1;
            let mut link = Link::new(id, config.clone());
            link.active = false;
            registry.links.push(link.clone());
            created.push(link);
        }
        Ok(created)
    })?;

    set_current_at(home, Some(name))?;
    Ok(links)
}

/// `load_at` convenience wrapper.
pub fn load(name: &WorkspaceName) -> Result<Vec<Link>, RegistryError> {
    load_at(&registry::home()?, name)
}

// ---------------------------------------------------------------------------
// 4. List / delete / rename
// ---------------------------------------------------------------------------

/// Names of all saved workspaces, sorted.
pub fn list_at(home: &Path) -> Result<Vec<WorkspaceName>, RegistryError> {
    let dir = home.join(".mirrorlink").join(WORKSPACES_DIR);
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut names: Vec<WorkspaceName> = fs::read_dir(&dir)?
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let file_name = e.file_name();
            let name = file_name.to_string_lossy();
            name.strip_suffix(".yaml")
                .map(|stem| WorkspaceName::from(stem.to_owned()))
        })
        .collect();
    names.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(names)
}

/// `list_at` convenience wrapper.
pub fn list() -> Result<Vec<WorkspaceName>, RegistryError> {
    list_at(&registry::home()?)
}

/// Delete a snapshot. Blanks the current-workspace name if it pointed here.
pub fn delete_at(home: &Path, name: &WorkspaceName) -> Result<(), RegistryError> {
    let path = workspace_path_at(home, name);
    if !path.exists() {
        return Err(RegistryError::WorkspaceNotFound { name: name.clone() });
    }
    fs::remove_file(&path)?;
    if current_at(home)?.as_ref() == Some(name) {
        set_current_at(home, None)?;
    }
    Ok(())
}

/// `delete_at` convenience wrapper.
pub fn delete(name: &WorkspaceName) -> Result<(), RegistryError> {
    delete_at(&registry::home()?, name)
}

/// Rename a snapshot. Fails with [`RegistryError::WorkspaceExists`] if the new
/// name is taken.
pub fn rename_at(
    home: &Path,
    old: &WorkspaceName,
    new: &WorkspaceName,
) -> Result<(), RegistryError> {
    let old_path = workspace_path_at(home, old);
    if !old_path.exists() {
        return Err(RegistryError::WorkspaceNotFound { name: old.clone() });
    }
    let new_path = workspace_path_at(home, new);
    if new_path.exists() {
        return Err(RegistryError::WorkspaceExists { name: new.clone() });
    }

    let mut workspace = read_at(home, old)?;
    workspace.name = new.clone();
    write_workspace(home, &new_path, &workspace)?;
    fs::remove_file(&old_path)?;

    if current_at(home)?.as_ref() == Some(old) {
        set_current_at(home, Some(new))?;
    }
    Ok(())
}

/// `rename_at` convenience wrapper.
pub fn rename(old: &WorkspaceName, new: &WorkspaceName) -> Result<(), RegistryError> {
    rename_at(&registry::home()?, old, new)
}

// ---------------------------------------------------------------------------
// 5. Export / import
// ---------------------------------------------------------------------------

/// Copy the snapshot's serialized form to `dest` for transfer between
/// machines. `dest` may be a directory (the `<name>.yaml` filename is kept)
/// or a full file path.
pub fn export_at(
    home: &Path,
    name: &WorkspaceName,
    dest: &Path,
) -> Result<PathBuf, RegistryError> {
    let workspace = read_at(home, name)?;
    let target = if dest.is_dir() {
        dest.join(format!("{}.yaml", name.0))
    } else {
        dest.to_path_buf()
    };
    let yaml = serde_yaml::to_string(&workspace)?;
    fs::write(&target, yaml)?;
    Ok(target)
}

/// `export_at` convenience wrapper.
pub fn export(name: &WorkspaceName, dest: &Path) -> Result<PathBuf, RegistryError> {
    export_at(&registry::home()?, name, dest)
}

/// Import a serialized workspace file into the store under its embedded name.
/// Fails with [`RegistryError::WorkspaceExists`] when that name is taken and
/// `overwrite` is false.
pub fn import_at(
    home: &Path,
    file: &Path,
    overwrite: bool,
) -> Result<WorkspaceName, RegistryError> {
    let contents = fs::read_to_string(file)?;
    let workspace: Workspace = serde_yaml::from_str(&contents).map_err(|e| {
        RegistryError::Parse {
            path: file.to_path_buf(),
            source: e,
        }
    })?;

    let path = workspace_path_at(home, &workspace.name);
    if path.exists() && !overwrite {
        return Err(RegistryError::WorkspaceExists {
            name: workspace.name.clone(),
        });
    }
    write_workspace(home, &path, &workspace)?;
    Ok(workspace.name)
}

/// `import_at` convenience wrapper.
pub fn import(file: &Path, overwrite: bool) -> Result<WorkspaceName, RegistryError> {
    import_at(&registry::home()?, file, overwrite)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

/// Atomic snapshot write: `.tmp` sibling → `chmod 0600` → `rename`.
fn write_workspace(
    home: &Path,
    path: &Path,
    workspace: &Workspace,
) -> Result<(), RegistryError> {
    workspaces_dir_at(home)?;
    let tmp = path.with_file_name(format!("{}.yaml.tmp", workspace.name.0));
    let yaml = serde_yaml::to_string(workspace)?;
    fs::write(&tmp, yaml)?;
    registry::set_file_permissions(&tmp)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LinkConfig;
    use tempfile::TempDir;

    fn make_home() -> TempDir {
        TempDir::new().expect("tempdir")
    }

    fn config(read_spec: &str) -> LinkConfig {
        LinkConfig {
            name: Some("bench".to_owned()),
            read_spec: read_spec.to_owned(),
            recursive: false,
            write_path: PathBuf::from("/mnt/device"),
            base_dir: PathBuf::from("/home/user"),
            absolute: true,
            wipe_dest: true,
            skip_presave: true,
        }
    }

    fn ws(name: &str) -> WorkspaceName {
        WorkspaceName::from(name)
    }

    #[test]
    fn save_with_empty_registry_fails() {
        let home = make_home();
        let err = save_at(home.path(), &ws("empty"), false).unwrap_err();
        assert!(matches!(err, RegistryError::NothingToSave));
    }

    #[test]
    fn save_strips_runtime_fields_and_one_shot_flags() {
        let home = make_home();
        registry::create_at(home.path(), config("*.txt")).expect("create");

        save_at(home.path(), &ws("bench"), false).expect("save");
        let workspace = read_at(home.path(), &ws("bench")).expect("read");

        assert_eq!(workspace.links.len(), 1);
        let snap = &workspace.links[0];
        assert!(!snap.wipe_dest, "wipe_dest is one-shot, must not persist");
        assert!(!snap.skip_presave, "skip_presave is one-shot, must not persist");
        assert_eq!(snap.read_spec, "*.txt");
    }

    #[test]
    fn save_existing_name_without_overwrite_is_conflict() {
        let home = make_home();
        registry::create_at(home.path(), config("*.txt")).expect("create");
        save_at(home.path(), &ws("bench"), false).expect("first save");

        let err = save_at(home.path(), &ws("bench"), false).unwrap_err();
        assert!(matches!(err, RegistryError::WorkspaceExists { .. }));

        // Overwrite succeeds.
        save_at(home.path(), &ws("bench"), true).expect("overwrite");
    }

    #[test]
    fn load_over_nonempty_registry_is_conflict_and_noop() {
        let home = make_home();
        let link = registry::create_at(home.path(), config("*.txt")).expect("create");
        save_at(home.path(), &ws("bench"), false).expect("save");

        // Registry still holds a link (even inactive registries must refuse).
        registry::update_at(home.path(), link.id, |l| l.active = false).expect("deactivate");
        let before = registry::load_at(home.path()).expect("load before");
        let err = load_at(home.path(), &ws("bench")).unwrap_err();
        assert!(matches!(err, RegistryError::RegistryNotEmpty));
        let after = registry::load_at(home.path()).expect("load after");
        assert_eq!(before, after, "failed load must not mutate the registry");
    }

    #[test]
    fn load_materializes_inactive_links_with_fresh_ids() {
        let home = make_home();
        let original = registry::create_at(home.path(), config("*.txt")).expect("create");
        save_at(home.path(), &ws("bench"), false).expect("save");
        registry::remove_at(home.path(), original.id, true).expect("clear");

        let loaded = load_at(home.path(), &ws("bench")).expect("load");
        assert_eq!(loaded.len(), 1);
        assert!(!loaded[0].active, "loaded links must not be running");
        assert!(loaded[0].pid.is_none());
        assert_ne!(loaded[0].id, original.id, "fresh identifier expected");
        assert_eq!(
            current_at(home.path()).expect("current"),
            Some(ws("bench"))
        );
    }

    #[test]
    fn load_missing_workspace_is_not_found() {
        let home = make_home();
        let err = load_at(home.path(), &ws("ghost")).unwrap_err();
        assert!(matches!(err, RegistryError::WorkspaceNotFound { .. }));
    }

    #[test]
    fn list_is_sorted_and_empty_when_no_store() {
        let home = make_home();
        assert!(list_at(home.path()).expect("list").is_empty());

        registry::create_at(home.path(), config("*.txt")).expect("create");
        save_at(home.path(), &ws("zeta"), false).expect("save zeta");
        save_at(home.path(), &ws("alpha"), false).expect("save alpha");

        let names = list_at(home.path()).expect("list");
        assert_eq!(names, vec![ws("alpha"), ws("zeta")]);
    }

    #[test]
    fn rename_to_existing_name_is_conflict() {
        let home = make_home();
        registry::create_at(home.path(), config("*.txt")).expect("create");
        save_at(home.path(), &ws("a"), false).expect("save a");
        save_at(home.path(), &ws("b"), true).expect("save b");

        let err = rename_at(home.path(), &ws("a"), &ws("b")).unwrap_err();
        assert!(matches!(err, RegistryError::WorkspaceExists { .. }));
    }

    #[test]
    fn rename_updates_embedded_name_and_current_pointer() {
        let home = make_home();
        registry::create_at(home.path(), config("*.txt")).expect("create");
        save_at(home.path(), &ws("old"), false).expect("save");

        rename_at(home.path(), &ws("old"), &ws("new")).expect("rename");
        assert!(!workspace_path_at(home.path(), &ws("old")).exists());
        let workspace = read_at(home.path(), &ws("new")).expect("read");
        assert_eq!(workspace.name, ws("new"));
        assert_eq!(current_at(home.path()).expect("current"), Some(ws("new")));
    }

    #[test]
    fn delete_blanks_current_pointer() {
        let home = make_home();
        registry::create_at(home.path(), config("*.txt")).expect("create");
        save_at(home.path(), &ws("gone"), false).expect("save");

        delete_at(home.path(), &ws("gone")).expect("delete");
        assert_eq!(current_at(home.path()).expect("current"), None);
        let err = read_at(home.path(), &ws("gone")).unwrap_err();
        assert!(matches!(err, RegistryError::WorkspaceNotFound { .. }));
    }

    #[test]
    fn export_import_roundtrip_between_homes() {
        let home_a = make_home();
        let home_b = make_home();
        let transfer = make_home();

        registry::create_at(home_a.path(), config("src/*.py")).expect("create");
        save_at(home_a.path(), &ws("portable"), false).expect("save");

        let file = export_at(home_a.path(), &ws("portable"), transfer.path()).expect("export");
        let imported = import_at(home_b.path(), &file, false).expect("import");
        assert_eq!(imported, ws("portable"));

        let workspace = read_at(home_b.path(), &ws("portable")).expect("read imported");
        assert_eq!(workspace.links.len(), 1);
        assert_eq!(workspace.links[0].read_spec, "src/*.py");

        // A second import without overwrite conflicts.
        let err = import_at(home_b.path(), &file, false).unwrap_err();
        assert!(matches!(err, RegistryError::WorkspaceExists { .. }));
    }
}
