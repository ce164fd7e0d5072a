//! User settings with an explicit lifecycle: loaded once at command start,
//! re-read only after `config edit`/`config reset`. No ambient global state.
//!
//! Stored as YAML at `~/.mirrorlink/settings.yaml`; `config view`/`config edit`
//! address individual values with dot paths (`display.table.format`).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::error::RegistryError;
use crate::registry;

pub const SETTINGS_FILE: &str = "settings.yaml";

// ---------------------------------------------------------------------------
// Typed settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub display: DisplaySettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DisplaySettings {
    #[serde(default)]
    pub info: InfoSettings,
    #[serde(default)]
    pub table: TableSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct InfoSettings {
    /// Show the backing process id column in `list` output.
    #[serde(rename = "process-id", default)]
    pub process_id: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSettings {
    /// Table style name understood by the listing renderer.
    pub format: String,
}

impl Default for TableSettings {
    fn default() -> Self {
        Self {
            format: "rounded".to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// Load / save / reset
// ---------------------------------------------------------------------------

/// `<home>/.mirrorlink/settings.yaml` — pure, no I/O.
pub fn settings_path_at(home: &Path) -> PathBuf {
    home.join(".mirrorlink").join(SETTINGS_FILE)
}

/// Load settings; a missing file yields the defaults (and is written out so
/// `config view` has something to show).
pub fn load_at(home: &Path) -> Result<Settings, RegistryError> {
    let path = settings_path_at(home);
    if !path.exists() {
        let defaults = Settings::default();
        save_at(home, &defaults)?;
        return Ok(defaults);
    }
    let contents = fs::read_to_string(&path)?;
    serde_yaml::from_str(&contents).map_err(|e| RegistryError::Parse { path, source: e })
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Settings, RegistryError> {
    load_at(&registry::home()?)
}

/// Atomic save: `.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_at(home: &Path, settings: &Settings) -> Result<(), RegistryError> {
    registry::app_dir_at(home)?;
    let path = settings_path_at(home);
    let tmp = path.with_file_name(format!("{SETTINGS_FILE}.tmp"));
    let yaml = serde_yaml::to_string(settings)?;
    fs::write(&tmp, yaml)?;
    registry::set_file_permissions(&tmp)?;
    fs::rename(&tmp, &path)?;
    Ok(())
}

/// Restore the defaults on disk.
pub fn reset_at(home: &Path) -> Result<Settings, RegistryError> {
    let defaults = Settings::default();
    save_at(home, &defaults)?;
    Ok(defaults)
}

/// `reset_at` convenience wrapper.
pub fn reset() -> Result<Settings, RegistryError> {
    reset_at(&registry::home()?)
}

// ---------------------------------------------------------------------------
// Dot-path view / edit
// ---------------------------------------------------------------------------

/// Fetch the value at a dot path (`display.info.process-id`), or the whole
/// tree for an empty path / `"all"`.
pub fn view_at(home: &Path, key: &str) -> Result<Value, RegistryError> {
    let settings = load_at(home)?;
    let tree = serde_yaml::to_value(&settings)?;
    if key.is_empty() || key == "all" {
        return Ok(tree);
    }
    lookup(&tree, key)
        .cloned()
        .ok_or_else(|| RegistryError::SettingNotFound {
            key: key.to_owned(),
        })
}

/// Set the value at a dot path, preserving the existing value's type:
/// booleans only accept `true`/`false`, mappings cannot be assigned directly.
/// The result must still deserialize as [`Settings`] before it is saved.
pub fn edit_at(home: &Path, key: &str, raw: &str) -> Result<Settings, RegistryError> {
    let settings = load_at(home)?;
    let mut tree = serde_yaml::to_value(&settings)?;

    let existing = lookup(&tree, key)
        .cloned()
        .ok_or_else(|| RegistryError::SettingNotFound {
            key: key.to_owned(),
        })?;

    let new_value = match existing {
        Value::Bool(_) => match raw.to_ascii_lowercase().as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => {
                return Err(RegistryError::SettingType {
                    key: key.to_owned(),
                    value: raw.to_owned(),
                    expected: "a boolean (true/false)",
                })
            }
        },
        Value::String(_) => Value::String(raw.to_owned()),
        Value::Mapping(_) => {
            return Err(RegistryError::SettingType {
                key: key.to_owned(),
                value: raw.to_owned(),
                expected: "a leaf setting, not a section",
            })
        }
        _ => Value::String(raw.to_owned()),
    };

    let slot = lookup_mut(&mut tree, key).ok_or_else(|| RegistryError::SettingNotFound {
        key: key.to_owned(),
    })?;
    *slot = new_value;

    let updated: Settings = serde_yaml::from_value(tree)?;
    save_at(home, &updated)?;
    Ok(updated)
}

fn lookup<'a>(tree: &'a Value, key: &str) -> Option<&'a Value> {
    key.split('.')
        .try_fold(tree, |node, part| node.get(part))
}

fn lookup_mut<'a>(tree: &'a mut Value, key: &str) -> Option<&'a mut Value> {
    key.split('.')
        .try_fold(tree, |node, part| node.get_mut(part))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    fn make_home() -> TempDir {
        TempDir::new().expect("tempdir")
    }

    #[test]
    fn first_load_writes_defaults() {
        let home = make_home();
        let settings = load_at(home.path()).expect("load");
        assert_eq!(settings, Settings::default());
        assert!(settings_path_at(home.path()).exists());
        assert!(!settings.display.info.process_id);
        assert_eq!(settings.display.table.format, "rounded");
    }

    #[rstest]
    #[case("display.info.process-id")]
    #[case("display.table.format")]
    #[case("display")]
    #[case("all")]
    fn view_resolves_known_paths(#[case] key: &str) {
        let home = make_home();
        view_at(home.path(), key).expect("view");
    }

    #[test]
    fn view_unknown_path_is_not_found() {
        let home = make_home();
        let err = view_at(home.path(), "display.colors").unwrap_err();
        assert!(matches!(err, RegistryError::SettingNotFound { .. }));
    }

    #[test]
    fn edit_bool_persists() {
        let home = make_home();
        let updated =
            edit_at(home.path(), "display.info.process-id", "true").expect("edit");
        assert!(updated.display.info.process_id);

        // Changes survive an independent reload.
        let reloaded = load_at(home.path()).expect("reload");
        assert!(reloaded.display.info.process_id);
    }

    #[test]
    fn edit_bool_rejects_non_bool() {
        let home = make_home();
        let err = edit_at(home.path(), "display.info.process-id", "yes").unwrap_err();
        assert!(matches!(err, RegistryError::SettingType { .. }));
    }

    #[test]
    fn edit_section_is_rejected() {
        let home = make_home();
        let err = edit_at(home.path(), "display.table", "plain").unwrap_err();
        assert!(matches!(err, RegistryError::SettingType { .. }));
    }

    #[test]
    fn edit_string_accepts_any_value() {
        let home = make_home();
        let updated = edit_at(home.path(), "display.table.format", "markdown").expect("edit");
        assert_eq!(updated.display.table.format, "markdown");
    }

    #[test]
    fn reset_restores_defaults() {
        let home = make_home();
        edit_at(home.path(), "display.info.process-id", "true").expect("edit");
        let settings = reset_at(home.path()).expect("reset");
        assert_eq!(settings, Settings::default());
    }
}
