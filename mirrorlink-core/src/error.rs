//! Error types for mirrorlink-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::{LinkId, WorkspaceName};

/// All errors that can arise from registry, workspace, and settings operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Underlying I/O failure (file not found, permission denied, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load — includes file path and line context from serde_yaml.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None` — cannot locate `~/.mirrorlink/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// No link with this identifier exists in the registry.
    #[error("link #{id} does not exist")]
    LinkNotFound { id: LinkId },

    /// Conflict: the link is active and the operation was not forced.
    #[error("link #{id} is active; stop it first or use --force")]
    LinkActive { id: LinkId },

    /// Conflict: loading a workspace requires an empty registry.
    #[error("registry is not empty; stop and clear all links before loading a workspace")]
    RegistryNotEmpty,

    /// No workspace with this name exists.
    #[error("workspace '{name}' does not exist")]
    WorkspaceNotFound { name: WorkspaceName },

    /// Conflict: a workspace with this name already exists.
    #[error("workspace '{name}' already exists; use --overwrite to replace it")]
    WorkspaceExists { name: WorkspaceName },

    /// There are no links in the registry to snapshot.
    #[error("no links in the history, nothing to save")]
    NothingToSave,

    /// Exclusive registry lock could not be acquired within the retry budget.
    #[error("registry is locked by another process (lock file: {path})")]
    LockContended { path: PathBuf },

    /// Unknown settings key in a `config view`/`config edit` dot path.
    #[error("setting '{key}' does not exist")]
    SettingNotFound { key: String },

    /// A settings value of the wrong type for the targeted key.
    #[error("cannot use '{value}' for setting '{key}': expected {expected}")]
    SettingType {
        key: String,
        value: String,
        expected: &'static str,
    },
}
