//! Domain types for the mirrorlink registry.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem paths.
//! All persisted types are serializable/deserializable via serde + serde_yaml.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed link identifier. Assigned monotonically by the registry
/// and never reused, even after the record is cleared.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct LinkId(pub u64);

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for LinkId {
    fn from(n: u64) -> Self {
        Self(n)
    }
}

/// A strongly-typed name for a saved workspace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkspaceName(pub String);

impl fmt::Display for WorkspaceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for WorkspaceName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for WorkspaceName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Selectors
// ---------------------------------------------------------------------------

/// Target of a registry query: a concrete id, the most recently created link,
/// or every link in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSelector {
    Id(LinkId),
    Last,
    All,
}

impl FromStr for LinkSelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "last" => Ok(Self::Last),
            other => other
                .parse::<u64>()
                .map(|n| Self::Id(LinkId(n)))
                .map_err(|_| format!("link must be an ID, \"last\", or \"all\" (got '{other}')")),
        }
    }
}

impl fmt::Display for LinkSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => id.fmt(f),
            Self::Last => write!(f, "last"),
            Self::All => write!(f, "all"),
        }
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// The spawnable definition of a sync task: everything needed to start a link,
/// with no runtime state. This is what workspaces snapshot and what restart
/// re-uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Literal file path or glob pattern, resolved against `base_dir`.
    pub read_spec: String,
    #[serde(default)]
    pub recursive: bool,
    /// Destination directory of the mirror.
    pub write_path: PathBuf,
    /// Directory the read spec is resolved against; mirror layout is computed
    /// relative to this.
    pub base_dir: PathBuf,
    /// True when the write path was given as-is (`--path`), false when it was
    /// joined onto a detected device mount.
    #[serde(default)]
    pub absolute: bool,
    /// One-shot: recursively wipe the destination before the initial save.
    #[serde(default)]
    pub wipe_dest: bool,
    /// One-shot: skip the initial full copy pass.
    #[serde(default)]
    pub skip_presave: bool,
}

impl LinkConfig {
    /// The definition with runtime one-shot flags reset, as stored in
    /// workspace snapshots and used by restart.
    pub fn stripped(&self) -> LinkConfig {
        LinkConfig {
            wipe_dest: false,
            skip_presave: false,
            ..self.clone()
        }
    }
}

/// One sync task, active or historical. The central registry entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub id: LinkId,
    #[serde(flatten)]
    pub config: LinkConfig,
    /// True while a backing process is (believed to be) running the engine.
    pub active: bool,
    /// Cooperative end flag, polled by the engine loop at the top of each cycle.
    #[serde(default)]
    pub stop_requested: bool,
    /// Backing process identifier; absent until the child publishes it, cleared
    /// on clean exit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl Link {
    pub fn new(id: LinkId, config: LinkConfig) -> Self {
        Self {
            id,
            config,
            active: true,
            stop_requested: false,
            pid: None,
            created_at: Utc::now(),
        }
    }

    /// Display name for listings: the user-supplied name or `---`.
    pub fn display_name(&self) -> &str {
        self.config.name.as_deref().unwrap_or("---")
    }
}

/// Root of the persisted link table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    pub version: u32,
    /// Next identifier to assign. Monotonic; never decremented.
    pub next_id: u64,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            version: 1,
            next_id: 1,
            links: Vec::new(),
        }
    }
}

impl Registry {
    pub fn get(&self, id: LinkId) -> Option<&Link> {
        self.links.iter().find(|l| l.id == id)
    }

    pub fn get_mut(&mut self, id: LinkId) -> Option<&mut Link> {
        self.links.iter_mut().find(|l| l.id == id)
    }

    /// The most recently created link, by identifier.
    pub fn last(&self) -> Option<&Link> {
        self.links.iter().max_by_key(|l| l.id)
    }
}

/// A named snapshot of link definitions, for bulk save/restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub name: WorkspaceName,
    #[serde(default)]
    pub links: Vec<LinkConfig>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
