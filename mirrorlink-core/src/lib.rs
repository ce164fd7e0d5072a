//! Mirrorlink core library — domain types, link registry, workspaces, settings.
//!
//! Public API surface:
//! - [`types`] — newtypes and domain structs
//! - [`error`] — [`RegistryError`]
//! - [`registry`] — the locked, persisted link table
//! - [`ledger`] — per-file claims of mirror destinations
//! - [`workspace`] — named snapshots of link definitions
//! - [`settings`] — user settings with dot-path view/edit

pub mod error;
pub mod ledger;
pub mod registry;
pub mod settings;
pub mod types;
pub mod workspace;

pub use error::RegistryError;
pub use ledger::LedgerEntry;
pub use settings::Settings;
pub use types::{Link, LinkConfig, LinkId, LinkSelector, Registry, Workspace, WorkspaceName};
