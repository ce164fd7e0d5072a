//! File mirroring engine.
//!
//! This crate owns the mechanics of keeping one destination directory in sync
//! with a read spec: resolving the spec to a source set ([`matcher`]),
//! detecting per-file change ([`fingerprint`]), and the prepare/cycle passes
//! themselves ([`engine`]). It knows nothing about link records, processes,
//! or persistence; callers construct a [`MirrorEngine`] from a
//! [`MirrorConfig`] and drive the cycles at their own pace.

pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod matcher;

pub use engine::{CycleSummary, MirrorConfig, MirrorEngine, DEFAULT_POLL_INTERVAL};
pub use error::EngineError;
pub use fingerprint::{FileRecord, Fingerprint};
pub use matcher::PathMatcher;
