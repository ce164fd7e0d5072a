//! Error types for mirrorlink-engine.
//!
//! Only *fatal* conditions become error values: a bad pattern, a read spec
//! that must exist but doesn't, or an unreachable destination root. Transient
//! single-file failures inside a poll cycle are logged and skipped by the
//! engine, never surfaced.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from matching and mirroring.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The read spec is not a valid glob pattern.
    #[error("invalid glob pattern '{spec}': {source}")]
    Pattern {
        spec: String,
        #[source]
        source: glob::PatternError,
    },

    /// A literal (non-wildcard) read spec that names no existing file.
    #[error("read path '{spec}' does not exist or is not a file")]
    ReadSpecNotFound { spec: String },

    /// The destination root is missing or unreachable; the mirror cannot
    /// continue (device unplugged, root deleted). Fatal to the loop.
    #[error("destination '{path}' is unavailable: {source}")]
    DestinationUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
