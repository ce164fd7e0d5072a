use std::path::PathBuf;

use thiserror::Error;

use mirrorlink_core::LinkId;

/// Error surface for process supervision and the detached engine runtime.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("registry error: {0}")]
    Registry(#[from] mirrorlink_core::RegistryError),

    #[error("engine error: {0}")]
    Engine(#[from] mirrorlink_engine::EngineError),

    #[error("failed to spawn engine process for link {id}: {source}")]
    SpawnFailed {
        id: LinkId,
        #[source]
        source: std::io::Error,
    },

    #[error("engine process for link {id} did not confirm startup in time")]
    SpawnTimeout { id: LinkId },

    #[error("link {id} did not stop in time (use --force to kill it)")]
    StopTimeout { id: LinkId },

    #[error("link {id} is not running")]
    NotRunning { id: LinkId },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
