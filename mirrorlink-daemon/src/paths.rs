use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use mirrorlink_core::LinkId;

use crate::error::{io_err, DaemonError};

/// How long the spawning process waits for the child to publish its pid.
pub const SPAWN_CONFIRM_BUDGET: Duration = Duration::from_secs(5);
/// How long a cooperative stop waits for the engine to mark itself inactive.
pub const STOP_BUDGET: Duration = Duration::from_secs(5);
/// Step between registry polls while waiting on the child.
pub const POLL_STEP: Duration = Duration::from_millis(100);

pub fn logs_dir(home: &Path) -> PathBuf {
    home.join(".mirrorlink").join("logs")
}

/// `<home>/.mirrorlink/logs/link-<id>.log` — combined stdout/stderr of the
/// detached engine process for one link.
pub fn link_log_path(home: &Path, id: LinkId) -> PathBuf {
    logs_dir(home).join(format!("link-{id}.log"))
}

pub fn ensure_logs_dir(home: &Path) -> Result<PathBuf, DaemonError> {
    let dir = logs_dir(home);
    fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
    Ok(dir)
}
