//! Process supervision for detached mirror engines: spawn/stop/restart, the
//! `run <id>` runtime entry, and per-link log rotation.

mod error;
pub mod log_rotation;
pub mod paths;
pub mod runtime;
pub mod supervisor;

pub use error::DaemonError;
pub use runtime::run_link_at;
pub use supervisor::{is_alive, is_running, restart_at, spawn_at, terminate_at};
