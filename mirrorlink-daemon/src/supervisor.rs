//! Lifecycle of detached engine processes: spawn with a readiness handshake,
//! liveness probing, cooperative stop, and restart.
//!
//! Each link is backed by one OS process running `<exe> run <id>`. The parent
//! never holds a `Child` handle past the handshake — once the child has
//! published its pid into the registry, the registry record *is* the
//! supervision state, shared by every later CLI invocation.

use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Instant;

use sysinfo::{Pid, ProcessesToUpdate, Signal, System};

use mirrorlink_core::{ledger, registry, Link, LinkConfig, LinkId, RegistryError};

use crate::error::{io_err, DaemonError};
use crate::log_rotation::rotate_link_log;
use crate::paths::{self, POLL_STEP, SPAWN_CONFIRM_BUDGET, STOP_BUDGET};

/// Create a registry record for `config` and spawn a detached engine process
/// for it. Blocks until the child publishes its pid (the readiness
/// confirmation) or [`SPAWN_CONFIRM_BUDGET`] elapses — on timeout the child is
/// killed and the record removed, so a failed start leaves no trace.
pub fn spawn_at(home: &Path, config: LinkConfig, exe: &Path) -> Result<Link, DaemonError> {
    let link = registry::create_at(home, config)?;

    paths::ensure_logs_dir(home)?;
    let log_path = paths::link_log_path(home, link.id);
    rotate_link_log(&log_path);
    let log = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|e| io_err(&log_path, e))?;
    let log_err = log.try_clone().map_err(|e| io_err(&log_path, e))?;

    let mut command = Command::new(exe);
    command
        .arg("run")
        .arg(link.id.to_string())
        .current_dir(&link.config.base_dir)
        .stdin(Stdio::null())
        .stdout(log)
        .stderr(log_err);
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        // Own process group: the engine must outlive the CLI's session.
        command.process_group(0);
    }

    let mut child = command.spawn().map_err(|source| {
        let _ = registry::remove_at(home, link.id, true);
        DaemonError::SpawnFailed {
            id: link.id,
            source,
        }
    })?;

    let deadline = Instant::now() + SPAWN_CONFIRM_BUDGET;
    loop {
        if let Ok(Some(status)) = child.try_wait() {
            // Died before confirming (bad spec raced, unreadable registry).
            let _ = registry::remove_at(home, link.id, true);
            return Err(DaemonError::SpawnFailed {
                id: link.id,
                source: std::io::Error::other(format!("engine process exited early: {status}")),
            });
        }
        let current = registry::get_at(home, link.id)?;
        if current.pid.is_some() {
            tracing::info!(id = %link.id, pid = ?current.pid, "link started");
            return Ok(current);
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = registry::remove_at(home, link.id, true);
            return Err(DaemonError::SpawnTimeout { id: link.id });
        }
        std::thread::sleep(POLL_STEP);
    }
}

/// Whether a process with this pid currently exists. Non-blocking.
pub fn is_alive(pid: u32) -> bool {
    let target = Pid::from_u32(pid);
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::Some(&[target]));
    sys.process(target).is_some()
}

/// A link's effective run state: active in the registry *and* backed by a
/// live process.
pub fn is_running(link: &Link) -> bool {
    link.active && link.pid.map(is_alive).unwrap_or(false)
}

/// Stop a link's engine process.
///
/// Cooperative first: set `stop_requested` and wait up to [`STOP_BUDGET`] for
/// the engine to observe it and mark itself inactive. A stale record (active
/// but process dead) is reconciled to inactive immediately. On timeout,
/// `force` sends SIGTERM and marks the record inactive; without it the caller
/// gets [`DaemonError::StopTimeout`].
pub fn terminate_at(home: &Path, id: LinkId, force: bool) -> Result<Link, DaemonError> {
    let link = registry::get_at(home, id)?;
    if !link.active {
        return Err(DaemonError::NotRunning { id });
    }

    if !link.pid.map(is_alive).unwrap_or(false) {
        tracing::warn!(%id, "active record with no live process, reconciling");
        return Ok(mark_stopped(home, id)?);
    }

    registry::update_at(home, id, |l| l.stop_requested = true)?;

    let deadline = Instant::now() + STOP_BUDGET;
    loop {
        let current = registry::get_at(home, id)?;
        if !current.active {
            return Ok(current);
        }
        if Instant::now() >= deadline {
            break;
        }
        std::thread::sleep(POLL_STEP);
    }

    if !force {
        return Err(DaemonError::StopTimeout { id });
    }

    if let Some(pid) = link.pid {
        kill(pid);
    }
    Ok(mark_stopped(home, id)?)
}

/// Replace a stopped link with a fresh one built from its definition, one-shot
/// flags reset. The old record is removed; the new link gets a new id.
pub fn restart_at(home: &Path, id: LinkId, exe: &Path) -> Result<Link, DaemonError> {
    let link = registry::get_at(home, id)?;
    if is_running(&link) {
        return Err(RegistryError::LinkActive { id }.into());
    }
    if link.active {
        // Stale record; reconcile so remove() sees an inactive link.
        mark_stopped(home, id)?;
    }
    registry::remove_at(home, id, false)?;
    spawn_at(home, link.config.stripped(), exe)
}

fn mark_stopped(home: &Path, id: LinkId) -> Result<Link, RegistryError> {
    // The backing process is dead or being killed, so it will not release
    // its own write ledger claims.
    if let Err(err) = ledger::release_link_at(home, id) {
        tracing::warn!(%id, error = %err, "cannot release write ledger entries");
    }
    registry::update_at(home, id, |l| {
        l.active = false;
        l.stop_requested = false;
        l.pid = None;
    })
}

fn kill(pid: u32) {
    let target = Pid::from_u32(pid);
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::Some(&[target]));
    if let Some(process) = sys.process(target) {
        let _ = process.kill_with(Signal::Term);
        tracing::info!(pid, "sent SIGTERM to engine process");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
