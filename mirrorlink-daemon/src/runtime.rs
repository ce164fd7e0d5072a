//! Entry point of the detached engine process (`run <id>`).
//!
//! The process publishes its own pid into the link record as the readiness
//! confirmation the spawning CLI is polling for, then drives the mirror loop
//! until the record asks it to stop or disappears. Each time the engine's
//! tracked destination set changes, the set is published to the write ledger
//! so other processes can see which mirror files this link claims.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use mirrorlink_core::{ledger, registry, LinkId, RegistryError};
use mirrorlink_engine::{EngineError, MirrorConfig, MirrorEngine, DEFAULT_POLL_INTERVAL};

use crate::error::DaemonError;

/// Run the engine for one link until stopped. Blocks the calling thread for
/// the life of the link.
///
/// Stdout/stderr are expected to already point at the link log; tracing
/// writes to stderr. A fatal engine error marks the record inactive and is
/// returned so the process can exit non-zero. Ledger claims are released on
/// the way out, clean exit or not.
pub fn run_link_at(home: &Path, id: LinkId) -> Result<(), DaemonError> {
    init_tracing();

    let link = registry::update_at(home, id, |l| l.pid = Some(std::process::id()))?;
    tracing::info!(%id, pid = std::process::id(), spec = %link.config.read_spec, "engine process started");

    let mut engine = MirrorEngine::new(MirrorConfig {
        read_spec: link.config.read_spec.clone(),
        base_dir: link.config.base_dir.clone(),
        recursive: link.config.recursive,
        write_path: link.config.write_path.clone(),
        wipe_dest: link.config.wipe_dest,
        skip_presave: link.config.skip_presave,
    })?;

    let result = drive(home, id, &mut engine);

    if let Err(err) = ledger::release_link_at(home, id) {
        tracing::warn!(%id, error = %err, "cannot release write ledger entries");
    }

    match result {
        Ok(()) => {
            // Record may be gone already if the link was force-cleared.
            match registry::update_at(home, id, |l| {
                l.active = false;
                l.stop_requested = false;
                l.pid = None;
            }) {
                Ok(_) | Err(RegistryError::LinkNotFound { .. }) => {}
                Err(err) => return Err(err.into()),
            }
            tracing::info!(%id, "link stopped");
            Ok(())
        }
        Err(err) => {
            tracing::error!(%id, error = %err, "mirror loop failed");
            let _ = registry::update_at(home, id, |l| {
                l.active = false;
                l.pid = None;
            });
            Err(err.into())
        }
    }
}

/// The loop proper: startup pass, then cycle/publish/sleep until the stop
/// predicate fires (observed at the top of each cycle) or a fatal error.
fn drive(home: &Path, id: LinkId, engine: &mut MirrorEngine) -> Result<(), EngineError> {
    let pid = std::process::id();
    let seeded = engine.prepare()?;
    tracing::info!(
        copied = seeded.copied,
        skipped = seeded.skipped,
        "initial save complete"
    );

    let mut claimed = BTreeSet::new();
    publish_claims(home, id, pid, engine, &mut claimed);

    loop {
        if should_stop(home, id) {
            tracing::info!("stop requested, ending mirror loop");
            return Ok(());
        }
        let summary = engine.cycle()?;
        if summary.copied > 0 || summary.deleted > 0 {
            tracing::info!(
                copied = summary.copied,
                deleted = summary.deleted,
                skipped = summary.skipped,
                "mirror updated"
            );
        }
        publish_claims(home, id, pid, engine, &mut claimed);
        std::thread::sleep(DEFAULT_POLL_INTERVAL);
    }
}

/// Push the engine's tracked destination set to the write ledger when it
/// differs from what was last published. Ledger trouble never stops the
/// mirror; the push is retried on the next cycle.
fn publish_claims(
    home: &Path,
    id: LinkId,
    pid: u32,
    engine: &MirrorEngine,
    claimed: &mut BTreeSet<PathBuf>,
) {
    let current = engine.tracked_destinations();
    if current == *claimed {
        return;
    }
    match ledger::sync_link_at(home, id, pid, &current) {
        Ok(()) => *claimed = current,
        Err(err) => tracing::warn!(%id, error = %err, "cannot update write ledger"),
    }
}

/// Stop predicate, evaluated at the top of each poll cycle: stop when the
/// record requests it or no longer exists.
fn should_stop(home: &Path, id: LinkId) -> bool {
    match registry::get_at(home, id) {
        Ok(link) => link.stop_requested,
        Err(RegistryError::LinkNotFound { .. }) => true,
        // Transient registry trouble (lock contention, unreadable file):
        // keep mirroring, re-check next cycle.
        Err(err) => {
            tracing::warn!(%id, error = %err, "cannot read own record");
            false
        }
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use mirrorlink_core::LinkConfig;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn run_link_without_record_is_not_found() {
        let home = TempDir::new().unwrap();
        let err = run_link_at(home.path(), LinkId(42)).unwrap_err();
        assert!(matches!(
            err,
            DaemonError::Registry(RegistryError::LinkNotFound { .. })
        ));
    }

    #[test]
    fn stop_predicate_tracks_the_record() {
        let home = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let link = registry::create_at(
            home.path(),
            LinkConfig {
                name: None,
                read_spec: "*.txt".to_owned(),
                recursive: false,
                write_path: work.path().join("dest"),
                base_dir: work.path().to_path_buf(),
                absolute: true,
                wipe_dest: false,
                skip_presave: false,
            },
        )
        .unwrap();

        assert!(!should_stop(home.path(), link.id));

        registry::update_at(home.path(), link.id, |l| l.stop_requested = true).unwrap();
        assert!(should_stop(home.path(), link.id));

        registry::remove_at(home.path(), link.id, true).unwrap();
        assert!(should_stop(home.path(), link.id), "gone record stops the loop");
    }

    #[test]
    fn ledger_claims_follow_the_tracked_set() {
        let home = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let dest = work.path().join("dest");
        let a = work.path().join("a.txt");
        fs::write(&a, "alpha").unwrap();

        let mut engine = MirrorEngine::new(MirrorConfig {
            read_spec: "*.txt".to_owned(),
            base_dir: work.path().to_path_buf(),
            recursive: false,
            write_path: dest.clone(),
            wipe_dest: false,
            skip_presave: false,
        })
        .unwrap();
        engine.prepare().unwrap();

        let id = LinkId(1);
        let mut claimed = BTreeSet::new();
        publish_claims(home.path(), id, 100, &engine, &mut claimed);

        let entries = ledger::load_at(home.path()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].write_path, dest.join("a.txt"));
        assert_eq!(entries[0].link_id, id);

        // A vanished source releases its claim on the next publish.
        fs::remove_file(&a).unwrap();
        engine.cycle().unwrap();
        publish_claims(home.path(), id, 100, &engine, &mut claimed);
        assert!(ledger::load_at(home.path()).unwrap().is_empty());
    }
}
