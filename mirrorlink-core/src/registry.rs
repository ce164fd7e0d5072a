//! Persisted, process-shared link table.
//!
//! # Storage layout
//!
//! ```text
//! ~/.mirrorlink/
//!   registry.yaml   (whole link table — mode 0600, atomic tmp+rename on save)
//!   registry.lock   (exclusive-mutation lockfile, created O_EXCL)
//! ```
//!
//! # Concurrency discipline
//!
//! The table is mutated by the CLI process and by every detached engine process
//! (each updating its own record). Every mutation goes through [`mutate_at`]:
//! acquire the lockfile with bounded retry/backoff, read the whole table, apply
//! the closure, write atomically, release. Reads are lock-free.
//!
//! # API pattern
//!
//! Every function has two forms:
//! - `fn_at(home: &Path, …)` — explicit home; used in tests with `TempDir`
//! - `fn(…)` — derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! Tests must NEVER call the no-arg wrappers; always use `_at`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use crate::error::RegistryError;
use crate::types::{Link, LinkConfig, LinkId, LinkSelector, Registry};

pub const REGISTRY_FILE: &str = "registry.yaml";
pub const LOCK_FILE: &str = "registry.lock";

/// Total time budget for acquiring the mutation lock.
const LOCK_RETRY_BUDGET: Duration = Duration::from_secs(5);
/// A lockfile older than this belongs to a crashed holder and is broken.
const LOCK_STALE_AFTER: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.mirrorlink/` — creates the directory (mode `0700`) if absent.
pub fn app_dir_at(home: &Path) -> Result<PathBuf, RegistryError> {
    let dir = home.join(".mirrorlink");
    if !dir.exists() {
        fs::create_dir_all(&dir)?;
        set_dir_permissions(&dir)?;
    }
    Ok(dir)
}

/// `<home>/.mirrorlink/registry.yaml` — pure, no I/O.
pub fn registry_path_at(home: &Path) -> PathBuf {
    home.join(".mirrorlink").join(REGISTRY_FILE)
}

/// `<home>/.mirrorlink/registry.lock` — pure, no I/O.
pub fn lock_path_at(home: &Path) -> PathBuf {
    home.join(".mirrorlink").join(LOCK_FILE)
}

pub(crate) fn home() -> Result<PathBuf, RegistryError> {
    dirs::home_dir().ok_or(RegistryError::HomeNotFound)
}

// ---------------------------------------------------------------------------
// 2. Lock guard
// ---------------------------------------------------------------------------

/// Exclusive mutation lock over one store file. Held for the duration of one
/// read-modify-write, never across mirror I/O. Removed on drop.
pub(crate) struct RegistryLock {
    path: PathBuf,
}

impl RegistryLock {
    /// Acquire the registry lock under `home`.
    fn acquire(home: &Path) -> Result<Self, RegistryError> {
        app_dir_at(home)?;
        Self::acquire_path(lock_path_at(home))
    }

    /// Acquire an arbitrary lockfile with bounded retry and backoff (25ms
    /// doubling to 400ms). Lockfiles older than [`LOCK_STALE_AFTER`] are
    /// broken before retrying.
    pub(crate) fn acquire_path(path: PathBuf) -> Result<Self, RegistryError> {
        let deadline = Instant::now() + LOCK_RETRY_BUDGET;
        let mut backoff = Duration::from_millis(25);

        loop {
            match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(Self { path }),
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                    if break_stale_lock(&path) {
                        continue;
                    }
                    if Instant::now() >= deadline {
                        return Err(RegistryError::LockContended { path });
                    }
                    std::thread::sleep(backoff);
                    backoff = (backoff * 2).min(Duration::from_millis(400));
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

impl Drop for RegistryLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Break a lockfile whose holder has crashed. The file is renamed to a
/// per-process name before removal, so the remove can never hit a fresh lock
/// that a faster contender has already broken and re-created at the canonical
/// path. Returns `true` when the canonical path may now be free and the
/// caller should retry creation immediately.
fn break_stale_lock(path: &Path) -> bool {
    if !lock_is_stale(path) {
        return false;
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| LOCK_FILE.to_owned());
    let aside = path.with_file_name(format!("{name}.break-{}", std::process::id()));

    if fs::rename(path, &aside).is_err() {
        // Another contender moved it aside first.
        return true;
    }
    if lock_is_stale(&aside) {
        let _ = fs::remove_file(&aside);
    } else {
        // The holder cycled the lock between the staleness check and the
        // rename. Hand it back; hard_link refuses to clobber any lock a
        // contender created at the canonical path in the meantime.
        let _ = fs::hard_link(&aside, path);
        let _ = fs::remove_file(&aside);
    }
    true
}

fn lock_is_stale(path: &Path) -> bool {
    let Ok(meta) = fs::metadata(path) else {
        return false;
    };
    let Ok(modified) = meta.modified() else {
        return false;
    };
    SystemTime::now()
        .duration_since(modified)
        .map(|age| age > LOCK_STALE_AFTER)
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// 3. Load / save
// ---------------------------------------------------------------------------

/// Load the whole table. A missing file is an empty registry, not an error
/// (links may never have been started on this machine).
pub fn load_at(home: &Path) -> Result<Registry, RegistryError> {
    let path = registry_path_at(home);
    if !path.exists() {
        return Ok(Registry::default());
    }
    let contents = fs::read_to_string(&path)?;
    serde_yaml::from_str(&contents).map_err(|e| RegistryError::Parse { path, source: e })
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Registry, RegistryError> {
    load_at(&home()?)
}

/// Atomically save the whole table: serialize → `.tmp` sibling → `chmod 0600`
/// → `rename`. The `.tmp` lives next to the target so the rename never crosses
/// filesystems, and concurrent readers only ever observe complete tables.
pub fn save_at(home: &Path, registry: &Registry) -> Result<(), RegistryError> {
    app_dir_at(home)?;
    let path = registry_path_at(home);
    let tmp = path.with_file_name(format!("{REGISTRY_FILE}.tmp"));

    let yaml = serde_yaml::to_string(registry)?;
    fs::write(&tmp, yaml)?;
    set_file_permissions(&tmp)?;
    fs::rename(&tmp, &path)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// 4. Locked read-modify-write
// ---------------------------------------------------------------------------

/// Run one exclusive read-modify-write against the table. The closure's value
/// is returned after the table is durably saved, so callers can rely on the
/// mutation existing once this function returns.
pub fn mutate_at<T>(
    home: &Path,
    f: impl FnOnce(&mut Registry) -> Result<T, RegistryError>,
) -> Result<T, RegistryError> {
    let _lock = RegistryLock::acquire(home)?;
    let mut registry = load_at(home)?;
    let value = f(&mut registry)?;
    save_at(home, &registry)?;
    Ok(value)
}

// ---------------------------------------------------------------------------
// 5. Operations
// ---------------------------------------------------------------------------

/// Append a new link record and assign the next identifier. Durable before
/// returning — a child process spawned afterwards will find its record.
pub fn create_at(home: &Path, config: LinkConfig) -> Result<Link, RegistryError> {
    mutate_at(home, |registry| {
        let id = LinkId(registry.next_id);
        registry.next_id += 1;
        let link = Link::new(id, config);
        registry.links.push(link.clone());
        Ok(link)
    })
}

/// `create_at` convenience wrapper.
pub fn create(config: LinkConfig) -> Result<Link, RegistryError> {
    create_at(&home()?, config)
}

/// Apply `f` to the record with this id under the exclusive lock.
/// Returns the updated record.
pub fn update_at(
    home: &Path,
    id: LinkId,
    f: impl FnOnce(&mut Link),
) -> Result<Link, RegistryError> {
    mutate_at(home, |registry| {
        let link = registry
            .get_mut(id)
            .ok_or(RegistryError::LinkNotFound { id })?;
        f(link);
        Ok(link.clone())
    })
}

/// `update_at` convenience wrapper.
pub fn update(id: LinkId, f: impl FnOnce(&mut Link)) -> Result<Link, RegistryError> {
    update_at(&home()?, id, f)
}

/// Fetch a single record. Lock-free read.
pub fn get_at(home: &Path, id: LinkId) -> Result<Link, RegistryError> {
    load_at(home)?
        .get(id)
        .cloned()
        .ok_or(RegistryError::LinkNotFound { id })
}

/// `get_at` convenience wrapper.
pub fn get(id: LinkId) -> Result<Link, RegistryError> {
    get_at(&home()?, id)
}

/// Resolve a selector to concrete records, sorted by id. `Last` and a concrete
/// id fail with `LinkNotFound` when no record matches; `All` may be empty.
pub fn select_at(home: &Path, selector: LinkSelector) -> Result<Vec<Link>, RegistryError> {
    let registry = load_at(home)?;
    match selector {
        LinkSelector::Id(id) => registry
            .get(id)
            .cloned()
            .map(|l| vec![l])
            .ok_or(RegistryError::LinkNotFound { id }),
        LinkSelector::Last => registry
            .last()
            .cloned()
            .map(|l| vec![l])
            .ok_or(RegistryError::LinkNotFound {
                id: LinkId(registry.next_id.saturating_sub(1)),
            }),
        LinkSelector::All => {
            let mut links = registry.links;
            links.sort_by_key(|l| l.id);
            Ok(links)
        }
    }
}

/// `select_at` convenience wrapper.
pub fn select(selector: LinkSelector) -> Result<Vec<Link>, RegistryError> {
    select_at(&home()?, selector)
}

/// Remove a record. Fails with [`RegistryError::LinkActive`] if the link is
/// active and `force` is not set; the table is left unchanged in that case.
pub fn remove_at(home: &Path, id: LinkId, force: bool) -> Result<Link, RegistryError> {
    mutate_at(home, |registry| {
        let link = registry
            .get(id)
            .cloned()
            .ok_or(RegistryError::LinkNotFound { id })?;
        if link.active && !force {
            return Err(RegistryError::LinkActive { id });
        }
        registry.links.retain(|l| l.id != id);
        Ok(link)
    })
}

/// `remove_at` convenience wrapper.
pub fn remove(id: LinkId, force: bool) -> Result<Link, RegistryError> {
    remove_at(&home()?, id, force)
}

/// All records currently marked active, sorted by id. Lock-free read.
pub fn list_active_at(home: &Path) -> Result<Vec<Link>, RegistryError> {
    let mut links: Vec<Link> = load_at(home)?
        .links
        .into_iter()
        .filter(|l| l.active)
        .collect();
    links.sort_by_key(|l| l.id);
    Ok(links)
}

/// `list_active_at` convenience wrapper.
pub fn list_active() -> Result<Vec<Link>, RegistryError> {
    list_active_at(&home()?)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), RegistryError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), RegistryError> {
    Ok(())
}

#[cfg(unix)]
pub(crate) fn set_file_permissions(path: &Path) -> Result<(), RegistryError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
pub(crate) fn set_file_permissions(_path: &Path) -> Result<(), RegistryError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn make_home() -> TempDir {
        TempDir::new().expect("tempdir")
    }

    fn config(read_spec: &str) -> LinkConfig {
        LinkConfig {
            name: None,
            read_spec: read_spec.to_owned(),
            recursive: false,
            write_path: PathBuf::from("/mnt/device"),
            base_dir: PathBuf::from("/home/user"),
            absolute: true,
            wipe_dest: false,
            skip_presave: false,
        }
    }

    #[test]
    fn empty_registry_when_file_missing() {
        let home = make_home();
        let registry = load_at(home.path()).expect("load");
        assert!(registry.links.is_empty());
        assert_eq!(registry.next_id, 1);
    }

    #[test]
    fn create_assigns_monotonic_ids() {
        let home = make_home();
        let a = create_at(home.path(), config("a.txt")).expect("create a");
        let b = create_at(home.path(), config("b.txt")).expect("create b");
        assert_eq!(a.id, LinkId(1));
        assert_eq!(b.id, LinkId(2));
    }

    #[test]
    fn ids_are_never_reused_after_removal() {
        let home = make_home();
        let a = create_at(home.path(), config("a.txt")).expect("create");
        remove_at(home.path(), a.id, true).expect("remove");
        let b = create_at(home.path(), config("b.txt")).expect("create again");
        assert_eq!(b.id, LinkId(2), "cleared ids must not be reassigned");
    }

    #[test]
    fn create_is_durable_before_returning() {
        let home = make_home();
        let link = create_at(home.path(), config("a.txt")).expect("create");
        // A fresh load (what a spawned child does) must see the record.
        let reloaded = load_at(home.path()).expect("reload");
        assert!(reloaded.get(link.id).is_some());
    }

    #[test]
    fn atomic_save_cleans_up_tmp() {
        let home = make_home();
        create_at(home.path(), config("a.txt")).expect("create");
        let tmp = registry_path_at(home.path()).with_file_name("registry.yaml.tmp");
        assert!(!tmp.exists(), ".tmp must be gone after successful save");
    }

    #[test]
    fn remove_active_without_force_is_conflict_and_noop() {
        let home = make_home();
        let link = create_at(home.path(), config("a.txt")).expect("create");
        assert!(link.active);

        let err = remove_at(home.path(), link.id, false).unwrap_err();
        assert!(matches!(err, RegistryError::LinkActive { .. }));
        // Idempotent failure: record must still exist, unchanged.
        let reloaded = get_at(home.path(), link.id).expect("still present");
        assert_eq!(reloaded, link);
    }

    #[test]
    fn remove_inactive_succeeds_without_force() {
        let home = make_home();
        let link = create_at(home.path(), config("a.txt")).expect("create");
        update_at(home.path(), link.id, |l| l.active = false).expect("deactivate");
        remove_at(home.path(), link.id, false).expect("remove");
        let err = get_at(home.path(), link.id).unwrap_err();
        assert!(matches!(err, RegistryError::LinkNotFound { .. }));
    }

    #[test]
    fn update_missing_link_is_not_found() {
        let home = make_home();
        let err = update_at(home.path(), LinkId(42), |l| l.active = false).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::LinkNotFound { id: LinkId(42) }
        ));
    }

    #[test]
    fn select_last_returns_highest_id() {
        let home = make_home();
        create_at(home.path(), config("a.txt")).expect("create");
        let b = create_at(home.path(), config("b.txt")).expect("create");
        let selected = select_at(home.path(), LinkSelector::Last).expect("select last");
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, b.id);
    }

    #[test]
    fn select_all_on_empty_registry_is_empty() {
        let home = make_home();
        let selected = select_at(home.path(), LinkSelector::All).expect("select all");
        assert!(selected.is_empty());
    }

    #[test]
    fn select_last_on_empty_registry_is_not_found() {
        let home = make_home();
        let err = select_at(home.path(), LinkSelector::Last).unwrap_err();
        assert!(matches!(err, RegistryError::LinkNotFound { .. }));
    }

    #[test]
    fn list_active_filters_stopped_links() {
        let home = make_home();
        let a = create_at(home.path(), config("a.txt")).expect("create");
        let b = create_at(home.path(), config("b.txt")).expect("create");
        update_at(home.path(), a.id, |l| l.active = false).expect("deactivate");

        let active = list_active_at(home.path()).expect("list");
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, b.id);
    }

    #[test]
    fn concurrent_creates_yield_distinct_ids() {
        let home = make_home();
        let home_path = home.path().to_path_buf();

        let handles: Vec<_> = (0..8)
            .map(|n| {
                let home = home_path.clone();
                std::thread::spawn(move || {
                    create_at(&home, config(&format!("file{n}.txt")))
                        .expect("concurrent create")
                        .id
                })
            })
            .collect();

        let ids: BTreeSet<LinkId> = handles
            .into_iter()
            .map(|h| h.join().expect("join"))
            .collect();
        assert_eq!(ids.len(), 8, "every create must get a unique id");
    }

    #[test]
    fn stale_lock_is_broken() {
        let home = make_home();
        app_dir_at(home.path()).expect("app dir");
        let lock = lock_path_at(home.path());
        fs::write(&lock, "").expect("plant lock");
        // Age the lockfile past the staleness threshold.
        let old = SystemTime::now() - Duration::from_secs(60);
        let file = fs::OpenOptions::new().write(true).open(&lock).expect("open");
        file.set_modified(old).expect("backdate lock");
        drop(file);

        // A mutation must succeed by breaking the stale lock.
        create_at(home.path(), config("a.txt")).expect("create despite stale lock");
    }

    #[test]
    fn fresh_lock_is_not_broken() {
        let home = make_home();
        app_dir_at(home.path()).expect("app dir");
        let lock = lock_path_at(home.path());
        fs::write(&lock, "").expect("plant lock");

        assert!(!break_stale_lock(&lock));
        assert!(lock.exists(), "a live holder's lock must stay in place");
    }

    #[test]
    fn breaking_a_stale_lock_leaves_no_aside_file() {
        let home = make_home();
        app_dir_at(home.path()).expect("app dir");
        let lock = lock_path_at(home.path());
        fs::write(&lock, "").expect("plant lock");
        let old = SystemTime::now() - Duration::from_secs(60);
        let file = fs::OpenOptions::new().write(true).open(&lock).expect("open");
        file.set_modified(old).expect("backdate lock");
        drop(file);

        assert!(break_stale_lock(&lock));
        assert!(!lock.exists(), "stale lock must be gone");
        let residue: Vec<_> = fs::read_dir(lock.parent().expect("parent"))
            .expect("read dir")
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".break-"))
            .collect();
        assert!(residue.is_empty(), "no renamed-aside lockfile may remain");
    }

    #[test]
    fn mutation_error_leaves_lock_released() {
        let home = make_home();
        let err = remove_at(home.path(), LinkId(9), false).unwrap_err();
        assert!(matches!(err, RegistryError::LinkNotFound { .. }));
        assert!(
            !lock_path_at(home.path()).exists(),
            "lockfile must be released after a failed mutation"
        );
    }
}
