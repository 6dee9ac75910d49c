//! Advisory lock files and atomic file replacement.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use tracing::{debug, warn};

use crate::StoreError;

const RETRY_INTERVAL: Duration = Duration::from_millis(20);

/// Holds `<file>.lock` until dropped.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
}

impl LockGuard {
    /// Acquire the lock beside `target`, waiting up to `timeout`.
    ///
    /// A lock file older than `stale_after` is assumed abandoned and
    /// reclaimed. Locks are advisory: only writers going through this type
    /// respect them.
    pub fn acquire(target: &Path, timeout: Duration, stale_after: Duration) -> Result<Self, StoreError> {
        let path = sibling(target, ".lock");
        let deadline = Instant::now() + timeout;
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    if let Err(err) = writeln!(file, "{}", std::process::id()) {
                        warn!(lock = %path.display(), %err, "could not record owner pid");
                    }
                    debug!(lock = %path.display(), "lock acquired");
                    return Ok(Self { path });
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    if is_stale(&path, stale_after) && reclaim(&path, stale_after) {
                        continue;
                    }
                    if Instant::now() >= deadline {
                        return Err(StoreError::Locked(path));
                    }
                    thread::sleep(RETRY_INTERVAL);
                }
                Err(err) => return Err(StoreError::io(&path, err)),
            }
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            warn!(lock = %self.path.display(), %err, "failed to release lock");
        }
    }
}

fn sibling(target: &Path, suffix: &str) -> PathBuf {
    let mut name = target.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(suffix);
    target.with_file_name(name)
}

fn is_stale(path: &Path, stale_after: Duration) -> bool {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age > stale_after)
}

fn remove_logged(path: &Path, what: &str) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => true,
        Err(err) if err.kind() == ErrorKind::NotFound => false,
        Err(err) => {
            warn!(path = %path.display(), %err, "failed to remove {what}");
            false
        }
    }
}

/// Remove a stale lock file. Reclaimers serialise on `<lock>.reclaim` and
/// re-check staleness while holding it, so a lock created after another
/// process's staleness check is never removed.
fn reclaim(lock: &Path, stale_after: Duration) -> bool {
    let guard = sibling(lock, ".reclaim");
    match OpenOptions::new().write(true).create_new(true).open(&guard) {
        Ok(_) => {}
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {
            // A reclaimer that died mid-reclaim.
            if is_stale(&guard, stale_after) {
                remove_logged(&guard, "stale reclaim guard");
            }
            return false;
        }
        Err(err) => {
            warn!(path = %guard.display(), %err, "cannot create reclaim guard");
            return false;
        }
    }
    let removed = is_stale(lock, stale_after) && remove_logged(lock, "stale lock");
    if removed {
        warn!(lock = %lock.display(), "removed stale lock");
    }
    remove_logged(&guard, "reclaim guard");
    removed
}

/// Replace `target` with `contents` via a temp file in the same directory.
pub fn write_atomic(target: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let dir = target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
    tmp.write_all(contents).map_err(|e| StoreError::io(tmp.path(), e))?;
    tmp.as_file().sync_all().map_err(|e| StoreError::io(tmp.path(), e))?;
    tmp.persist(target).map_err(|e| StoreError::io(target, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_is_exclusive_and_released_on_drop() {
        let dir = tempfile::TempDir::new().unwrap();
        let target = dir.path().join("exclusions.json");
        let guard = LockGuard::acquire(&target, Duration::from_millis(50), Duration::from_secs(60)).unwrap();
        assert!(dir.path().join("exclusions.json.lock").exists());

        let second = LockGuard::acquire(&target, Duration::from_millis(50), Duration::from_secs(60));
        assert!(matches!(second, Err(StoreError::Locked(_))));

        drop(guard);
        assert!(!dir.path().join("exclusions.json.lock").exists());
        LockGuard::acquire(&target, Duration::from_millis(50), Duration::from_secs(60)).unwrap();
    }

    fn age(path: &Path, by: Duration) {
        let file = OpenOptions::new().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - by).unwrap();
    }

    #[test]
    fn stale_lock_is_reclaimed() {
        let dir = tempfile::TempDir::new().unwrap();
        let target = dir.path().join("audit.jsonl");
        let lock = dir.path().join("audit.jsonl.lock");
        std::fs::write(&lock, "999999\n").unwrap();
        age(&lock, Duration::from_secs(3600));
        let guard = LockGuard::acquire(&target, Duration::from_millis(50), Duration::from_secs(60)).unwrap();
        assert_ne!(std::fs::read_to_string(&lock).unwrap(), "999999\n");
        assert!(!dir.path().join("audit.jsonl.lock.reclaim").exists());
        drop(guard);
    }

    #[test]
    fn concurrent_reclaimers_get_one_lock() {
        let dir = tempfile::TempDir::new().unwrap();
        let target = dir.path().join("exclusions.json");
        let lock = dir.path().join("exclusions.json.lock");
        std::fs::write(&lock, "999999\n").unwrap();
        age(&lock, Duration::from_secs(3600));

        let barrier = std::sync::Barrier::new(8);
        let winners = std::sync::atomic::AtomicUsize::new(0);
        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    barrier.wait();
                    if let Ok(guard) =
                        LockGuard::acquire(&target, Duration::from_millis(100), Duration::from_secs(60))
                    {
                        winners.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(500));
                        drop(guard);
                    }
                });
            }
        });
        assert_eq!(winners.into_inner(), 1);
        assert!(!lock.exists());
    }

    #[test]
    fn abandoned_reclaim_guard_is_cleared() {
        let dir = tempfile::TempDir::new().unwrap();
        let target = dir.path().join("exclusions.json");
        let lock = dir.path().join("exclusions.json.lock");
        let guard = dir.path().join("exclusions.json.lock.reclaim");
        std::fs::write(&lock, "999999\n").unwrap();
        std::fs::write(&guard, "").unwrap();
        age(&lock, Duration::from_secs(3600));
        age(&guard, Duration::from_secs(3600));
        LockGuard::acquire(&target, Duration::from_millis(200), Duration::from_secs(60)).unwrap();
        assert!(!guard.exists());
    }

    #[test]
    fn atomic_write_replaces_contents() {
        let dir = tempfile::TempDir::new().unwrap();
        let target = dir.path().join("file.json");
        write_atomic(&target, b"one").unwrap();
        write_atomic(&target, b"two").unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "two");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
