//! Versioned, file-backed exclusion store.
//!
//! On-disk format: `{"version": n, "entries": {"K123456": {reason, added, added_by}}}`.
//! Readers take an [`ExclusionSnapshot`]; writers lock, re-read the latest
//! state, refuse to overwrite an entry that changed since their snapshot,
//! bump the version and replace the file atomically.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use predicate_core::{DeviceId, ExclusionEntry, ExclusionOrigin, ExclusionSnapshot};
use tracing::info;

use crate::StoreError;
use crate::lock::{LockGuard, write_atomic};

pub struct ExclusionStore {
    path: PathBuf,
    lock_timeout: Duration,
    stale_after: Duration,
}

impl ExclusionStore {
    /// Point at an exclusion file. A missing file reads as an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_timeout: Duration::from_secs(5),
            stale_after: Duration::from_secs(300),
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current state. Unparseable content is [`StoreError::Corrupt`].
    pub fn snapshot(&self) -> Result<ExclusionSnapshot, StoreError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ExclusionSnapshot::default());
            }
            Err(err) => return Err(StoreError::io(&self.path, err)),
        };
        if text.trim().is_empty() {
            return Ok(ExclusionSnapshot::default());
        }
        serde_json::from_str(&text).map_err(|err| StoreError::Corrupt {
            path: self.path.clone(),
            detail: err.to_string(),
        })
    }

    /// Add or replace an exclusion. Fails with
    /// [`StoreError::VersionConflict`] if the entry for `id` differs from
    /// what `base` saw.
    pub fn add(
        &self,
        base: &ExclusionSnapshot,
        id: DeviceId,
        reason: &str,
        added_by: ExclusionOrigin,
        added: DateTime<Utc>,
    ) -> Result<ExclusionSnapshot, StoreError> {
        let entry = ExclusionEntry {
            reason: reason.to_string(),
            added,
            added_by,
        };
        self.update(base, &id, |snapshot| {
            snapshot.entries.insert(id.clone(), entry);
            Ok(())
        })
    }

    /// Remove an exclusion under the same conflict rules as [`add`](Self::add).
    pub fn remove(&self, base: &ExclusionSnapshot, id: &DeviceId) -> Result<ExclusionSnapshot, StoreError> {
        self.update(base, id, |snapshot| match snapshot.entries.remove(id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotExcluded {
                device_id: id.to_string(),
            }),
        })
    }

    fn update<F>(&self, base: &ExclusionSnapshot, id: &DeviceId, mutate: F) -> Result<ExclusionSnapshot, StoreError>
    where
        F: FnOnce(&mut ExclusionSnapshot) -> Result<(), StoreError>,
    {
        let _lock = LockGuard::acquire(&self.path, self.lock_timeout, self.stale_after)?;
        let mut latest = self.snapshot()?;

        if latest.get(id) != base.get(id) {
            return Err(StoreError::VersionConflict {
                device_id: id.to_string(),
                snapshot: base.version,
                current: latest.version,
            });
        }

        mutate(&mut latest)?;
        latest.version += 1;

        let json = serde_json::to_vec_pretty(&latest)?;
        write_atomic(&self.path, &json)?;
        info!(device = %id, version = latest.version, entries = latest.len(), "exclusion store updated");
        Ok(latest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, day, 9, 30, 0).unwrap()
    }

    fn id(s: &str) -> DeviceId {
        DeviceId::parse(s).unwrap()
    }

    fn store() -> (tempfile::TempDir, ExclusionStore) {
        let dir = tempfile::TempDir::new().unwrap();
        let store = ExclusionStore::open(dir.path().join("exclusions.json"));
        (dir, store)
    }

    #[test]
    fn missing_file_is_empty() {
        let (_dir, store) = store();
        let snap = store.snapshot().unwrap();
        assert_eq!(snap.version, 0);
        assert!(snap.is_empty());
    }

    #[test]
    fn add_persists_and_bumps_version() {
        let (_dir, store) = store();
        let base = store.snapshot().unwrap();
        let next = store
            .add(&base, id("K123456"), "recalled design", ExclusionOrigin::Manual, at(1))
            .unwrap();
        assert_eq!(next.version, 1);

        let reread = store.snapshot().unwrap();
        assert_eq!(reread, next);
        let entry = reread.get(&id("K123456")).unwrap();
        assert_eq!(entry.reason, "recalled design");
        assert_eq!(entry.added_by, ExclusionOrigin::Manual);

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["version"], 1);
        assert_eq!(raw["entries"]["K123456"]["added_by"], "manual");
        assert_eq!(raw["entries"]["K123456"]["added"], "2025-04-01T09:30:00Z");
    }

    #[test]
    fn stale_snapshot_conflicts_on_same_entry() {
        let (_dir, store) = store();
        let base = store.snapshot().unwrap();
        store
            .add(&base, id("K123456"), "first", ExclusionOrigin::Manual, at(1))
            .unwrap();

        // Same stale base, same device: refused.
        let err = store
            .add(&base, id("K123456"), "second", ExclusionOrigin::Review, at(2))
            .unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { current: 1, .. }));

        // Same stale base, different device: merged onto latest.
        let merged = store
            .add(&base, id("K654321"), "other", ExclusionOrigin::Auto, at(2))
            .unwrap();
        assert_eq!(merged.version, 2);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn remove_entry() {
        let (_dir, store) = store();
        let base = store.snapshot().unwrap();
        let snap = store
            .add(&base, id("K123456"), "x", ExclusionOrigin::Manual, at(1))
            .unwrap();
        let snap = store.remove(&snap, &id("K123456")).unwrap();
        assert!(snap.is_empty());
        assert_eq!(snap.version, 2);

        let err = store.remove(&snap, &id("K123456")).unwrap_err();
        assert!(matches!(err, StoreError::NotExcluded { .. }));
    }

    #[test]
    fn corrupt_file_is_fatal() {
        let (_dir, store) = store();
        std::fs::write(store.path(), "{ not json").unwrap();
        let err = store.snapshot().unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
        assert!(err.as_review_error().unwrap().is_fatal());
    }

    #[test]
    fn concurrent_writers_serialise() {
        let (_dir, store) = store();
        let path = store.path().to_path_buf();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let path = path.clone();
                std::thread::spawn(move || {
                    let store = ExclusionStore::open(path);
                    let base = store.snapshot().unwrap();
                    let device = id(&format!("K10000{i}"));
                    store
                        .add(&base, device, "parallel", ExclusionOrigin::Auto, at(3))
                        .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let snap = store.snapshot().unwrap();
        assert_eq!(snap.len(), 8);
        assert_eq!(snap.version, 8);
    }
}
