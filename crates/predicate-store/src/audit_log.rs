//! Append-only, hash-chained audit log (JSON Lines).
//!
//! Each line wraps one [`AuditRecord`] with a sequence number, the previous
//! line's hash, its own hash, and the hash of the entry it supersedes (the
//! previous entry for the same device). Lines are only ever appended.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use predicate_core::{AuditRecord, DeviceId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::StoreError;
use crate::lock::LockGuard;

/// `prev_hash` of the first entry.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub seq: u64,
    pub prev_hash: String,
    pub hash: String,
    pub supersedes: Option<String>,
    pub record: AuditRecord,
}

/// Summary of a successful chain verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSummary {
    pub entries: u64,
    pub devices: usize,
    pub head: String,
}

pub struct AuditLog {
    path: PathBuf,
    lock_timeout: Duration,
    stale_after: Duration,
}

impl AuditLog {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_timeout: Duration::from_secs(5),
            stale_after: Duration::from_secs(300),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All entries in file order. A missing file is an empty log.
    pub fn entries(&self) -> Result<Vec<AuditEntry>, StoreError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StoreError::io(&self.path, err)),
        };
        text.lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                serde_json::from_str(line).map_err(|err| StoreError::Corrupt {
                    path: self.path.clone(),
                    detail: format!("line {}: {err}", i + 1),
                })
            })
            .collect()
    }

    pub fn append(&self, record: AuditRecord) -> Result<AuditEntry, StoreError> {
        let mut appended = self.append_all(vec![record])?;
        appended
            .pop()
            .ok_or_else(|| StoreError::Other("append produced no entry".into()))
    }

    /// Append records under one lock, chaining each onto the last.
    pub fn append_all(&self, records: Vec<AuditRecord>) -> Result<Vec<AuditEntry>, StoreError> {
        let _lock = LockGuard::acquire(&self.path, self.lock_timeout, self.stale_after)?;
        let existing = self.entries()?;

        let mut prev_hash = existing
            .last()
            .map_or_else(|| GENESIS_HASH.to_string(), |e| e.hash.clone());
        let mut seq = existing.last().map_or(0, |e| e.seq);
        let mut latest: HashMap<DeviceId, String> = existing
            .iter()
            .map(|e| (e.record.device_id.clone(), e.hash.clone()))
            .collect();

        let mut lines = String::new();
        let mut appended = Vec::with_capacity(records.len());
        for record in records {
            seq += 1;
            let supersedes = latest.get(&record.device_id).cloned();
            let hash = entry_hash(seq, &prev_hash, supersedes.as_deref(), &record);
            let entry = AuditEntry {
                seq,
                prev_hash: prev_hash.clone(),
                hash: hash.clone(),
                supersedes,
                record,
            };
            lines.push_str(&serde_json::to_string(&entry)?);
            lines.push('\n');
            debug!(seq, device = %entry.record.device_id, "audit entry chained");
            latest.insert(entry.record.device_id.clone(), hash.clone());
            prev_hash = hash;
            appended.push(entry);
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StoreError::io(&self.path, e))?;
        let start = file
            .metadata()
            .map_err(|e| StoreError::io(&self.path, e))?
            .len();
        write_all_or_truncate(&mut file, lines.as_bytes(), |f| f.set_len(start))
            .map_err(|e| StoreError::io(&self.path, e))?;
        file.sync_all().map_err(|e| StoreError::io(&self.path, e))?;

        info!(appended = appended.len(), head_seq = seq, "audit log appended");
        Ok(appended)
    }

    /// Re-walk the chain, recomputing every hash and supersession link.
    pub fn verify(&self) -> Result<ChainSummary, StoreError> {
        let entries = self.entries()?;
        let mut prev_hash = GENESIS_HASH.to_string();
        let mut latest: HashMap<&DeviceId, &str> = HashMap::new();

        for (i, entry) in entries.iter().enumerate() {
            let expected_seq = i as u64 + 1;
            let broken = |detail: String| StoreError::ChainBroken {
                seq: entry.seq,
                detail,
            };
            if entry.seq != expected_seq {
                return Err(broken(format!("expected seq {expected_seq}")));
            }
            if entry.prev_hash != prev_hash {
                return Err(broken("prev_hash does not match preceding entry".into()));
            }
            let expected_supersedes = latest.get(&entry.record.device_id).copied();
            if entry.supersedes.as_deref() != expected_supersedes {
                return Err(broken("supersedes link does not match device history".into()));
            }
            let hash = entry_hash(entry.seq, &entry.prev_hash, entry.supersedes.as_deref(), &entry.record);
            if hash != entry.hash {
                return Err(broken("content hash mismatch".into()));
            }
            latest.insert(&entry.record.device_id, &entry.hash);
            prev_hash = entry.hash.clone();
        }

        Ok(ChainSummary {
            entries: entries.len() as u64,
            devices: latest.len(),
            head: prev_hash,
        })
    }

    /// Every entry for one device, oldest first.
    pub fn history(&self, id: &DeviceId) -> Result<Vec<AuditEntry>, StoreError> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|e| &e.record.device_id == id)
            .collect())
    }
}

/// Write `bytes` in full, or call `truncate` to drop whatever part of them
/// reached `out` so no partial line is left behind.
fn write_all_or_truncate<W: Write>(
    out: &mut W,
    bytes: &[u8],
    truncate: impl FnOnce(&mut W) -> std::io::Result<()>,
) -> std::io::Result<()> {
    let Err(err) = out.write_all(bytes).and_then(|()| out.flush()) else {
        return Ok(());
    };
    if let Err(undo) = truncate(out) {
        warn!(%err, %undo, "could not roll back partial audit write");
    }
    Err(err)
}

fn entry_hash(
    seq: u64,
    prev_hash: &str,
    supersedes: Option<&str>,
    record: &AuditRecord,
) -> String {
    let body = serde_json::json!({
        "seq": seq,
        "prev_hash": prev_hash,
        "supersedes": supersedes,
        "record": record,
    });
    let mut hasher = Sha256::new();
    hasher.update(body.to_string().as_bytes());
    hex::encode(hasher.finalize())
}
