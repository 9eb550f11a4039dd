//! Pre-mutation snapshots
//!
//! Layout of one transaction's backup:
//!
//! ```text
//! <state_dir>/backups/<transactionId>/
//! ├── index.json      original paths, snapshot names, sha256, state
//! ├── 0000.bak
//! └── 0001.bak
//! ```
//!
//! `index.json` is written before any workspace file changes. A directory
//! without it never got that far and holds nothing worth restoring.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use vcascade_common::{checksum, fsutil};

use crate::error::{EngineError, RestoreFailure, Result};
use crate::file_store::FileStore;

pub const BACKUP_INDEX_FILE: &str = "index.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackupRole {
    Target,
    Registry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackupState {
    /// Workspace files may have been changed; restore on recovery
    Prepared,
    /// Kept after a successful commit; never restored
    Committed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupEntry {
    pub original_path: PathBuf,
    pub backup_file: String,
    pub sha256: String,
    pub role: BackupRole,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupIndex {
    pub transaction_id: String,
    pub created_at: i64,
    pub state: BackupState,
    pub entries: Vec<BackupEntry>,
}

/// Snapshots for one transaction
///
/// Always held in memory. Unless created with [`BackupSet::in_memory`], also
/// mirrored to disk so an interrupted process can be recovered.
#[derive(Debug)]
pub struct BackupSet {
    dir: Option<PathBuf>,
    index: BackupIndex,
    snapshots: HashMap<PathBuf, Vec<u8>>,
}

impl BackupSet {
    /// Disk-backed set under `backups_root/<transaction_id>`
    pub fn create(backups_root: &Path, transaction_id: &str, created_at: i64) -> Result<Self> {
        let dir = backups_root.join(transaction_id);
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir: Some(dir),
            index: BackupIndex {
                transaction_id: transaction_id.to_string(),
                created_at,
                state: BackupState::Prepared,
                entries: Vec::new(),
            },
            snapshots: HashMap::new(),
        })
    }

    /// Memory-only set, for dry runs
    pub fn in_memory(transaction_id: &str, created_at: i64) -> Self {
        Self {
            dir: None,
            index: BackupIndex {
                transaction_id: transaction_id.to_string(),
                created_at,
                state: BackupState::Prepared,
                entries: Vec::new(),
            },
            snapshots: HashMap::new(),
        }
    }

    /// Re-open a persisted set; `Ok(None)` when it has no index
    pub fn open(dir: &Path) -> Result<Option<Self>> {
        let index_path = dir.join(BACKUP_INDEX_FILE);
        let bytes = match std::fs::read(&index_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let index: BackupIndex = serde_json::from_slice(&bytes)?;
        Ok(Some(Self {
            dir: Some(dir.to_path_buf()),
            index,
            snapshots: HashMap::new(),
        }))
    }

    pub fn transaction_id(&self) -> &str {
        &self.index.transaction_id
    }

    pub fn index(&self) -> &BackupIndex {
        &self.index
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.index.entries.iter().any(|e| e.original_path == path)
    }

    /// Record the original content of `path`; repeated calls for the same
    /// path keep the first snapshot
    pub fn snapshot(&mut self, path: &Path, bytes: &[u8], role: BackupRole) -> Result<()> {
        if self.contains(path) {
            return Ok(());
        }

        let backup_file = format!("{:04}.bak", self.index.entries.len());
        if let Some(dir) = &self.dir {
            fsutil::write_atomic(dir.join(&backup_file), bytes)?;
        }
        self.index.entries.push(BackupEntry {
            original_path: path.to_path_buf(),
            backup_file,
            sha256: checksum::sha256_hex(bytes),
            role,
        });
        self.snapshots.insert(path.to_path_buf(), bytes.to_vec());
        debug!(path = %path.display(), bytes = bytes.len(), "Snapshotted file");
        Ok(())
    }

    /// Persist the index; after this the set is recoverable
    pub fn seal(&self) -> Result<()> {
        if let Some(dir) = &self.dir {
            fsutil::write_json_atomic(dir.join(BACKUP_INDEX_FILE), &self.index)?;
        }
        Ok(())
    }

    /// Flag a kept backup as belonging to a committed transaction
    pub fn mark_committed(&mut self) -> Result<()> {
        self.index.state = BackupState::Committed;
        self.seal()
    }

    /// Original bytes of one entry, checksum-verified when read from disk
    fn original(&self, entry: &BackupEntry) -> Result<Vec<u8>> {
        if let Some(bytes) = self.snapshots.get(&entry.original_path) {
            return Ok(bytes.clone());
        }
        let dir = self.dir.as_ref().ok_or_else(|| {
            EngineError::InvalidRequest(format!(
                "no snapshot of '{}' in memory-only backup",
                entry.original_path.display()
            ))
        })?;
        let bytes = std::fs::read(dir.join(&entry.backup_file))?;
        checksum::verify_checksum(&entry.backup_file, &bytes, &entry.sha256)?;
        Ok(bytes)
    }

    /// Put every snapshotted file back, continuing past individual failures
    ///
    /// Files already holding their original bytes are left alone, so calling
    /// this twice is harmless.
    pub fn restore(&self, store: &dyn FileStore) -> Vec<RestoreFailure> {
        let mut failures = Vec::new();

        for entry in &self.index.entries {
            let path = &entry.original_path;
            let original = match self.original(entry) {
                Ok(bytes) => bytes,
                Err(e) => {
                    failures.push(RestoreFailure {
                        path: path.clone(),
                        reason: format!("backup unreadable: {e}"),
                    });
                    continue;
                },
            };

            if matches!(store.read(path), Ok(current) if current == original) {
                continue;
            }

            match store.write(path, &original) {
                Ok(()) => debug!(path = %path.display(), "Restored file"),
                Err(e) => failures.push(RestoreFailure {
                    path: path.clone(),
                    reason: e.to_string(),
                }),
            }
        }

        failures
    }

    /// Delete the on-disk copy
    pub fn discard(&self) -> Result<()> {
        if let Some(dir) = &self.dir {
            match std::fs::remove_dir_all(dir) {
                Ok(()) => {},
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Best-effort [`BackupSet::discard`]
    pub fn discard_quietly(&self) {
        if let Err(e) = self.discard() {
            warn!(transaction_id = %self.transaction_id(), error = %e, "Failed to remove backup directory");
        }
    }
}

/// Every transaction directory under `backups_root`, oldest first
pub fn backup_dirs(backups_root: &Path) -> Result<Vec<PathBuf>> {
    if !backups_root.exists() {
        return Ok(Vec::new());
    }
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(backups_root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::file_store::LocalFileStore;
    use tempfile::TempDir;

    #[test]
    fn test_snapshot_seal_and_reopen() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("VERSION");
        std::fs::write(&target, "1.0.0\n").unwrap();

        let mut backup = BackupSet::create(&temp.path().join("backups"), "tx-1", 42).unwrap();
        backup.snapshot(&target, b"1.0.0\n", BackupRole::Target).unwrap();
        backup.snapshot(&target, b"ignored", BackupRole::Target).unwrap();
        backup.seal().unwrap();

        let reopened = BackupSet::open(backup.dir().unwrap()).unwrap().unwrap();
        assert_eq!(reopened.index().entries.len(), 1);
        assert_eq!(reopened.index().entries[0].sha256, checksum::sha256_hex(b"1.0.0\n"));
        assert_eq!(reopened.index().state, BackupState::Prepared);
    }

    #[test]
    fn test_restore_from_disk_verifies_checksum() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("VERSION");
        std::fs::write(&target, "1.0.0\n").unwrap();

        let mut backup = BackupSet::create(&temp.path().join("backups"), "tx-1", 42).unwrap();
        backup.snapshot(&target, b"1.0.0\n", BackupRole::Target).unwrap();
        backup.seal().unwrap();
        std::fs::write(&target, "2.0.0\n").unwrap();

        let reopened = BackupSet::open(backup.dir().unwrap()).unwrap().unwrap();
        assert!(reopened.restore(&LocalFileStore).is_empty());
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "1.0.0\n");

        // corrupt the snapshot
        std::fs::write(&target, "2.0.0\n").unwrap();
        std::fs::write(backup.dir().unwrap().join("0000.bak"), "garbage").unwrap();
        let failures = reopened.restore(&LocalFileStore);
        assert_eq!(failures.len(), 1);
        assert!(failures[0].reason.contains("Checksum mismatch"));
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "2.0.0\n");
    }

    #[test]
    fn test_in_memory_set_never_touches_disk() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("VERSION");
        std::fs::write(&target, "1.0.0\n").unwrap();

        let mut backup = BackupSet::in_memory("tx-dry", 1);
        backup.snapshot(&target, b"1.0.0\n", BackupRole::Target).unwrap();
        backup.seal().unwrap();
        backup.discard().unwrap();
        assert!(backup.dir().is_none());
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_open_without_index() {
        let temp = TempDir::new().unwrap();
        assert!(BackupSet::open(temp.path()).unwrap().is_none());
    }
}
