//! Filesystem seam for every write a transaction makes to the workspace
//!
//! Target files and the registry file are read and written through
//! [`FileStore`], so alternative stores (for example one that fails on
//! demand) can be plugged into the transaction manager.

use std::fmt;
use std::io;
use std::path::Path;

use vcascade_common::{fsutil, CommonError};

pub trait FileStore: Send + Sync + fmt::Debug {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Replace `path` with `bytes` so readers never see a partial write
    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;

    fn exists(&self, path: &Path) -> bool;
}

/// The real filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileStore;

impl FileStore for LocalFileStore {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        fsutil::write_atomic(path, bytes).map_err(|e| match e {
            CommonError::Io(io) => io,
            other => io::Error::other(other.to_string()),
        })
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_local_store_round_trip() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("pkg/VERSION");
        let store = LocalFileStore;

        assert!(!store.exists(&path));
        assert_eq!(store.read(&path).unwrap_err().kind(), io::ErrorKind::NotFound);

        store.write(&path, b"1.0.0\n").unwrap();
        assert!(store.exists(&path));
        assert_eq!(store.read(&path).unwrap(), b"1.0.0\n");
    }
}
