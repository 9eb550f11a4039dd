//! Atomic file replacement helpers
//!
//! Every durable artifact (registry, manifests, backups, keys) is written
//! through these functions: content goes to a temp file in the destination
//! directory, is synced, then renamed over the target. Readers therefore see
//! either the old or the new file, never a prefix of the new one.

use crate::error::{CommonError, Result};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Create the parent directory of `path` if it does not exist yet
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Atomically replace `path` with `bytes`
pub fn write_atomic(path: impl AsRef<Path>, bytes: &[u8]) -> Result<()> {
    write_atomic_inner(path.as_ref(), bytes, None)
}

/// Atomically replace `path` with `bytes`, restricting permissions to the owner
///
/// Used for key material. On non-unix targets this is identical to
/// [`write_atomic`].
pub fn write_secret_atomic(path: impl AsRef<Path>, bytes: &[u8]) -> Result<()> {
    write_atomic_inner(path.as_ref(), bytes, Some(0o600))
}

/// Serialize `value` as pretty JSON and atomically replace `path` with it
pub fn write_json_atomic<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let mut content = serde_json::to_vec_pretty(value)?;
    content.push(b'\n');
    write_atomic(path, &content)
}

#[cfg_attr(not(unix), allow(unused_variables))]
fn write_atomic_inner(path: &Path, bytes: &[u8], mode: Option<u32>) -> Result<()> {
    ensure_parent_dir(path)?;
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;

    #[cfg(unix)]
    if let Some(mode) = mode {
        use std::os::unix::fs::PermissionsExt;
        temp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(mode))?;
    }

    // keep the mode of a file being replaced
    if mode.is_none() {
        if let Ok(existing) = std::fs::metadata(path) {
            temp.as_file().set_permissions(existing.permissions())?;
        }
    }

    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| {
        CommonError::Io(std::io::Error::new(
            e.error.kind(),
            format!("failed to persist {}: {}", path.display(), e.error),
        ))
    })?;

    Ok(())
}
