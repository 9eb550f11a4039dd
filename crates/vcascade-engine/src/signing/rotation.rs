//! Durable record of which key signs new manifests

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;
use vcascade_common::{fsutil, now_millis};

use super::keys::KeyVersion;
use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationState {
    pub current_key_version: KeyVersion,
    #[serde(default)]
    pub rotated_at: Option<i64>,
    #[serde(default)]
    pub previous_key_version: Option<KeyVersion>,
}

impl Default for RotationState {
    fn default() -> Self {
        Self {
            current_key_version: KeyVersion::Primary,
            rotated_at: None,
            previous_key_version: None,
        }
    }
}

impl RotationState {
    /// State after making `to` the signing key
    pub fn rotated_to(&self, to: KeyVersion) -> Self {
        Self {
            current_key_version: to,
            rotated_at: Some(now_millis()),
            previous_key_version: Some(self.current_key_version),
        }
    }
}

/// `rotation.json` under the state directory
#[derive(Debug, Clone)]
pub struct RotationStore {
    path: PathBuf,
}

impl RotationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the state; a missing file means the primary key is current
    pub fn load(&self) -> Result<RotationState> {
        match std::fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                EngineError::signing(format!(
                    "rotation state '{}' is corrupt: {e}",
                    self.path.display()
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(RotationState::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, state: &RotationState) -> Result<()> {
        fsutil::write_json_atomic(&self.path, state)?;
        info!(
            current = %state.current_key_version,
            previous = ?state.previous_key_version,
            "Persisted key rotation state"
        );
        Ok(())
    }
}
