//! Secure local secret store
//!
//! The default store is a TOML file:
//!
//! ```toml
//! [signing]
//! primary = "<hex>"
//! secondary = "<hex>"
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;

use super::keys::KeyVersion;
use crate::error::{EngineError, Result};

/// Source of hex-encoded key material
///
/// Lookups may be slow (a remote vault, a keychain prompt); callers bound
/// them with a timeout.
#[async_trait]
pub trait SecretStore: Send + Sync + fmt::Debug {
    /// Hex key for `version`, or `None` when the store has none
    async fn lookup(&self, version: KeyVersion) -> Result<Option<String>>;

    /// Human-readable location for logs
    fn describe(&self) -> String;
}

#[derive(Debug, Default, Deserialize)]
struct SecretsFile {
    #[serde(default)]
    signing: SigningSecrets,
}

#[derive(Default, Deserialize)]
struct SigningSecrets {
    primary: Option<String>,
    secondary: Option<String>,
}

impl fmt::Debug for SigningSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningSecrets")
            .field("primary", &self.primary.is_some())
            .field("secondary", &self.secondary.is_some())
            .finish()
    }
}

/// `.secrets.toml` on local disk
#[derive(Debug, Clone)]
pub struct TomlSecretStore {
    path: PathBuf,
}

impl TomlSecretStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse the store; a missing file is an empty store, malformed TOML is an error
    async fn read(&self) -> Result<SecretsFile> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(SecretsFile::default()),
            Err(e) => {
                return Err(EngineError::signing(format!(
                    "cannot read secret store '{}': {e}",
                    self.path.display()
                )));
            },
        };
        toml::from_str(&raw).map_err(|e| {
            EngineError::signing(format!(
                "secret store '{}' is not valid TOML: {}",
                self.path.display(),
                e.message()
            ))
        })
    }
}

#[async_trait]
impl SecretStore for TomlSecretStore {
    async fn lookup(&self, version: KeyVersion) -> Result<Option<String>> {
        let secrets = self.read().await?.signing;
        let value = match version {
            KeyVersion::Primary => secrets.primary,
            KeyVersion::Secondary => secrets.secondary,
        };
        Ok(value.filter(|v| !v.trim().is_empty()))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
