//! Key material and the keyring
//!
//! Keys resolve in priority order: explicit configuration, then the secret
//! store, then (primary only) a locally generated fallback key persisted
//! under the state directory.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use vcascade_common::fsutil;

use super::secret_store::SecretStore;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};

/// Minimum decoded key length
pub const MIN_KEY_BYTES: usize = 32;

/// Length of generated fallback keys
pub const FALLBACK_KEY_BYTES: usize = 32;

/// Which of the two configured keys produced a signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyVersion {
    Primary,
    Secondary,
}

impl KeyVersion {
    pub const ALL: [KeyVersion; 2] = [KeyVersion::Primary, KeyVersion::Secondary];
}

impl fmt::Display for KeyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyVersion::Primary => f.write_str("primary"),
            KeyVersion::Secondary => f.write_str("secondary"),
        }
    }
}

impl FromStr for KeyVersion {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "primary" => Ok(KeyVersion::Primary),
            "secondary" => Ok(KeyVersion::Secondary),
            other => Err(EngineError::InvalidRequest(format!(
                "unknown key version '{other}', expected primary or secondary"
            ))),
        }
    }
}

/// Where a key came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeySource {
    Explicit,
    SecretStore,
    Fallback,
}

impl fmt::Display for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySource::Explicit => f.write_str("explicit"),
            KeySource::SecretStore => f.write_str("secret-store"),
            KeySource::Fallback => f.write_str("fallback"),
        }
    }
}

/// HMAC key bytes; never printed
#[derive(Clone, PartialEq, Eq)]
pub struct SigningKey {
    bytes: Vec<u8>,
    source: KeySource,
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("source", &self.source)
            .field("bytes", &format_args!("[REDACTED; {}]", self.bytes.len()))
            .finish()
    }
}

impl SigningKey {
    pub fn from_hex(encoded: &str, source: KeySource) -> Result<Self> {
        let bytes = hex::decode(encoded.trim())
            .map_err(|e| EngineError::signing(format!("{source} key is not valid hex: {e}")))?;
        if bytes.len() < MIN_KEY_BYTES {
            return Err(EngineError::signing(format!(
                "{source} key is {} bytes, at least {MIN_KEY_BYTES} required",
                bytes.len()
            )));
        }
        Ok(Self { bytes, source })
    }

    /// Fresh random key from the OS RNG
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; FALLBACK_KEY_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self {
            bytes,
            source: KeySource::Fallback,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    pub fn source(&self) -> KeySource {
        self.source
    }

    /// Short non-secret identifier for status output
    pub fn fingerprint(&self) -> String {
        vcascade_common::checksum::sha256_hex(&self.bytes)[..12].to_string()
    }
}

/// The loaded primary and secondary keys
#[derive(Debug, Clone, Default)]
pub struct Keyring {
    primary: Option<SigningKey>,
    secondary: Option<SigningKey>,
}

impl Keyring {
    pub fn new(primary: Option<SigningKey>, secondary: Option<SigningKey>) -> Self {
        Self { primary, secondary }
    }

    pub fn get(&self, version: KeyVersion) -> Option<&SigningKey> {
        match version {
            KeyVersion::Primary => self.primary.as_ref(),
            KeyVersion::Secondary => self.secondary.as_ref(),
        }
    }

    pub fn has(&self, version: KeyVersion) -> bool {
        self.get(version).is_some()
    }
}

/// Resolves key material for both versions
#[derive(Clone)]
pub struct KeyLoader {
    pub primary_key: Option<String>,
    pub secondary_key: Option<String>,
    pub store: Arc<dyn SecretStore>,
    pub store_timeout: Duration,
    pub allow_fallback: bool,
    pub fallback_path: PathBuf,
}

impl fmt::Debug for KeyLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyLoader")
            .field("primary_key", &self.primary_key.as_ref().map(|_| "[REDACTED]"))
            .field("secondary_key", &self.secondary_key.as_ref().map(|_| "[REDACTED]"))
            .field("store", &self.store)
            .field("store_timeout", &self.store_timeout)
            .field("allow_fallback", &self.allow_fallback)
            .field("fallback_path", &self.fallback_path)
            .finish()
    }
}

impl KeyLoader {
    pub fn from_config(config: &EngineConfig, store: Arc<dyn SecretStore>) -> Self {
        Self {
            primary_key: config.signing.primary_key.clone(),
            secondary_key: config.signing.secondary_key.clone(),
            store,
            store_timeout: config.signing.secret_store_timeout(),
            allow_fallback: config.signing.allow_fallback_key,
            fallback_path: config.fallback_key_path(),
        }
    }

    /// Resolve one key version; `None` when no source provides it
    ///
    /// May generate and persist the fallback primary key.
    pub async fn load_signing_key(&self, version: KeyVersion) -> Result<Option<SigningKey>> {
        self.resolve(version, true).await
    }

    /// Both keys, generating the fallback primary key if needed
    pub async fn load_keyring(&self) -> Result<Keyring> {
        let primary = self.resolve(KeyVersion::Primary, true).await?;
        let secondary = self.resolve(KeyVersion::Secondary, true).await?;
        Ok(Keyring::new(primary, secondary))
    }

    /// Both keys without writing anything; an absent fallback key stays absent
    pub async fn load_existing_keyring(&self) -> Result<Keyring> {
        let primary = self.resolve(KeyVersion::Primary, false).await?;
        let secondary = self.resolve(KeyVersion::Secondary, false).await?;
        Ok(Keyring::new(primary, secondary))
    }

    #[instrument(skip(self))]
    async fn resolve(&self, version: KeyVersion, generate: bool) -> Result<Option<SigningKey>> {
        let explicit = match version {
            KeyVersion::Primary => self.primary_key.as_deref(),
            KeyVersion::Secondary => self.secondary_key.as_deref(),
        };
        if let Some(encoded) = explicit.filter(|s| !s.trim().is_empty()) {
            debug!("Using explicitly configured key");
            return SigningKey::from_hex(encoded, KeySource::Explicit).map(Some);
        }

        let lookup = tokio::time::timeout(self.store_timeout, self.store.lookup(version)).await;
        match lookup {
            Err(_) => return Err(EngineError::SecretStoreTimeout(self.store_timeout)),
            Ok(result) => {
                if let Some(encoded) = result? {
                    debug!(store = %self.store.describe(), "Using key from secret store");
                    return SigningKey::from_hex(&encoded, KeySource::SecretStore).map(Some);
                }
            },
        }

        if version == KeyVersion::Primary && self.allow_fallback {
            return load_fallback(&self.fallback_path, generate);
        }
        Ok(None)
    }
}

fn load_fallback(path: &Path, generate: bool) -> Result<Option<SigningKey>> {
    match std::fs::read_to_string(path) {
        Ok(encoded) => {
            debug!(path = %path.display(), "Reusing fallback signing key");
            SigningKey::from_hex(&encoded, KeySource::Fallback).map(Some)
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && !generate => Ok(None),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let key = SigningKey::generate();
            fsutil::write_secret_atomic(path, key.to_hex().as_bytes())?;
            warn!(
                path = %path.display(),
                "Generated a local fallback signing key; manifests signed with it only verify on this machine"
            );
            Ok(Some(key))
        },
        Err(e) => Err(EngineError::signing(format!(
            "cannot read fallback key '{}': {e}",
            path.display()
        ))),
    }
}
