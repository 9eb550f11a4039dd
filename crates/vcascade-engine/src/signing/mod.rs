//! Signing Service
//!
//! HMAC-SHA256 over the canonical manifest payload, with two keys loaded at
//! once so manifests signed before a rotation keep verifying after it.

mod keys;
mod rotation;
mod secret_store;

pub use keys::{KeyLoader, KeySource, KeyVersion, Keyring, SigningKey, FALLBACK_KEY_BYTES, MIN_KEY_BYTES};
pub use rotation::{RotationState, RotationStore};
pub use secret_store::{SecretStore, TomlSecretStore};

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};
use vcascade_common::now_millis;

use crate::error::{EngineError, Result};
use crate::manifest::{canonical_payload, Manifest};

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies manifests with a fixed keyring
///
/// `current` selects the key for new signatures. Verification uses whichever
/// key the manifest names.
#[derive(Debug, Clone)]
pub struct SigningService {
    keyring: Keyring,
    current: KeyVersion,
}

impl SigningService {
    pub fn new(keyring: Keyring, current: KeyVersion) -> Self {
        Self { keyring, current }
    }

    pub fn current_key_version(&self) -> KeyVersion {
        self.current
    }

    pub fn keyring(&self) -> &Keyring {
        &self.keyring
    }

    /// Same keys, different signing key
    pub fn with_current(&self, current: KeyVersion) -> Result<Self> {
        if !self.keyring.has(current) {
            return Err(EngineError::signing(format!(
                "cannot sign with the {current} key: it is not loaded"
            )));
        }
        Ok(Self {
            keyring: self.keyring.clone(),
            current,
        })
    }

    /// Sign with the current key, filling `keyVersion`, `signedAt` and `signature`
    pub fn sign(&self, manifest: &mut Manifest) -> Result<()> {
        self.sign_with(manifest, self.current)
    }

    pub fn sign_with(&self, manifest: &mut Manifest, version: KeyVersion) -> Result<()> {
        let key = self.key(version)?;
        manifest.key_version = Some(version);
        manifest.signed_at = Some(now_millis());
        let payload = canonical_payload(manifest)?;
        manifest.signature = compute_hmac(key.as_bytes(), &payload)?;
        debug!(transaction_id = %manifest.transaction_id, key_version = %version, "Signed manifest");
        Ok(())
    }

    /// Recompute the MAC and compare in constant time
    ///
    /// Errors only when the key the manifest names is not loaded; any
    /// tampering or malformed signature yields `Ok(false)`.
    pub fn verify(&self, manifest: &Manifest) -> Result<bool> {
        let version = manifest.key_version.unwrap_or(KeyVersion::Primary);
        let key = self.key(version)?;
        let payload = canonical_payload(manifest)?;
        let expected = compute_hmac(key.as_bytes(), &payload)?;

        let valid = verify_hmac(&manifest.signature, &expected);
        if !valid {
            warn!(transaction_id = %manifest.transaction_id, key_version = %version, "Manifest signature mismatch");
        }
        Ok(valid)
    }

    fn key(&self, version: KeyVersion) -> Result<&SigningKey> {
        self.keyring
            .get(version)
            .ok_or_else(|| EngineError::signing(format!("no {version} signing key is loaded")))
    }
}

fn compute_hmac(secret: &[u8], payload: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| EngineError::signing(format!("invalid signing key: {e}")))?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn verify_hmac(stored: &str, computed: &str) -> bool {
    let (Ok(expected), Ok(actual)) = (hex::decode(stored), hex::decode(computed)) else {
        return false;
    };
    if expected.len() != actual.len() {
        return false;
    }
    expected.ct_eq(actual.as_slice()).into()
}
