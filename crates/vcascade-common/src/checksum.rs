//! Checksum utilities for snapshot verification

use crate::error::{CommonError, Result};
use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of an in-memory buffer
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Verify that `bytes` hash to `expected`
///
/// `label` names the data in the mismatch error (usually the file path).
pub fn verify_checksum(label: &str, bytes: &[u8], expected: &str) -> Result<()> {
    let actual = sha256_hex(bytes);
    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(CommonError::ChecksumMismatch {
            path: label.to_string(),
            expected: expected.to_string(),
            actual,
        })
    }
}
