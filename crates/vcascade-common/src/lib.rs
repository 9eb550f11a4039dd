//! vcascade Common Library
//!
//! Shared utilities and error handling for the vcascade workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`CommonError`] and the [`Result`] alias
//! - **Checksums**: SHA-256 digests used to verify backup snapshots
//! - **Atomic writes**: replace a file without ever exposing a torn write
//! - **Logging**: `tracing` subscriber initialisation shared by every binary
//!
//! # Example
//!
//! ```no_run
//! use vcascade_common::{checksum, fsutil, Result};
//!
//! fn snapshot(path: &str) -> Result<String> {
//!     let bytes = std::fs::read(path)?;
//!     fsutil::write_atomic(format!("{path}.bak"), &bytes)?;
//!     Ok(checksum::sha256_hex(&bytes))
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod checksum;
pub mod error;
pub mod fsutil;
pub mod logging;

pub use error::{CommonError, Result};

/// Current wall-clock time as milliseconds since the Unix epoch.
///
/// Every timestamp persisted by vcascade (transactions, manifests, rotation
/// state) uses this representation.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
