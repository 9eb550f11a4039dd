//! Manifest: the signed, persisted record of a bump transaction
//!
//! ```json
//! {
//!   "transactionId": "6f1c...",
//!   "scope": "global",
//!   "targetEntityId": null,
//!   "status": "committed",
//!   "affectedEntities": [{"entityId": "global:main", "oldVersion": "1.0.0", "newVersion": "1.0.1"}],
//!   "fileChanges": [{"filePath": "VERSION", "matchCount": 1}],
//!   "createdAt": 1760000000000,
//!   "committedAt": 1760000000042,
//!   "signature": "9a0b...",
//!   "signedAt": 1760000000040,
//!   "keyVersion": "primary"
//! }
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use vcascade_common::fsutil;

use crate::error::{EngineError, Result};
use crate::semver::BumpKind;
use crate::signing::KeyVersion;

/// What a bump targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BumpScope {
    /// Every root, cascading to all linked descendants
    Global,
    Major,
    Minor,
    Patch,
}

impl BumpScope {
    /// Increment carried by a targeted scope; `None` for `global`
    pub fn increment(self) -> Option<BumpKind> {
        match self {
            BumpScope::Global => None,
            BumpScope::Major => Some(BumpKind::Major),
            BumpScope::Minor => Some(BumpKind::Minor),
            BumpScope::Patch => Some(BumpKind::Patch),
        }
    }
}

impl fmt::Display for BumpScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BumpScope::Global => f.write_str("global"),
            BumpScope::Major => f.write_str("major"),
            BumpScope::Minor => f.write_str("minor"),
            BumpScope::Patch => f.write_str("patch"),
        }
    }
}

impl FromStr for BumpScope {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "global" => Ok(BumpScope::Global),
            "major" => Ok(BumpScope::Major),
            "minor" => Ok(BumpScope::Minor),
            "patch" => Ok(BumpScope::Patch),
            other => Err(EngineError::InvalidRequest(format!(
                "unknown scope '{other}', expected global, major, minor or patch"
            ))),
        }
    }
}

/// Terminal status recorded in a manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ManifestStatus {
    Committed,
    RolledBack,
}

impl fmt::Display for ManifestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestStatus::Committed => f.write_str("committed"),
            ManifestStatus::RolledBack => f.write_str("rolled-back"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedEntity {
    pub entity_id: String,
    pub old_version: String,
    pub new_version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChange {
    pub file_path: String,
    pub match_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub transaction_id: String,
    pub scope: BumpScope,
    pub target_entity_id: Option<String>,
    pub status: ManifestStatus,
    pub affected_entities: Vec<AffectedEntity>,
    pub file_changes: Vec<FileChange>,
    pub created_at: i64,
    pub committed_at: Option<i64>,
    /// Hex HMAC over every other field; empty until signed
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub signed_at: Option<i64>,
    #[serde(default)]
    pub key_version: Option<KeyVersion>,
}

/// Canonical bytes a signature covers: RFC 8785 JSON of the manifest with
/// the `signature` member removed.
pub fn canonical_payload(manifest: &Manifest) -> Result<Vec<u8>> {
    let mut value = serde_json::to_value(manifest)?;
    if let Some(object) = value.as_object_mut() {
        object.remove("signature");
    }
    Ok(serde_jcs::to_vec(&value)?)
}

/// Directory of persisted manifests
#[derive(Debug, Clone)]
pub struct ManifestStore {
    dir: PathBuf,
}

impl ManifestStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<createdAt>-<transactionId>.json`, so names sort chronologically
    pub fn path_for(&self, manifest: &Manifest) -> PathBuf {
        self.dir
            .join(format!("{}-{}.json", manifest.created_at, manifest.transaction_id))
    }

    pub fn encode(manifest: &Manifest) -> Result<Vec<u8>> {
        let mut bytes = serde_json::to_vec_pretty(manifest)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    pub fn save(&self, manifest: &Manifest) -> Result<PathBuf> {
        let path = self.path_for(manifest);
        fsutil::write_atomic(&path, &Self::encode(manifest)?)?;
        debug!(path = %path.display(), "Saved manifest");
        Ok(path)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Manifest> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        serde_json::from_slice(&bytes).map_err(|e| {
            EngineError::InvalidRequest(format!("'{}' is not a manifest: {e}", path.display()))
        })
    }

    /// Every readable manifest, oldest first
    ///
    /// Unparseable files are skipped with a warning.
    pub fn list(&self) -> Result<Vec<(PathBuf, Manifest)>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut manifests = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::load(&path) {
                Ok(manifest) => manifests.push((path, manifest)),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable manifest"),
            }
        }

        manifests.sort_by(|a, b| {
            a.1.created_at
                .cmp(&b.1.created_at)
                .then_with(|| a.1.transaction_id.cmp(&b.1.transaction_id))
        });
        Ok(manifests)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample(created_at: i64) -> Manifest {
        Manifest {
            transaction_id: format!("tx-{created_at}"),
            scope: BumpScope::Global,
            target_entity_id: None,
            status: ManifestStatus::Committed,
            affected_entities: vec![AffectedEntity {
                entity_id: "global:main".into(),
                old_version: "1.0.0".into(),
                new_version: "1.0.1".into(),
            }],
            file_changes: vec![FileChange {
                file_path: "VERSION".into(),
                match_count: 1,
            }],
            created_at,
            committed_at: Some(created_at + 5),
            signature: "abcd".into(),
            signed_at: Some(created_at + 4),
            key_version: Some(KeyVersion::Primary),
        }
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_value(sample(10)).unwrap();
        assert_eq!(json["scope"], "global");
        assert_eq!(json["targetEntityId"], serde_json::Value::Null);
        assert_eq!(json["status"], "committed");
        assert_eq!(json["affectedEntities"][0]["newVersion"], "1.0.1");
        assert_eq!(json["fileChanges"][0]["matchCount"], 1);
        assert_eq!(json["keyVersion"], "primary");
    }

    #[test]
    fn test_canonical_payload_excludes_signature() {
        let mut manifest = sample(10);
        let before = canonical_payload(&manifest).unwrap();
        manifest.signature = "ffff".into();
        assert_eq!(canonical_payload(&manifest).unwrap(), before);

        let text = String::from_utf8(before).unwrap();
        assert!(!text.contains("signature"));
        // members sorted, no whitespace
        assert!(text.starts_with(r#"{"affectedEntities":[{"entityId":"global:main""#));
    }

    #[test]
    fn test_store_lists_in_creation_order() {
        let temp = TempDir::new().unwrap();
        let store = ManifestStore::new(temp.path().join("manifests"));
        store.save(&sample(300)).unwrap();
        store.save(&sample(100)).unwrap();
        store.save(&sample(200)).unwrap();
        std::fs::write(store.dir().join("junk.json"), "not json").unwrap();

        let listed: Vec<i64> = store.list().unwrap().iter().map(|(_, m)| m.created_at).collect();
        assert_eq!(listed, vec![100, 200, 300]);
    }

    #[test]
    fn test_scope_parse() {
        assert_eq!("Global".parse::<BumpScope>().unwrap(), BumpScope::Global);
        assert_eq!(BumpScope::Minor.increment(), Some(BumpKind::Minor));
        assert!("huge".parse::<BumpScope>().is_err());
    }
}
