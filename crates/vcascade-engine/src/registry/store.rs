//! Registry file persistence (JSON or YAML, chosen by extension)

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;
use vcascade_common::fsutil;

use super::{Registry, VersionedEntity};
use crate::error::{EngineError, Result};

/// Schema version written into every registry file
pub const REGISTRY_SCHEMA_VERSION: u32 = 1;

/// On-disk shape of the registry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryDocument {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    #[serde(default)]
    pub entities: Vec<VersionedEntity>,
}

fn default_schema_version() -> u32 {
    REGISTRY_SCHEMA_VERSION
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryFormat {
    Json,
    Yaml,
}

impl RegistryFormat {
    /// `.yaml`/`.yml` are YAML, anything else is JSON
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                RegistryFormat::Yaml
            },
            _ => RegistryFormat::Json,
        }
    }
}

/// Reads and writes one registry file
#[derive(Debug, Clone)]
pub struct RegistryStore {
    path: PathBuf,
    format: RegistryFormat,
}

impl RegistryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = RegistryFormat::from_path(&path);
        Self { path, format }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> RegistryFormat {
        self.format
    }

    /// Load the registry from disk
    pub fn load(&self) -> Result<Registry> {
        let bytes = std::fs::read(&self.path).map_err(|e| {
            EngineError::config(format!(
                "Failed to read registry '{}': {e}",
                self.path.display()
            ))
        })?;
        let registry = self.decode(&bytes)?;
        debug!(path = %self.path.display(), entities = registry.len(), "Loaded registry");
        Ok(registry)
    }

    /// Write the registry atomically
    pub fn save(&self, registry: &Registry) -> Result<()> {
        let bytes = self.encode(registry)?;
        fsutil::write_atomic(&self.path, &bytes)?;
        debug!(path = %self.path.display(), "Saved registry");
        Ok(())
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<Registry> {
        let doc: RegistryDocument = match self.format {
            RegistryFormat::Json => serde_json::from_slice(bytes)?,
            RegistryFormat::Yaml => serde_yaml::from_slice(bytes)?,
        };
        if doc.schema_version != REGISTRY_SCHEMA_VERSION {
            return Err(EngineError::config(format!(
                "Unsupported registry schemaVersion {} in '{}' (expected {})",
                doc.schema_version,
                self.path.display(),
                REGISTRY_SCHEMA_VERSION
            )));
        }
        Registry::new(doc.entities)
    }

    pub fn encode(&self, registry: &Registry) -> Result<Vec<u8>> {
        let doc = RegistryDocument {
            schema_version: REGISTRY_SCHEMA_VERSION,
            entities: registry.entities().to_vec(),
        };
        let mut bytes = match self.format {
            RegistryFormat::Json => serde_json::to_vec_pretty(&doc)?,
            RegistryFormat::Yaml => serde_yaml::to_string(&doc)?.into_bytes(),
        };
        if !bytes.ends_with(b"\n") {
            bytes.push(b'\n');
        }
        Ok(bytes)
    }
}
