//! Shared fixtures for engine integration tests

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;
use vcascade_engine::signing::TomlSecretStore;
use vcascade_engine::{BumpOrchestrator, EngineConfig, FileStore, LocalFileStore};

pub const PRIMARY_KEY: &str = "8f1c2a7d9e4b3f6a0c5d8e1f2a3b4c5d6e7f8091a2b3c4d5e6f708192a3b4c5d";
pub const SECONDARY_KEY: &str = "1d2c3b4a5f6e7d8c9b0a1f2e3d4c5b6a7f8e9d0c1b2a3f4e5d6c7b8a9f0e1d2c";

pub const REGISTRY_JSON: &str = r#"{
  "schemaVersion": 1,
  "entities": [
    {
      "id": "global:main",
      "entityType": "global",
      "currentVersion": "1.0.0",
      "updateStrategy": "independent",
      "targetFiles": [{ "path": "VERSION", "pattern": "{version}" }]
    },
    {
      "id": "component:foo",
      "entityType": "component",
      "currentVersion": "1.0.0",
      "updateStrategy": "linked-to-parent",
      "parentId": "global:main",
      "targetFiles": [
        { "path": "foo/Cargo.toml", "pattern": "(?m)^version = \"(?P<version>[^\"]+)\"", "kind": "regex" }
      ]
    }
  ]
}
"#;

pub const FOO_MANIFEST: &str = "[package]\nname = \"foo\"\nversion = \"1.0.0\"\n";

/// A workspace on disk plus an engine opened on it
pub struct Workspace {
    pub temp: TempDir,
    pub config: EngineConfig,
}

impl Workspace {
    /// The two-entity workspace: `global:main` with child `component:foo`
    pub fn basic() -> Self {
        Self::with_registry(REGISTRY_JSON, &[("VERSION", "1.0.0\n"), ("foo/Cargo.toml", FOO_MANIFEST)])
    }

    pub fn with_registry(registry_json: &str, files: &[(&str, &str)]) -> Self {
        let temp = TempDir::new().unwrap();
        let mut config = EngineConfig::for_workspace(temp.path());
        config.signing.primary_key = Some(PRIMARY_KEY.to_string());
        config.signing.secondary_key = Some(SECONDARY_KEY.to_string());
        config.signing.allow_fallback_key = false;

        std::fs::write(config.registry_file(), registry_json).unwrap();
        for (rel, content) in files {
            let path = temp.path().join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
        Self { temp, config }
    }

    pub async fn open(&self) -> BumpOrchestrator {
        self.open_with(Arc::new(LocalFileStore)).await
    }

    pub async fn open_with(&self, store: Arc<dyn FileStore>) -> BumpOrchestrator {
        let secrets = Arc::new(TomlSecretStore::new(self.config.secret_store_file()));
        BumpOrchestrator::open_with(self.config.clone(), store, secrets).await.unwrap()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.temp.path().join(rel)
    }

    pub fn read(&self, rel: &str) -> String {
        std::fs::read_to_string(self.path(rel)).unwrap()
    }

    /// Every file under the workspace except engine state, with contents
    pub fn snapshot(&self) -> Vec<(PathBuf, Vec<u8>)> {
        let mut files = Vec::new();
        collect(self.temp.path(), &self.config.state_path(), &mut files);
        files.sort();
        files
    }
}

fn collect(dir: &Path, skip: &Path, out: &mut Vec<(PathBuf, Vec<u8>)>) {
    for entry in std::fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path == skip {
            continue;
        }
        if path.is_dir() {
            collect(&path, skip, out);
        } else {
            out.push((path.clone(), std::fs::read(&path).unwrap()));
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The forward write fails; later writes succeed
    FirstWrite,
    /// The forward write succeeds; every later write (the restore) fails
    LaterWrites,
}

/// Local store that fails writes to chosen paths
#[derive(Debug, Default)]
pub struct FaultyStore {
    faults: HashMap<PathBuf, Fault>,
    attempts: Mutex<HashMap<PathBuf, usize>>,
    written: Mutex<Vec<PathBuf>>,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(mut self, path: PathBuf, fault: Fault) -> Self {
        self.faults.insert(path, fault);
        self
    }

    /// Paths written successfully, in order
    pub fn written(&self) -> Vec<PathBuf> {
        self.written.lock().unwrap().clone()
    }
}

impl FileStore for FaultyStore {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        LocalFileStore.read(path)
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let n = attempts.entry(path.to_path_buf()).or_insert(0);
            *n += 1;
            *n
        };
        let fails = match self.faults.get(path) {
            Some(Fault::FirstWrite) => attempt == 1,
            Some(Fault::LaterWrites) => attempt > 1,
            None => false,
        };
        if fails {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "injected write failure"));
        }

        LocalFileStore.write(path, bytes)?;
        self.written.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        LocalFileStore.exists(path)
    }
}
