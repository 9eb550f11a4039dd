//! Engine configuration
//!
//! Layers, lowest priority first: built-in defaults, an optional TOML file
//! (`vcascade.toml` or an explicit path), then `VCASCADE_*` environment
//! variables with `__` separating nested keys
//! (`VCASCADE_SIGNING__PRIMARY_KEY`). A `.env` file is read first.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::graph::DEFAULT_MAX_DEPTH;
use crate::signing::KeyVersion;

/// Config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "vcascade.toml";

/// Registry file, relative to the workspace root
pub const DEFAULT_REGISTRY_PATH: &str = "vcascade.registry.json";

/// State directory (manifests, backups, keys), relative to the workspace root
pub const DEFAULT_STATE_DIR: &str = ".vcascade";

pub const DEFAULT_SECRET_STORE_PATH: &str = ".secrets.toml";

pub const DEFAULT_SECRET_STORE_TIMEOUT_MS: u64 = 5000;

/// Environment prefix for every engine setting
pub const ENV_PREFIX: &str = "VCASCADE";

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningConfig {
    /// Hex key; wins over the secret store
    pub primary_key: Option<String>,
    pub secondary_key: Option<String>,
    pub secret_store_path: PathBuf,
    pub secret_store_timeout_ms: u64,
    /// Generate and persist a local primary key when no other source has one
    pub allow_fallback_key: bool,
    /// Overrides the persisted rotation state
    pub current_key_version: Option<KeyVersion>,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            primary_key: None,
            secondary_key: None,
            secret_store_path: PathBuf::from(DEFAULT_SECRET_STORE_PATH),
            secret_store_timeout_ms: DEFAULT_SECRET_STORE_TIMEOUT_MS,
            allow_fallback_key: true,
            current_key_version: None,
        }
    }
}

impl fmt::Debug for SigningConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningConfig")
            .field("primary_key", &self.primary_key.as_ref().map(|_| "[REDACTED]"))
            .field("secondary_key", &self.secondary_key.as_ref().map(|_| "[REDACTED]"))
            .field("secret_store_path", &self.secret_store_path)
            .field("secret_store_timeout_ms", &self.secret_store_timeout_ms)
            .field("allow_fallback_key", &self.allow_fallback_key)
            .field("current_key_version", &self.current_key_version)
            .finish()
    }
}

impl SigningConfig {
    pub fn secret_store_timeout(&self) -> Duration {
        Duration::from_millis(self.secret_store_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Base for every relative path below and in the registry
    pub workspace_root: PathBuf,
    pub registry_path: PathBuf,
    pub state_dir: PathBuf,
    pub max_graph_depth: usize,
    /// Keep `backups/<transactionId>/` after a commit
    pub keep_backups: bool,
    pub signing: SigningConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workspace_root: PathBuf::from("."),
            registry_path: PathBuf::from(DEFAULT_REGISTRY_PATH),
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            max_graph_depth: DEFAULT_MAX_DEPTH,
            keep_backups: false,
            signing: SigningConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Defaults rooted at `root`
    pub fn for_workspace(root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: root.into(),
            ..Self::default()
        }
    }

    /// Load from defaults, the config file and the environment
    ///
    /// An explicit `config_file` must exist; the default `vcascade.toml` is
    /// optional.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let file_source = match config_file {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let config: EngineConfig = config::Config::builder()
            .add_source(file_source)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        debug!(?config, "Loaded engine configuration");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_graph_depth == 0 {
            return Err(EngineError::config("max_graph_depth must be greater than 0"));
        }
        if self.signing.secret_store_timeout_ms == 0 {
            return Err(EngineError::config(
                "signing.secret_store_timeout_ms must be greater than 0",
            ));
        }
        for (name, path) in [
            ("workspace_root", &self.workspace_root),
            ("registry_path", &self.registry_path),
            ("state_dir", &self.state_dir),
            ("signing.secret_store_path", &self.signing.secret_store_path),
        ] {
            if path.as_os_str().is_empty() {
                return Err(EngineError::config(format!("{name} cannot be empty")));
            }
        }
        Ok(())
    }

    fn in_workspace(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        }
    }

    pub fn registry_file(&self) -> PathBuf {
        self.in_workspace(&self.registry_path)
    }

    pub fn state_path(&self) -> PathBuf {
        self.in_workspace(&self.state_dir)
    }

    pub fn manifests_dir(&self) -> PathBuf {
        self.state_path().join("manifests")
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.state_path().join("backups")
    }

    pub fn fallback_key_path(&self) -> PathBuf {
        self.state_path().join("keys").join("primary.key")
    }

    pub fn rotation_path(&self) -> PathBuf {
        self.state_path().join("rotation.json")
    }

    pub fn secret_store_file(&self) -> PathBuf {
        self.in_workspace(&self.signing.secret_store_path)
    }
}
