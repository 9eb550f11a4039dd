//! Error taxonomy for the cascade engine
//!
//! The variants map one-to-one onto how a failure must be handled:
//!
//! | class                 | effect                                           |
//! |-----------------------|--------------------------------------------------|
//! | `RegistryIntegrity`   | refuse to start any bump                         |
//! | `UnknownEntity`       | report, no state change                          |
//! | `Mutation`/`Signing`  | roll back if raised after `prepared`             |
//! | `RolledBack`          | transaction terminal in `rolled-back`, files restored |
//! | `RollbackFailure`     | files may be inconsistent, escalate              |

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use vcascade_common::CommonError;

use crate::graph::GraphIssue;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// A single file that could not be restored during rollback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreFailure {
    pub path: PathBuf,
    pub reason: String,
}

impl std::fmt::Display for RestoreFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.reason)
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    /// Cycle, dangling parent, missing required parent, or an over-deep chain
    #[error("Registry integrity check failed with {} error(s): {}", issues.len(), summarize(issues))]
    RegistryIntegrity { issues: Vec<GraphIssue> },

    #[error("Unknown entity: '{0}'")]
    UnknownEntity(String),

    #[error("Mutation failed for '{}': {reason}", path.display())]
    Mutation { path: PathBuf, reason: String },

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Secret store lookup timed out after {0:?}")]
    SecretStoreTimeout(Duration),

    /// The transaction failed after `prepared` and every file was restored
    #[error("Transaction {transaction_id} rolled back: {cause}")]
    RolledBack {
        transaction_id: String,
        cause: Box<EngineError>,
    },

    /// Restoration of at least one file failed; the file set may be mixed
    #[error(
        "ROLLBACK FAILED for transaction {transaction_id}: {} file(s) could not be restored [{}] (original failure: {cause})",
        failures.len(),
        failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
    )]
    RollbackFailure {
        transaction_id: String,
        failures: Vec<RestoreFailure>,
        cause: Box<EngineError>,
    },

    /// A backup left behind by a process that stopped before commit
    #[error("Transaction {0} was interrupted before commit")]
    Interrupted(String),

    #[error("Invalid version '{0}'")]
    InvalidVersion(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Common(#[from] CommonError),
}

impl EngineError {
    pub fn mutation(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Mutation {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn signing(msg: impl Into<String>) -> Self {
        Self::Signing(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn is_integrity_error(&self) -> bool {
        matches!(self, Self::RegistryIntegrity { .. })
    }

    pub fn is_rollback_failure(&self) -> bool {
        matches!(self, Self::RollbackFailure { .. })
    }

    pub fn is_rolled_back(&self) -> bool {
        matches!(self, Self::RolledBack { .. })
    }

    /// Transaction id carried by terminal transaction errors
    pub fn transaction_id(&self) -> Option<&str> {
        match self {
            Self::RolledBack { transaction_id, .. } | Self::RollbackFailure { transaction_id, .. } => {
                Some(transaction_id)
            },
            _ => None,
        }
    }
}

impl From<config::ConfigError> for EngineError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

fn summarize(issues: &[GraphIssue]) -> String {
    const SHOWN: usize = 3;
    let mut parts: Vec<String> = issues.iter().take(SHOWN).map(ToString::to_string).collect();
    if issues.len() > SHOWN {
        parts.push(format!("and {} more", issues.len() - SHOWN));
    }
    parts.join("; ")
}
