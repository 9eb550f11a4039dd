//! Error types for the vcascade CLI
//!
//! Engine failures are translated into messages that say what happened to
//! the workspace and what to do next, and each class maps to an exit code.

use thiserror::Error;
use vcascade_engine::{EngineError, GraphIssue, RestoreFailure};

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_INTEGRITY: i32 = 2;
pub const EXIT_ROLLED_BACK: i32 = 3;
pub const EXIT_ROLLBACK_FAILURE: i32 = 4;
pub const EXIT_VERIFICATION: i32 = 5;

#[derive(Error, Debug)]
pub enum CliError {
    /// The registry graph has errors; nothing was started
    #[error("Registry is invalid ({} error(s)): {}. Run 'vcascade validate' for the full report and fix the registry file.", issues.len(), summarize(issues))]
    Integrity { issues: Vec<GraphIssue> },

    #[error("Bump failed and was rolled back (transaction {transaction_id}): {cause}. No workspace file was changed.")]
    RolledBack { transaction_id: String, cause: String },

    #[error("ROLLBACK FAILED for transaction {transaction_id}: could not restore {}. Original failure: {cause}. Workspace files may be inconsistent; fix the cause and run 'vcascade recover'.", list(failures))]
    RollbackFailure {
        transaction_id: String,
        failures: Vec<RestoreFailure>,
        cause: String,
    },

    #[error("{failed} of {total} manifest(s) failed verification. Treat their contents as untrusted.")]
    Verification { failed: usize, total: usize },

    #[error("Unknown entity '{0}'. Run 'vcascade graph' to list registry entities.")]
    UnknownEntity(String),

    #[error("Signing error: {0}. Check the signing keys with 'vcascade keys status'.")]
    Signing(String),

    #[error(transparent)]
    Engine(EngineError),

    /// File system operation failed
    #[error("File operation failed: {0}. Check file permissions and disk space.")]
    Io(#[from] std::io::Error),

    /// JSON output failed
    #[error("Failed to produce JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic anyhow error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Integrity { .. } => EXIT_INTEGRITY,
            CliError::RolledBack { .. } => EXIT_ROLLED_BACK,
            CliError::RollbackFailure { .. } => EXIT_ROLLBACK_FAILURE,
            CliError::Verification { .. } => EXIT_VERIFICATION,
            _ => EXIT_FAILURE,
        }
    }
}

impl From<EngineError> for CliError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::RegistryIntegrity { issues } => CliError::Integrity { issues },
            EngineError::RolledBack {
                transaction_id,
                cause,
            } => CliError::RolledBack {
                transaction_id,
                cause: cause.to_string(),
            },
            EngineError::RollbackFailure {
                transaction_id,
                failures,
                cause,
            } => CliError::RollbackFailure {
                transaction_id,
                failures,
                cause: cause.to_string(),
            },
            EngineError::UnknownEntity(id) => CliError::UnknownEntity(id),
            EngineError::Signing(reason) => CliError::Signing(reason),
            other => CliError::Engine(other),
        }
    }
}

fn summarize(issues: &[GraphIssue]) -> String {
    let shown: Vec<String> = issues.iter().take(3).map(ToString::to_string).collect();
    let mut summary = shown.join("; ");
    if issues.len() > 3 {
        summary.push_str(&format!("; and {} more", issues.len() - 3));
    }
    summary
}

fn list(failures: &[RestoreFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
