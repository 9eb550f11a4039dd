//! Transaction Manager
//!
//! ```text
//! pending ──► prepared ──► committed
//!    │            │
//!    └────────────┴──► rolled-back
//! ```

mod backup;
mod manager;

pub use backup::{backup_dirs, BackupEntry, BackupIndex, BackupRole, BackupSet, BackupState, BACKUP_INDEX_FILE};
pub use manager::{
    recover_interrupted, RecoveredTransaction, RecoveryAction, RecoveryReport, TransactionManager,
    TransactionOutcome, TransactionPlan,
};

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vcascade_common::now_millis;

use crate::error::{EngineError, Result};
use crate::manifest::{AffectedEntity, BumpScope, FileChange, Manifest, ManifestStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionStatus {
    Pending,
    Prepared,
    Committed,
    RolledBack,
}

impl TransactionStatus {
    pub fn can_transition_to(self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, next),
            (Pending, Prepared) | (Prepared, Committed) | (Pending, RolledBack) | (Prepared, RolledBack)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TransactionStatus::Committed | TransactionStatus::RolledBack)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStatus::Pending => f.write_str("pending"),
            TransactionStatus::Prepared => f.write_str("prepared"),
            TransactionStatus::Committed => f.write_str("committed"),
            TransactionStatus::RolledBack => f.write_str("rolled-back"),
        }
    }
}

/// One bump in flight
#[derive(Debug, Clone)]
pub struct BumpTransaction {
    pub transaction_id: String,
    pub scope: BumpScope,
    pub target_entity_id: Option<String>,
    status: TransactionStatus,
    affected_entities: Vec<AffectedEntity>,
    pub file_changes: Vec<FileChange>,
    pub created_at: i64,
    pub committed_at: Option<i64>,
}

impl BumpTransaction {
    pub fn new(scope: BumpScope, target_entity_id: Option<String>) -> Self {
        Self {
            transaction_id: Uuid::new_v4().to_string(),
            scope,
            target_entity_id,
            status: TransactionStatus::Pending,
            affected_entities: Vec::new(),
            file_changes: Vec::new(),
            created_at: now_millis(),
            committed_at: None,
        }
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn affected_entities(&self) -> &[AffectedEntity] {
        &self.affected_entities
    }

    /// Freeze the affected set and move to `prepared`
    pub fn prepare(&mut self, affected: Vec<AffectedEntity>) -> Result<()> {
        self.advance(TransactionStatus::Prepared)?;
        self.affected_entities = affected;
        Ok(())
    }

    pub fn commit(&mut self) -> Result<()> {
        self.advance(TransactionStatus::Committed)?;
        if self.committed_at.is_none() {
            self.committed_at = Some(now_millis());
        }
        Ok(())
    }

    pub fn roll_back(&mut self) -> Result<()> {
        self.advance(TransactionStatus::RolledBack)?;
        self.committed_at = None;
        Ok(())
    }

    fn advance(&mut self, next: TransactionStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(EngineError::InvalidRequest(format!(
                "transaction {} cannot move from {} to {next}",
                self.transaction_id, self.status
            )));
        }
        self.status = next;
        Ok(())
    }

    /// Unsigned manifest describing this transaction
    pub fn to_manifest(&self, status: ManifestStatus) -> Manifest {
        Manifest {
            transaction_id: self.transaction_id.clone(),
            scope: self.scope,
            target_entity_id: self.target_entity_id.clone(),
            status,
            affected_entities: self.affected_entities.clone(),
            file_changes: self.file_changes.clone(),
            created_at: self.created_at,
            committed_at: match status {
                ManifestStatus::Committed => self.committed_at,
                ManifestStatus::RolledBack => None,
            },
            signature: String::new(),
            signed_at: None,
            key_version: None,
        }
    }
}
