//! vcascade Engine
//!
//! Version dependency graph with atomic cascade bumps.
//!
//! # Overview
//!
//! - **Registry Model**: versioned entities in an id-keyed arena ([`registry`])
//! - **Graph Validator**: cycles, dangling parents and over-deep chains ([`graph`])
//! - **File Mutator**: literal and regex version rewriting, in memory ([`mutator`])
//! - **Signing Service**: HMAC-SHA256 manifests with dual-key rotation ([`signing`])
//! - **Transaction Manager**: `pending → prepared → committed | rolled-back`
//!   with byte-for-byte rollback and crash recovery ([`transaction`])
//! - **Bump Orchestrator**: the single-writer entry point ([`orchestrator`])
//!
//! # Example
//!
//! ```no_run
//! use vcascade_engine::{BumpKind, BumpOrchestrator, BumpRequest, EngineConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = EngineConfig::load(None)?;
//!     let engine = BumpOrchestrator::open(config).await?;
//!     let outcome = engine.bump(BumpRequest::global(BumpKind::Patch)).await?;
//!     for entity in &outcome.affected {
//!         println!("{}: {} -> {}", entity.entity_id, entity.old_version, entity.new_version);
//!     }
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod error;
pub mod file_store;
pub mod graph;
pub mod manifest;
pub mod mutator;
pub mod orchestrator;
pub mod registry;
pub mod semver;
pub mod signing;
pub mod transaction;

// Re-export commonly used types
pub use config::EngineConfig;
pub use error::{EngineError, RestoreFailure, Result};
pub use file_store::{FileStore, LocalFileStore};
pub use graph::{GraphIssue, ValidationReport};
pub use manifest::{AffectedEntity, BumpScope, FileChange, Manifest, ManifestStatus, ManifestStore};
pub use orchestrator::{BumpOrchestrator, BumpOutcome, BumpRequest, KeyStatus, ManifestVerifier};
pub use registry::{Registry, RegistryStore, VersionedEntity};
pub use semver::BumpKind;
pub use signing::{KeyVersion, SigningService};
pub use transaction::{RecoveryReport, TransactionStatus};
