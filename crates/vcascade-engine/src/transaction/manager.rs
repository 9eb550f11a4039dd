//! Drives one bump from snapshot to commit or rollback

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, instrument, warn};
use vcascade_common::now_millis;

use super::backup::{backup_dirs, BackupRole, BackupSet, BackupState};
use super::{BumpTransaction, TransactionStatus};
use crate::config::EngineConfig;
use crate::error::{EngineError, RestoreFailure, Result};
use crate::file_store::FileStore;
use crate::manifest::{AffectedEntity, BumpScope, FileChange, Manifest, ManifestStatus, ManifestStore};
use crate::mutator::{resolve_target, FileMutator};
use crate::registry::{Registry, RegistryStore};
use crate::signing::SigningService;

/// What to execute: the frozen affected set plus request metadata
#[derive(Debug, Clone)]
pub struct TransactionPlan {
    pub scope: BumpScope,
    pub target_entity_id: Option<String>,
    pub affected: Vec<AffectedEntity>,
    pub dry_run: bool,
}

#[derive(Debug, Clone)]
pub struct TransactionOutcome {
    pub transaction_id: String,
    /// `committed`, or `prepared` for a dry run
    pub status: TransactionStatus,
    pub affected: Vec<AffectedEntity>,
    pub file_changes: Vec<FileChange>,
    pub warnings: Vec<String>,
    pub manifest: Option<Manifest>,
    pub manifest_path: Option<PathBuf>,
    /// Registry as persisted by the commit
    pub registry: Option<Registry>,
}

pub struct TransactionManager<'a> {
    config: &'a EngineConfig,
    store: &'a dyn FileStore,
    signing: &'a SigningService,
    registry_store: &'a RegistryStore,
    manifests: &'a ManifestStore,
}

impl<'a> TransactionManager<'a> {
    pub fn new(
        config: &'a EngineConfig,
        store: &'a dyn FileStore,
        signing: &'a SigningService,
        registry_store: &'a RegistryStore,
        manifests: &'a ManifestStore,
    ) -> Self {
        Self {
            config,
            store,
            signing,
            registry_store,
            manifests,
        }
    }

    /// Run one transaction to a terminal state (or to `prepared` for a dry run)
    ///
    /// Failures before `prepared` leave no trace. Failures after it restore
    /// every snapshotted file and surface as `RolledBack` or, when a restore
    /// itself fails, `RollbackFailure`.
    #[instrument(skip_all, fields(scope = %plan.scope, dry_run = plan.dry_run, transaction_id = tracing::field::Empty))]
    pub fn execute(&self, registry: &Registry, plan: TransactionPlan) -> Result<TransactionOutcome> {
        let mut tx = BumpTransaction::new(plan.scope, plan.target_entity_id.clone());
        tracing::Span::current().record("transaction_id", tx.transaction_id.as_str());
        info!(affected = plan.affected.len(), "Starting bump transaction");

        let backup = self.snapshot(&tx, registry, &plan)?;
        if let Err(e) = tx.prepare(plan.affected) {
            backup.discard_quietly();
            return Err(e);
        }
        debug!("Transaction prepared");

        let mut mutator = FileMutator::new(self.store, &self.config.workspace_root);
        let mut warnings = Vec::new();
        if let Err(cause) = compute_mutations(registry, &tx, &mut mutator, &mut warnings) {
            return Err(self.roll_back(tx, &backup, cause, plan.dry_run));
        }
        tx.file_changes = mutator.file_changes();
        warnings.extend(mutator.take_warnings());

        if plan.dry_run {
            info!(files = tx.file_changes.len(), "Dry run complete; nothing written");
            return Ok(TransactionOutcome {
                transaction_id: tx.transaction_id.clone(),
                status: tx.status(),
                affected: tx.affected_entities().to_vec(),
                file_changes: tx.file_changes.clone(),
                warnings,
                manifest: None,
                manifest_path: None,
                registry: None,
            });
        }

        let (manifest, manifest_path, next_registry) = match self.apply(&mut tx, registry, &mutator) {
            Ok(applied) => applied,
            Err(cause) => return Err(self.roll_back(tx, &backup, cause, false)),
        };
        tx.commit()?;

        if self.config.keep_backups {
            let mut backup = backup;
            if let Err(e) = backup.mark_committed() {
                warn!(error = %e, "Failed to mark kept backup as committed");
            }
        } else {
            backup.discard_quietly();
        }

        info!(
            affected = tx.affected_entities().len(),
            files = tx.file_changes.len(),
            manifest = %manifest_path.display(),
            "Transaction committed"
        );

        Ok(TransactionOutcome {
            transaction_id: tx.transaction_id.clone(),
            status: tx.status(),
            affected: tx.affected_entities().to_vec(),
            file_changes: tx.file_changes.clone(),
            warnings,
            manifest: Some(manifest),
            manifest_path: Some(manifest_path),
            registry: Some(next_registry),
        })
    }

    /// Snapshot every target file of the affected set plus the registry file
    fn snapshot(&self, tx: &BumpTransaction, registry: &Registry, plan: &TransactionPlan) -> Result<BackupSet> {
        let mut backup = if plan.dry_run {
            BackupSet::in_memory(&tx.transaction_id, tx.created_at)
        } else {
            BackupSet::create(&self.config.backups_dir(), &tx.transaction_id, tx.created_at)?
        };

        let result = self.fill_backup(&mut backup, registry, &plan.affected);
        if let Err(e) = result {
            backup.discard_quietly();
            return Err(e);
        }
        Ok(backup)
    }

    fn fill_backup(&self, backup: &mut BackupSet, registry: &Registry, affected: &[AffectedEntity]) -> Result<()> {
        let mut paths: Vec<(PathBuf, BackupRole)> = Vec::new();
        for item in affected {
            for target in &registry.get(&item.entity_id)?.target_files {
                paths.push((resolve_target(&self.config.workspace_root, &target.path), BackupRole::Target));
            }
        }
        paths.push((self.registry_store.path().to_path_buf(), BackupRole::Registry));

        for (path, role) in paths {
            if backup.contains(&path) {
                continue;
            }
            match self.store.read(&path) {
                Ok(bytes) => backup.snapshot(&path, &bytes, role)?,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(path = %path.display(), "Nothing to snapshot");
                },
                Err(e) => {
                    return Err(EngineError::mutation(&path, format!("cannot snapshot: {e}")));
                },
            }
        }
        backup.seal()
    }

    /// Write files, sign, persist registry and manifest
    fn apply(
        &self,
        tx: &mut BumpTransaction,
        registry: &Registry,
        mutator: &FileMutator<'_>,
    ) -> Result<(Manifest, PathBuf, Registry)> {
        for (path, bytes) in mutator.pending_writes() {
            self.store
                .write(&path, &bytes)
                .map_err(|e| EngineError::mutation(&path, format!("write failed: {e}")))?;
            debug!(path = %path.display(), "Wrote target file");
        }

        let next_registry = registry.with_versions(
            tx.affected_entities()
                .iter()
                .map(|a| (a.entity_id.as_str(), a.new_version.as_str())),
        )?;

        tx.committed_at = Some(now_millis());
        let mut manifest = tx.to_manifest(ManifestStatus::Committed);
        self.signing.sign(&mut manifest)?;

        let registry_path = self.registry_store.path();
        let registry_bytes = self.registry_store.encode(&next_registry)?;
        self.store
            .write(registry_path, &registry_bytes)
            .map_err(|e| EngineError::mutation(registry_path, format!("cannot persist registry: {e}")))?;

        let manifest_path = self.manifests.path_for(&manifest);
        self.store
            .write(&manifest_path, &ManifestStore::encode(&manifest)?)
            .map_err(|e| EngineError::mutation(&manifest_path, format!("cannot persist manifest: {e}")))?;

        Ok((manifest, manifest_path, next_registry))
    }

    fn roll_back(&self, mut tx: BumpTransaction, backup: &BackupSet, cause: EngineError, dry_run: bool) -> EngineError {
        let transaction_id = tx.transaction_id.clone();
        warn!(transaction_id = %transaction_id, error = %cause, "Rolling back transaction");

        let failures = backup.restore(self.store);
        if let Err(e) = tx.roll_back() {
            warn!(error = %e, "Unexpected transaction state during rollback");
        }
        if !dry_run {
            self.record_rolled_back(&tx);
        }

        if failures.is_empty() {
            backup.discard_quietly();
            warn!(transaction_id = %transaction_id, "Transaction rolled back; all files restored");
            return EngineError::RolledBack {
                transaction_id,
                cause: Box::new(cause),
            };
        }

        for failure in &failures {
            error!(
                transaction_id = %transaction_id,
                path = %failure.path.display(),
                reason = %failure.reason,
                "FAILED TO RESTORE FILE"
            );
        }
        error!(
            transaction_id = %transaction_id,
            failed = failures.len(),
            backup_dir = ?backup.dir(),
            "ROLLBACK FAILED: workspace files may be inconsistent; backup kept for recovery"
        );
        EngineError::RollbackFailure {
            transaction_id,
            failures,
            cause: Box::new(cause),
        }
    }

    /// Persist a signed rolled-back manifest as an audit record, best effort
    fn record_rolled_back(&self, tx: &BumpTransaction) {
        let mut manifest = tx.to_manifest(ManifestStatus::RolledBack);
        if let Err(e) = self.signing.sign(&mut manifest) {
            warn!(error = %e, "Cannot sign rolled-back manifest; not persisting it");
            return;
        }
        match self.manifests.save(&manifest) {
            Ok(path) => debug!(path = %path.display(), "Recorded rolled-back manifest"),
            Err(e) => warn!(error = %e, "Failed to persist rolled-back manifest"),
        }
    }
}

/// Rewrite every target of every affected entity in memory
fn compute_mutations(
    registry: &Registry,
    tx: &BumpTransaction,
    mutator: &mut FileMutator<'_>,
    warnings: &mut Vec<String>,
) -> Result<()> {
    for item in tx.affected_entities() {
        let entity = registry.get(&item.entity_id)?;
        if entity.target_files.is_empty() {
            warn!(entity_id = %entity.id, "Affected entity has no target files");
            warnings.push(format!("entity '{}' has no target files", entity.id));
            continue;
        }

        let mut matched = 0;
        for target in &entity.target_files {
            matched += mutator.rewrite_version(target, &item.old_version, &item.new_version)?;
        }
        if matched == 0 {
            warn!(entity_id = %entity.id, "No target file of the entity contained its version");
            warnings.push(format!(
                "entity '{}': none of its {} target file(s) matched; its version string was not rewritten anywhere",
                entity.id,
                entity.target_files.len()
            ));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Files restored from the backup
    Restored,
    /// A committed manifest exists; only the leftover backup was removed
    AlreadyCommitted,
    /// Interrupted while snapshotting, before any workspace write
    Incomplete,
}

#[derive(Debug, Clone)]
pub struct RecoveredTransaction {
    pub transaction_id: String,
    pub action: RecoveryAction,
    pub files: usize,
}

#[derive(Debug, Clone, Default)]
pub struct RecoveryReport {
    pub transactions: Vec<RecoveredTransaction>,
}

impl RecoveryReport {
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

/// Restore every transaction a previous process left behind
#[instrument(skip(manifests, store))]
pub fn recover_interrupted(
    backups_root: &Path,
    manifests: &ManifestStore,
    store: &dyn FileStore,
) -> Result<RecoveryReport> {
    let committed: HashSet<String> = manifests
        .list()?
        .into_iter()
        .filter(|(_, m)| m.status == ManifestStatus::Committed)
        .map(|(_, m)| m.transaction_id)
        .collect();

    let mut report = RecoveryReport::default();
    let mut failed: Option<(String, Vec<RestoreFailure>)> = None;

    for dir in backup_dirs(backups_root)? {
        let Some(backup) = BackupSet::open(&dir)? else {
            let transaction_id = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            info!(transaction_id = %transaction_id, "Removing incomplete backup");
            std::fs::remove_dir_all(&dir)?;
            report.transactions.push(RecoveredTransaction {
                transaction_id,
                action: RecoveryAction::Incomplete,
                files: 0,
            });
            continue;
        };

        let transaction_id = backup.transaction_id().to_string();
        if backup.index().state == BackupState::Committed {
            continue;
        }
        if committed.contains(&transaction_id) {
            info!(transaction_id = %transaction_id, "Transaction had committed; removing leftover backup");
            backup.discard()?;
            report.transactions.push(RecoveredTransaction {
                transaction_id,
                action: RecoveryAction::AlreadyCommitted,
                files: 0,
            });
            continue;
        }

        warn!(transaction_id = %transaction_id, "Restoring interrupted transaction");
        let failures = backup.restore(store);
        if failures.is_empty() {
            backup.discard()?;
            report.transactions.push(RecoveredTransaction {
                transaction_id,
                action: RecoveryAction::Restored,
                files: backup.index().entries.len(),
            });
        } else {
            for failure in &failures {
                error!(
                    transaction_id = %transaction_id,
                    path = %failure.path.display(),
                    reason = %failure.reason,
                    "FAILED TO RESTORE FILE"
                );
            }
            match &mut failed {
                Some((_, all)) => all.extend(failures),
                None => failed = Some((transaction_id, failures)),
            }
        }
    }

    match failed {
        Some((transaction_id, failures)) => Err(EngineError::RollbackFailure {
            cause: Box::new(EngineError::Interrupted(transaction_id.clone())),
            transaction_id,
            failures,
        }),
        None => Ok(report),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::collections::HashMap;
    use std::io;
    use std::sync::Mutex;

    use tempfile::TempDir;

    use super::*;
    use crate::file_store::LocalFileStore;
    use crate::graph::{plan_cascade, CascadeRequest};
    use crate::registry::{EntityType, TargetFile, VersionedEntity};
    use crate::semver::BumpKind;
    use crate::signing::{KeyVersion, Keyring, SigningKey};

    /// Local store whose writes to chosen paths fail after a number of successes
    #[derive(Debug, Default)]
    struct FlakyStore {
        allowed: HashMap<PathBuf, usize>,
        writes: Mutex<HashMap<PathBuf, usize>>,
    }

    impl FlakyStore {
        fn failing(path: PathBuf, allowed_writes: usize) -> Self {
            let mut store = Self::default();
            store.allowed.insert(path, allowed_writes);
            store
        }

        fn and(mut self, path: PathBuf, allowed_writes: usize) -> Self {
            self.allowed.insert(path, allowed_writes);
            self
        }
    }

    impl FileStore for FlakyStore {
        fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
            LocalFileStore.read(path)
        }

        fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
            let mut writes = self.writes.lock().unwrap();
            let done = writes.entry(path.to_path_buf()).or_insert(0);
            if let Some(&allowed) = self.allowed.get(path) {
                if *done >= allowed {
                    return Err(io::Error::new(io::ErrorKind::PermissionDenied, "injected failure"));
                }
            }
            *done += 1;
            LocalFileStore.write(path, bytes)
        }

        fn exists(&self, path: &Path) -> bool {
            path.exists()
        }
    }

    struct Fixture {
        temp: TempDir,
        config: EngineConfig,
        registry: Registry,
        registry_store: RegistryStore,
        manifests: ManifestStore,
        signing: SigningService,
    }

    const PACKAGE_JSON: &str = "{\n  \"name\": \"foo\",\n  \"version\": \"1.0.0\"\n}\n";

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("VERSION"), "1.0.0\n").unwrap();
        std::fs::create_dir_all(temp.path().join("foo")).unwrap();
        std::fs::write(temp.path().join("foo/package.json"), PACKAGE_JSON).unwrap();

        let registry = Registry::new(vec![
            VersionedEntity::root("global:main", EntityType::Global, "1.0.0")
                .with_target(TargetFile::literal("VERSION", "{version}")),
            VersionedEntity::linked("component:foo", EntityType::Component, "1.0.0", "global:main")
                .with_target(TargetFile::literal("foo/package.json", r#""version": "{version}""#)),
        ])
        .unwrap();

        let config = EngineConfig::for_workspace(temp.path());
        let registry_store = RegistryStore::new(config.registry_file());
        registry_store.save(&registry).unwrap();
        let manifests = ManifestStore::new(config.manifests_dir());
        let signing = SigningService::new(Keyring::new(Some(SigningKey::generate()), None), KeyVersion::Primary);

        Fixture {
            temp,
            config,
            registry,
            registry_store,
            manifests,
            signing,
        }
    }

    impl Fixture {
        fn plan(&self, dry_run: bool) -> TransactionPlan {
            TransactionPlan {
                scope: BumpScope::Global,
                target_entity_id: None,
                affected: plan_cascade(&self.registry, &CascadeRequest::global(BumpKind::Patch)).unwrap(),
                dry_run,
            }
        }

        fn run(&self, store: &dyn FileStore, dry_run: bool) -> Result<TransactionOutcome> {
            let manager =
                TransactionManager::new(&self.config, store, &self.signing, &self.registry_store, &self.manifests);
            manager.execute(&self.registry, self.plan(dry_run))
        }

        fn read(&self, rel: &str) -> String {
            std::fs::read_to_string(self.temp.path().join(rel)).unwrap()
        }

        fn backups_left(&self) -> usize {
            backup_dirs(&self.config.backups_dir()).unwrap().len()
        }
    }

    #[test]
    fn test_commit_rewrites_files_registry_and_manifest() {
        let fx = fixture();
        let outcome = fx.run(&LocalFileStore, false).unwrap();

        assert_eq!(outcome.status, TransactionStatus::Committed);
        assert_eq!(fx.read("VERSION"), "1.0.1\n");
        assert!(fx.read("foo/package.json").contains(r#""version": "1.0.1""#));
        assert_eq!(outcome.file_changes.len(), 2);

        let persisted = fx.registry_store.load().unwrap();
        assert_eq!(persisted.get("component:foo").unwrap().current_version, "1.0.1");
        assert_eq!(Some(&persisted), outcome.registry.as_ref());

        let manifest = ManifestStore::load(outcome.manifest_path.unwrap()).unwrap();
        assert_eq!(manifest.status, ManifestStatus::Committed);
        assert!(manifest.committed_at.is_some());
        assert!(fx.signing.verify(&manifest).unwrap());
        assert_eq!(fx.backups_left(), 0);
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let fx = fixture();
        let registry_before = std::fs::read(fx.config.registry_file()).unwrap();

        let outcome = fx.run(&LocalFileStore, true).unwrap();
        assert_eq!(outcome.status, TransactionStatus::Prepared);
        assert!(outcome.manifest.is_none());
        assert_eq!(outcome.affected.len(), 2);
        assert_eq!(outcome.file_changes[0].match_count, 1);

        assert_eq!(fx.read("VERSION"), "1.0.0\n");
        assert_eq!(fx.read("foo/package.json"), PACKAGE_JSON);
        assert_eq!(std::fs::read(fx.config.registry_file()).unwrap(), registry_before);
        assert!(!fx.config.state_path().exists());
    }

    #[test]
    fn test_failed_registry_write_restores_targets() {
        let fx = fixture();
        let registry_before = std::fs::read(fx.config.registry_file()).unwrap();
        let store = FlakyStore::failing(fx.config.registry_file(), 0);

        let err = fx.run(&store, false).unwrap_err();
        assert!(err.is_rolled_back(), "{err}");

        assert_eq!(fx.read("VERSION"), "1.0.0\n");
        assert_eq!(fx.read("foo/package.json"), PACKAGE_JSON);
        assert_eq!(std::fs::read(fx.config.registry_file()).unwrap(), registry_before);
        assert_eq!(fx.backups_left(), 0);

        let recorded = fx.manifests.list().unwrap();
        assert_eq!(recorded.len(), 1);
        let manifest = &recorded[0].1;
        assert_eq!(manifest.status, ManifestStatus::RolledBack);
        assert_eq!(manifest.committed_at, None);
        assert_eq!(Some(manifest.transaction_id.as_str()), err.transaction_id());
        assert!(fx.signing.verify(manifest).unwrap());
    }

    #[test]
    fn test_failed_restore_escalates_and_keeps_backup() {
        let fx = fixture();
        // VERSION accepts the forward write but not the restore
        let store = FlakyStore::failing(fx.temp.path().join("VERSION"), 1).and(fx.config.registry_file(), 0);

        let err = fx.run(&store, false).unwrap_err();
        let EngineError::RollbackFailure { failures, .. } = &err else {
            panic!("expected rollback failure, got {err}");
        };
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].path, fx.temp.path().join("VERSION"));

        // the file that could be restored was
        assert_eq!(fx.read("foo/package.json"), PACKAGE_JSON);
        assert_eq!(fx.read("VERSION"), "1.0.1\n");
        assert_eq!(fx.backups_left(), 1);

        // a later recovery with a healthy store finishes the job
        let report = recover_interrupted(&fx.config.backups_dir(), &fx.manifests, &LocalFileStore).unwrap();
        assert_eq!(report.transactions.len(), 1);
        assert_eq!(report.transactions[0].action, RecoveryAction::Restored);
        assert_eq!(fx.read("VERSION"), "1.0.0\n");
        assert_eq!(fx.backups_left(), 0);
    }

    #[test]
    fn test_required_target_failure_before_any_write() {
        let mut fx = fixture();
        fx.registry = Registry::new(vec![VersionedEntity::root("global:main", EntityType::Global, "1.0.0")
            .with_target(TargetFile::literal("VERSION", "v{version}").required())])
        .unwrap();

        let err = fx.run(&LocalFileStore, false).unwrap_err();
        let EngineError::RolledBack { cause, .. } = &err else {
            panic!("expected rolled back, got {err}");
        };
        assert!(matches!(**cause, EngineError::Mutation { .. }));
        assert_eq!(fx.read("VERSION"), "1.0.0\n");
    }

    #[test]
    fn test_entities_without_matches_warn() {
        let mut fx = fixture();
        fx.registry = Registry::new(vec![
            VersionedEntity::root("global:main", EntityType::Global, "1.0.0")
                .with_target(TargetFile::literal("VERSION", "{version}")),
            VersionedEntity::linked("documentation:guide", EntityType::Documentation, "1.0.0", "global:main"),
        ])
        .unwrap();

        let outcome = fx.run(&LocalFileStore, true).unwrap();
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].contains("documentation:guide"));
    }

    #[test]
    fn test_recovery_of_interrupted_transactions() {
        let fx = fixture();
        let backups = fx.config.backups_dir();
        let version = fx.temp.path().join("VERSION");

        let mut interrupted = BackupSet::create(&backups, "tx-crashed", 1).unwrap();
        interrupted.snapshot(&version, b"1.0.0\n", BackupRole::Target).unwrap();
        interrupted.seal().unwrap();
        std::fs::write(&version, "1.0.1\n").unwrap();

        std::fs::create_dir_all(backups.join("tx-no-index")).unwrap();

        let mut kept = BackupSet::create(&backups, "tx-kept", 2).unwrap();
        kept.snapshot(&version, b"0.9.0\n", BackupRole::Target).unwrap();
        kept.mark_committed().unwrap();

        let report = recover_interrupted(&backups, &fx.manifests, &LocalFileStore).unwrap();
        let mut actions: Vec<_> = report
            .transactions
            .iter()
            .map(|t| (t.transaction_id.as_str(), t.action))
            .collect();
        actions.sort_by_key(|(id, _)| *id);
        assert_eq!(
            actions,
            vec![("tx-crashed", RecoveryAction::Restored), ("tx-no-index", RecoveryAction::Incomplete)]
        );
        assert_eq!(fx.read("VERSION"), "1.0.0\n");
        assert_eq!(backup_dirs(&backups).unwrap(), vec![backups.join("tx-kept")]);

        assert!(recover_interrupted(&backups, &fx.manifests, &LocalFileStore)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_recovery_skips_committed_transactions() {
        let fx = fixture();
        let outcome = fx.run(&LocalFileStore, false).unwrap();

        // simulate a crash between manifest write and backup removal
        let mut leftover = BackupSet::create(&fx.config.backups_dir(), &outcome.transaction_id, 1).unwrap();
        leftover
            .snapshot(&fx.temp.path().join("VERSION"), b"1.0.0\n", BackupRole::Target)
            .unwrap();
        leftover.seal().unwrap();

        let report = recover_interrupted(&fx.config.backups_dir(), &fx.manifests, &LocalFileStore).unwrap();
        assert_eq!(report.transactions[0].action, RecoveryAction::AlreadyCommitted);
        assert_eq!(fx.read("VERSION"), "1.0.1\n");
        assert_eq!(fx.backups_left(), 0);
    }
}
