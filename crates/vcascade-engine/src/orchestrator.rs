//! Bump Orchestrator
//!
//! Entry point for every state-changing operation. Writers (bumps, key
//! rotation, recovery) are serialized behind one async mutex; readers get the
//! last committed registry as a cheap `Arc` snapshot without waiting on it.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::file_store::{FileStore, LocalFileStore};
use crate::graph::{plan_cascade, CascadeRequest, GraphValidator, ValidationReport};
use crate::manifest::{AffectedEntity, BumpScope, FileChange, Manifest, ManifestStore};
use crate::registry::{Registry, RegistryStore};
use crate::semver::BumpKind;
use crate::signing::{
    KeyLoader, KeySource, KeyVersion, RotationState, RotationStore, SecretStore, SigningService,
    TomlSecretStore,
};
use crate::transaction::{
    recover_interrupted, RecoveryAction, RecoveryReport, TransactionManager, TransactionPlan,
    TransactionStatus,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BumpRequest {
    pub scope: BumpScope,
    pub target_entity_id: Option<String>,
    /// Root increment for `global`; ignored by the other scopes
    pub global_increment: BumpKind,
    pub dry_run: bool,
}

impl BumpRequest {
    pub fn global(increment: BumpKind) -> Self {
        Self {
            scope: BumpScope::Global,
            target_entity_id: None,
            global_increment: increment,
            dry_run: false,
        }
    }

    pub fn targeted(scope: BumpScope, entity_id: impl Into<String>) -> Self {
        Self {
            scope,
            target_entity_id: Some(entity_id.into()),
            global_increment: BumpKind::Patch,
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    fn cascade(&self) -> CascadeRequest {
        CascadeRequest {
            scope: self.scope,
            target_entity_id: self.target_entity_id.clone(),
            global_increment: self.global_increment,
        }
    }
}

/// Result of a committed or dry-run bump
#[derive(Debug, Clone)]
pub struct BumpOutcome {
    pub transaction_id: String,
    pub status: TransactionStatus,
    pub affected: Vec<AffectedEntity>,
    pub file_changes: Vec<FileChange>,
    pub warnings: Vec<String>,
    pub manifest: Option<Manifest>,
    pub manifest_path: Option<PathBuf>,
    pub dry_run: bool,
}

/// One row of `keys status`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyStatus {
    pub version: KeyVersion,
    pub source: Option<KeySource>,
    pub fingerprint: Option<String>,
    pub current: bool,
}

impl KeyStatus {
    pub fn is_loaded(&self) -> bool {
        self.source.is_some()
    }
}

pub struct BumpOrchestrator {
    config: EngineConfig,
    store: Arc<dyn FileStore>,
    registry_store: RegistryStore,
    manifests: ManifestStore,
    rotation: RotationStore,
    registry: RwLock<Arc<Registry>>,
    /// Validation of the registry as it was loaded
    load_report: ValidationReport,
    signing: RwLock<Arc<SigningService>>,
    writer: Mutex<()>,
}

impl std::fmt::Debug for BumpOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BumpOrchestrator")
            .field("workspace_root", &self.config.workspace_root)
            .field("registry", &self.registry_store.path())
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl BumpOrchestrator {
    /// Open a workspace with the local filesystem and the TOML secret store
    pub async fn open(config: EngineConfig) -> Result<Self> {
        let secrets = Arc::new(TomlSecretStore::new(config.secret_store_file()));
        Self::open_with(config, Arc::new(LocalFileStore), secrets).await
    }

    /// Open with explicit stores; loads and validates the registry, then loads
    /// both signing keys
    ///
    /// An invalid registry still opens so it can be inspected and recovered;
    /// every bump is refused until it is fixed.
    #[instrument(skip_all, fields(workspace = %config.workspace_root.display()))]
    pub async fn open_with(
        config: EngineConfig,
        store: Arc<dyn FileStore>,
        secrets: Arc<dyn SecretStore>,
    ) -> Result<Self> {
        config.validate()?;

        let registry_store = RegistryStore::new(config.registry_file());
        let registry = registry_store.load()?;

        let keyring = KeyLoader::from_config(&config, secrets).load_keyring().await?;

        let rotation = RotationStore::new(config.rotation_path());
        let current = match config.signing.current_key_version {
            Some(version) => version,
            None => rotation.load()?.current_key_version,
        };

        info!(entities = registry.len(), current_key = %current, "Opened workspace");
        Ok(Self::assemble(config, store, registry_store, registry, SigningService::new(keyring, current)))
    }

    /// Build from already-loaded parts; nothing is read from disk
    pub fn from_parts(
        config: EngineConfig,
        store: Arc<dyn FileStore>,
        registry: Registry,
        signing: SigningService,
    ) -> Self {
        let registry_store = RegistryStore::new(config.registry_file());
        Self::assemble(config, store, registry_store, registry, signing)
    }

    fn assemble(
        config: EngineConfig,
        store: Arc<dyn FileStore>,
        registry_store: RegistryStore,
        registry: Registry,
        signing: SigningService,
    ) -> Self {
        let load_report = validate_loaded(&registry, config.max_graph_depth);
        Self {
            manifests: ManifestStore::new(config.manifests_dir()),
            rotation: RotationStore::new(config.rotation_path()),
            config,
            store,
            registry_store,
            registry: RwLock::new(Arc::new(registry)),
            load_report,
            signing: RwLock::new(Arc::new(signing)),
            writer: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn manifests(&self) -> &ManifestStore {
        &self.manifests
    }

    /// Last committed registry
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn signing(&self) -> Arc<SigningService> {
        Arc::clone(&self.signing.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn replace_registry(&self, registry: Registry) {
        *self.registry.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(registry);
    }

    /// Validation findings from when the registry was loaded
    pub fn load_report(&self) -> &ValidationReport {
        &self.load_report
    }

    pub fn validate(&self) -> ValidationReport {
        GraphValidator::new(self.config.max_graph_depth).validate(&self.registry())
    }

    /// Bump, cascade and commit (or only prepare, for a dry run)
    ///
    /// Refuses to start on an invalid registry or when the current signing
    /// key is not loaded.
    #[instrument(
        skip(self),
        fields(scope = %request.scope, target = ?request.target_entity_id, dry_run = request.dry_run)
    )]
    pub async fn bump(&self, request: BumpRequest) -> Result<BumpOutcome> {
        let _writer = self.writer.lock().await;
        let registry = self.registry();

        let report = GraphValidator::new(self.config.max_graph_depth).validate(&registry);
        if let Err(e) = report.ensure_valid() {
            warn!(errors = report.errors.len(), "Refusing to bump an invalid registry");
            return Err(e);
        }

        let affected = plan_cascade(&registry, &request.cascade())?;

        let signing = self.signing();
        let current = signing.current_key_version();
        if !signing.keyring().has(current) {
            return Err(EngineError::signing(format!(
                "the current signing key ({current}) is not loaded; configure it or rotate to a loaded key"
            )));
        }

        let manager = TransactionManager::new(
            &self.config,
            self.store.as_ref(),
            &signing,
            &self.registry_store,
            &self.manifests,
        );
        let outcome = manager.execute(
            &registry,
            TransactionPlan {
                scope: request.scope,
                target_entity_id: request.target_entity_id.clone(),
                affected,
                dry_run: request.dry_run,
            },
        )?;

        if let Some(next) = outcome.registry {
            self.replace_registry(next);
        }

        Ok(BumpOutcome {
            transaction_id: outcome.transaction_id,
            status: outcome.status,
            affected: outcome.affected,
            file_changes: outcome.file_changes,
            warnings: outcome.warnings,
            manifest: outcome.manifest,
            manifest_path: outcome.manifest_path,
            dry_run: request.dry_run,
        })
    }

    /// Make `to` the signing key for new manifests
    #[instrument(skip(self))]
    pub async fn rotate_signing_key(&self, to: KeyVersion) -> Result<RotationState> {
        let _writer = self.writer.lock().await;

        let next = self.signing().with_current(to)?;
        let state = self.rotation.load()?.rotated_to(to);
        self.rotation.save(&state)?;
        *self.signing.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);

        if let Some(pinned) = self.config.signing.current_key_version.filter(|v| *v != to) {
            warn!(pinned = %pinned, "Configuration pins the signing key; the rotation only lasts until restart");
        }
        info!(current = %to, "Rotated signing key");
        Ok(state)
    }

    pub fn key_status(&self) -> Vec<KeyStatus> {
        let signing = self.signing();
        KeyVersion::ALL
            .iter()
            .map(|&version| {
                let key = signing.keyring().get(version);
                KeyStatus {
                    version,
                    source: key.map(|k| k.source()),
                    fingerprint: key.map(|k| k.fingerprint()),
                    current: version == signing.current_key_version(),
                }
            })
            .collect()
    }

    pub fn verify_manifest(&self, manifest: &Manifest) -> Result<bool> {
        self.signing().verify(manifest)
    }

    /// Persisted manifests, oldest first
    pub fn history(&self) -> Result<Vec<(PathBuf, Manifest)>> {
        self.manifests.list()
    }

    /// Restore transactions a previous process left half-done
    #[instrument(skip(self))]
    pub async fn recover(&self) -> Result<RecoveryReport> {
        let _writer = self.writer.lock().await;

        let report = recover_interrupted(&self.config.backups_dir(), &self.manifests, self.store.as_ref())?;
        if report
            .transactions
            .iter()
            .any(|t| t.action == RecoveryAction::Restored)
        {
            let registry = self.registry_store.load()?;
            validate_loaded(&registry, self.config.max_graph_depth);
            self.replace_registry(registry);
        }
        info!(transactions = report.transactions.len(), "Recovery finished");
        Ok(report)
    }
}

/// Read-only manifest verification
///
/// Loads whichever keys already exist and nothing else: no registry, no
/// rotation state, and no fallback key generation.
#[derive(Debug)]
pub struct ManifestVerifier {
    signing: SigningService,
    manifests: ManifestStore,
}

impl ManifestVerifier {
    pub async fn open(config: &EngineConfig) -> Result<Self> {
        let secrets = Arc::new(TomlSecretStore::new(config.secret_store_file()));
        Self::open_with(config, secrets).await
    }

    pub async fn open_with(config: &EngineConfig, secrets: Arc<dyn SecretStore>) -> Result<Self> {
        config.validate()?;
        let keyring = KeyLoader::from_config(config, secrets).load_existing_keyring().await?;
        Ok(Self {
            // verification follows each manifest's keyVersion; nothing is signed here
            signing: SigningService::new(keyring, KeyVersion::Primary),
            manifests: ManifestStore::new(config.manifests_dir()),
        })
    }

    /// Every persisted manifest, oldest first
    pub fn manifest_paths(&self) -> Result<Vec<PathBuf>> {
        Ok(self.manifests.list()?.into_iter().map(|(path, _)| path).collect())
    }

    pub fn verify(&self, manifest: &Manifest) -> Result<bool> {
        self.signing.verify(manifest)
    }

    pub fn verify_file(&self, path: &Path) -> Result<(Manifest, bool)> {
        let manifest = ManifestStore::load(path)?;
        let valid = self.verify(&manifest)?;
        Ok((manifest, valid))
    }
}

/// Validate a freshly loaded registry and log every finding
fn validate_loaded(registry: &Registry, max_depth: usize) -> ValidationReport {
    let report = GraphValidator::new(max_depth).validate(registry);
    for issue in &report.errors {
        error!(issue = %issue, "Registry integrity error");
    }
    for issue in &report.warnings {
        warn!(issue = %issue, "Registry warning");
    }
    if !report.is_valid() {
        error!(errors = report.errors.len(), "Registry is invalid; bumps are refused until it is fixed");
    }
    report
}
