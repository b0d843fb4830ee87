//! Version ledger.
//!
//! The ledger allocates version numbers, tracks branch lineage, and writes
//! immutable version records. Numbers come from one sequence per config that
//! every branch draws from, so a branch's own numbers are usually not
//! contiguous.
//!
//! Allocation (read the current maximum, insert maximum + 1) runs under the
//! config's lock. Stores additionally reject duplicate numbers, and a
//! collision with a writer outside this process is retried with a fresh
//! number.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::audit::{AuditAction, AuditContext, AuditDispatcher, AuditEvent, EntityType};
use crate::diff::DiffEngine;
use crate::document::{Document, DocumentHasher};
use crate::error::{
    ConflictError, InvalidStateError, NotFoundError, Result, ValidationError, VaultError,
};
use crate::settings::LedgerSettings;
use crate::store::{Config, ConfigLocks, ConfigStore, Page, Version, VersionStore};

/// Request to append a version.
#[derive(Debug, Clone)]
pub struct NewVersion {
    /// Target config.
    pub config_id: Uuid,
    /// Owning tenant.
    pub tenant_id: String,
    /// Document snapshot.
    pub data: Document,
    /// Branch; the ledger's default branch when unset.
    pub branch: Option<String>,
    /// Explicit parent; inferred from the branch head when unset.
    pub parent_version: Option<u64>,
    /// Explicit change log; generated from the parent diff when unset.
    pub change_log: Option<String>,
    /// Author.
    pub author: String,
    /// Request origin for the audit record.
    pub context: AuditContext,
}

/// Request to fork a new branch.
#[derive(Debug, Clone)]
pub struct NewBranch {
    /// Target config.
    pub config_id: Uuid,
    /// Owning tenant.
    pub tenant_id: String,
    /// Name of the branch to create.
    pub branch: String,
    /// Fork point; becomes the parent of the first version on the branch.
    pub source_version: u64,
    /// Document snapshot.
    pub data: Document,
    /// Explicit change log.
    pub change_log: Option<String>,
    /// Author.
    pub author: String,
    /// Request origin for the audit record.
    pub context: AuditContext,
}

/// One page of version history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionHistory {
    /// Versions on this page, newest first.
    pub versions: Vec<Version>,
    /// 1-based page number.
    pub page: u64,
    /// Page size.
    pub limit: u64,
    /// Matching versions across all pages.
    pub total: u64,
    /// Number of pages.
    pub pages: u64,
}

impl NewVersion {
    /// Creates a request on the default branch with inferred lineage.
    #[must_use]
    pub fn new(config_id: Uuid, tenant_id: &str, data: Document, author: &str) -> Self {
        Self {
            config_id,
            tenant_id: tenant_id.to_string(),
            data,
            branch: None,
            parent_version: None,
            change_log: None,
            author: author.to_string(),
            context: AuditContext::default(),
        }
    }

    /// Sets the branch.
    #[must_use]
    pub fn on_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Sets an explicit parent version.
    #[must_use]
    pub fn with_parent(mut self, parent_version: u64) -> Self {
        self.parent_version = Some(parent_version);
        self
    }

    /// Sets an explicit change log.
    #[must_use]
    pub fn with_change_log(mut self, change_log: impl Into<String>) -> Self {
        self.change_log = Some(change_log.into());
        self
    }

    /// Sets the request origin.
    #[must_use]
    pub fn with_context(mut self, context: AuditContext) -> Self {
        self.context = context;
        self
    }
}

impl NewBranch {
    /// Creates a branch request forking from `source_version`.
    #[must_use]
    pub fn new(
        config_id: Uuid,
        tenant_id: &str,
        branch: &str,
        source_version: u64,
        data: Document,
        author: &str,
    ) -> Self {
        Self {
            config_id,
            tenant_id: tenant_id.to_string(),
            branch: branch.to_string(),
            source_version,
            data,
            change_log: None,
            author: author.to_string(),
            context: AuditContext::default(),
        }
    }

    /// Sets an explicit change log.
    #[must_use]
    pub fn with_change_log(mut self, change_log: impl Into<String>) -> Self {
        self.change_log = Some(change_log.into());
        self
    }

    /// Sets the request origin.
    #[must_use]
    pub fn with_context(mut self, context: AuditContext) -> Self {
        self.context = context;
        self
    }
}

/// Append-only ledger of config versions.
#[derive(Debug)]
pub struct VersionLedger {
    configs: Arc<dyn ConfigStore>,
    versions: Arc<dyn VersionStore>,
    locks: ConfigLocks,
    audit: Arc<AuditDispatcher>,
    diff: DiffEngine,
    hasher: DocumentHasher,
    settings: LedgerSettings,
}

impl VersionLedger {
    /// Creates a ledger with default settings.
    #[must_use]
    pub fn new(
        configs: Arc<dyn ConfigStore>,
        versions: Arc<dyn VersionStore>,
        audit: Arc<AuditDispatcher>,
    ) -> Self {
        Self {
            configs,
            versions,
            locks: ConfigLocks::new(),
            audit,
            diff: DiffEngine::new(),
            hasher: DocumentHasher::new(),
            settings: LedgerSettings::default(),
        }
    }

    /// Replaces the ledger settings.
    #[must_use]
    pub fn with_settings(mut self, settings: LedgerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Gets the ledger settings.
    #[must_use]
    pub const fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    /// Gets the per-config lock registry shared with config writers.
    #[must_use]
    pub const fn locks(&self) -> &ConfigLocks {
        &self.locks
    }

    /// Gets the audit dispatcher.
    #[must_use]
    pub fn audit(&self) -> &AuditDispatcher {
        &self.audit
    }

    /// Gets the diff engine.
    #[must_use]
    pub const fn diff_engine(&self) -> &DiffEngine {
        &self.diff
    }

    /// Loads a config or fails with `NotFound`.
    pub(crate) async fn require_config(&self, config_id: Uuid, tenant_id: &str) -> Result<Config> {
        self.configs
            .find(config_id, tenant_id)
            .await?
            .ok_or_else(|| {
                NotFoundError::Config {
                    config_id,
                    tenant_id: tenant_id.to_string(),
                }
                .into()
            })
    }

    async fn require_writable(
        &self,
        config_id: Uuid,
        tenant_id: &str,
        operation: &str,
    ) -> Result<Config> {
        let config = self.require_config(config_id, tenant_id).await?;
        if config.is_archived {
            return Err(InvalidStateError::Archived {
                config_id,
                operation: operation.to_string(),
            }
            .into());
        }
        Ok(config)
    }

    /// Appends a version to a branch.
    ///
    /// When no parent is given and this is not the config's first version,
    /// the parent is the newest version on the same branch (if the branch has
    /// any). When the parent was inferred and no change log is given, one is
    /// generated from the diff against the parent.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the config does not exist for the tenant,
    /// `InvalidState` if it is archived, and `Conflict` if a version number
    /// could not be allocated within the configured number of attempts.
    pub async fn create_version(&self, request: NewVersion) -> Result<Version> {
        let branch = request
            .branch
            .clone()
            .unwrap_or_else(|| self.settings.default_branch.clone());
        validate_branch(&branch)?;

        let guard = self.locks.acquire(request.config_id).await?;
        let config = self
            .require_writable(request.config_id, &request.tenant_id, "create versions")
            .await?;
        let checksum = self.hasher.checksum(&request.data)?;

        let mut attempt = 1;
        let version = loop {
            let number = self.versions.find_max_version(config.id).await? + 1;
            let (parent_version, change_log) = self.lineage(&request, &branch, number).await?;

            let version = Version {
                id: Uuid::new_v4(),
                config_id: config.id,
                tenant_id: config.tenant_id.clone(),
                version: number,
                branch: branch.clone(),
                parent_version,
                data: request.data.clone(),
                checksum: checksum.clone(),
                change_log,
                created_by: request.author.clone(),
                created_at: chrono::Utc::now(),
                is_archived: false,
            };

            match self.versions.insert(&version).await {
                Ok(()) => break version,
                Err(e) => self.check_retry(e, &mut attempt)?,
            }
        };
        drop(guard);

        info!(
            "Created version {} of config {} on branch '{}'",
            version.version, version.config_id, version.branch
        );

        self.audit
            .emit(
                AuditEvent::new(
                    EntityType::ConfigVersion,
                    version.id,
                    &version.tenant_id,
                    AuditAction::VersionCreate,
                    &version.created_by,
                    json!({
                        "configId": version.config_id,
                        "version": version.version,
                        "branch": version.branch,
                        "parentVersion": version.parent_version,
                    }),
                )
                .with_context(request.context),
            )
            .await;

        Ok(version)
    }

    /// Resolves the parent and change log of a version about to be written.
    async fn lineage(
        &self,
        request: &NewVersion,
        branch: &str,
        number: u64,
    ) -> Result<(Option<u64>, Option<String>)> {
        if request.parent_version.is_some() || number <= 1 {
            return Ok((request.parent_version, request.change_log.clone()));
        }

        let Some(head) = self
            .versions
            .find_latest_on_branch(request.config_id, branch)
            .await?
        else {
            debug!("Branch '{branch}' has no versions yet; leaving parent unset");
            return Ok((None, request.change_log.clone()));
        };

        let change_log = match &request.change_log {
            Some(log) => log.clone(),
            None => {
                let diff = self.diff.compute_diff(&head.data, &request.data);
                self.diff
                    .generate_change_log(&diff, self.settings.change_log_max_length)
            }
        };
        Ok((Some(head.version), Some(change_log)))
    }

    /// Swallows a retryable insert collision until attempts run out.
    fn check_retry(&self, error: VaultError, attempt: &mut u32) -> Result<()> {
        if !error.is_retryable() || *attempt >= self.settings.max_allocation_retries {
            return Err(error);
        }
        warn!(
            "Version allocation collided (attempt {} of {}): {error}",
            attempt, self.settings.max_allocation_retries
        );
        *attempt += 1;
        Ok(())
    }

    /// Forks a new branch with its first version.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the config does not exist for the tenant,
    /// `InvalidState` if it is archived, and `Conflict` if the branch already
    /// has a version.
    pub async fn create_branch(&self, request: NewBranch) -> Result<Version> {
        validate_branch(&request.branch)?;

        let guard = self.locks.acquire(request.config_id).await?;
        let config = self
            .require_writable(request.config_id, &request.tenant_id, "create branches")
            .await?;

        if self
            .versions
            .find_latest_on_branch(config.id, &request.branch)
            .await?
            .is_some()
        {
            return Err(ConflictError::BranchExists {
                config_id: config.id,
                branch: request.branch,
            }
            .into());
        }

        let checksum = self.hasher.checksum(&request.data)?;
        let change_log = request
            .change_log
            .clone()
            .unwrap_or_else(|| format!("Branch created from version {}", request.source_version));

        let mut attempt = 1;
        let version = loop {
            let number = self.versions.find_max_version(config.id).await? + 1;
            let version = Version {
                id: Uuid::new_v4(),
                config_id: config.id,
                tenant_id: config.tenant_id.clone(),
                version: number,
                branch: request.branch.clone(),
                parent_version: Some(request.source_version),
                data: request.data.clone(),
                checksum: checksum.clone(),
                change_log: Some(change_log.clone()),
                created_by: request.author.clone(),
                created_at: chrono::Utc::now(),
                is_archived: false,
            };

            match self.versions.insert(&version).await {
                Ok(()) => break version,
                Err(e) => self.check_retry(e, &mut attempt)?,
            }
        };
        drop(guard);

        info!(
            "Created branch '{}' of config {} at version {} (from {})",
            version.branch, version.config_id, version.version, request.source_version
        );

        self.audit
            .emit(
                AuditEvent::new(
                    EntityType::ConfigVersion,
                    version.id,
                    &version.tenant_id,
                    AuditAction::BranchCreate,
                    &version.created_by,
                    json!({
                        "configId": version.config_id,
                        "newBranch": version.branch,
                        "sourceVersion": request.source_version,
                        "newVersion": version.version,
                    }),
                )
                .with_context(request.context),
            )
            .await;

        Ok(version)
    }

    /// Loads a single version.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` naming the version if it does not exist.
    pub async fn get_version(
        &self,
        config_id: Uuid,
        tenant_id: &str,
        version: u64,
    ) -> Result<Version> {
        self.versions
            .find(config_id, tenant_id, version)
            .await?
            .ok_or_else(|| NotFoundError::Version { config_id, version }.into())
    }

    /// Lists versions newest first, optionally filtered by branch.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn get_version_history(
        &self,
        config_id: Uuid,
        tenant_id: &str,
        branch: Option<&str>,
        page: Page,
    ) -> Result<Vec<Version>> {
        debug!("Listing versions of config {config_id} (branch: {branch:?}, {page:?})");
        self.versions
            .list_by_config(config_id, tenant_id, branch, page)
            .await
    }

    /// Counts versions, optionally filtered by branch.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn count_versions(
        &self,
        config_id: Uuid,
        tenant_id: &str,
        branch: Option<&str>,
    ) -> Result<u64> {
        self.versions
            .count_by_config(config_id, tenant_id, branch)
            .await
    }

    /// Loads one numbered page of history with totals.
    ///
    /// `limit` falls back to the configured page size.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn history_page(
        &self,
        config_id: Uuid,
        tenant_id: &str,
        branch: Option<&str>,
        page: u64,
        limit: Option<u64>,
    ) -> Result<VersionHistory> {
        let page = page.max(1);
        let limit = limit.unwrap_or(self.settings.history_page_size).max(1);

        let versions = self
            .get_version_history(config_id, tenant_id, branch, Page::numbered(page, limit))
            .await?;
        let total = self.count_versions(config_id, tenant_id, branch).await?;

        Ok(VersionHistory {
            versions,
            page,
            limit,
            total,
            pages: total.div_ceil(limit),
        })
    }
}

fn validate_branch(branch: &str) -> Result<()> {
    if branch.trim().is_empty() {
        return Err(ValidationError::field("Branch name cannot be empty", "branch").into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditSink, MemoryAuditSink};
    use crate::error::AuditError;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    const TENANT: &str = "tenant-a";

    struct Fixture {
        ledger: Arc<VersionLedger>,
        store: Arc<MemoryStore>,
        sink: Arc<MemoryAuditSink>,
        config: Config,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(MemoryAuditSink::new());
        let audit = Arc::new(AuditDispatcher::inline(Arc::clone(&sink) as Arc<dyn AuditSink>));
        let config = Config::new(
            TENANT,
            "payments",
            vec![String::from("dev"), String::from("prod")],
            "alice",
        );
        store.save(&config).await.expect("save config");

        let ledger = Arc::new(VersionLedger::new(
            Arc::clone(&store) as Arc<dyn ConfigStore>,
            Arc::clone(&store) as Arc<dyn VersionStore>,
            audit,
        ));
        Fixture { ledger, store, sink, config }
    }

    fn doc(value: serde_json::Value) -> Document {
        Document::from(value)
    }

    #[tokio::test]
    async fn test_first_version_has_no_parent() {
        let f = fixture().await;
        let v1 = f
            .ledger
            .create_version(NewVersion::new(f.config.id, TENANT, doc(json!({"v": 1})), "alice"))
            .await
            .expect("create");

        assert_eq!(v1.version, 1);
        assert_eq!(v1.branch, "main");
        assert_eq!(v1.parent_version, None);
        assert_eq!(v1.change_log, None);
        assert_eq!(v1.checksum.len(), 64);
    }

    #[tokio::test]
    async fn test_parent_and_change_log_are_inferred() {
        let f = fixture().await;
        f.ledger
            .create_version(NewVersion::new(f.config.id, TENANT, doc(json!({"v": 1})), "alice"))
            .await
            .expect("v1");
        let v2 = f
            .ledger
            .create_version(NewVersion::new(f.config.id, TENANT, doc(json!({"v": 2})), "alice"))
            .await
            .expect("v2");

        assert_eq!(v2.version, 2);
        assert_eq!(v2.parent_version, Some(1));
        assert!(v2.change_log.as_deref().is_some_and(|l| l.contains("Modified v")));

        let events = f.sink.events().expect("events");
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].action, AuditAction::VersionCreate);
        assert_eq!(events[1].metadata["parentVersion"], 1);
    }

    #[tokio::test]
    async fn test_explicit_parent_skips_auto_change_log() {
        let f = fixture().await;
        for n in 1..=2 {
            f.ledger
                .create_version(NewVersion::new(f.config.id, TENANT, doc(json!({"n": n})), "a"))
                .await
                .expect("create");
        }
        let v3 = f
            .ledger
            .create_version(
                NewVersion::new(f.config.id, TENANT, doc(json!({"n": 3})), "a").with_parent(1),
            )
            .await
            .expect("v3");

        assert_eq!(v3.parent_version, Some(1));
        assert_eq!(v3.change_log, None);
    }

    #[tokio::test]
    async fn test_numbering_is_shared_across_branches() {
        let f = fixture().await;
        let id = f.config.id;

        let v1 = f
            .ledger
            .create_version(NewVersion::new(id, TENANT, doc(json!({"a": 1})), "a"))
            .await
            .expect("v1");
        let fork = f
            .ledger
            .create_branch(NewBranch::new(id, TENANT, "feature", 1, doc(json!({"a": 2})), "a"))
            .await
            .expect("branch");
        let v3 = f
            .ledger
            .create_version(NewVersion::new(id, TENANT, doc(json!({"a": 3})), "a"))
            .await
            .expect("v3");
        let v4 = f
            .ledger
            .create_version(
                NewVersion::new(id, TENANT, doc(json!({"a": 4})), "a").on_branch("feature"),
            )
            .await
            .expect("v4");

        assert_eq!([v1.version, fork.version, v3.version, v4.version], [1, 2, 3, 4]);
        assert_eq!(fork.parent_version, Some(1));
        assert_eq!(fork.change_log.as_deref(), Some("Branch created from version 1"));
        // Main's parent skips the feature branch's version 2.
        assert_eq!(v3.parent_version, Some(1));
        assert_eq!(v4.parent_version, Some(2));
    }

    #[tokio::test]
    async fn test_new_branch_without_versions_has_no_parent() {
        let f = fixture().await;
        let id = f.config.id;
        f.ledger
            .create_version(NewVersion::new(id, TENANT, doc(json!({})), "a"))
            .await
            .expect("v1");

        let v2 = f
            .ledger
            .create_version(
                NewVersion::new(id, TENANT, doc(json!({"x": true})), "a").on_branch("hotfix"),
            )
            .await
            .expect("v2");
        assert_eq!(v2.version, 2);
        assert_eq!(v2.parent_version, None);
        assert_eq!(v2.change_log, None);
    }

    #[tokio::test]
    async fn test_existing_branch_conflicts() {
        let f = fixture().await;
        let id = f.config.id;
        f.ledger
            .create_version(NewVersion::new(id, TENANT, doc(json!({})), "a"))
            .await
            .expect("v1");

        let err = f
            .ledger
            .create_branch(NewBranch::new(id, TENANT, "main", 1, doc(json!({})), "a"))
            .await
            .expect_err("must conflict");
        assert!(matches!(err, VaultError::Conflict(ConflictError::BranchExists { .. })));
        assert_eq!(f.ledger.count_versions(id, TENANT, None).await.expect("count"), 1);
    }

    #[tokio::test]
    async fn test_archived_config_rejects_writes() {
        let f = fixture().await;
        let mut config = f.config.clone();
        config.is_archived = true;
        f.store.save(&config).await.expect("archive");

        let err = f
            .ledger
            .create_version(NewVersion::new(config.id, TENANT, doc(json!({"any": "thing"})), "a"))
            .await
            .expect_err("must fail");
        assert!(matches!(err, VaultError::InvalidState(InvalidStateError::Archived { .. })));

        let err = f
            .ledger
            .create_branch(NewBranch::new(config.id, TENANT, "b", 1, doc(json!({})), "a"))
            .await
            .expect_err("must fail");
        assert!(matches!(err, VaultError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_unknown_config_and_tenant() {
        let f = fixture().await;
        let err = f
            .ledger
            .create_version(NewVersion::new(f.config.id, "tenant-b", doc(json!({})), "a"))
            .await
            .expect_err("wrong tenant");
        assert!(matches!(err, VaultError::NotFound(NotFoundError::Config { .. })));

        let err = f.ledger.get_version(f.config.id, TENANT, 9).await.expect_err("missing");
        assert!(matches!(err, VaultError::NotFound(NotFoundError::Version { version: 9, .. })));
    }

    #[tokio::test]
    async fn test_concurrent_creates_get_distinct_numbers() {
        let f = fixture().await;
        let mut handles = Vec::new();
        for n in 0..24_u64 {
            let ledger = Arc::clone(&f.ledger);
            let id = f.config.id;
            handles.push(tokio::spawn(async move {
                let branch = if n % 3 == 0 { "feature" } else { "main" };
                ledger
                    .create_version(
                        NewVersion::new(id, TENANT, doc(json!({"n": n})), "a").on_branch(branch),
                    )
                    .await
                    .map(|v| v.version)
            }));
        }

        let mut numbers = Vec::new();
        for handle in handles {
            numbers.push(handle.await.expect("join").expect("create"));
        }
        numbers.sort_unstable();
        assert_eq!(numbers, (1..=24).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn test_concurrent_branches_and_versions_share_numbering() {
        let f = fixture().await;
        let id = f.config.id;
        f.ledger
            .create_version(NewVersion::new(id, TENANT, doc(json!({"n": 0})), "a"))
            .await
            .expect("v1");

        let mut handles = Vec::new();
        for n in 0..24_u64 {
            let ledger = Arc::clone(&f.ledger);
            handles.push(tokio::spawn(async move {
                let created = if n % 3 == 0 {
                    let branch = format!("branch-{n}");
                    ledger
                        .create_branch(NewBranch::new(id, TENANT, &branch, 1, doc(json!({})), "a"))
                        .await
                } else {
                    ledger
                        .create_version(NewVersion::new(id, TENANT, doc(json!({"n": n})), "a"))
                        .await
                };
                created.map(|v| (v.version, v.branch))
            }));
        }

        let mut numbers = Vec::new();
        let mut branches = 0;
        for handle in handles {
            let (number, branch) = handle.await.expect("join").expect("create");
            if branch.starts_with("branch-") {
                branches += 1;
            }
            numbers.push(number);
        }
        numbers.sort_unstable();
        assert_eq!(numbers, (2..=25).collect::<Vec<u64>>());
        assert_eq!(branches, 8);
    }

    /// Version store that loses the first `collisions` inserts to a phantom
    /// writer, as another process sharing the store would.
    struct RacingStore {
        inner: MemoryStore,
        collisions: AtomicU32,
    }

    #[async_trait]
    impl VersionStore for RacingStore {
        async fn find(
            &self,
            config_id: Uuid,
            tenant_id: &str,
            version: u64,
        ) -> Result<Option<Version>> {
            VersionStore::find(&self.inner, config_id, tenant_id, version).await
        }

        async fn find_latest_on_branch(
            &self,
            config_id: Uuid,
            branch: &str,
        ) -> Result<Option<Version>> {
            self.inner.find_latest_on_branch(config_id, branch).await
        }

        async fn find_max_version(&self, config_id: Uuid) -> Result<u64> {
            self.inner.find_max_version(config_id).await
        }

        async fn insert(&self, version: &Version) -> Result<()> {
            if self.collisions.load(Ordering::SeqCst) > 0 {
                self.collisions.fetch_sub(1, Ordering::SeqCst);
                let mut phantom = version.clone();
                phantom.branch = String::from("elsewhere");
                self.inner.insert(&phantom).await?;
            }
            self.inner.insert(version).await
        }

        async fn list_by_config(
            &self,
            config_id: Uuid,
            tenant_id: &str,
            branch: Option<&str>,
            page: Page,
        ) -> Result<Vec<Version>> {
            self.inner.list_by_config(config_id, tenant_id, branch, page).await
        }

        async fn count_by_config(
            &self,
            config_id: Uuid,
            tenant_id: &str,
            branch: Option<&str>,
        ) -> Result<u64> {
            self.inner.count_by_config(config_id, tenant_id, branch).await
        }

        fn backend_type(&self) -> &'static str {
            "racing"
        }
    }

    async fn racing_ledger(collisions: u32, retries: u32) -> (VersionLedger, Config) {
        let configs = Arc::new(MemoryStore::new());
        let config = Config::new(TENANT, "racy", vec![String::from("dev")], "a");
        configs.save(&config).await.expect("save");
        let versions = Arc::new(RacingStore {
            inner: MemoryStore::new(),
            collisions: AtomicU32::new(collisions),
        });
        let audit = Arc::new(AuditDispatcher::inline(Arc::new(MemoryAuditSink::new())));
        let settings = LedgerSettings {
            max_allocation_retries: retries,
            ..LedgerSettings::default()
        };
        let ledger = VersionLedger::new(configs, versions, audit).with_settings(settings);
        (ledger, config)
    }

    #[tokio::test]
    async fn test_collision_is_retried_with_next_number() {
        let (ledger, config) = racing_ledger(2, 5).await;
        let version = ledger
            .create_version(NewVersion::new(config.id, TENANT, doc(json!({"k": 1})), "a"))
            .await
            .expect("create");
        assert_eq!(version.version, 3);
        assert_eq!(version.branch, "main");
    }

    #[tokio::test]
    async fn test_collisions_exhaust_retries() {
        let (ledger, config) = racing_ledger(3, 3).await;
        let err = ledger
            .create_version(NewVersion::new(config.id, TENANT, doc(json!({"k": 1})), "a"))
            .await
            .expect_err("must give up");
        assert!(err.is_retryable());
    }

    struct BrokenSink;

    #[async_trait]
    impl AuditSink for BrokenSink {
        async fn emit(&self, _event: &AuditEvent) -> Result<()> {
            Err(AuditError::delivery("broken", "disk full").into())
        }

        fn name(&self) -> &'static str {
            "broken"
        }
    }

    #[tokio::test]
    async fn test_audit_failure_does_not_fail_the_write() {
        let store = Arc::new(MemoryStore::new());
        let config = Config::new(TENANT, "audited", vec![String::from("dev")], "a");
        store.save(&config).await.expect("save");
        let ledger = VersionLedger::new(
            Arc::clone(&store) as Arc<dyn ConfigStore>,
            Arc::clone(&store) as Arc<dyn VersionStore>,
            Arc::new(AuditDispatcher::inline(Arc::new(BrokenSink))),
        );

        let version = ledger
            .create_version(NewVersion::new(config.id, TENANT, doc(json!({"a": 1})), "a"))
            .await
            .expect("write succeeds");
        assert_eq!(ledger.get_version(config.id, TENANT, 1).await.expect("stored"), version);
    }

    #[tokio::test]
    async fn test_history_pages() {
        let f = fixture().await;
        let id = f.config.id;
        for n in 0..5 {
            let request = NewVersion::new(id, TENANT, doc(json!({"n": n})), "a");
            let request = if n == 2 { request.on_branch("exp") } else { request };
            f.ledger.create_version(request).await.expect("create");
        }

        let page = f.ledger.history_page(id, TENANT, None, 2, Some(2)).await.expect("page");
        let numbers: Vec<u64> = page.versions.iter().map(|v| v.version).collect();
        assert_eq!(numbers, vec![3, 2]);
        assert_eq!((page.total, page.pages), (5, 3));

        let main = f
            .ledger
            .get_version_history(id, TENANT, Some("main"), Page::new(0, 10))
            .await
            .expect("history");
        let numbers: Vec<u64> = main.iter().map(|v| v.version).collect();
        assert_eq!(numbers, vec![5, 4, 2, 1]);
    }

    #[tokio::test]
    async fn test_empty_branch_name_rejected() {
        let f = fixture().await;
        let err = f
            .ledger
            .create_version(
                NewVersion::new(f.config.id, TENANT, doc(json!({})), "a").on_branch("  "),
            )
            .await
            .expect_err("must fail");
        assert!(matches!(err, VaultError::Validation(_)));
    }
}
