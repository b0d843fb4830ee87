//! Store trait definitions.
//!
//! This module defines the storage contracts the ledger and the deployment
//! manager depend on. Backends must be safe to share across tasks.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;

use super::types::{Config, Page, Version};

/// Storage for config records.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Loads a config scoped to its tenant.
    ///
    /// Returns `None` if no such config exists for the tenant.
    async fn find(&self, config_id: Uuid, tenant_id: &str) -> Result<Option<Config>>;

    /// Loads a config by its per-tenant unique name.
    async fn find_by_name(&self, tenant_id: &str, name: &str) -> Result<Option<Config>>;

    /// Persists a config, replacing any previous record in one atomic write.
    async fn save(&self, config: &Config) -> Result<Config>;

    /// Lists a tenant's configs ordered by name.
    async fn list(&self, tenant_id: &str, include_archived: bool) -> Result<Vec<Config>>;

    /// Gets the backend type name.
    fn backend_type(&self) -> &'static str;
}

/// Append-only storage for version records.
#[async_trait]
pub trait VersionStore: Send + Sync {
    /// Loads a single version.
    async fn find(&self, config_id: Uuid, tenant_id: &str, version: u64) -> Result<Option<Version>>;

    /// Loads the highest-numbered version on a branch.
    async fn find_latest_on_branch(&self, config_id: Uuid, branch: &str) -> Result<Option<Version>>;

    /// Returns the highest version number of a config, or 0 if it has none.
    async fn find_max_version(&self, config_id: Uuid) -> Result<u64>;

    /// Writes a new version.
    ///
    /// Must fail with `ConflictError::DuplicateVersion` if the
    /// `(config_id, version)` pair already exists.
    async fn insert(&self, version: &Version) -> Result<()>;

    /// Lists versions in descending version order.
    async fn list_by_config(
        &self,
        config_id: Uuid,
        tenant_id: &str,
        branch: Option<&str>,
        page: Page,
    ) -> Result<Vec<Version>>;

    /// Counts versions matching the same filter as [`Self::list_by_config`].
    async fn count_by_config(
        &self,
        config_id: Uuid,
        tenant_id: &str,
        branch: Option<&str>,
    ) -> Result<u64>;

    /// Gets the backend type name.
    fn backend_type(&self) -> &'static str;
}

impl std::fmt::Debug for dyn ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ConfigStore({})", self.backend_type())
    }
}

impl std::fmt::Debug for dyn VersionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VersionStore({})", self.backend_type())
    }
}
