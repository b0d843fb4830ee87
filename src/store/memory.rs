//! In-memory store backend.
//!
//! [`MemoryStore`] keeps configs and versions in maps behind `RwLock`s. It
//! implements both store traits and is used for tests, embedding, and the
//! `memory` backend setting. Data is lost when the store is dropped.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use uuid::Uuid;

use crate::error::{ConflictError, Result, StoreError};

use super::traits::{ConfigStore, VersionStore};
use super::types::{Config, Page, Version};

/// In-memory implementation of [`ConfigStore`] and [`VersionStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    configs: RwLock<HashMap<Uuid, Config>>,
    versions: RwLock<HashMap<Uuid, BTreeMap<u64, Version>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn filtered<'a>(
        versions: &'a BTreeMap<u64, Version>,
        tenant_id: &str,
        branch: Option<&str>,
    ) -> impl DoubleEndedIterator<Item = &'a Version> + use<'a> {
        let tenant_id = tenant_id.to_string();
        let branch = branch.map(String::from);
        versions.values().filter(move |v| {
            v.tenant_id == tenant_id && branch.as_deref().is_none_or(|b| v.branch == b)
        })
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn find(&self, config_id: Uuid, tenant_id: &str) -> Result<Option<Config>> {
        let configs = self.configs.read().map_err(|_| StoreError::Poisoned)?;
        Ok(configs
            .get(&config_id)
            .filter(|c| c.tenant_id == tenant_id)
            .cloned())
    }

    async fn find_by_name(&self, tenant_id: &str, name: &str) -> Result<Option<Config>> {
        let configs = self.configs.read().map_err(|_| StoreError::Poisoned)?;
        Ok(configs
            .values()
            .find(|c| c.tenant_id == tenant_id && c.name == name)
            .cloned())
    }

    async fn save(&self, config: &Config) -> Result<Config> {
        let mut configs = self.configs.write().map_err(|_| StoreError::Poisoned)?;
        configs.insert(config.id, config.clone());
        Ok(config.clone())
    }

    async fn list(&self, tenant_id: &str, include_archived: bool) -> Result<Vec<Config>> {
        let configs = self.configs.read().map_err(|_| StoreError::Poisoned)?;
        let mut listed: Vec<Config> = configs
            .values()
            .filter(|c| c.tenant_id == tenant_id && (include_archived || !c.is_archived))
            .cloned()
            .collect();
        listed.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(listed)
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}

#[async_trait]
impl VersionStore for MemoryStore {
    async fn find(
        &self,
        config_id: Uuid,
        tenant_id: &str,
        version: u64,
    ) -> Result<Option<Version>> {
        let versions = self.versions.read().map_err(|_| StoreError::Poisoned)?;
        Ok(versions
            .get(&config_id)
            .and_then(|by_number| by_number.get(&version))
            .filter(|v| v.tenant_id == tenant_id)
            .cloned())
    }

    async fn find_latest_on_branch(
        &self,
        config_id: Uuid,
        branch: &str,
    ) -> Result<Option<Version>> {
        let versions = self.versions.read().map_err(|_| StoreError::Poisoned)?;
        Ok(versions.get(&config_id).and_then(|by_number| {
            by_number
                .values()
                .rev()
                .find(|v| v.branch == branch)
                .cloned()
        }))
    }

    async fn find_max_version(&self, config_id: Uuid) -> Result<u64> {
        let versions = self.versions.read().map_err(|_| StoreError::Poisoned)?;
        Ok(versions
            .get(&config_id)
            .and_then(|by_number| by_number.keys().next_back().copied())
            .unwrap_or(0))
    }

    async fn insert(&self, version: &Version) -> Result<()> {
        let mut versions = self.versions.write().map_err(|_| StoreError::Poisoned)?;
        let by_number = versions.entry(version.config_id).or_default();
        if by_number.contains_key(&version.version) {
            return Err(ConflictError::DuplicateVersion {
                config_id: version.config_id,
                version: version.version,
            }
            .into());
        }
        by_number.insert(version.version, version.clone());
        Ok(())
    }

    async fn list_by_config(
        &self,
        config_id: Uuid,
        tenant_id: &str,
        branch: Option<&str>,
        page: Page,
    ) -> Result<Vec<Version>> {
        let versions = self.versions.read().map_err(|_| StoreError::Poisoned)?;
        Ok(versions.get(&config_id).map_or_else(Vec::new, |by_number| {
            page.apply(Self::filtered(by_number, tenant_id, branch).rev().cloned())
        }))
    }

    async fn count_by_config(
        &self,
        config_id: Uuid,
        tenant_id: &str,
        branch: Option<&str>,
    ) -> Result<u64> {
        let versions = self.versions.read().map_err(|_| StoreError::Poisoned)?;
        let count = versions.get(&config_id).map_or(0, |by_number| {
            Self::filtered(by_number, tenant_id, branch).count()
        });
        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}
