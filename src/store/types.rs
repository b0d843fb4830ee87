//! Record types persisted by the stores.
//!
//! A [`Config`] owns a set of environments and the active-version pointer for
//! each of them. A [`Version`] is an immutable ledger entry holding one
//! snapshot of the config's document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::document::Document;

/// Branch used when none is given.
pub const DEFAULT_BRANCH: &str = "main";

/// Default page size for history queries.
pub const DEFAULT_PAGE_LIMIT: u64 = 50;

/// A configuration, owned by a tenant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Unique config identifier.
    pub id: Uuid,
    /// Owning tenant.
    pub tenant_id: String,
    /// Name, unique per tenant.
    pub name: String,
    /// Free-text description.
    #[serde(default)]
    pub description: Option<String>,
    /// Environments this config may be deployed to.
    pub environments: Vec<String>,
    /// Active version per environment; `None` means nothing is deployed.
    #[serde(default)]
    pub active_versions: BTreeMap<String, Option<u64>>,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Archived configs accept no new versions or deployments.
    #[serde(default)]
    pub is_archived: bool,
    /// Who created the config.
    pub created_by: String,
    /// When the config was created.
    pub created_at: DateTime<Utc>,
    /// When the config was last changed.
    pub updated_at: DateTime<Utc>,
}

/// An immutable, numbered snapshot of a config's document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Version {
    /// Unique record identifier.
    pub id: Uuid,
    /// Owning config.
    pub config_id: Uuid,
    /// Owning tenant.
    pub tenant_id: String,
    /// Version number, monotonic per config across all branches.
    pub version: u64,
    /// Branch label.
    pub branch: String,
    /// Lineage pointer to another version of the same config.
    #[serde(default)]
    pub parent_version: Option<u64>,
    /// The document snapshot.
    pub data: Document,
    /// Lowercase hex SHA-256 of the canonical document.
    pub checksum: String,
    /// Description of the change.
    #[serde(default)]
    pub change_log: Option<String>,
    /// Author of the version.
    pub created_by: String,
    /// When the version was written.
    pub created_at: DateTime<Utc>,
    /// Archival flag.
    #[serde(default)]
    pub is_archived: bool,
}

/// Version metadata without the document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VersionMeta {
    /// Version number.
    pub version: u64,
    /// Branch label.
    pub branch: String,
    /// When the version was written.
    pub created_at: DateTime<Utc>,
    /// Author of the version.
    pub created_by: String,
    /// Document checksum.
    pub checksum: String,
}

/// Skip/limit pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Number of records to skip.
    pub skip: u64,
    /// Maximum number of records to return.
    pub limit: u64,
}

impl Config {
    /// Creates a new, unarchived config with every environment unset.
    #[must_use]
    pub fn new(tenant_id: &str, name: &str, environments: Vec<String>, created_by: &str) -> Self {
        let now = Utc::now();
        let mut config = Self {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.to_string(),
            name: name.to_string(),
            description: None,
            environments: Vec::new(),
            active_versions: BTreeMap::new(),
            tags: Vec::new(),
            is_archived: false,
            created_by: created_by.to_string(),
            created_at: now,
            updated_at: now,
        };
        config.set_environments(environments);
        config
    }

    /// Returns true if `environment` is declared for this config.
    #[must_use]
    pub fn declares(&self, environment: &str) -> bool {
        self.environments.iter().any(|e| e == environment)
    }

    /// Returns the active-version slot for an environment.
    ///
    /// `None` means the config has no entry for the environment at all;
    /// `Some(None)` means the entry exists but nothing is deployed.
    #[must_use]
    pub fn active_slot(&self, environment: &str) -> Option<Option<u64>> {
        self.active_versions.get(environment).copied()
    }

    /// Points an environment at a version, returning the previous pointer.
    pub fn set_active(&mut self, environment: &str, version: u64) -> Option<u64> {
        let previous = self
            .active_versions
            .insert(environment.to_string(), Some(version))
            .flatten();
        self.touch();
        previous
    }

    /// Replaces the declared environments.
    ///
    /// New environments get an unset slot; existing pointers are kept.
    pub fn set_environments(&mut self, environments: Vec<String>) {
        let mut deduped: Vec<String> = Vec::with_capacity(environments.len());
        for env in environments {
            if !deduped.contains(&env) {
                deduped.push(env);
            }
        }
        for env in &deduped {
            self.active_versions.entry(env.clone()).or_insert(None);
        }
        self.environments = deduped;
        self.touch();
    }

    /// Marks the config as modified now.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Version {
    /// Returns the metadata of this version.
    #[must_use]
    pub fn meta(&self) -> VersionMeta {
        VersionMeta {
            version: self.version,
            branch: self.branch.clone(),
            created_at: self.created_at,
            created_by: self.created_by.clone(),
            checksum: self.checksum.clone(),
        }
    }
}

impl Page {
    /// Creates a window from a raw skip and limit.
    #[must_use]
    pub const fn new(skip: u64, limit: u64) -> Self {
        Self { skip, limit }
    }

    /// Creates a window from a 1-based page number.
    #[must_use]
    pub const fn numbered(page: u64, limit: u64) -> Self {
        let page = if page == 0 { 1 } else { page };
        Self {
            skip: (page - 1).saturating_mul(limit),
            limit,
        }
    }

    /// Applies the window to an already-ordered iterator.
    pub fn apply<T>(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        let skip = usize::try_from(self.skip).unwrap_or(usize::MAX);
        let limit = usize::try_from(self.limit).unwrap_or(usize::MAX);
        items.into_iter().skip(skip).take(limit).collect()
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(0, DEFAULT_PAGE_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_config_has_unset_slots() {
        let config = Config::new(
            "tenant-a",
            "payments",
            vec![String::from("dev"), String::from("prod"), String::from("dev")],
            "alice",
        );

        assert_eq!(config.environments, vec!["dev", "prod"]);
        assert_eq!(config.active_slot("dev"), Some(None));
        assert_eq!(config.active_slot("staging"), None);
        assert!(config.declares("prod"));
        assert!(!config.declares("staging"));
    }

    #[test]
    fn test_set_active_returns_previous() {
        let mut config = Config::new("t", "c", vec![String::from("dev")], "u");

        assert_eq!(config.set_active("dev", 2), None);
        assert_eq!(config.set_active("dev", 1), Some(2));
        assert_eq!(config.active_slot("dev"), Some(Some(1)));
    }

    #[test]
    fn test_set_environments_keeps_pointers() {
        let mut config = Config::new("t", "c", vec![String::from("dev")], "u");
        config.set_active("dev", 4);

        config.set_environments(vec![String::from("dev"), String::from("staging")]);
        assert_eq!(config.active_slot("dev"), Some(Some(4)));
        assert_eq!(config.active_slot("staging"), Some(None));
    }

    #[test]
    fn test_page_windows() {
        assert_eq!(Page::numbered(1, 20), Page::new(0, 20));
        assert_eq!(Page::numbered(3, 20), Page::new(40, 20));
        assert_eq!(Page::numbered(0, 20), Page::new(0, 20));

        let window = Page::new(2, 2).apply(1..=10);
        assert_eq!(window, vec![3, 4]);
    }
}
