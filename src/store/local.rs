//! Local file-based store backend.
//!
//! Layout under the base directory:
//!
//! ```text
//! configs/<config-id>.json
//! versions/<config-id>/<version, zero-padded>.json
//! ```
//!
//! Config writes go to a temporary file that is renamed over the target, so a
//! reader never sees a partially written `active_versions` map. Version files
//! are published with a hard link, which fails if the target already exists;
//! that gives the `(config_id, version)` uniqueness guarantee even across
//! processes sharing the directory.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ConflictError, Result, StoreError};

use super::traits::{ConfigStore, VersionStore};
use super::types::{Config, Page, Version};

/// Default store directory name under the user data directory.
pub const STORE_DIR: &str = "cfgvault";

/// Config records directory.
const CONFIGS_DIR: &str = "configs";

/// Version records directory.
const VERSIONS_DIR: &str = "versions";

/// Local file-based store.
#[derive(Debug)]
pub struct LocalStore {
    /// Base directory for all records.
    base_dir: PathBuf,
    /// Directory of config records.
    configs_dir: PathBuf,
    /// Directory of per-config version directories.
    versions_dir: PathBuf,
}

impl LocalStore {
    /// Creates a store under the platform data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if no data directory can be determined.
    pub fn new() -> Result<Self> {
        let base_dir = Self::default_dir().ok_or_else(|| {
            crate::error::VaultError::internal("Cannot determine a data directory for the store")
        })?;
        Ok(Self::with_base_dir(base_dir))
    }

    /// Returns the default store directory, if one can be determined.
    #[must_use]
    pub fn default_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join(STORE_DIR))
    }

    /// Creates a store with a custom base directory.
    #[must_use]
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        let configs_dir = base_dir.join(CONFIGS_DIR);
        let versions_dir = base_dir.join(VERSIONS_DIR);

        Self {
            base_dir,
            configs_dir,
            versions_dir,
        }
    }

    /// Gets the base directory.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn config_path(&self, config_id: Uuid) -> PathBuf {
        self.configs_dir.join(format!("{config_id}.json"))
    }

    fn version_dir(&self, config_id: Uuid) -> PathBuf {
        self.versions_dir.join(config_id.to_string())
    }

    fn version_path(&self, config_id: Uuid, version: u64) -> PathBuf {
        self.version_dir(config_id).join(format!("{version:010}.json"))
    }

    /// Ensures a directory exists.
    async fn ensure_dir(dir: &Path) -> Result<()> {
        if !dir.exists() {
            debug!("Creating store directory: {}", dir.display());
            fs::create_dir_all(dir)
                .await
                .map_err(|e| StoreError::io("create directory", dir, e))?;
        }
        Ok(())
    }

    /// Reads and parses a JSON record if it exists.
    async fn read_record<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path)
            .await
            .map_err(|e| StoreError::io("read", path, e))?;

        let record = serde_json::from_str(&content).map_err(|e| StoreError::Corrupted {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        Ok(Some(record))
    }

    /// Writes content to a fresh temporary file next to `target`.
    async fn write_temp(target: &Path, content: &[u8]) -> Result<PathBuf> {
        let temp_path = target.with_extension(format!("tmp-{}", Uuid::new_v4().simple()));

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| StoreError::io("create", &temp_path, e))?;
        file.write_all(content)
            .await
            .map_err(|e| StoreError::io("write", &temp_path, e))?;
        file.sync_all()
            .await
            .map_err(|e| StoreError::io("sync", &temp_path, e))?;

        Ok(temp_path)
    }

    /// Lists the JSON record files of a directory.
    async fn record_files(dir: &Path) -> Result<Vec<PathBuf>> {
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = fs::read_dir(dir)
            .await
            .map_err(|e| StoreError::io("list", dir, e))?;
        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io("list", dir, e))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    async fn load_configs(&self) -> Result<Vec<Config>> {
        let mut configs = Vec::new();
        for path in Self::record_files(&self.configs_dir).await? {
            if let Some(config) = Self::read_record::<Config>(&path).await? {
                configs.push(config);
            }
        }
        Ok(configs)
    }

    /// Loads every version of a config in ascending order.
    async fn load_versions(&self, config_id: Uuid) -> Result<Vec<Version>> {
        let mut versions = Vec::new();
        for path in Self::record_files(&self.version_dir(config_id)).await? {
            if let Some(version) = Self::read_record::<Version>(&path).await? {
                versions.push(version);
            }
        }
        versions.sort_by_key(|v| v.version);
        Ok(versions)
    }
}

#[async_trait]
impl ConfigStore for LocalStore {
    async fn find(&self, config_id: Uuid, tenant_id: &str) -> Result<Option<Config>> {
        let config = Self::read_record::<Config>(&self.config_path(config_id)).await?;
        Ok(config.filter(|c| c.tenant_id == tenant_id))
    }

    async fn find_by_name(&self, tenant_id: &str, name: &str) -> Result<Option<Config>> {
        Ok(self
            .load_configs()
            .await?
            .into_iter()
            .find(|c| c.tenant_id == tenant_id && c.name == name))
    }

    async fn save(&self, config: &Config) -> Result<Config> {
        Self::ensure_dir(&self.configs_dir).await?;

        let path = self.config_path(config.id);
        let content = serde_json::to_vec_pretty(config)
            .map_err(|e| StoreError::serialization(format!("Failed to serialize config: {e}")))?;

        let temp_path = Self::write_temp(&path, &content).await?;

        // Atomic rename
        fs::rename(&temp_path, &path)
            .await
            .map_err(|e| StoreError::io("rename", &temp_path, e))?;

        debug!("Saved config {} to {}", config.id, path.display());
        Ok(config.clone())
    }

    async fn list(&self, tenant_id: &str, include_archived: bool) -> Result<Vec<Config>> {
        let mut configs: Vec<Config> = self
            .load_configs()
            .await?
            .into_iter()
            .filter(|c| c.tenant_id == tenant_id && (include_archived || !c.is_archived))
            .collect();
        configs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(configs)
    }

    fn backend_type(&self) -> &'static str {
        "local"
    }
}

#[async_trait]
impl VersionStore for LocalStore {
    async fn find(
        &self,
        config_id: Uuid,
        tenant_id: &str,
        version: u64,
    ) -> Result<Option<Version>> {
        let record = Self::read_record::<Version>(&self.version_path(config_id, version)).await?;
        Ok(record.filter(|v| v.tenant_id == tenant_id))
    }

    async fn find_latest_on_branch(
        &self,
        config_id: Uuid,
        branch: &str,
    ) -> Result<Option<Version>> {
        Ok(self
            .load_versions(config_id)
            .await?
            .into_iter()
            .rev()
            .find(|v| v.branch == branch))
    }

    async fn find_max_version(&self, config_id: Uuid) -> Result<u64> {
        let max = Self::record_files(&self.version_dir(config_id))
            .await?
            .iter()
            .filter_map(|p| p.file_stem()?.to_str()?.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        Ok(max)
    }

    async fn insert(&self, version: &Version) -> Result<()> {
        let dir = self.version_dir(version.config_id);
        Self::ensure_dir(&dir).await?;

        let path = self.version_path(version.config_id, version.version);
        let content = serde_json::to_vec_pretty(version)
            .map_err(|e| StoreError::serialization(format!("Failed to serialize version: {e}")))?;

        let temp_path = Self::write_temp(&path, &content).await?;
        let linked = fs::hard_link(&temp_path, &path).await;
        fs::remove_file(&temp_path)
            .await
            .map_err(|e| StoreError::io("remove", &temp_path, e))?;

        match linked {
            Ok(()) => {
                info!(
                    "Wrote version {} of config {} to {}",
                    version.version,
                    version.config_id,
                    path.display()
                );
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(ConflictError::DuplicateVersion {
                    config_id: version.config_id,
                    version: version.version,
                }
                .into())
            }
            Err(e) => Err(StoreError::io("publish", &path, e).into()),
        }
    }

    async fn list_by_config(
        &self,
        config_id: Uuid,
        tenant_id: &str,
        branch: Option<&str>,
        page: Page,
    ) -> Result<Vec<Version>> {
        let versions = self.load_versions(config_id).await?;
        Ok(page.apply(versions.into_iter().rev().filter(|v| {
            v.tenant_id == tenant_id && branch.is_none_or(|b| v.branch == b)
        })))
    }

    async fn count_by_config(
        &self,
        config_id: Uuid,
        tenant_id: &str,
        branch: Option<&str>,
    ) -> Result<u64> {
        let count = self
            .load_versions(config_id)
            .await?
            .iter()
            .filter(|v| v.tenant_id == tenant_id && branch.is_none_or(|b| v.branch == b))
            .count();
        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }

    fn backend_type(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::error::VaultError;
    use chrono::Utc;
    use serde_json::json;
    use tempfile::TempDir;

    fn create_test_store() -> (LocalStore, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = LocalStore::with_base_dir(temp_dir.path());
        (store, temp_dir)
    }

    fn version(config_id: Uuid, number: u64, branch: &str) -> Version {
        Version {
            id: Uuid::new_v4(),
            config_id,
            tenant_id: String::from("tenant"),
            version: number,
            branch: branch.to_string(),
            parent_version: None,
            data: Document::from(json!({"n": number})),
            checksum: String::from("abc"),
            change_log: Some(format!("v{number}")),
            created_by: String::from("tester"),
            created_at: Utc::now(),
            is_archived: false,
        }
    }

    #[tokio::test]
    async fn test_config_save_and_find() {
        let (store, _temp) = create_test_store();
        let mut config = Config::new("tenant", "api", vec![String::from("dev")], "u");
        store.save(&config).await.expect("save");

        config.set_active("dev", 3);
        store.save(&config).await.expect("overwrite");

        let loaded = ConfigStore::find(&store, config.id, "tenant")
            .await
            .expect("find")
            .expect("exists");
        assert_eq!(loaded.active_slot("dev"), Some(Some(3)));
        assert!(ConfigStore::find(&store, config.id, "intruder").await.expect("find").is_none());
        assert_eq!(store.list("tenant", true).await.expect("list").len(), 1);
        assert!(store.find_by_name("tenant", "api").await.expect("find").is_some());
    }

    #[tokio::test]
    async fn test_missing_records() {
        let (store, _temp) = create_test_store();
        let id = Uuid::new_v4();
        assert!(ConfigStore::find(&store, id, "tenant").await.expect("find").is_none());
        assert!(VersionStore::find(&store, id, "tenant", 1).await.expect("find").is_none());
        assert_eq!(store.find_max_version(id).await.expect("max"), 0);
        assert!(
            store
                .list_by_config(id, "tenant", None, Page::default())
                .await
                .expect("list")
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_version_insert_is_exclusive() {
        let (store, temp) = create_test_store();
        let config_id = Uuid::new_v4();

        store.insert(&version(config_id, 1, "main")).await.expect("insert");
        let err = store
            .insert(&version(config_id, 1, "other"))
            .await
            .expect_err("duplicate must fail");
        assert!(matches!(err, VaultError::Conflict(ConflictError::DuplicateVersion { .. })));

        // The losing write leaves no stray temp files behind.
        let files = LocalStore::record_files(&store.version_dir(config_id)).await.expect("files");
        assert_eq!(files.len(), 1);
        let stored = VersionStore::find(&store, config_id, "tenant", 1)
            .await
            .expect("find")
            .expect("exists");
        assert_eq!(stored.branch, "main");
        drop(temp);
    }

    #[tokio::test]
    async fn test_version_queries() {
        let (store, _temp) = create_test_store();
        let config_id = Uuid::new_v4();
        for (n, branch) in [(1, "main"), (2, "hotfix"), (3, "main"), (10, "main")] {
            store.insert(&version(config_id, n, branch)).await.expect("insert");
        }

        assert_eq!(store.find_max_version(config_id).await.expect("max"), 10);
        let latest = store
            .find_latest_on_branch(config_id, "main")
            .await
            .expect("latest")
            .expect("exists");
        assert_eq!(latest.version, 10);

        let listed: Vec<u64> = store
            .list_by_config(config_id, "tenant", Some("main"), Page::new(1, 5))
            .await
            .expect("list")
            .iter()
            .map(|v| v.version)
            .collect();
        assert_eq!(listed, vec![3, 1]);
        assert_eq!(
            store.count_by_config(config_id, "tenant", Some("hotfix")).await.expect("count"),
            1
        );
    }
}
