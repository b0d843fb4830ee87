//! Config catalog.
//!
//! Creates configs and changes their descriptive fields and archive flag.
//! Version history and active pointers are owned by the ledger and the
//! deployment manager.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::audit::{AuditAction, AuditContext, AuditEvent, EntityType};
use crate::error::{ConflictError, InvalidStateError, Result, ValidationError};
use crate::ledger::VersionLedger;
use crate::store::{Config, ConfigStore, Page};

/// Environment labels a config may declare.
pub const KNOWN_ENVIRONMENTS: &[&str] = &["dev", "staging", "prod", "test"];

/// Environment declared when a new config names none.
pub const DEFAULT_ENVIRONMENT: &str = "dev";

/// Configs per page when a listing names no limit.
pub const DEFAULT_CONFIG_PAGE_LIMIT: u64 = 20;

/// One page of a tenant's configs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigPage {
    /// Configs on this page, most recently updated first.
    pub configs: Vec<Config>,
    /// 1-based page number.
    pub page: u64,
    /// Page size.
    pub limit: u64,
    /// Matching configs across all pages.
    pub total: u64,
    /// Number of pages.
    pub pages: u64,
}

/// Request to create a config.
#[derive(Debug, Clone)]
pub struct NewConfig {
    /// Owning tenant.
    pub tenant_id: String,
    /// Name, unique per tenant.
    pub name: String,
    /// Free-text description.
    pub description: Option<String>,
    /// Declared environments; `[dev]` when empty.
    pub environments: Vec<String>,
    /// Free-form tags.
    pub tags: Vec<String>,
    /// Creator.
    pub created_by: String,
    /// Request origin for the audit record.
    pub context: AuditContext,
}

/// Field changes for an existing config. `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct ConfigUpdate {
    /// New name.
    pub name: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New set of declared environments.
    pub environments: Option<Vec<String>>,
    /// New tags.
    pub tags: Option<Vec<String>>,
}

impl NewConfig {
    /// Creates a request declaring only the default environment.
    #[must_use]
    pub fn new(tenant_id: &str, name: &str, created_by: &str) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            name: name.to_string(),
            description: None,
            environments: Vec::new(),
            tags: Vec::new(),
            created_by: created_by.to_string(),
            context: AuditContext::default(),
        }
    }

    /// Sets the declared environments.
    #[must_use]
    pub fn with_environments<I, S>(mut self, environments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.environments = environments.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the tags.
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Sets the request origin.
    #[must_use]
    pub fn with_context(mut self, context: AuditContext) -> Self {
        self.context = context;
        self
    }
}

impl ConfigUpdate {
    /// Returns true if no field would change.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.environments.is_none()
            && self.tags.is_none()
    }
}

/// Creates, edits, archives and restores configs.
#[derive(Debug)]
pub struct ConfigCatalog {
    configs: Arc<dyn ConfigStore>,
    ledger: Arc<VersionLedger>,
    names: Mutex<()>,
}

impl ConfigCatalog {
    /// Creates a catalog sharing the ledger's locks and audit dispatcher.
    #[must_use]
    pub fn new(configs: Arc<dyn ConfigStore>, ledger: Arc<VersionLedger>) -> Self {
        Self {
            configs,
            ledger,
            names: Mutex::new(()),
        }
    }

    /// Creates a config with every declared environment unset.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for an empty name or unknown environment, and
    /// `Conflict` if the tenant already has a config with this name.
    pub async fn create(&self, request: NewConfig) -> Result<Config> {
        let name = validate_name(&request.name)?;
        let environments = if request.environments.is_empty() {
            vec![String::from(DEFAULT_ENVIRONMENT)]
        } else {
            validate_environments(request.environments)?
        };

        let _names = self.names.lock().await;
        self.ensure_name_free(&request.tenant_id, &name, None).await?;

        let mut config = Config::new(&request.tenant_id, &name, environments, &request.created_by);
        config.description = request.description;
        config.tags = request.tags;
        let config = self.configs.save(&config).await?;

        info!("Created config '{}' ({}) for tenant '{}'", config.name, config.id, config.tenant_id);
        self.record(
            &config,
            AuditAction::Create,
            &request.created_by,
            json!({"name": config.name, "environments": config.environments}),
            request.context,
        )
        .await;

        Ok(config)
    }

    /// Applies field changes to a config.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the config does not exist, `InvalidState` if it
    /// is archived, `Validation` for bad values, and `Conflict` if the new
    /// name is taken.
    pub async fn update(
        &self,
        config_id: Uuid,
        tenant_id: &str,
        update: ConfigUpdate,
        performed_by: &str,
        context: AuditContext,
    ) -> Result<Config> {
        let _names = self.names.lock().await;
        let _guard = self.ledger.locks().acquire(config_id).await?;

        let mut config = self.ledger.require_config(config_id, tenant_id).await?;
        if config.is_archived {
            return Err(InvalidStateError::Archived {
                config_id,
                operation: String::from("update"),
            }
            .into());
        }

        let mut changed = Vec::new();
        if let Some(name) = update.name {
            let name = validate_name(&name)?;
            if name != config.name {
                self.ensure_name_free(tenant_id, &name, Some(config_id)).await?;
                config.name = name;
                changed.push("name");
            }
        }
        if let Some(description) = update.description {
            config.description = Some(description);
            changed.push("description");
        }
        if let Some(environments) = update.environments {
            config.set_environments(validate_environments(environments)?);
            changed.push("environments");
        }
        if let Some(tags) = update.tags {
            config.tags = tags;
            changed.push("tags");
        }

        config.touch();
        let config = self.configs.save(&config).await?;

        info!("Updated config {} ({})", config.id, changed.join(", "));
        self.record(&config, AuditAction::Update, performed_by, json!({"fields": changed}), context)
            .await;

        Ok(config)
    }

    /// Marks a config archived.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the config does not exist.
    pub async fn archive(
        &self,
        config_id: Uuid,
        tenant_id: &str,
        performed_by: &str,
        context: AuditContext,
    ) -> Result<Config> {
        self.set_archived(config_id, tenant_id, true, performed_by, context)
            .await
    }

    /// Clears a config's archived flag.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the config does not exist.
    pub async fn restore(
        &self,
        config_id: Uuid,
        tenant_id: &str,
        performed_by: &str,
        context: AuditContext,
    ) -> Result<Config> {
        self.set_archived(config_id, tenant_id, false, performed_by, context)
            .await
    }

    async fn set_archived(
        &self,
        config_id: Uuid,
        tenant_id: &str,
        archived: bool,
        performed_by: &str,
        context: AuditContext,
    ) -> Result<Config> {
        let _guard = self.ledger.locks().acquire(config_id).await?;

        let mut config = self.ledger.require_config(config_id, tenant_id).await?;
        config.is_archived = archived;
        config.touch();
        let config = self.configs.save(&config).await?;

        let action = if archived {
            AuditAction::Archive
        } else {
            AuditAction::Restore
        };
        info!("Config {} {}", config.id, if archived { "archived" } else { "restored" });
        self.record(&config, action, performed_by, json!({}), context).await;

        Ok(config)
    }

    /// Loads a config.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the config does not exist for the tenant.
    pub async fn get(&self, config_id: Uuid, tenant_id: &str) -> Result<Config> {
        self.ledger.require_config(config_id, tenant_id).await
    }

    /// Lists one page of a tenant's configs, most recently updated first.
    ///
    /// Page numbers start at 1; `limit` defaults to
    /// [`DEFAULT_CONFIG_PAGE_LIMIT`].
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn list(
        &self,
        tenant_id: &str,
        include_archived: bool,
        page: u64,
        limit: Option<u64>,
    ) -> Result<ConfigPage> {
        let page = page.max(1);
        let limit = limit.unwrap_or(DEFAULT_CONFIG_PAGE_LIMIT).max(1);

        let mut configs = self.configs.list(tenant_id, include_archived).await?;
        configs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        let total = u64::try_from(configs.len()).unwrap_or(u64::MAX);

        Ok(ConfigPage {
            configs: Page::numbered(page, limit).apply(configs),
            page,
            limit,
            total,
            pages: total.div_ceil(limit),
        })
    }

    async fn ensure_name_free(
        &self,
        tenant_id: &str,
        name: &str,
        owner: Option<Uuid>,
    ) -> Result<()> {
        match self.configs.find_by_name(tenant_id, name).await? {
            Some(existing) if Some(existing.id) != owner => Err(ConflictError::DuplicateName {
                tenant_id: tenant_id.to_string(),
                name: name.to_string(),
            }
            .into()),
            _ => Ok(()),
        }
    }

    async fn record(
        &self,
        config: &Config,
        action: AuditAction,
        performed_by: &str,
        metadata: serde_json::Value,
        context: AuditContext,
    ) {
        self.ledger
            .audit()
            .emit(
                AuditEvent::new(
                    EntityType::Config,
                    config.id,
                    &config.tenant_id,
                    action,
                    performed_by,
                    metadata,
                )
                .with_context(context),
            )
            .await;
    }
}

fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::field("Config name cannot be empty", "name").into());
    }
    Ok(name.to_string())
}

fn validate_environments(environments: Vec<String>) -> Result<Vec<String>> {
    if environments.is_empty() {
        return Err(
            ValidationError::field("At least one environment is required", "environments").into(),
        );
    }
    if let Some(unknown) = environments
        .iter()
        .find(|e| !KNOWN_ENVIRONMENTS.contains(&e.as_str()))
    {
        return Err(ValidationError::field(
            format!(
                "Unknown environment '{unknown}' (expected one of {})",
                KNOWN_ENVIRONMENTS.join(", ")
            ),
            "environments",
        )
        .into());
    }
    Ok(environments)
}
