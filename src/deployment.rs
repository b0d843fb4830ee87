//! Deployment state machine.
//!
//! Each `(config, environment)` pair is either unset or points at one
//! existing version. Deploy and rollback both move that pointer; they differ
//! in their preconditions and in the audit action they record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::audit::{AuditAction, AuditContext, AuditEvent, EntityType};
use crate::diff::DiffResult;
use crate::document::{DocPath, Document};
use crate::error::{InvalidStateError, NotFoundError, Result, ValidationError, VaultError};
use crate::ledger::VersionLedger;
use crate::store::{Config, ConfigStore, VersionMeta};

/// Request to deploy a version to an environment.
#[derive(Debug, Clone)]
pub struct DeployRequest {
    /// Target config.
    pub config_id: Uuid,
    /// Owning tenant.
    pub tenant_id: String,
    /// Version to activate.
    pub version: u64,
    /// Environment label.
    pub environment: String,
    /// Who deploys.
    pub performed_by: String,
    /// Request origin for the audit record.
    pub context: AuditContext,
}

/// Request to roll an environment back to a version.
#[derive(Debug, Clone)]
pub struct RollbackRequest {
    /// Target config.
    pub config_id: Uuid,
    /// Owning tenant.
    pub tenant_id: String,
    /// Environment label.
    pub environment: String,
    /// Version to activate.
    pub target_version: u64,
    /// Who rolls back.
    pub performed_by: String,
    /// Why.
    pub reason: Option<String>,
    /// Request origin for the audit record.
    pub context: AuditContext,
}

/// Outcome of a deploy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployResult {
    /// Always true for a returned result.
    pub success: bool,
    /// Config ID.
    pub config_id: Uuid,
    /// Environment label.
    pub environment: String,
    /// Version active before the deploy, if any.
    pub previous_version: Option<u64>,
    /// Version active now.
    pub deployed_version: u64,
    /// Branch of the deployed version.
    pub branch: String,
    /// When the pointer moved.
    pub deployed_at: DateTime<Utc>,
}

/// Outcome of a rollback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackResult {
    /// Always true for a returned result.
    pub success: bool,
    /// Config ID.
    pub config_id: Uuid,
    /// Environment label.
    pub environment: String,
    /// Version active before the rollback, if any.
    pub previous_version: Option<u64>,
    /// Version active now.
    pub current_version: u64,
    /// Stated reason.
    pub reason: Option<String>,
    /// When the pointer moved.
    pub rolled_back_at: DateTime<Utc>,
}

/// The version live in an environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveVersion {
    /// Environment label.
    pub environment: String,
    /// Version number.
    pub version: u64,
    /// Document of that version.
    pub data: Document,
    /// Checksum of that version.
    pub checksum: String,
    /// Creation time of that version.
    pub updated_at: DateTime<Utc>,
}

/// Side-by-side comparison of two versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comparison {
    /// Metadata of the first version.
    pub version1: VersionMeta,
    /// Metadata of the second version.
    pub version2: VersionMeta,
    /// Changes from the first to the second.
    pub diff: DiffResult,
}

impl DeployRequest {
    /// Creates a deploy request.
    #[must_use]
    pub fn new(
        config_id: Uuid,
        tenant_id: &str,
        version: u64,
        environment: &str,
        performed_by: &str,
    ) -> Self {
        Self {
            config_id,
            tenant_id: tenant_id.to_string(),
            version,
            environment: environment.to_string(),
            performed_by: performed_by.to_string(),
            context: AuditContext::default(),
        }
    }

    /// Sets the request origin.
    #[must_use]
    pub fn with_context(mut self, context: AuditContext) -> Self {
        self.context = context;
        self
    }
}

impl RollbackRequest {
    /// Creates a rollback request.
    #[must_use]
    pub fn new(
        config_id: Uuid,
        tenant_id: &str,
        environment: &str,
        target_version: u64,
        performed_by: &str,
    ) -> Self {
        Self {
            config_id,
            tenant_id: tenant_id.to_string(),
            environment: environment.to_string(),
            target_version,
            performed_by: performed_by.to_string(),
            reason: None,
            context: AuditContext::default(),
        }
    }

    /// Sets the reason.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Sets the request origin.
    #[must_use]
    pub fn with_context(mut self, context: AuditContext) -> Self {
        self.context = context;
        self
    }
}

impl ActiveVersion {
    /// Returns the value at a dotted `path` inside the active document.
    ///
    /// # Errors
    ///
    /// Returns a validation error if nothing lives at `path`.
    pub fn select(&self, path: &str) -> Result<&Document> {
        self.data.get(&DocPath::parse(path)).ok_or_else(|| {
            ValidationError::field(format!("No value at path '{path}'"), "path").into()
        })
    }
}

/// Tracks and moves the active version of each environment.
#[derive(Debug)]
pub struct DeploymentManager {
    configs: Arc<dyn ConfigStore>,
    ledger: Arc<VersionLedger>,
}

impl DeploymentManager {
    /// Creates a manager over the given config store and ledger.
    ///
    /// The ledger's lock registry also guards the active-version map.
    #[must_use]
    pub fn new(configs: Arc<dyn ConfigStore>, ledger: Arc<VersionLedger>) -> Self {
        Self { configs, ledger }
    }

    /// Points an environment at a version.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the config or version does not exist, and
    /// `InvalidState` if the config is archived or the environment is not
    /// declared for it.
    pub async fn deploy(&self, request: DeployRequest) -> Result<DeployResult> {
        let guard = self.ledger.locks().acquire(request.config_id).await?;

        let mut config = self
            .ledger
            .require_config(request.config_id, &request.tenant_id)
            .await?;
        check_deployable(&config, &request.environment, "deploy")?;

        let version = self
            .ledger
            .get_version(config.id, &request.tenant_id, request.version)
            .await?;

        let previous_version = config.set_active(&request.environment, version.version);
        self.configs.save(&config).await?;
        drop(guard);

        info!(
            "Deployed version {} of config {} to '{}' (was {:?})",
            version.version, config.id, request.environment, previous_version
        );

        self.ledger
            .audit()
            .emit(
                AuditEvent::new(
                    EntityType::Config,
                    config.id,
                    &config.tenant_id,
                    AuditAction::Deploy,
                    &request.performed_by,
                    json!({
                        "environment": request.environment,
                        "previousVersion": previous_version,
                        "deployedVersion": version.version,
                        "branch": version.branch,
                    }),
                )
                .with_context(request.context),
            )
            .await;

        Ok(DeployResult {
            success: true,
            config_id: config.id,
            environment: request.environment,
            previous_version,
            deployed_version: version.version,
            branch: version.branch,
            deployed_at: config.updated_at,
        })
    }

    /// Points an environment at an arbitrary existing version.
    ///
    /// The target need not have been active before. Unless strict rollback is
    /// enabled in the ledger settings, archived configs and undeclared
    /// environments are not rejected.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the config or target version does not exist, and
    /// `InvalidState` under strict rollback when deploy would refuse.
    pub async fn rollback(&self, request: RollbackRequest) -> Result<RollbackResult> {
        let guard = self.ledger.locks().acquire(request.config_id).await?;

        let mut config = self
            .ledger
            .require_config(request.config_id, &request.tenant_id)
            .await?;
        if self.ledger.settings().strict_rollback {
            check_deployable(&config, &request.environment, "roll back")?;
        }

        let target = self
            .ledger
            .get_version(config.id, &request.tenant_id, request.target_version)
            .await?;

        let previous_version = config.set_active(&request.environment, target.version);
        self.configs.save(&config).await?;
        drop(guard);

        info!(
            "Rolled back config {} in '{}' from {:?} to version {}",
            config.id, request.environment, previous_version, target.version
        );

        self.ledger
            .audit()
            .emit(
                AuditEvent::new(
                    EntityType::Config,
                    config.id,
                    &config.tenant_id,
                    AuditAction::Rollback,
                    &request.performed_by,
                    json!({
                        "environment": request.environment,
                        "fromVersion": previous_version,
                        "toVersion": target.version,
                        "reason": request.reason,
                    }),
                )
                .with_context(request.context),
            )
            .await;

        Ok(RollbackResult {
            success: true,
            config_id: config.id,
            environment: request.environment,
            previous_version,
            current_version: target.version,
            reason: request.reason,
            rolled_back_at: config.updated_at,
        })
    }

    /// Loads the version live in an environment.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the config does not exist, nothing is active in
    /// the environment, or the active pointer references a missing version.
    pub async fn get_active_version(
        &self,
        config_id: Uuid,
        tenant_id: &str,
        environment: &str,
    ) -> Result<ActiveVersion> {
        let config = self.ledger.require_config(config_id, tenant_id).await?;

        let Some(Some(number)) = config.active_slot(environment) else {
            return Err(NotFoundError::ActiveVersion {
                config_id,
                environment: environment.to_string(),
            }
            .into());
        };

        let version = match self.ledger.get_version(config_id, tenant_id, number).await {
            Ok(version) => version,
            Err(VaultError::NotFound(NotFoundError::Version { .. })) => {
                return Err(NotFoundError::ActiveVersionData {
                    config_id,
                    environment: environment.to_string(),
                    version: number,
                }
                .into());
            }
            Err(e) => return Err(e),
        };

        debug!("Config {config_id} has version {number} active in '{environment}'");
        Ok(ActiveVersion {
            environment: environment.to_string(),
            version: version.version,
            data: version.data,
            checksum: version.checksum,
            updated_at: version.created_at,
        })
    }

    /// Compares two versions of a config.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` naming the first missing version number.
    pub async fn compare_versions(
        &self,
        config_id: Uuid,
        tenant_id: &str,
        version1: u64,
        version2: u64,
    ) -> Result<Comparison> {
        let (first, second) = tokio::join!(
            self.ledger.get_version(config_id, tenant_id, version1),
            self.ledger.get_version(config_id, tenant_id, version2),
        );
        let (first, second) = (first?, second?);

        let diff = self
            .ledger
            .diff_engine()
            .compute_diff(&first.data, &second.data);

        Ok(Comparison {
            version1: first.meta(),
            version2: second.meta(),
            diff,
        })
    }
}

fn check_deployable(config: &Config, environment: &str, operation: &str) -> Result<()> {
    if config.is_archived {
        return Err(InvalidStateError::Archived {
            config_id: config.id,
            operation: operation.to_string(),
        }
        .into());
    }
    if !config.declares(environment) {
        return Err(InvalidStateError::UndeclaredEnvironment {
            config_id: config.id,
            environment: environment.to_string(),
        }
        .into());
    }
    Ok(())
}
