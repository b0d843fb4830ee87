//! Audit event records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Kind of entity an audit event is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// A config record.
    Config,
    /// A version record.
    ConfigVersion,
}

/// Action recorded by an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    /// Config created.
    Create,
    /// Config fields updated.
    Update,
    /// Config archived.
    Archive,
    /// Config restored from the archive.
    Restore,
    /// Version written.
    VersionCreate,
    /// Branch forked.
    BranchCreate,
    /// Version deployed to an environment.
    Deploy,
    /// Environment rolled back to a version.
    Rollback,
}

/// Where a request came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditContext {
    /// Caller IP address, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    /// Caller user agent, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Host the operation ran on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

/// A single audit record handed to a sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Event ID.
    pub id: Uuid,
    /// Kind of entity.
    pub entity_type: EntityType,
    /// Entity ID.
    pub entity_id: Uuid,
    /// Owning tenant.
    pub tenant_id: String,
    /// What happened.
    pub action: AuditAction,
    /// Who did it.
    pub performed_by: String,
    /// Action-specific details.
    pub metadata: serde_json::Value,
    /// Request origin.
    #[serde(default)]
    pub context: AuditContext,
    /// When it happened.
    pub performed_at: DateTime<Utc>,
}

impl AuditContext {
    /// Creates a context naming the local host.
    #[must_use]
    pub fn local() -> Self {
        let host = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok());

        Self {
            host,
            ..Self::default()
        }
    }

    /// Sets the caller IP address.
    #[must_use]
    pub fn with_ip_address(mut self, ip_address: impl Into<String>) -> Self {
        self.ip_address = Some(ip_address.into());
        self
    }

    /// Sets the caller user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

impl AuditEvent {
    /// Creates an event stamped now with an empty context.
    #[must_use]
    pub fn new(
        entity_type: EntityType,
        entity_id: Uuid,
        tenant_id: &str,
        action: AuditAction,
        performed_by: &str,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity_type,
            entity_id,
            tenant_id: tenant_id.to_string(),
            action,
            performed_by: performed_by.to_string(),
            metadata,
            context: AuditContext::default(),
            performed_at: Utc::now(),
        }
    }

    /// Attaches a request context.
    #[must_use]
    pub fn with_context(mut self, context: AuditContext) -> Self {
        self.context = context;
        self
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config => write!(f, "config"),
            Self::ConfigVersion => write!(f, "config_version"),
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Archive => "ARCHIVE",
            Self::Restore => "RESTORE",
            Self::VersionCreate => "VERSION_CREATE",
            Self::BranchCreate => "BRANCH_CREATE",
            Self::Deploy => "DEPLOY",
            Self::Rollback => "ROLLBACK",
        };
        write!(f, "{name}")
    }
}
