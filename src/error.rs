//! Error types for the configuration vault.
//!
//! Every core operation either succeeds or fails with exactly one
//! [`VaultError`]. The nested enums group failures by the taxonomy the
//! transport layer maps onto user-facing codes: missing records, conflicts,
//! invalid state, validation, and internal/storage failures.

use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// The main error type for the configuration vault.
#[derive(Debug, Error)]
pub enum VaultError {
    /// A referenced record does not exist.
    #[error("Not found: {0}")]
    NotFound(#[from] NotFoundError),

    /// The operation collides with existing data.
    #[error("Conflict: {0}")]
    Conflict(#[from] ConflictError),

    /// The target is in a state that forbids the operation.
    #[error("Invalid state: {0}")]
    InvalidState(#[from] InvalidStateError),

    /// Input failed validation.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Storage backend errors.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Settings file errors.
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    /// Audit sink errors. Never surfaced by core operations.
    #[error("Audit error: {0}")]
    Audit(#[from] AuditError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse error classification used by outer layers to pick response codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing config, version, or active version.
    NotFound,
    /// Duplicate branch, version number, or config name.
    Conflict,
    /// Write against an archived config or an undeclared environment.
    InvalidState,
    /// Malformed input.
    Validation,
    /// Storage or other internal failure.
    Internal,
}

/// Missing-record errors. Each variant names the missing identifier.
#[derive(Debug, Error)]
pub enum NotFoundError {
    /// The config does not exist for the tenant.
    #[error("Config {config_id} not found for tenant '{tenant_id}'")]
    Config {
        /// Requested config ID.
        config_id: Uuid,
        /// Tenant the lookup was scoped to.
        tenant_id: String,
    },

    /// The version does not exist in the ledger.
    #[error("Version {version} not found for config {config_id}")]
    Version {
        /// Config the version was looked up in.
        config_id: Uuid,
        /// Missing version number.
        version: u64,
    },

    /// No version is active for the environment.
    #[error("No active version for environment '{environment}' of config {config_id}")]
    ActiveVersion {
        /// Config ID.
        config_id: Uuid,
        /// Environment label.
        environment: String,
    },

    /// The active pointer references a version record that is missing.
    #[error(
        "Active version {version} data not found for environment '{environment}' of config {config_id}"
    )]
    ActiveVersionData {
        /// Config ID.
        config_id: Uuid,
        /// Environment label.
        environment: String,
        /// Version number the pointer references.
        version: u64,
    },
}

/// Conflicts with existing data.
#[derive(Debug, Error)]
pub enum ConflictError {
    /// A version already exists on the branch.
    #[error("Branch '{branch}' already exists for config {config_id}")]
    BranchExists {
        /// Config ID.
        config_id: Uuid,
        /// Branch label.
        branch: String,
    },

    /// The version number was taken by a concurrent writer.
    #[error("Version {version} already exists for config {config_id}")]
    DuplicateVersion {
        /// Config ID.
        config_id: Uuid,
        /// Version number that collided.
        version: u64,
    },

    /// A config with this name already exists for the tenant.
    #[error("Config name '{name}' already exists for tenant '{tenant_id}'")]
    DuplicateName {
        /// Tenant ID.
        tenant_id: String,
        /// Config name.
        name: String,
    },
}

/// Operation forbidden by the current state of the target.
#[derive(Debug, Error)]
pub enum InvalidStateError {
    /// Archived configs are read-only.
    #[error("Config {config_id} is archived; cannot {operation}. Restore it first.")]
    Archived {
        /// Config ID.
        config_id: Uuid,
        /// Operation that was attempted.
        operation: String,
    },

    /// The environment is not declared for the config.
    #[error("Environment '{environment}' not configured for config {config_id}")]
    UndeclaredEnvironment {
        /// Config ID.
        config_id: Uuid,
        /// Environment label.
        environment: String,
    },
}

/// Input validation failure.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ValidationError {
    /// Description of the failure.
    pub message: String,
    /// Field or path that failed validation.
    pub field: Option<String>,
}

/// Storage backend errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A stored record could not be read back.
    #[error("Corrupted record at {path}: {message}")]
    Corrupted {
        /// Location of the record.
        path: PathBuf,
        /// Description of the corruption.
        message: String,
    },

    /// A record could not be serialized.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the serialization error.
        message: String,
    },

    /// A filesystem operation failed.
    #[error("Failed to {action} {path}: {source}")]
    Io {
        /// What was being done.
        action: &'static str,
        /// Path involved.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// An in-memory lock was poisoned by a panicking writer.
    #[error("Store lock poisoned")]
    Poisoned,
}

/// Settings loading errors.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// An explicitly requested settings file does not exist.
    #[error("Settings file not found: {path}")]
    FileNotFound {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// The settings file could not be read or parsed.
    #[error("Failed to parse settings: {message}")]
    Parse {
        /// Error message.
        message: String,
        /// Location of the error, if known.
        location: Option<String>,
    },
}

/// Audit delivery errors.
#[derive(Debug, Error)]
pub enum AuditError {
    /// A sink failed to record an event.
    #[error("Sink '{sink}' failed: {message}")]
    Delivery {
        /// Sink name.
        sink: &'static str,
        /// Failure description.
        message: String,
    },
}

/// Result type alias for vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;

impl VaultError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Maps this error onto the coarse taxonomy.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::Validation(_) | Self::Settings(_) => ErrorKind::Validation,
            Self::Store(_) | Self::Audit(_) | Self::Io(_) | Self::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Returns true if this error is retryable.
    ///
    /// Only version-number collisions qualify: the writer recomputes the next
    /// number and re-attempts the insert.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(ConflictError::DuplicateVersion { .. }))
    }
}

impl ValidationError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a validation error without a specific field.
    #[must_use]
    pub fn general(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field: None,
        }
    }
}

impl AuditError {
    /// Creates a delivery error for the named sink.
    #[must_use]
    pub fn delivery(sink: &'static str, message: impl Into<String>) -> Self {
        Self::Delivery {
            sink,
            message: message.into(),
        }
    }
}

impl StoreError {
    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Creates an IO error for the given action and path.
    #[must_use]
    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        let id = Uuid::new_v4();
        let not_found = VaultError::from(NotFoundError::Version {
            config_id: id,
            version: 7,
        });
        assert_eq!(not_found.kind(), ErrorKind::NotFound);
        assert!(not_found.to_string().contains("Version 7"));

        let archived = VaultError::from(InvalidStateError::Archived {
            config_id: id,
            operation: String::from("create versions"),
        });
        assert_eq!(archived.kind(), ErrorKind::InvalidState);

        assert_eq!(VaultError::from(StoreError::Poisoned).kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_only_duplicate_version_is_retryable() {
        let id = Uuid::new_v4();
        let duplicate = VaultError::from(ConflictError::DuplicateVersion {
            config_id: id,
            version: 3,
        });
        assert!(duplicate.is_retryable());

        let branch = VaultError::from(ConflictError::BranchExists {
            config_id: id,
            branch: String::from("feature"),
        });
        assert!(!branch.is_retryable());
        assert_eq!(branch.kind(), ErrorKind::Conflict);
    }
}
