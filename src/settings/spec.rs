//! Settings types.
//!
//! These structs map to the `cfgvault.yaml` file. Every section is optional
//! and falls back to its defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use validator::Validate;

use crate::audit::{AUDIT_LOG_FILE, DEFAULT_QUEUE_CAPACITY, DEFAULT_TIMEOUT_SECS};
use crate::diff::DEFAULT_CHANGE_LOG_MAX_LENGTH;
use crate::store::{DEFAULT_BRANCH, DEFAULT_PAGE_LIMIT, LocalStore};

/// Default number of attempts at allocating a version number.
pub const DEFAULT_MAX_ALLOCATION_RETRIES: u32 = 5;

/// Root settings structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Validate)]
#[serde(default)]
pub struct Settings {
    /// Storage backend.
    pub store: StoreSettings,
    /// Audit sink.
    #[validate(nested)]
    pub audit: AuditSettings,
    /// Ledger behavior.
    #[validate(nested)]
    pub ledger: LedgerSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

/// Storage backend settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreSettings {
    /// Backend type.
    pub backend: StoreBackend,
    /// Data directory for the local backend.
    pub path: Option<PathBuf>,
}

/// Storage backend types.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// JSON files on disk.
    #[default]
    Local,
    /// Process memory; data is lost on exit.
    Memory,
}

/// Audit sink settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
#[serde(default)]
pub struct AuditSettings {
    /// Sink type.
    pub sink: AuditSinkKind,
    /// Log file for the `jsonl` sink.
    pub path: Option<PathBuf>,
    /// Endpoint for the `webhook` sink.
    #[validate(url)]
    pub url: Option<String>,
    /// Dispatch queue capacity.
    #[validate(range(min = 1, max = 65_536))]
    pub queue_capacity: usize,
    /// Webhook request timeout.
    #[validate(range(min = 1, max = 300))]
    pub timeout_secs: u64,
}

/// Audit sink types.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuditSinkKind {
    /// Structured log lines.
    #[default]
    Tracing,
    /// Append-only JSON Lines file.
    Jsonl,
    /// HTTP POST per event.
    Webhook,
    /// Discard events.
    None,
}

/// Ledger settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
#[serde(default)]
pub struct LedgerSettings {
    /// Branch used when a request names none.
    #[validate(length(min = 1, max = 128))]
    pub default_branch: String,
    /// Maximum length of auto-generated change logs.
    #[validate(range(min = 1, max = 10_000))]
    pub change_log_max_length: usize,
    /// Attempts at allocating a version number before giving up.
    #[validate(range(min = 1, max = 100))]
    pub max_allocation_retries: u32,
    /// Default history page size.
    #[validate(range(min = 1, max = 1_000))]
    pub history_page_size: u64,
    /// Apply deploy's archived and environment checks to rollback too.
    pub strict_rollback: bool,
}

/// Log output settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingSettings {
    /// Output format.
    pub format: LogFormat,
}

/// Log output formats.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            sink: AuditSinkKind::default(),
            path: None,
            url: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            default_branch: String::from(DEFAULT_BRANCH),
            change_log_max_length: DEFAULT_CHANGE_LOG_MAX_LENGTH,
            max_allocation_retries: DEFAULT_MAX_ALLOCATION_RETRIES,
            history_page_size: DEFAULT_PAGE_LIMIT,
            strict_rollback: false,
        }
    }
}

impl Settings {
    /// Resolves the local store directory: the configured path, else the
    /// platform data directory.
    #[must_use]
    pub fn store_dir(&self) -> Option<PathBuf> {
        self.store.path.clone().or_else(LocalStore::default_dir)
    }

    /// Resolves the JSON Lines audit log path.
    #[must_use]
    pub fn audit_log_path(&self) -> Option<PathBuf> {
        self.audit
            .path
            .clone()
            .or_else(|| self.store_dir().map(|d| d.join(AUDIT_LOG_FILE)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.ledger.default_branch, "main");
        assert_eq!(settings.ledger.change_log_max_length, 200);
        assert_eq!(settings.audit.queue_capacity, 256);
        assert!(!settings.ledger.strict_rollback);
    }

    #[test]
    fn test_derived_checks() {
        let mut settings = Settings::default();
        settings.audit.url = Some(String::from("not a url"));
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.ledger.max_allocation_retries = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_audit_log_path_falls_back_to_store_dir() {
        let mut settings = Settings::default();
        settings.store.path = Some(PathBuf::from("/var/lib/cfgvault"));
        assert_eq!(
            settings.audit_log_path(),
            Some(PathBuf::from("/var/lib/cfgvault/audit.jsonl"))
        );

        settings.audit.path = Some(PathBuf::from("/tmp/a.jsonl"));
        assert_eq!(settings.audit_log_path(), Some(PathBuf::from("/tmp/a.jsonl")));
    }
}
