//! Settings validation.
//!
//! Field-level ranges and URL shape come from the `validator` derive on the
//! settings types. This module adds the checks that span fields.

use tracing::debug;
use validator::Validate;

use crate::error::{Result, ValidationError};

use super::spec::{AuditSinkKind, Settings, StoreBackend};

/// Validator for loaded settings.
#[derive(Debug, Default)]
pub struct SettingsValidator;

/// Problems found in a settings value.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Fatal problems, as `(field, message)`.
    pub errors: Vec<(String, String)>,
    /// Non-fatal observations.
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Returns true if no errors were found.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push((field.to_string(), message.into()));
    }
}

impl SettingsValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates settings.
    ///
    /// # Errors
    ///
    /// Returns the first error found.
    pub fn validate(&self, settings: &Settings) -> Result<ValidationResult> {
        if let Err(e) = settings.validate() {
            return Err(ValidationError::general(format!("Invalid settings: {e}")).into());
        }

        let mut result = ValidationResult::default();
        Self::validate_store(settings, &mut result);
        Self::validate_audit(settings, &mut result);
        Self::validate_ledger(settings, &mut result);

        if let Some((field, message)) = result.errors.first() {
            return Err(ValidationError::field(message.clone(), field.clone()).into());
        }

        debug!("Settings validation passed");
        Ok(result)
    }

    fn validate_store(settings: &Settings, result: &mut ValidationResult) {
        match settings.store.backend {
            StoreBackend::Local => {
                if settings.store_dir().is_none() {
                    result.error(
                        "store.path",
                        "No data directory could be determined; set store.path",
                    );
                }
            }
            StoreBackend::Memory => {
                result
                    .warnings
                    .push(String::from("Memory store selected; data is lost on exit"));
            }
        }
    }

    fn validate_audit(settings: &Settings, result: &mut ValidationResult) {
        let audit = &settings.audit;
        match audit.sink {
            AuditSinkKind::Webhook => {
                if audit.url.as_deref().is_none_or(str::is_empty) {
                    result.error("audit.url", "A URL is required when using the webhook sink");
                }
            }
            AuditSinkKind::Jsonl => {
                if settings.audit_log_path().is_none() {
                    result.error(
                        "audit.path",
                        "A log path is required when using the jsonl sink",
                    );
                }
            }
            AuditSinkKind::Tracing | AuditSinkKind::None => {}
        }

        if audit.url.is_some() && audit.sink != AuditSinkKind::Webhook {
            result
                .warnings
                .push(format!("audit.url is ignored by the '{:?}' sink", audit.sink));
        }
    }

    fn validate_ledger(settings: &Settings, result: &mut ValidationResult) {
        let branch = &settings.ledger.default_branch;
        if branch.trim().is_empty() || branch.chars().any(char::is_whitespace) {
            result.error(
                "ledger.default_branch",
                format!("Branch name '{branch}' must be non-empty and contain no whitespace"),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VaultError;
    use std::path::PathBuf;

    fn settings() -> Settings {
        let mut settings = Settings::default();
        settings.store.path = Some(PathBuf::from("/srv/cfgvault"));
        settings
    }

    #[test]
    fn test_defaults_pass() {
        let result = SettingsValidator::new().validate(&settings()).expect("valid");
        assert!(result.is_valid());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_webhook_requires_url() {
        let mut s = settings();
        s.audit.sink = AuditSinkKind::Webhook;
        let err = SettingsValidator::new().validate(&s).expect_err("must fail");
        assert!(matches!(
            err,
            VaultError::Validation(ValidationError { field: Some(ref f), .. }) if f == "audit.url"
        ));

        s.audit.url = Some(String::from("https://hooks.example.com/audit"));
        assert!(SettingsValidator::new().validate(&s).is_ok());
    }

    #[test]
    fn test_branch_with_whitespace_rejected() {
        let mut s = settings();
        s.ledger.default_branch = String::from("release 1");
        assert!(SettingsValidator::new().validate(&s).is_err());
    }

    #[test]
    fn test_derive_errors_surface_as_validation() {
        let mut s = settings();
        s.audit.queue_capacity = 0;
        let err = SettingsValidator::new().validate(&s).expect_err("must fail");
        assert!(matches!(err, VaultError::Validation(_)));
    }

    #[test]
    fn test_memory_backend_warns() {
        let mut s = settings();
        s.store.backend = StoreBackend::Memory;
        s.audit.url = Some(String::from("https://hooks.example.com/audit"));
        let result = SettingsValidator::new().validate(&s).expect("valid");
        assert_eq!(result.warnings.len(), 2);
    }
}
