//! Settings module.
//!
//! Loads `cfgvault.yaml`, applies `.env` and environment overrides, and
//! validates the result before anything is wired up.

mod parser;
mod spec;
mod validator;

pub use parser::{DEFAULT_SETTINGS_FILES, SettingsParser, find_settings_file};
pub use spec::{
    AuditSettings, AuditSinkKind, DEFAULT_MAX_ALLOCATION_RETRIES, LedgerSettings, LogFormat,
    LoggingSettings, Settings, StoreBackend, StoreSettings,
};
pub use validator::{SettingsValidator, ValidationResult};
