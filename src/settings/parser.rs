//! Settings loading.
//!
//! Precedence, lowest first: built-in defaults, the YAML file, then
//! `CFGVAULT_*` environment variables (including those loaded from a `.env`
//! file next to the settings file).

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Result, SettingsError};

use super::spec::{AuditSinkKind, Settings};

/// Default settings file names to search for.
pub const DEFAULT_SETTINGS_FILES: &[&str] = &["cfgvault.yaml", "cfgvault.yml"];

/// Settings parser.
#[derive(Debug, Default)]
pub struct SettingsParser {
    /// Directory holding the `.env` file.
    base_path: Option<PathBuf>,
}

impl SettingsParser {
    /// Creates a new parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the directory the `.env` file is read from.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads settings from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or cannot be parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Settings> {
        let path = path.as_ref();
        info!("Loading settings from: {}", path.display());

        if !path.exists() {
            return Err(SettingsError::FileNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }

        let content = std::fs::read_to_string(path).map_err(|e| SettingsError::Parse {
            message: format!("Failed to read file: {e}"),
            location: Some(path.display().to_string()),
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses settings from a YAML string. An empty document yields defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<Settings> {
        debug!("Parsing YAML settings");

        if content.trim().is_empty() {
            return Ok(Settings::default());
        }

        let settings = serde_yaml::from_str(content).map_err(|e| SettingsError::Parse {
            message: format!("YAML parse error: {e}"),
            location: source.map(|p| p.display().to_string()),
        })?;
        Ok(settings)
    }

    /// Resolves and loads settings.
    ///
    /// An explicit path must exist. Without one, the nearest settings file
    /// above the working directory is used, or defaults if there is none.
    /// Environment overrides are applied in every case.
    ///
    /// # Errors
    ///
    /// Returns an error if a settings file cannot be read or parsed, or an
    /// override has an invalid value.
    pub fn resolve(explicit: Option<&Path>) -> Result<(Settings, Option<PathBuf>)> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => std::env::current_dir().ok().and_then(find_settings_file),
        };

        let base = path
            .as_deref()
            .and_then(Path::parent)
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let parser = Self::new().with_base_path(base);
        parser.load_dotenv()?;

        let mut settings = match &path {
            Some(p) => parser.load_file(p)?,
            None => {
                debug!("No settings file found, using defaults");
                Settings::default()
            }
        };
        Self::apply_overrides(&mut settings, |key| std::env::var(key).ok())?;

        Ok((settings, path))
    }

    /// Applies `CFGVAULT_*` overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if `CFGVAULT_AUDIT_SINK` names an unknown sink.
    pub fn apply_overrides(
        settings: &mut Settings,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<()> {
        if let Some(path) = lookup("CFGVAULT_STORE_PATH") {
            debug!("Overriding store.path from environment");
            settings.store.path = Some(PathBuf::from(path));
        }

        if let Some(sink) = lookup("CFGVAULT_AUDIT_SINK") {
            debug!("Overriding audit.sink from environment");
            settings.audit.sink = parse_sink(&sink)?;
        }

        if let Some(url) = lookup("CFGVAULT_AUDIT_URL") {
            debug!("Overriding audit.url from environment");
            settings.audit.url = Some(url);
        }

        if let Some(branch) = lookup("CFGVAULT_DEFAULT_BRANCH") {
            debug!("Overriding ledger.default_branch from environment");
            settings.ledger.default_branch = branch;
        }

        Ok(())
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| SettingsError::Parse {
                message: format!("Failed to load .env file: {e}"),
                location: Some(env_path.display().to_string()),
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

fn parse_sink(value: &str) -> Result<AuditSinkKind> {
    serde_yaml::from_str(value.trim()).map_err(|_| {
        SettingsError::Parse {
            message: format!(
                "Unknown audit sink '{value}' (expected tracing, jsonl, webhook or none)"
            ),
            location: Some(String::from("CFGVAULT_AUDIT_SINK")),
        }
        .into()
    })
}

/// Finds the nearest settings file in `start_dir` or its parents.
#[must_use]
pub fn find_settings_file(start_dir: impl AsRef<Path>) -> Option<PathBuf> {
    let mut current = start_dir.as_ref().to_path_buf();

    loop {
        for filename in DEFAULT_SETTINGS_FILES {
            let candidate = current.join(filename);
            if candidate.exists() {
                info!("Found settings file: {}", candidate.display());
                return Some(candidate);
            }
        }

        if !current.pop() {
            return None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VaultError;
    use crate::settings::spec::{LogFormat, StoreBackend};
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_parse_partial_settings() {
        let yaml = r"
store:
  backend: memory
ledger:
  strict_rollback: true
logging:
  format: json
";
        let settings = SettingsParser::new().parse_yaml(yaml, None).expect("parse");
        assert_eq!(settings.store.backend, StoreBackend::Memory);
        assert!(settings.ledger.strict_rollback);
        assert_eq!(settings.ledger.default_branch, "main");
        assert_eq!(settings.logging.format, LogFormat::Json);
        assert_eq!(settings.audit.sink, AuditSinkKind::Tracing);
    }

    #[test]
    fn test_empty_file_is_defaults() {
        let settings = SettingsParser::new().parse_yaml("  \n", None).expect("parse");
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_invalid_yaml_reports_location() {
        let err = SettingsParser::new()
            .parse_yaml("store: [", Some(Path::new("cfgvault.yaml")))
            .expect_err("must fail");
        assert!(matches!(
            err,
            VaultError::Settings(SettingsError::Parse { location: Some(ref l), .. })
                if l == "cfgvault.yaml"
        ));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("CFGVAULT_STORE_PATH", "/data/vault"),
            ("CFGVAULT_AUDIT_SINK", "webhook"),
            ("CFGVAULT_AUDIT_URL", "https://audit.example.com/events"),
            ("CFGVAULT_DEFAULT_BRANCH", "trunk"),
        ]);

        let mut settings = Settings::default();
        SettingsParser::apply_overrides(&mut settings, |k| env.get(k).map(|v| (*v).to_string()))
            .expect("overrides");

        assert_eq!(settings.store.path, Some(PathBuf::from("/data/vault")));
        assert_eq!(settings.audit.sink, AuditSinkKind::Webhook);
        assert_eq!(settings.audit.url.as_deref(), Some("https://audit.example.com/events"));
        assert_eq!(settings.ledger.default_branch, "trunk");
    }

    #[test]
    fn test_unknown_sink_override_fails() {
        let mut settings = Settings::default();
        let result = SettingsParser::apply_overrides(&mut settings, |k| {
            (k == "CFGVAULT_AUDIT_SINK").then(|| String::from("syslog"))
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_find_settings_file_searches_upward() {
        let temp = TempDir::new().expect("temp dir");
        let nested = temp.path().join("a").join("b");
        std::fs::create_dir_all(&nested).expect("mkdir");
        std::fs::write(temp.path().join("cfgvault.yml"), "ledger: {}\n").expect("write");

        let found = find_settings_file(&nested).expect("found");
        assert_eq!(found, temp.path().join("cfgvault.yml"));

        let settings = SettingsParser::new().load_file(&found).expect("load");
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = SettingsParser::new()
            .load_file("/nonexistent/cfgvault.yaml")
            .expect_err("must fail");
        assert!(matches!(err, VaultError::Settings(SettingsError::FileNotFound { .. })));
    }
}
