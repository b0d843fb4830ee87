//! cfgvault CLI entrypoint.
//!
//! This is the main entrypoint for the cfgvault command-line tool.

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use cfgvault::audit::{
    AuditContext, AuditDispatcher, AuditSink, JsonlAuditSink, NullAuditSink, TracingAuditSink,
    WebhookAuditSink,
};
use cfgvault::catalog::{ConfigCatalog, ConfigUpdate, NewConfig};
use cfgvault::cli::{
    BranchCommands, Cli, Commands, ConfigCommands, OutputFormatter, VersionCommands,
    load_document,
};
use cfgvault::deployment::{DeployRequest, DeploymentManager, RollbackRequest};
use cfgvault::error::{Result, ValidationError, VaultError};
use cfgvault::ledger::{NewBranch, NewVersion, VersionLedger};
use cfgvault::settings::{
    AuditSinkKind, LogFormat, Settings, SettingsParser, SettingsValidator, StoreBackend,
};
use cfgvault::store::{ConfigStore, LocalStore, MemoryStore, VersionStore};

use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    let (settings, settings_path) = match SettingsParser::resolve(cli.settings.as_deref()) {
        Ok(resolved) => resolved,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    init_logging(cli.verbose, settings.logging.format);
    match &settings_path {
        Some(path) => debug!("Using settings from: {}", path.display()),
        None => debug!("No settings file found, using defaults"),
    }

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli, settings)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
///
/// `RUST_LOG` takes precedence over the verbosity flag. Logs go to stderr so
/// command output on stdout stays machine-readable.
fn init_logging(verbose: bool, format: LogFormat) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Services wired from settings.
struct Vault {
    catalog: ConfigCatalog,
    ledger: Arc<VersionLedger>,
    deployments: DeploymentManager,
    audit: Arc<AuditDispatcher>,
}

/// Caller identity for one invocation.
struct Session {
    tenant: String,
    user: String,
    context: AuditContext,
    formatter: OutputFormatter,
}

/// Main async entry point.
async fn run(cli: Cli, settings: Settings) -> Result<()> {
    let validation = SettingsValidator::new().validate(&settings)?;

    let session = Session {
        tenant: cli.tenant,
        user: cli
            .user
            .or_else(|| std::env::var("USER").ok())
            .unwrap_or_else(|| String::from("cli")),
        context: AuditContext::default()
            .with_user_agent(format!("cfgvault/{}", env!("CARGO_PKG_VERSION"))),
        formatter: OutputFormatter::new(cli.output),
    };
    for warning in &validation.warnings {
        warn!("{warning}");
    }

    let vault = open_vault(&settings)?;
    let outcome = dispatch(&vault, &session, cli.command).await;

    // Flush queued audit events before reporting, whatever the outcome.
    vault.audit.shutdown().await;

    let output = outcome?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

/// Runs one command and renders its result.
async fn dispatch(vault: &Vault, session: &Session, command: Commands) -> Result<String> {
    match command {
        Commands::Config { command } => cmd_config(vault, session, command).await,
        Commands::Version { command } => cmd_version(vault, session, command).await,
        Commands::Branch { command } => cmd_branch(vault, session, command).await,
        Commands::Deploy {
            config_id,
            version,
            env,
        } => {
            let request =
                DeployRequest::new(config_id, &session.tenant, version, &env, &session.user)
                .with_context(session.context.clone());
            let result = vault.deployments.deploy(request).await?;
            Ok(session.formatter.format_deploy(&result))
        }
        Commands::Rollback {
            config_id,
            env,
            target,
            reason,
        } => {
            let mut request =
                RollbackRequest::new(config_id, &session.tenant, &env, target, &session.user)
                    .with_context(session.context.clone());
            if let Some(reason) = reason {
                request = request.with_reason(reason);
            }
            let result = vault.deployments.rollback(request).await?;
            Ok(session.formatter.format_rollback(&result))
        }
        Commands::Active {
            config_id,
            env,
            data_only,
            path,
        } => {
            let active = vault
                .deployments
                .get_active_version(config_id, &session.tenant, &env)
                .await?;
            match path {
                Some(path) => Ok(session.formatter.format_document(active.select(&path)?)),
                None => Ok(session.formatter.format_active(&active, data_only)),
            }
        }
        Commands::Compare {
            config_id,
            version1,
            version2,
        } => {
            let comparison = vault
                .deployments
                .compare_versions(config_id, &session.tenant, version1, version2)
                .await?;
            Ok(session.formatter.format_comparison(&comparison))
        }
    }
}

/// Handles `config` subcommands.
async fn cmd_config(vault: &Vault, session: &Session, command: ConfigCommands) -> Result<String> {
    let formatter = &session.formatter;
    match command {
        ConfigCommands::Create {
            name,
            environments,
            description,
            tags,
        } => {
            let mut request = NewConfig::new(&session.tenant, &name, &session.user)
                .with_environments(environments)
                .with_tags(tags)
                .with_context(session.context.clone());
            if let Some(description) = description {
                request = request.with_description(description);
            }
            let config = vault.catalog.create(request).await?;
            Ok(formatter.format_config(&config))
        }
        ConfigCommands::List {
            archived,
            page,
            limit,
        } => {
            let configs = vault
                .catalog
                .list(&session.tenant, archived, page, limit)
                .await?;
            Ok(formatter.format_configs(&configs))
        }
        ConfigCommands::Show { config_id } => {
            let config = vault.catalog.get(config_id, &session.tenant).await?;
            Ok(formatter.format_config(&config))
        }
        ConfigCommands::Update {
            config_id,
            name,
            description,
            environments,
            tags,
        } => {
            let update = ConfigUpdate {
                name,
                description,
                environments: non_empty(environments),
                tags: non_empty(tags),
            };
            if update.is_empty() {
                return Err(ValidationError::general(
                    "Nothing to update: pass --name, --description, --env or --tag",
                )
                .into());
            }
            let config = vault
                .catalog
                .update(
                    config_id,
                    &session.tenant,
                    update,
                    &session.user,
                    session.context.clone(),
                )
                .await?;
            Ok(formatter.format_config(&config))
        }
        ConfigCommands::Archive { config_id } => {
            let config = vault
                .catalog
                .archive(config_id, &session.tenant, &session.user, session.context.clone())
                .await?;
            Ok(formatter.success(&format!("Archived config '{}'", config.name)))
        }
        ConfigCommands::Restore { config_id } => {
            let config = vault
                .catalog
                .restore(config_id, &session.tenant, &session.user, session.context.clone())
                .await?;
            Ok(formatter.success(&format!("Restored config '{}'", config.name)))
        }
    }
}

/// Handles `version` subcommands.
async fn cmd_version(vault: &Vault, session: &Session, command: VersionCommands) -> Result<String> {
    let formatter = &session.formatter;
    match command {
        VersionCommands::Create {
            config_id,
            file,
            branch,
            parent,
            message,
        } => {
            let data = load_document(&file)?;
            let mut request = NewVersion::new(config_id, &session.tenant, data, &session.user)
                .with_context(session.context.clone());
            if let Some(branch) = branch {
                request = request.on_branch(branch);
            }
            if let Some(parent) = parent {
                request = request.with_parent(parent);
            }
            if let Some(message) = message {
                request = request.with_change_log(message);
            }

            let version = vault.ledger.create_version(request).await?;
            info!("Recorded version {} from {}", version.version, file.display());
            Ok(formatter.format_version(&version))
        }
        VersionCommands::Show { config_id, version } => {
            vault.catalog.get(config_id, &session.tenant).await?;
            let version = vault
                .ledger
                .get_version(config_id, &session.tenant, version)
                .await?;
            Ok(formatter.format_version(&version))
        }
        VersionCommands::History {
            config_id,
            branch,
            page,
            limit,
        } => {
            vault.catalog.get(config_id, &session.tenant).await?;
            let history = vault
                .ledger
                .history_page(config_id, &session.tenant, branch.as_deref(), page, limit)
                .await?;
            Ok(formatter.format_history(&history))
        }
    }
}

/// Handles `branch` subcommands.
async fn cmd_branch(vault: &Vault, session: &Session, command: BranchCommands) -> Result<String> {
    match command {
        BranchCommands::Create {
            config_id,
            branch,
            source_version,
            file,
            message,
        } => {
            let data = load_document(&file)?;
            let mut request = NewBranch::new(
                config_id,
                &session.tenant,
                &branch,
                source_version,
                data,
                &session.user,
            )
            .with_context(session.context.clone());
            if let Some(message) = message {
                request = request.with_change_log(message);
            }

            let version = vault.ledger.create_branch(request).await?;
            Ok(session.formatter.format_version(&version))
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Builds stores, audit dispatch and services from settings.
fn open_vault(settings: &Settings) -> Result<Vault> {
    let (configs, versions) = open_stores(settings)?;
    let sink = open_audit_sink(settings)?;
    let audit = Arc::new(AuditDispatcher::queued(sink, settings.audit.queue_capacity));

    let ledger = Arc::new(
        VersionLedger::new(Arc::clone(&configs), versions, Arc::clone(&audit))
            .with_settings(settings.ledger.clone()),
    );

    Ok(Vault {
        catalog: ConfigCatalog::new(Arc::clone(&configs), Arc::clone(&ledger)),
        deployments: DeploymentManager::new(configs, Arc::clone(&ledger)),
        ledger,
        audit,
    })
}

/// Creates the storage backend named in settings.
fn open_stores(settings: &Settings) -> Result<(Arc<dyn ConfigStore>, Arc<dyn VersionStore>)> {
    match settings.store.backend {
        StoreBackend::Local => {
            let dir = settings
                .store_dir()
                .ok_or_else(|| {
                    VaultError::internal("No data directory available for the local store")
                })?;
            debug!("Opening local store at: {}", dir.display());
            let store = Arc::new(LocalStore::with_base_dir(dir));
            let configs: Arc<dyn ConfigStore> = store.clone();
            let versions: Arc<dyn VersionStore> = store;
            Ok((configs, versions))
        }
        StoreBackend::Memory => {
            let store = Arc::new(MemoryStore::new());
            let configs: Arc<dyn ConfigStore> = store.clone();
            let versions: Arc<dyn VersionStore> = store;
            Ok((configs, versions))
        }
    }
}

/// Creates the audit sink named in settings.
fn open_audit_sink(settings: &Settings) -> Result<Arc<dyn AuditSink>> {
    let sink: Arc<dyn AuditSink> = match settings.audit.sink {
        AuditSinkKind::Tracing => Arc::new(TracingAuditSink),
        AuditSinkKind::None => Arc::new(NullAuditSink),
        AuditSinkKind::Jsonl => {
            let path = settings
                .audit_log_path()
                .ok_or_else(|| VaultError::internal("No audit log path configured"))?;
            Arc::new(JsonlAuditSink::new(path))
        }
        AuditSinkKind::Webhook => {
            let url = settings
                .audit
                .url
                .as_deref()
                .ok_or_else(|| VaultError::internal("No audit webhook URL configured"))?;
            Arc::new(WebhookAuditSink::new(url, settings.audit.timeout_secs)?)
        }
    };
    debug!("Audit sink: {}", sink.name());
    Ok(sink)
}

/// Maps an empty repeated flag to "not given".
fn non_empty(values: Vec<String>) -> Option<Vec<String>> {
    (!values.is_empty()).then_some(values)
}
