//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

/// Tenant used when none is given.
pub const DEFAULT_TENANT: &str = "default";

/// cfgvault - Versioned configuration documents with per-environment deploys.
#[derive(Parser, Debug)]
#[command(name = "cfgvault")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the settings file.
    #[arg(short, long, global = true, env = "CFGVAULT_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Tenant that owns the configs.
    #[arg(short, long, global = true, env = "CFGVAULT_TENANT", default_value = DEFAULT_TENANT)]
    pub tenant: String,

    /// User recorded as the author of changes.
    #[arg(short, long, global = true, env = "CFGVAULT_USER")]
    pub user: Option<String>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage configs.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Manage versions.
    Version {
        /// Version subcommand.
        #[command(subcommand)]
        command: VersionCommands,
    },

    /// Manage branches.
    Branch {
        /// Branch subcommand.
        #[command(subcommand)]
        command: BranchCommands,
    },

    /// Make a version active in an environment.
    Deploy {
        /// Config ID.
        config_id: Uuid,

        /// Version number to deploy.
        #[arg(id = "number", value_name = "VERSION")]
        version: u64,

        /// Target environment.
        #[arg(short, long)]
        env: String,
    },

    /// Point an environment back at an earlier version.
    Rollback {
        /// Config ID.
        config_id: Uuid,

        /// Target environment.
        #[arg(short, long)]
        env: String,

        /// Version number to roll back to.
        #[arg(long = "to")]
        target: u64,

        /// Why the rollback is happening.
        #[arg(short, long)]
        reason: Option<String>,
    },

    /// Show the version active in an environment.
    Active {
        /// Config ID.
        config_id: Uuid,

        /// Environment to inspect.
        #[arg(short, long)]
        env: String,

        /// Print only the document.
        #[arg(long)]
        data_only: bool,

        /// Print only the value at this dotted path (implies --data-only).
        #[arg(long)]
        path: Option<String>,
    },

    /// Diff two versions of a config.
    Compare {
        /// Config ID.
        config_id: Uuid,

        /// Older version number.
        version1: u64,

        /// Newer version number.
        version2: u64,
    },
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Create a config.
    Create {
        /// Config name, unique per tenant.
        name: String,

        /// Declared environment (repeatable, defaults to dev).
        #[arg(short, long = "env")]
        environments: Vec<String>,

        /// Description.
        #[arg(short, long)]
        description: Option<String>,

        /// Tag (repeatable).
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// List configs.
    List {
        /// Include archived configs.
        #[arg(short, long)]
        archived: bool,

        /// Page number, starting at 1.
        #[arg(long, default_value_t = 1)]
        page: u64,

        /// Configs per page.
        #[arg(long)]
        limit: Option<u64>,
    },

    /// Show a config.
    Show {
        /// Config ID.
        config_id: Uuid,
    },

    /// Change a config's name, description, environments or tags.
    Update {
        /// Config ID.
        config_id: Uuid,

        /// New name.
        #[arg(long)]
        name: Option<String>,

        /// New description.
        #[arg(short, long)]
        description: Option<String>,

        /// Declared environment (repeatable, replaces the current set).
        #[arg(short, long = "env")]
        environments: Vec<String>,

        /// Tag (repeatable, replaces the current set).
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Archive a config.
    Archive {
        /// Config ID.
        config_id: Uuid,
    },

    /// Restore an archived config.
    Restore {
        /// Config ID.
        config_id: Uuid,
    },
}

/// Version subcommands.
#[derive(Subcommand, Debug)]
pub enum VersionCommands {
    /// Record a new version from a JSON or YAML document.
    Create {
        /// Config ID.
        config_id: Uuid,

        /// Document file.
        file: PathBuf,

        /// Branch (defaults to the configured default branch).
        #[arg(short, long)]
        branch: Option<String>,

        /// Explicit parent version.
        #[arg(short, long)]
        parent: Option<u64>,

        /// Change log message.
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Show a version.
    Show {
        /// Config ID.
        config_id: Uuid,

        /// Version number.
        #[arg(id = "number", value_name = "VERSION")]
        version: u64,
    },

    /// List versions, newest first.
    History {
        /// Config ID.
        config_id: Uuid,

        /// Only versions on this branch.
        #[arg(short, long)]
        branch: Option<String>,

        /// 1-based page number.
        #[arg(long, default_value = "1")]
        page: u64,

        /// Page size.
        #[arg(short, long)]
        limit: Option<u64>,
    },
}

/// Branch subcommands.
#[derive(Subcommand, Debug)]
pub enum BranchCommands {
    /// Start a branch from an existing version.
    Create {
        /// Config ID.
        config_id: Uuid,

        /// New branch name.
        branch: String,

        /// Version the branch forks from.
        #[arg(long = "from")]
        source_version: u64,

        /// Document file for the first version on the branch.
        file: PathBuf,

        /// Change log message.
        #[arg(short, long)]
        message: Option<String>,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}
