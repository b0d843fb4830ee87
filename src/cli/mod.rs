//! CLI module for the cfgvault tool.
//!
//! This module provides the command-line interface for managing configs,
//! their versions, and what is deployed in each environment.

mod commands;
mod input;
mod output;

pub use commands::{
    BranchCommands, Cli, Commands, ConfigCommands, DEFAULT_TENANT, OutputFormat, VersionCommands,
};
pub use input::{load_document, parse_document};
pub use output::OutputFormatter;
