// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # cfgvault
//!
//! Per-tenant version control and deployment for structured configuration
//! documents.
//!
//! ## Overview
//!
//! Every config owns an append-only ledger of numbered, checksummed document
//! snapshots and a set of environments, each pointing at the version that is
//! live there. cfgvault lets you:
//!
//! - Record new versions on named branches, with parent lineage inferred
//! - Fork branches from an existing version
//! - Deploy any version to an environment and roll back to earlier ones
//! - Compare two versions as a path-level structural diff
//! - Keep an audit trail of every state-changing operation
//!
//! ## Architecture
//!
//! 1. **Documents**: [`document::Document`] values with canonical SHA-256 checksums
//! 2. **Ledger**: [`ledger::VersionLedger`] allocates version numbers per config
//! 3. **Deployments**: [`deployment::DeploymentManager`] moves environment pointers
//!
//! Writes to one config are serialized by a per-config lock shared by all three
//! services; stores reject duplicate version numbers so concurrent processes
//! retry instead of overwriting each other.
//!
//! ## Modules
//!
//! - [`document`]: Document value type and checksums
//! - [`diff`]: Structural diffs, summaries and change logs
//! - [`store`]: Config and version storage backends (local, memory)
//! - [`ledger`]: Version creation, branching and history
//! - [`deployment`]: Deploy, rollback, active version and comparison
//! - [`catalog`]: Config creation, updates, archival
//! - [`audit`]: Audit events and sinks
//! - [`settings`]: Settings loading and validation
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! # cfgvault.yaml
//! store:
//!   backend: local
//!   path: /var/lib/cfgvault
//!
//! audit:
//!   sink: jsonl
//!
//! ledger:
//!   default_branch: main
//!   strict_rollback: true
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod audit;
pub mod catalog;
pub mod cli;
pub mod deployment;
pub mod diff;
pub mod document;
pub mod error;
pub mod ledger;
pub mod settings;
pub mod store;

// ============================================================================
// Re-exports
// ============================================================================

pub use audit::{AuditAction, AuditContext, AuditDispatcher, AuditEvent, AuditSink};
pub use catalog::{ConfigCatalog, ConfigPage, ConfigUpdate, NewConfig};
pub use cli::{Cli, Commands, OutputFormatter};
pub use deployment::{
    ActiveVersion, Comparison, DeployRequest, DeployResult, DeploymentManager, RollbackRequest,
    RollbackResult,
};
pub use diff::{Change, ChangeKind, DiffEngine, DiffResult};
pub use document::{Document, DocumentHasher};
pub use error::{ErrorKind, Result, VaultError};
pub use ledger::{NewBranch, NewVersion, VersionHistory, VersionLedger};
pub use settings::{Settings, SettingsParser, SettingsValidator};
pub use store::{Config, ConfigStore, LocalStore, MemoryStore, Version, VersionStore};
