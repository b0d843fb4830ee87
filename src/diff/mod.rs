//! Structural diffing of configuration documents.
//!
//! This module compares two documents path by path, renders human-readable
//! summaries and change logs, and re-applies a change set to a document.
//! Everything here is pure and synchronous.

mod changelog;
mod engine;
mod patch;

pub use changelog::DEFAULT_CHANGE_LOG_MAX_LENGTH;
pub use engine::{Change, ChangeKind, DiffEngine, DiffResult};
