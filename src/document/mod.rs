//! Structured configuration documents.
//!
//! This module holds the closed document type that every other component
//! operates over:
//! - [`Document`]: recursive null/bool/number/string/sequence/map value
//! - [`DocPath`]: dot-joined paths into a document
//! - [`DocumentHasher`]: canonical serialization and SHA-256 checksums

mod checksum;
mod path;
mod value;

pub use checksum::DocumentHasher;
pub use path::{DocPath, ROOT_PATH};
pub use value::Document;
