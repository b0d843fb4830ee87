//! Document checksums for change detection.
//!
//! The checksum is a SHA-256 digest over a canonical serialization: compact
//! JSON with map keys sorted at every nesting level. Two documents that differ
//! only in key insertion order always share a checksum.

use sha2::{Digest, Sha256};

use crate::error::{Result, StoreError};

use super::value::Document;

/// Hasher for computing document checksums.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentHasher;

impl DocumentHasher {
    /// Creates a new document hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the lowercase hex SHA-256 checksum of a document.
    ///
    /// # Errors
    ///
    /// Returns an error if a string scalar cannot be serialized.
    pub fn checksum(&self, doc: &Document) -> Result<String> {
        let bytes = self.canonical_bytes(doc)?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(hex::encode(hasher.finalize()))
    }

    /// Serializes a document canonically.
    ///
    /// # Errors
    ///
    /// Returns an error if a string scalar cannot be serialized.
    pub fn canonical_bytes(&self, doc: &Document) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        Self::write_canonical(doc, &mut out)?;
        Ok(out)
    }

    fn write_canonical(doc: &Document, out: &mut Vec<u8>) -> Result<()> {
        match doc {
            Document::Null => out.extend_from_slice(b"null"),
            Document::Bool(true) => out.extend_from_slice(b"true"),
            Document::Bool(false) => out.extend_from_slice(b"false"),
            Document::Number(n) => out.extend_from_slice(n.to_string().as_bytes()),
            Document::String(s) => Self::write_string(s, out)?,
            Document::Sequence(items) => {
                out.push(b'[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(b',');
                    }
                    Self::write_canonical(item, out)?;
                }
                out.push(b']');
            }
            Document::Map(map) => {
                // BTreeMap iteration is already sorted by key.
                out.push(b'{');
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        out.push(b',');
                    }
                    Self::write_string(key, out)?;
                    out.push(b':');
                    Self::write_canonical(value, out)?;
                }
                out.push(b'}');
            }
        }
        Ok(())
    }

    fn write_string(s: &str, out: &mut Vec<u8>) -> Result<()> {
        serde_json::to_writer(&mut *out, s)
            .map_err(|e| StoreError::serialization(format!("Failed to encode string: {e}")))?;
        Ok(())
    }

    /// Computes a short checksum (first 8 characters) for display purposes.
    #[must_use]
    pub fn short_checksum(checksum: &str) -> String {
        checksum.chars().take(8).collect()
    }
}
