//! Document input for CLI commands.

use std::path::Path;
use tracing::debug;

use crate::document::Document;
use crate::error::{Result, StoreError, ValidationError};

/// Loads a document from a JSON or YAML file.
///
/// Files ending in `.json` are parsed as JSON, everything else as YAML.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or if its root is
/// not a key-value map.
pub fn load_document(path: &Path) -> Result<Document> {
    debug!("Loading document from: {}", path.display());

    let content =
        std::fs::read_to_string(path).map_err(|e| StoreError::io("read", path, e))?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    parse_document(&content, is_json)
}

/// Parses document text, requiring a map at the root.
///
/// # Errors
///
/// Returns a validation error for unparsable input or a non-map root.
pub fn parse_document(content: &str, is_json: bool) -> Result<Document> {
    let document: Document = if is_json {
        serde_json::from_str(content)
            .map_err(|e| ValidationError::field(format!("Invalid JSON document: {e}"), "data"))?
    } else {
        serde_yaml::from_str(content)
            .map_err(|e| ValidationError::field(format!("Invalid YAML document: {e}"), "data"))?
    };

    if !document.is_map() {
        return Err(ValidationError::field(
            format!(
                "Config data must be a key-value map, got {}",
                document.kind_name()
            ),
            "data",
        )
        .into());
    }

    Ok(document)
}
