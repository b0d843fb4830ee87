//! The recursive document value type.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::collections::BTreeMap;

use super::path::DocPath;

/// An arbitrary structured document.
///
/// Maps are kept in a `BTreeMap`, so key order is always sorted and
/// canonical at every nesting level.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum Document {
    /// JSON `null`.
    #[default]
    Null,
    /// Boolean scalar.
    Bool(bool),
    /// Integer or floating point scalar.
    Number(Number),
    /// String scalar.
    String(String),
    /// Ordered sequence.
    Sequence(Vec<Document>),
    /// Key-value map.
    Map(BTreeMap<String, Document>),
}

impl Document {
    /// Creates an empty map document.
    #[must_use]
    pub const fn empty_map() -> Self {
        Self::Map(BTreeMap::new())
    }

    /// Returns the name of this value's kind.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Sequence(_) => "sequence",
            Self::Map(_) => "map",
        }
    }

    /// Returns true if this is a key-value map.
    #[must_use]
    pub const fn is_map(&self) -> bool {
        matches!(self, Self::Map(_))
    }

    /// Returns the inner map, if this is one.
    #[must_use]
    pub const fn as_map(&self) -> Option<&BTreeMap<String, Self>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Looks up the value at `path`. The root path returns `self`.
    #[must_use]
    pub fn get(&self, path: &DocPath) -> Option<&Self> {
        path.segments().iter().try_fold(self, |node, segment| match node {
            Self::Map(map) => map.get(segment),
            Self::Sequence(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }
}

impl From<Value> for Document {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::Sequence(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        match doc {
            Document::Null => Self::Null,
            Document::Bool(b) => Self::Bool(b),
            Document::Number(n) => Self::Number(n),
            Document::String(s) => Self::String(s),
            Document::Sequence(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Document::Map(map) => {
                Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl std::fmt::Display for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", Value::from(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_round_trips_through_json() {
        let raw = r#"{"b":[1,2.5,null],"a":{"x":true,"y":"s"}}"#;
        let doc: Document = serde_json::from_str(raw).expect("parse");

        let map = doc.as_map().expect("map");
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["a", "b"]);

        let back = serde_json::to_value(&doc).expect("serialize");
        assert_eq!(back, json!({"a": {"x": true, "y": "s"}, "b": [1, 2.5, null]}));
    }

    #[test]
    fn test_get_walks_maps_and_sequences() {
        let doc = Document::from(json!({"servers": [{"port": 80}, {"port": 443}]}));

        let port = doc.get(&DocPath::parse("servers.1.port"));
        assert_eq!(port, Some(&Document::from(json!(443))));
        assert_eq!(doc.get(&DocPath::root()), Some(&doc));
        assert!(doc.get(&DocPath::parse("servers.9")).is_none());
        assert!(doc.get(&DocPath::parse("servers.x")).is_none());
    }

    #[test]
    fn test_display_is_compact_json() {
        let doc = Document::from(json!({"k": [1, "two"]}));
        assert_eq!(doc.to_string(), r#"{"k":[1,"two"]}"#);
        assert_eq!(doc.kind_name(), "map");
    }
}
