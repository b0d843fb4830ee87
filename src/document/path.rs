//! Dot-joined paths into a document.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Rendering of the empty path.
pub const ROOT_PATH: &str = "root";

/// A path from the document root: map keys and sequence indices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocPath {
    segments: Vec<String>,
}

impl DocPath {
    /// The empty path.
    #[must_use]
    pub const fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Parses a rendered path. `"root"` and `""` both mean the empty path.
    ///
    /// Rendering is lossy: keys that contain `.`, or a top-level key named
    /// `root` or `""`, cannot be addressed this way. Code that needs exact
    /// addressing keeps the `DocPath` itself.
    #[must_use]
    pub fn parse(path: &str) -> Self {
        if path.is_empty() || path == ROOT_PATH {
            return Self::root();
        }
        Self {
            segments: path.split('.').map(String::from).collect(),
        }
    }

    /// Returns the path segments.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Appends a segment.
    pub fn push(&mut self, segment: impl Into<String>) {
        self.segments.push(segment.into());
    }

    /// Removes the last segment.
    pub fn pop(&mut self) -> Option<String> {
        self.segments.pop()
    }

    /// Splits off the last segment, returning the parent path and the key.
    #[must_use]
    pub fn split_last(&self) -> Option<(Self, &str)> {
        self.segments.split_last().map(|(last, parent)| {
            (
                Self {
                    segments: parent.to_vec(),
                },
                last.as_str(),
            )
        })
    }
}

impl std::fmt::Display for DocPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.segments.is_empty() {
            write!(f, "{ROOT_PATH}")
        } else {
            write!(f, "{}", self.segments.join("."))
        }
    }
}

impl Serialize for DocPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DocPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let rendered = String::deserialize(deserializer)?;
        Ok(Self::parse(&rendered))
    }
}
