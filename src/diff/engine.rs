//! Diff engine for comparing two documents.
//!
//! Maps are compared key by key: keys only in the old document are
//! `Deleted`, keys only in the new one are `Added`, and leaves that differ
//! are `Modified`. Sequences are compared index by index over their common
//! length; elements past that length are reported as `ArrayModified`.
//! A value whose kind changes is a single `Modified` at that path.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::document::{DocPath, Document};

/// Engine for computing diffs between documents.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiffEngine;

/// Kind of a single change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Path present only in the new document.
    Added,
    /// Path present only in the old document.
    Deleted,
    /// Leaf present in both with a different value.
    Modified,
    /// Element added or removed past the common length of a sequence.
    ArrayModified,
}

/// A single difference between two documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Change {
    /// A new path was added.
    Added {
        /// Location of the change.
        path: DocPath,
        /// Added value.
        new_value: Document,
    },
    /// An existing path was removed.
    Deleted {
        /// Location of the change.
        path: DocPath,
        /// Removed value.
        old_value: Document,
    },
    /// A leaf value changed.
    Modified {
        /// Location of the change.
        path: DocPath,
        /// Previous value.
        old_value: Document,
        /// Current value.
        new_value: Document,
    },
    /// A sequence grew or shrank at this index.
    ArrayModified {
        /// Location of the change, ending in the element index.
        path: DocPath,
        /// Removed element, if the sequence shrank.
        old_value: Option<Document>,
        /// Appended element, if the sequence grew.
        new_value: Option<Document>,
    },
}

/// Complete diff result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    /// False iff there are no changes.
    pub has_changes: bool,
    /// Changes in encounter order.
    pub changes: Vec<Change>,
    /// Human-readable summary of the counts.
    pub summary: String,
    /// Number of added paths.
    pub added: usize,
    /// Number of modified paths.
    pub modified: usize,
    /// Number of deleted paths.
    pub deleted: usize,
}

impl DiffEngine {
    /// Creates a new diff engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the diff between two documents.
    #[must_use]
    pub fn compute_diff(&self, old: &Document, new: &Document) -> DiffResult {
        let mut changes = Vec::new();
        let mut path = DocPath::root();
        Self::walk(&mut path, old, new, &mut changes);

        let result = DiffResult::from_changes(changes);
        debug!(
            "Computed diff: {} added, {} modified, {} deleted, {} total",
            result.added,
            result.modified,
            result.deleted,
            result.changes.len()
        );
        result
    }

    fn walk(path: &mut DocPath, old: &Document, new: &Document, changes: &mut Vec<Change>) {
        match (old, new) {
            (Document::Map(old_map), Document::Map(new_map)) => {
                for (key, old_val) in old_map {
                    path.push(key.as_str());
                    match new_map.get(key) {
                        Some(new_val) => Self::walk(path, old_val, new_val, changes),
                        None => changes.push(Change::Deleted {
                            path: path.clone(),
                            old_value: old_val.clone(),
                        }),
                    }
                    path.pop();
                }

                for (key, new_val) in new_map {
                    if !old_map.contains_key(key) {
                        path.push(key.as_str());
                        changes.push(Change::Added {
                            path: path.clone(),
                            new_value: new_val.clone(),
                        });
                        path.pop();
                    }
                }
            }

            (Document::Sequence(old_items), Document::Sequence(new_items)) => {
                let common = old_items.len().min(new_items.len());

                for (index, (old_item, new_item)) in
                    old_items.iter().zip(new_items.iter()).enumerate()
                {
                    path.push(index.to_string());
                    Self::walk(path, old_item, new_item, changes);
                    path.pop();
                }

                for (index, old_item) in old_items.iter().enumerate().skip(common) {
                    path.push(index.to_string());
                    changes.push(Change::ArrayModified {
                        path: path.clone(),
                        old_value: Some(old_item.clone()),
                        new_value: None,
                    });
                    path.pop();
                }

                for (index, new_item) in new_items.iter().enumerate().skip(common) {
                    path.push(index.to_string());
                    changes.push(Change::ArrayModified {
                        path: path.clone(),
                        old_value: None,
                        new_value: Some(new_item.clone()),
                    });
                    path.pop();
                }
            }

            _ if old == new => {}

            _ => changes.push(Change::Modified {
                path: path.clone(),
                old_value: old.clone(),
                new_value: new.clone(),
            }),
        }
    }
}

impl Change {
    /// Returns the kind of this change.
    #[must_use]
    pub const fn kind(&self) -> ChangeKind {
        match self {
            Self::Added { .. } => ChangeKind::Added,
            Self::Deleted { .. } => ChangeKind::Deleted,
            Self::Modified { .. } => ChangeKind::Modified,
            Self::ArrayModified { .. } => ChangeKind::ArrayModified,
        }
    }

    /// Returns the location of this change. Its `Display` is the dot-joined
    /// rendering.
    #[must_use]
    pub const fn path(&self) -> &DocPath {
        match self {
            Self::Added { path, .. }
            | Self::Deleted { path, .. }
            | Self::Modified { path, .. }
            | Self::ArrayModified { path, .. } => path,
        }
    }

    /// Returns the value before the change, if any.
    #[must_use]
    pub const fn old_value(&self) -> Option<&Document> {
        match self {
            Self::Added { .. } => None,
            Self::Deleted { old_value, .. } | Self::Modified { old_value, .. } => Some(old_value),
            Self::ArrayModified { old_value, .. } => old_value.as_ref(),
        }
    }

    /// Returns the value after the change, if any.
    #[must_use]
    pub const fn new_value(&self) -> Option<&Document> {
        match self {
            Self::Deleted { .. } => None,
            Self::Added { new_value, .. } | Self::Modified { new_value, .. } => Some(new_value),
            Self::ArrayModified { new_value, .. } => new_value.as_ref(),
        }
    }
}

impl DiffResult {
    /// Builds a result from a change list, computing counts and summary.
    #[must_use]
    pub fn from_changes(changes: Vec<Change>) -> Self {
        let count = |kind: ChangeKind| changes.iter().filter(|c| c.kind() == kind).count();
        let added = count(ChangeKind::Added);
        let modified = count(ChangeKind::Modified);
        let deleted = count(ChangeKind::Deleted);

        Self {
            has_changes: !changes.is_empty(),
            summary: DiffEngine::generate_summary(&changes),
            changes,
            added,
            modified,
            deleted,
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Added => "added",
            Self::Deleted => "deleted",
            Self::Modified => "modified",
            Self::ArrayModified => "array_modified",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        Document::from(value)
    }

    #[test]
    fn test_identical_documents_no_changes() {
        let engine = DiffEngine::new();
        let samples = [
            json!(null),
            json!(42),
            json!("text"),
            json!([1, [2, {"a": null}]]),
            json!({"a": {"b": [1, 2, {"c": true}]}, "d": 1.5}),
        ];

        for sample in samples {
            let d = doc(sample);
            let diff = engine.compute_diff(&d, &d);
            assert!(!diff.has_changes);
            assert!(diff.changes.is_empty());
            assert_eq!(diff.summary, "No changes");
        }
    }

    #[test]
    fn test_classifies_added_deleted_modified() {
        let engine = DiffEngine::new();
        let old = doc(json!({"keep": 1, "modify": "old", "remove": true}));
        let new = doc(json!({"keep": 1, "modify": "new", "added": [1]}));

        let diff = engine.compute_diff(&old, &new);
        assert!(diff.has_changes);
        assert_eq!(diff.added, 1);
        assert_eq!(diff.modified, 1);
        assert_eq!(diff.deleted, 1);
        assert_eq!(diff.summary, "1 added, 1 modified, 1 deleted");

        assert_eq!(
            diff.changes[0],
            Change::Modified {
                path: DocPath::parse("modify"),
                old_value: doc(json!("old")),
                new_value: doc(json!("new")),
            }
        );
        assert_eq!(diff.changes[1].kind(), ChangeKind::Deleted);
        assert_eq!(diff.changes[1].path().to_string(), "remove");
        assert_eq!(diff.changes[2].kind(), ChangeKind::Added);
        assert_eq!(diff.changes[2].path().to_string(), "added");
    }

    #[test]
    fn test_nested_paths_are_dot_joined() {
        let engine = DiffEngine::new();
        let old = doc(json!({"db": {"pool": {"size": 5}}}));
        let new = doc(json!({"db": {"pool": {"size": 10}}}));

        let diff = engine.compute_diff(&old, &new);
        assert_eq!(diff.changes.len(), 1);
        assert_eq!(diff.changes[0].path().to_string(), "db.pool.size");
    }

    #[test]
    fn test_top_level_scalar_change_is_root() {
        let engine = DiffEngine::new();
        let diff = engine.compute_diff(&doc(json!(1)), &doc(json!("one")));

        assert_eq!(diff.changes.len(), 1);
        assert_eq!(diff.changes[0].path().to_string(), "root");
        assert_eq!(diff.changes[0].kind(), ChangeKind::Modified);
    }

    #[test]
    fn test_kind_change_is_single_modification() {
        let engine = DiffEngine::new();
        let old = doc(json!({"value": {"nested": 1}}));
        let new = doc(json!({"value": [1]}));

        let diff = engine.compute_diff(&old, &new);
        assert_eq!(diff.changes.len(), 1);
        assert_eq!(diff.modified, 1);
        assert_eq!(diff.changes[0].old_value(), Some(&doc(json!({"nested": 1}))));
    }

    #[test]
    fn test_sequence_changes() {
        let engine = DiffEngine::new();
        let old = doc(json!({"hosts": ["a", "b", "c"]}));
        let new = doc(json!({"hosts": ["a", "x"]}));

        let diff = engine.compute_diff(&old, &new);
        assert_eq!(diff.changes.len(), 2);
        assert_eq!(diff.changes[0].path().to_string(), "hosts.1");
        assert_eq!(diff.changes[0].kind(), ChangeKind::Modified);
        assert_eq!(
            diff.changes[1],
            Change::ArrayModified {
                path: DocPath::parse("hosts.2"),
                old_value: Some(doc(json!("c"))),
                new_value: None,
            }
        );
        // Sequence growth or shrinkage is not counted in the summary.
        assert_eq!(diff.summary, "1 modified");
    }

    #[test]
    fn test_null_to_value_is_modification() {
        let engine = DiffEngine::new();
        let diff = engine.compute_diff(&doc(json!({"n": null})), &doc(json!({"n": "set"})));
        assert_eq!(diff.modified, 1);
        assert_eq!(diff.changes[0].old_value(), Some(&Document::Null));
    }

    #[test]
    fn test_change_serializes_with_type_tag() {
        let change = Change::Added {
            path: DocPath::parse("a"),
            new_value: doc(json!(1)),
        };
        let value = serde_json::to_value(&change).expect("serialize");
        assert_eq!(value, json!({"type": "added", "path": "a", "new_value": 1}));
    }
}
