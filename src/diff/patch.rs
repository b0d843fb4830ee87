//! Re-applying a change set to a document.

use std::collections::BTreeMap;

use crate::document::{DocPath, Document};

use super::engine::{Change, DiffEngine};

impl DiffEngine {
    /// Applies `changes` to a copy of `original` and returns the result.
    ///
    /// `original` is never mutated. `Added` and `Modified` set the value at
    /// the change path, creating intermediate maps as needed; `Deleted`
    /// removes it. `ArrayModified` appends the new element or truncates the
    /// sequence at the removed index.
    #[must_use]
    pub fn apply_patch(&self, original: &Document, changes: &[Change]) -> Document {
        let mut result = original.clone();

        for change in changes {
            let path = change.path();
            match change {
                Change::Added { new_value, .. } | Change::Modified { new_value, .. } => {
                    Self::set_at(&mut result, path.segments(), new_value.clone());
                }
                Change::Deleted { .. } => Self::remove_at(&mut result, path),
                Change::ArrayModified {
                    new_value: Some(value),
                    ..
                } => Self::set_at(&mut result, path.segments(), value.clone()),
                Change::ArrayModified { new_value: None, .. } => {
                    Self::truncate_at(&mut result, path);
                }
            }
        }

        result
    }

    fn set_at(node: &mut Document, segments: &[String], value: Document) {
        let Some((head, rest)) = segments.split_first() else {
            *node = value;
            return;
        };

        match node {
            Document::Sequence(items) => {
                if let Ok(index) = head.parse::<usize>() {
                    if index >= items.len() {
                        items.resize(index + 1, Document::Null);
                    }
                    Self::set_at(&mut items[index], rest, value);
                    return;
                }
            }
            Document::Map(map) => {
                let child = map.entry(head.clone()).or_default();
                Self::set_at(child, rest, value);
                return;
            }
            _ => {}
        }

        // Scalars (and sequences addressed by a non-index key) are replaced
        // by a map holding the new branch.
        let mut child = Document::Null;
        Self::set_at(&mut child, rest, value);
        let mut map = BTreeMap::new();
        map.insert(head.clone(), child);
        *node = Document::Map(map);
    }

    fn remove_at(root: &mut Document, path: &DocPath) {
        let Some((parent, key)) = path.split_last() else {
            *root = Document::Null;
            return;
        };

        match Self::node_mut(root, parent.segments()) {
            Some(Document::Map(map)) => {
                map.remove(key);
            }
            Some(Document::Sequence(items)) => {
                if let Ok(index) = key.parse::<usize>() {
                    if index < items.len() {
                        items.remove(index);
                    }
                }
            }
            _ => {}
        }
    }

    fn truncate_at(root: &mut Document, path: &DocPath) {
        let Some((parent, key)) = path.split_last() else {
            return;
        };

        if let (Some(Document::Sequence(items)), Ok(index)) =
            (Self::node_mut(root, parent.segments()), key.parse::<usize>())
        {
            items.truncate(index);
        }
    }

    fn node_mut<'a>(root: &'a mut Document, segments: &[String]) -> Option<&'a mut Document> {
        segments.iter().try_fold(root, |node, segment| match node {
            Document::Map(map) => map.get_mut(segment),
            Document::Sequence(items) => match segment.parse::<usize>() {
                Ok(index) => items.get_mut(index),
                Err(_) => None,
            },
            _ => None,
        })
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
    fn test_patch_reproduces_target_for_scalar_changes() {
        let engine = DiffEngine::new();
        let pairs = [
            (json!({"a": 1, "b": "x"}), json!({"a": 2, "c": true})),
            (
                json!({"db": {"host": "h", "port": 5432}, "debug": false}),
                json!({"db": {"host": "h2", "user": "app"}, "debug": false}),
            ),
            (json!({}), json!({"fresh": {"nested": null}})),
            (json!({"gone": {"deep": 1}}), json!({})),
            (json!({"kind": {"was": "map"}}), json!({"kind": "now scalar"})),
        ];

        for (a, b) in pairs {
            let (a, b) = (doc(a), doc(b));
            let diff = engine.compute_diff(&a, &b);
            assert_eq!(engine.apply_patch(&a, &diff.changes), b);
        }
    }

    #[test]
    fn test_patch_does_not_mutate_original() {
        let engine = DiffEngine::new();
        let original = doc(json!({"a": 1}));
        let target = doc(json!({"a": 2, "b": 3}));
        let snapshot = original.clone();

        let diff = engine.compute_diff(&original, &target);
        let patched = engine.apply_patch(&original, &diff.changes);

        assert_eq!(original, snapshot);
        assert_eq!(patched, target);
    }

    #[test]
    fn test_patch_handles_sequence_growth_and_shrinkage() {
        let engine = DiffEngine::new();
        let a = doc(json!({"items": [1, 2, 3, 4], "tags": ["x"]}));
        let b = doc(json!({"items": [1, 9], "tags": ["x", "y", "z"]}));

        let diff = engine.compute_diff(&a, &b);
        assert_eq!(engine.apply_patch(&a, &diff.changes), b);
    }

    #[test]
    fn test_patch_root_modification_replaces_document() {
        let engine = DiffEngine::new();
        let diff = engine.compute_diff(&doc(json!(1)), &doc(json!({"k": "v"})));
        assert_eq!(engine.apply_patch(&doc(json!(1)), &diff.changes), doc(json!({"k": "v"})));
    }

    #[test]
    fn test_patch_addresses_keys_named_like_the_root() {
        let engine = DiffEngine::new();
        let pairs = [
            (json!({"root": 1, "other": "x"}), json!({"root": 2, "other": "x"})),
            (json!({"root": 1, "other": "x"}), json!({"other": "x"})),
            (json!({"other": "x"}), json!({"root": {"nested": true}, "other": "x"})),
            (json!({"": 1, "k": 0}), json!({"": 2, "k": 0})),
            (json!({"": {"root": 1}}), json!({"": {}})),
        ];

        for (a, b) in pairs {
            let (a, b) = (doc(a), doc(b));
            let diff = engine.compute_diff(&a, &b);
            assert!(diff.has_changes);
            assert_eq!(engine.apply_patch(&a, &diff.changes), b);
        }
    }

    #[test]
    fn test_set_creates_intermediate_maps() {
        let engine = DiffEngine::new();
        let changes = vec![Change::Added {
            path: DocPath::parse("a.b.c"),
            new_value: doc(json!(1)),
        }];
        assert_eq!(
            engine.apply_patch(&doc(json!({"a": 5})), &changes),
            doc(json!({"a": {"b": {"c": 1}}}))
        );
    }

    #[test]
    fn test_delete_missing_path_is_noop() {
        let engine = DiffEngine::new();
        let changes = vec![Change::Deleted {
            path: DocPath::parse("missing.key"),
            old_value: doc(json!(1)),
        }];
        let original = doc(json!({"keep": true}));
        assert_eq!(engine.apply_patch(&original, &changes), original);
    }
}
