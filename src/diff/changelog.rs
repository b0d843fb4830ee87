//! Human-readable summaries and change logs.

use super::engine::{Change, ChangeKind, DiffEngine, DiffResult};

/// Default maximum change log length, in characters.
pub const DEFAULT_CHANGE_LOG_MAX_LENGTH: usize = 200;

/// Number of changes described individually in a change log.
const DESCRIBED_CHANGES: usize = 3;

impl DiffEngine {
    /// Summarizes the non-zero counts as `"2 added, 1 modified"`.
    ///
    /// Counts appear in the fixed order added, modified, deleted. Returns
    /// `"No changes"` when all three are zero.
    #[must_use]
    pub fn generate_summary(changes: &[Change]) -> String {
        let count = |kind: ChangeKind| changes.iter().filter(|c| c.kind() == kind).count();

        let parts: Vec<String> = [
            (count(ChangeKind::Added), "added"),
            (count(ChangeKind::Modified), "modified"),
            (count(ChangeKind::Deleted), "deleted"),
        ]
        .into_iter()
        .filter(|(n, _)| *n > 0)
        .map(|(n, label)| format!("{n} {label}"))
        .collect();

        if parts.is_empty() {
            String::from("No changes")
        } else {
            parts.join(", ")
        }
    }

    /// Describes the first three changes of a diff, e.g.
    /// `"Added a; Modified b.c; Deleted d (+2 more)"`.
    ///
    /// Output longer than `max_length` characters is cut to `max_length` and
    /// suffixed with `"..."`.
    #[must_use]
    pub fn generate_change_log(&self, diff: &DiffResult, max_length: usize) -> String {
        if !diff.has_changes {
            return String::from("No changes");
        }

        let mut description = diff
            .changes
            .iter()
            .take(DESCRIBED_CHANGES)
            .map(Self::describe)
            .collect::<Vec<_>>()
            .join("; ");

        if diff.changes.len() > DESCRIBED_CHANGES {
            description.push_str(&format!(
                " (+{} more)",
                diff.changes.len() - DESCRIBED_CHANGES
            ));
        }

        if description.chars().count() > max_length {
            let mut truncated: String = description.chars().take(max_length).collect();
            truncated.push_str("...");
            truncated
        } else {
            description
        }
    }

    fn describe(change: &Change) -> String {
        let verb = match change.kind() {
            ChangeKind::Added => "Added",
            ChangeKind::Modified => "Modified",
            ChangeKind::Deleted => "Deleted",
            ChangeKind::ArrayModified => "Changed",
        };
        format!("{verb} {}", change.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocPath, Document};
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        Document::from(value)
    }

    #[test]
    fn test_summary_order_and_empty() {
        let changes = vec![
            Change::Deleted {
                path: DocPath::parse("x"),
                old_value: doc(json!(1)),
            },
            Change::Added {
                path: DocPath::parse("a"),
                new_value: doc(json!(1)),
            },
            Change::Added {
                path: DocPath::parse("b"),
                new_value: doc(json!(2)),
            },
        ];

        assert_eq!(DiffEngine::generate_summary(&changes), "2 added, 1 deleted");
        assert_eq!(DiffEngine::generate_summary(&[]), "No changes");
    }

    #[test]
    fn test_change_log_no_changes() {
        let engine = DiffEngine::new();
        let d = doc(json!({"a": 1}));
        let diff = engine.compute_diff(&d, &d);
        assert_eq!(engine.generate_change_log(&diff, DEFAULT_CHANGE_LOG_MAX_LENGTH), "No changes");
    }

    #[test]
    fn test_change_log_lists_first_three_and_more() {
        let engine = DiffEngine::new();
        let old = doc(json!({"a": 1, "b": 1, "c": 1, "d": 1, "e": 1}));
        let new = doc(json!({"a": 2, "b": 2, "c": 2, "d": 2, "e": 2}));

        let diff = engine.compute_diff(&old, &new);
        let log = engine.generate_change_log(&diff, DEFAULT_CHANGE_LOG_MAX_LENGTH);
        assert_eq!(log, "Modified a; Modified b; Modified c (+2 more)");
    }

    #[test]
    fn test_change_log_exactly_three_has_no_suffix() {
        let engine = DiffEngine::new();
        let diff = engine.compute_diff(&doc(json!({"x": 1})), &doc(json!({"y": 1, "z": [1]})));
        let log = engine.generate_change_log(&diff, DEFAULT_CHANGE_LOG_MAX_LENGTH);
        assert_eq!(log, "Deleted x; Added y; Added z");
    }

    #[test]
    fn test_change_log_array_change_renders_as_changed() {
        let engine = DiffEngine::new();
        let diff = engine.compute_diff(&doc(json!({"l": [1]})), &doc(json!({"l": [1, 2]})));
        let log = engine.generate_change_log(&diff, DEFAULT_CHANGE_LOG_MAX_LENGTH);
        assert_eq!(log, "Changed l.1");
    }

    #[test]
    fn test_change_log_truncates() {
        let engine = DiffEngine::new();
        let long_key = "k".repeat(300);
        let old = doc(json!({}));
        let new = Document::Map([(long_key, doc(json!(1)))].into_iter().collect());

        let diff = engine.compute_diff(&old, &new);
        let log = engine.generate_change_log(&diff, 50);
        assert_eq!(log.chars().count(), 53);
        assert!(log.ends_with("..."));
        assert!(log.starts_with("Added kkk"));

        let short = engine.generate_change_log(&diff, 1000);
        assert!(!short.ends_with("..."));
    }
}
