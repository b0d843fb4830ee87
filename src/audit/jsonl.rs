//! Append-only JSON Lines audit sink.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{AuditError, Result};

use super::event::AuditEvent;
use super::sink::AuditSink;

/// Default audit log file name inside the store directory.
pub const AUDIT_LOG_FILE: &str = "audit.jsonl";

/// Appends one JSON object per line to a file.
#[derive(Debug)]
pub struct JsonlAuditSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlAuditSink {
    /// Creates a sink writing to `path`. The file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Gets the log file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AuditSink for JsonlAuditSink {
    async fn emit(&self, event: &AuditEvent) -> Result<()> {
        let mut line = serde_json::to_vec(event)
            .map_err(|e| AuditError::delivery("jsonl", format!("serialize: {e}")))?;
        line.push(b'\n');

        // One writer at a time so lines never interleave.
        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| {
                        AuditError::delivery("jsonl", format!("{}: {e}", parent.display()))
                    })?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| AuditError::delivery("jsonl", format!("{}: {e}", self.path.display())))?;
        file.write_all(&line)
            .await
            .map_err(|e| AuditError::delivery("jsonl", format!("{}: {e}", self.path.display())))?;
        file.flush()
            .await
            .map_err(|e| AuditError::delivery("jsonl", format!("{}: {e}", self.path.display())))?;

        debug!("Appended audit event {} to {}", event.id, self.path.display());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "jsonl"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::event::{AuditAction, EntityType};
    use serde_json::json;
    use tempfile::TempDir;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_appends_one_line_per_event() {
        let temp = TempDir::new().expect("temp dir");
        let sink = JsonlAuditSink::new(temp.path().join("nested").join(AUDIT_LOG_FILE));

        for action in [AuditAction::VersionCreate, AuditAction::Rollback] {
            let event = AuditEvent::new(
                EntityType::Config,
                Uuid::new_v4(),
                "tenant",
                action,
                "bob",
                json!({"reason": "bad deploy"}),
            );
            sink.emit(&event).await.expect("emit");
        }

        let content = std::fs::read_to_string(sink.path()).expect("read log");
        let events: Vec<AuditEvent> = content
            .lines()
            .map(|l| serde_json::from_str(l).expect("valid line"))
            .collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].action, AuditAction::Rollback);
        assert_eq!(events[1].metadata["reason"], "bad deploy");
    }
}
