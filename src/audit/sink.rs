//! Audit sink trait and the in-process sinks.

use async_trait::async_trait;
use std::sync::Mutex;
use tracing::info;

use crate::error::{AuditError, Result};

use super::event::AuditEvent;

/// Destination for audit events.
///
/// Sinks may fail; the dispatcher in front of them swallows and logs the
/// failure so it never reaches the operation that produced the event.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Records one event.
    async fn emit(&self, event: &AuditEvent) -> Result<()>;

    /// Gets the sink name.
    fn name(&self) -> &'static str;
}

/// Writes audit events to the `tracing` log under the `audit` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn emit(&self, event: &AuditEvent) -> Result<()> {
        info!(
            target: "audit",
            action = %event.action,
            entity_type = %event.entity_type,
            entity_id = %event.entity_id,
            tenant_id = %event.tenant_id,
            performed_by = %event.performed_by,
            metadata = %event.metadata,
            "Audit event"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "tracing"
    }
}

/// Keeps audit events in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the recorded events, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the event buffer is poisoned.
    pub fn events(&self) -> Result<Vec<AuditEvent>> {
        let events = self
            .events
            .lock()
            .map_err(|_| AuditError::delivery("memory", "event buffer poisoned"))?;
        Ok(events.clone())
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn emit(&self, event: &AuditEvent) -> Result<()> {
        self.events
            .lock()
            .map_err(|_| AuditError::delivery("memory", "event buffer poisoned"))?
            .push(event.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAuditSink;

#[async_trait]
impl AuditSink for NullAuditSink {
    async fn emit(&self, _event: &AuditEvent) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::event::{AuditAction, EntityType};
    use serde_json::json;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_memory_sink_records_in_order() {
        let sink = MemoryAuditSink::new();
        for action in [AuditAction::Create, AuditAction::Deploy] {
            let event =
                AuditEvent::new(EntityType::Config, Uuid::new_v4(), "t", action, "u", json!({}));
            sink.emit(&event).await.expect("emit");
        }

        let actions: Vec<AuditAction> = sink
            .events()
            .expect("events")
            .iter()
            .map(|e| e.action)
            .collect();
        assert_eq!(actions, vec![AuditAction::Create, AuditAction::Deploy]);
    }

    #[tokio::test]
    async fn test_tracing_and_null_sinks_accept_everything() {
        let event = AuditEvent::new(
            EntityType::Config,
            Uuid::new_v4(),
            "t",
            AuditAction::Archive,
            "u",
            json!({}),
        );
        TracingAuditSink.emit(&event).await.expect("tracing");
        NullAuditSink.emit(&event).await.expect("null");
        assert_eq!(NullAuditSink.name(), "none");
    }
}
