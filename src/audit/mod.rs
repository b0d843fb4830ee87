//! Audit event emission.
//!
//! Core operations describe what they did as an [`AuditEvent`] and hand it to
//! an [`AuditDispatcher`], which forwards it to a pluggable [`AuditSink`].
//! Audit records are write-only from the engine's point of view.

mod dispatcher;
mod event;
mod jsonl;
mod sink;
mod webhook;

pub use dispatcher::{AuditDispatcher, DEFAULT_QUEUE_CAPACITY};
pub use event::{AuditAction, AuditContext, AuditEvent, EntityType};
pub use jsonl::{AUDIT_LOG_FILE, JsonlAuditSink};
pub use sink::{AuditSink, MemoryAuditSink, NullAuditSink, TracingAuditSink};
pub use webhook::{DEFAULT_TIMEOUT_SECS, WebhookAuditSink};
