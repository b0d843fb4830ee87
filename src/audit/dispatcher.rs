//! Fire-and-forget audit dispatch.
//!
//! [`AuditDispatcher::emit`] never returns an error. In inline mode the sink
//! is awaited and any failure is logged; in queued mode events go through a
//! bounded channel drained by a background task, and a full or closed queue
//! drops the event with a warning.

use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::event::{AuditContext, AuditEvent};
use super::sink::AuditSink;

/// Default capacity of the dispatch queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Delivers audit events to a sink without affecting the caller.
#[derive(Debug)]
pub struct AuditDispatcher {
    mode: Mode,
    origin: AuditContext,
}

enum Mode {
    Inline(Arc<dyn AuditSink>),
    Queued {
        sink_name: &'static str,
        sender: Mutex<Option<mpsc::Sender<AuditEvent>>>,
        worker: Mutex<Option<JoinHandle<()>>>,
    },
}

impl std::fmt::Debug for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inline(sink) => f.debug_tuple("Inline").field(&sink.name()).finish(),
            Self::Queued { sink_name, .. } => f.debug_tuple("Queued").field(sink_name).finish(),
        }
    }
}

impl AuditDispatcher {
    /// Creates a dispatcher that awaits the sink on every emit.
    #[must_use]
    pub fn inline(sink: Arc<dyn AuditSink>) -> Self {
        Self {
            mode: Mode::Inline(sink),
            origin: AuditContext::local(),
        }
    }

    /// Creates a dispatcher backed by a bounded queue and a drain task.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn queued(sink: Arc<dyn AuditSink>, capacity: usize) -> Self {
        let (sender, mut receiver) = mpsc::channel::<AuditEvent>(capacity.max(1));
        let sink_name = sink.name();

        let worker = tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                deliver(sink.as_ref(), &event).await;
            }
            debug!("Audit queue for sink '{}' drained", sink.name());
        });

        Self {
            mode: Mode::Queued {
                sink_name,
                sender: Mutex::new(Some(sender)),
                worker: Mutex::new(Some(worker)),
            },
            origin: AuditContext::local(),
        }
    }

    /// Sends an event to the sink. Failures are logged, never returned.
    pub async fn emit(&self, mut event: AuditEvent) {
        if event.context.host.is_none() {
            event.context.host.clone_from(&self.origin.host);
        }

        match &self.mode {
            Mode::Inline(sink) => deliver(sink.as_ref(), &event).await,
            Mode::Queued { sink_name, sender, .. } => {
                let sender = sender.lock().ok().and_then(|s| s.clone());
                let Some(sender) = sender else {
                    warn!(
                        "Audit queue for sink '{sink_name}' is closed; dropping {} event {}",
                        event.action, event.id
                    );
                    return;
                };
                if let Err(e) = sender.try_send(event) {
                    let dropped = match &e {
                        mpsc::error::TrySendError::Full(ev)
                        | mpsc::error::TrySendError::Closed(ev) => ev,
                    };
                    warn!(
                        "Failed to queue {} audit event {} for sink '{sink_name}': {e}",
                        dropped.action, dropped.id
                    );
                }
            }
        }
    }

    /// Closes the queue and waits for queued events to be delivered.
    ///
    /// A no-op for inline dispatchers and on repeated calls.
    pub async fn shutdown(&self) {
        let Mode::Queued { sender, worker, .. } = &self.mode else {
            return;
        };

        if let Ok(mut sender) = sender.lock() {
            sender.take();
        }
        let handle = worker.lock().ok().and_then(|mut w| w.take());
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Audit drain task failed: {e}");
            }
        }
    }
}

async fn deliver(sink: &dyn AuditSink, event: &AuditEvent) {
    if let Err(e) = sink.emit(event).await {
        warn!(
            "Failed to record {} audit event {} via '{}': {e}",
            event.action,
            event.id,
            sink.name()
        );
    }
}
