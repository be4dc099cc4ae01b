use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::broadcast;

use agentgate_core_types::TaskId;

use crate::errors::AuditError;
use crate::model::{AuditEvent, AuditEventKind};

/// Append-only sink for decision and lifecycle events.
#[async_trait]
pub trait AuditRecorder: Send + Sync {
    async fn record(&self, event: AuditEvent) -> Result<(), AuditError>;
}

/// In-memory audit log with broadcast fan-out for downstream consumers.
pub struct InMemoryAuditLog {
    events: RwLock<Vec<AuditEvent>>,
    sender: broadcast::Sender<AuditEvent>,
}

impl InMemoryAuditLog {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            events: RwLock::new(Vec::new()),
            sender,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuditEvent> {
        self.sender.subscribe()
    }

    /// Snapshot of all recorded events, oldest first.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.read().clone()
    }

    pub fn events_for_task(&self, task: &TaskId) -> Vec<AuditEvent> {
        self.events
            .read()
            .iter()
            .filter(|event| event.task.as_ref() == Some(task))
            .cloned()
            .collect()
    }

    pub fn count_kind(&self, kind: AuditEventKind) -> usize {
        self.events
            .read()
            .iter()
            .filter(|event| event.kind == kind)
            .count()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

impl Default for InMemoryAuditLog {
    fn default() -> Self {
        Self::new(128)
    }
}

#[async_trait]
impl AuditRecorder for InMemoryAuditLog {
    async fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        if event.kind == AuditEventKind::CheckDenied && event.reason.is_empty() {
            return Err(AuditError::MissingReason);
        }
        self.events.write().push(event.clone());
        let _ = self.sender.send(event);
        Ok(())
    }
}
