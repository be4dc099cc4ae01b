use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use agentgate_core_types::{AccessLevel, AgentId, ResourceId, TaskId, UserId};

/// Kinds of events the delegation subsystem records.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    TaskCreated,
    TaskRevoked,
    TaskExpired,
    CheckAllowed,
    CheckDenied,
}

/// One decision or lifecycle record.
///
/// `task` is absent only for failures that happen before a task exists.
/// `reason` is mandatory on `CheckDenied` and enforced by the recorder.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: AuditEventKind,
    pub task: Option<TaskId>,
    pub user: Option<UserId>,
    pub agent: Option<AgentId>,
    pub resource: Option<ResourceId>,
    pub access: Option<AccessLevel>,
    pub reason: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl AuditEvent {
    pub fn new(kind: AuditEventKind, timestamp: DateTime<Utc>) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            timestamp,
            kind,
            task: None,
            user: None,
            agent: None,
            resource: None,
            access: None,
            reason: String::new(),
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_task(mut self, task: TaskId) -> Self {
        self.task = Some(task);
        self
    }

    pub fn with_user(mut self, user: UserId) -> Self {
        self.user = Some(user);
        self
    }

    pub fn with_agent(mut self, agent: AgentId) -> Self {
        self.agent = Some(agent);
        self
    }

    pub fn with_resource(mut self, resource: ResourceId) -> Self {
        self.resource = Some(resource);
        self
    }

    pub fn with_access(mut self, access: AccessLevel) -> Self {
        self.access = Some(access);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}
