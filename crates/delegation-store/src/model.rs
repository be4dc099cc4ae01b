use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use agentgate_core_types::{AccessLevel, AgentId, ResourceId, TaskId, UserId};

/// Lifecycle state of a grant. Transitions are monotonic: `Active` moves to
/// exactly one of the terminal states and never back.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantStatus {
    Active,
    Revoked,
    Expired,
}

impl GrantStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, GrantStatus::Revoked | GrantStatus::Expired)
    }
}

/// One resource/access pair inside a grant's scope.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ResourceGrant {
    pub resource: ResourceId,
    pub access: AccessLevel,
}

impl ResourceGrant {
    pub fn new(resource: impl Into<String>, access: AccessLevel) -> Self {
        Self {
            resource: ResourceId(resource.into()),
            access,
        }
    }
}

/// A task-scoped delegation from a user to an agent.
///
/// `resources` is the maximal scope the task may ever exercise; it is fixed
/// at creation. A grant is usable only while `status` is `Active` and the
/// wall clock has not reached `expires_at`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskGrant {
    pub id: TaskId,
    pub user: UserId,
    pub agent: AgentId,
    pub description: String,
    pub resources: Vec<ResourceGrant>,
    pub status: GrantStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl TaskGrant {
    pub fn new(
        user: UserId,
        agent: AgentId,
        description: impl Into<String>,
        resources: Vec<ResourceGrant>,
        created_at: DateTime<Utc>,
        ttl: std::time::Duration,
    ) -> (TaskId, Self) {
        let id = TaskId::new();
        let expires_at = Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| created_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let grant = Self {
            id: id.clone(),
            user,
            agent,
            description: description.into(),
            resources,
            status: GrantStatus::Active,
            created_at,
            expires_at,
        };
        (id, grant)
    }

    /// Logically active: not terminal and not past its deadline, even if the
    /// stored status has not been swept yet.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.status == GrantStatus::Active && now < self.expires_at
    }

    /// Exact membership of the pair in the grant's scope.
    pub fn covers(&self, resource: &ResourceId, access: AccessLevel) -> bool {
        self.resources
            .iter()
            .any(|grant| grant.resource == *resource && grant.access == access)
    }
}
