//! Adapter seam for the relationship-graph authorization backend.
//!
//! The kernel consumes the backend as a black box answering
//! "does subject S have relation R on object O?" plus tuple writes and
//! deletes. The concrete graph service lives behind [`RelationshipBackend`];
//! [`InMemoryRelationshipBackend`] is the exact-match stand-in used for
//! tests and offline development.

mod errors;
mod memory;

pub use errors::BackendError;
pub use memory::InMemoryRelationshipBackend;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use agentgate_core_types::{AgentId, ResourceId, TaskId, UserId};

/// Relation linking the delegating user to a task.
pub const REL_DELEGATOR: &str = "delegator";
/// Relation linking the receiving agent to a task.
pub const REL_ASSIGNEE: &str = "assignee";

/// A (subject, relation, object) permission edge.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct RelTuple {
    pub subject: String,
    pub relation: String,
    pub object: String,
}

impl RelTuple {
    pub fn new(
        subject: impl Into<String>,
        relation: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            relation: relation.into(),
            object: object.into(),
        }
    }
}

pub fn user_ref(user: &UserId) -> String {
    format!("user:{}", user.0)
}

pub fn agent_ref(agent: &AgentId) -> String {
    format!("agent:{}", agent.0)
}

pub fn task_ref(task: &TaskId) -> String {
    format!("task:{}", task.0)
}

pub fn resource_ref(resource: &ResourceId) -> String {
    format!("resource:{}", resource.0)
}

/// Client contract for the relationship backend. Duplicate writes and
/// deletes of the same tuple are safe no-ops.
#[async_trait]
pub trait RelationshipBackend: Send + Sync {
    async fn check(
        &self,
        subject: &str,
        relation: &str,
        object: &str,
    ) -> Result<bool, BackendError>;

    async fn write(&self, tuples: &[RelTuple]) -> Result<(), BackendError>;

    async fn delete(&self, tuples: &[RelTuple]) -> Result<(), BackendError>;
}
