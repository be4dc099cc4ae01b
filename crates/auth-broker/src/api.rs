use async_trait::async_trait;

use agentgate_core_types::{AccessLevel, AgentId, Decision, ResourceId, TaskId};

use crate::errors::BrokerError;

/// The check operation every tool call goes through. Implemented by the
/// plain service and by its caching decorator so callers compose either.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn check(
        &self,
        agent: &AgentId,
        task: &TaskId,
        resource: &ResourceId,
        access: AccessLevel,
    ) -> Result<Decision, BrokerError>;
}
