use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use agentgate_core_types::{AccessLevel, AgentId, ResourceId, TaskId};

use crate::errors::ToolError;

/// A tool callable through the gate.
///
/// `resource_for` is the caller-supplied extraction rule: a pure function
/// of the call arguments that needs no authorization of its own.
#[async_trait]
pub trait Tool: Send + Sync {
    type Args: Send + Sync;
    type Output: Send;

    fn name(&self) -> &str;

    fn required_access(&self) -> AccessLevel;

    fn resource_for(&self, args: &Self::Args) -> ResourceId;

    async fn run(&self, args: Self::Args) -> Result<Self::Output, ToolError>;
}

/// Context of a denied invocation, handed to the caller for logging and
/// reporting. Mirrors the audit event the check already recorded.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeniedCheck {
    pub tool: String,
    pub agent: AgentId,
    pub task: TaskId,
    pub resource: ResourceId,
    pub access: AccessLevel,
    pub reason: String,
}

impl std::fmt::Display for DeniedCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (tool={} agent={} resource={} access={})",
            self.reason, self.tool, self.agent, self.resource, self.access
        )
    }
}
