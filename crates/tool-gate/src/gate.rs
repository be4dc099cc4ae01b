use std::sync::Arc;

use tracing::{debug, warn};

use agentgate_core_types::{AgentId, Decision, DenialKind, TaskId};
use auth_broker::{Authorizer, BrokerError};

use crate::errors::GateError;
use crate::types::{DeniedCheck, Tool};

/// Wraps tool invocations with an authorization check.
///
/// Callers compose the gate and their tools explicitly: the gate holds the
/// check function, the tool carries its own extraction rule, and
/// [`ToolGate::invoke`] glues the two for each call.
pub struct ToolGate {
    authorizer: Arc<dyn Authorizer>,
}

impl ToolGate {
    pub fn new(authorizer: Arc<dyn Authorizer>) -> Self {
        Self { authorizer }
    }

    /// Checks and, only on `Allow`, runs the tool with the original
    /// arguments, returning its output unchanged.
    pub async fn invoke<T: Tool>(
        &self,
        tool: &T,
        agent: &AgentId,
        task: &TaskId,
        args: T::Args,
    ) -> Result<T::Output, GateError> {
        let resource = tool.resource_for(&args);
        let access = tool.required_access();

        let decision = self
            .authorizer
            .check(agent, task, &resource, access)
            .await
            .map_err(|err| match err {
                BrokerError::BackendUnavailable(message) => GateError::Unavailable(message),
                other => GateError::Internal(other.to_string()),
            })?;

        match decision {
            Decision::Allow => {
                debug!(tool = tool.name(), agent = %agent, resource = %resource, "tool invocation authorized");
                tool.run(args).await.map_err(|err| GateError::Tool {
                    tool: tool.name().to_string(),
                    message: err.0,
                })
            }
            Decision::Deny(denial) => {
                if denial.kind == DenialKind::BackendError {
                    warn!(tool = tool.name(), agent = %agent, "authorization backend unavailable");
                    return Err(GateError::Unavailable(denial.reason));
                }
                warn!(
                    tool = tool.name(),
                    agent = %agent,
                    resource = %resource,
                    reason = %denial.reason,
                    "tool invocation denied"
                );
                Err(GateError::Unauthorized(DeniedCheck {
                    tool: tool.name().to_string(),
                    agent: agent.clone(),
                    task: task.clone(),
                    resource,
                    access,
                    reason: denial.reason,
                }))
            }
        }
    }
}
