use thiserror::Error;

use crate::types::DeniedCheck;

/// Failure reported by a wrapped tool.
#[derive(Clone, Debug, Error)]
#[error("{0}")]
pub struct ToolError(pub String);

impl From<&str> for ToolError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

impl From<String> for ToolError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

/// Errors raised at the gateway boundary.
///
/// `Unauthorized` is a normal negative outcome ("you may not do this");
/// `Unavailable` means the authorization system itself could not answer.
#[derive(Clone, Debug, Error)]
pub enum GateError {
    #[error("not authorized: {0}")]
    Unauthorized(DeniedCheck),
    #[error("authorization unavailable: {0}")]
    Unavailable(String),
    #[error("tool '{tool}' failed: {message}")]
    Tool { tool: String, message: String },
    #[error("internal gate error: {0}")]
    Internal(String),
}

impl GateError {
    /// The denial context, when this error is a denial.
    pub fn denied(&self) -> Option<&DeniedCheck> {
        match self {
            GateError::Unauthorized(denied) => Some(denied),
            _ => None,
        }
    }
}
