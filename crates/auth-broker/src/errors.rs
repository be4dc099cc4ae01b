use thiserror::Error;

/// Errors surfaced by the authorization broker.
///
/// A negative check outcome is not an error; it comes back as
/// `Decision::Deny` so the cache and gateway can carry the audit reason.
#[derive(Clone, Debug, Error)]
pub enum BrokerError {
    #[error("invalid delegation request: {0}")]
    Validation(String),
    #[error("task not found")]
    NotFound,
    #[error("relationship backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("scope inference failed: {0}")]
    ScopeInference(String),
    #[error("audit sink failure: {0}")]
    Audit(String),
    #[error("internal error: {0}")]
    Internal(String),
}
