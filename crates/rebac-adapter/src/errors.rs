use thiserror::Error;

/// Errors surfaced by the relationship backend client.
#[derive(Clone, Debug, Error)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("backend request timed out")]
    Timeout,
    #[error("backend rejected request: {0}")]
    Rejected(String),
}

impl BackendError {
    /// Whether a bounded retry of the same request is worthwhile.
    pub fn is_retriable(&self) -> bool {
        matches!(self, BackendError::Unavailable(_) | BackendError::Timeout)
    }
}
