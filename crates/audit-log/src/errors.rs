use thiserror::Error;

/// Errors surfaced by audit sinks.
#[derive(Clone, Debug, Error)]
pub enum AuditError {
    #[error("denial event is missing a reason")]
    MissingReason,
    #[error("audit sink rejected event: {0}")]
    Sink(String),
}
