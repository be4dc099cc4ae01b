use thiserror::Error;

#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum StoreError {
    #[error("task not found")]
    NotFound,
    #[error("task already in a terminal state")]
    AlreadyTerminal,
    #[error("task id already registered")]
    Conflict,
}
