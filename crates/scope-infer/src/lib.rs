//! Scope inference: deriving a minimal resource/access list from a natural
//! language task description.
//!
//! The LLM-backed adapter is an external collaborator; this crate holds the
//! seam it plugs into plus the payload handling every adapter shares. Only
//! the task-creation flow consumes inference — never the check path.

mod payload;

pub use payload::{filter_available, parse_scope_payload};

use async_trait::async_trait;
use thiserror::Error;

use delegation_store::ResourceGrant;

/// Errors surfaced by scope inference. Any of these aborts task creation
/// before a task or tuple exists.
#[derive(Clone, Debug, Error)]
pub enum ScopeError {
    #[error("scope inference failed: {0}")]
    Inference(String),
    #[error("malformed scope payload: {0}")]
    Malformed(String),
}

/// Maps a free-text request to candidate resource grants.
#[async_trait]
pub trait ScopeInference: Send + Sync {
    async fn infer(&self, description: &str) -> Result<Vec<ResourceGrant>, ScopeError>;
}

/// Deterministic provider used for tests and offline development.
#[derive(Clone, Debug, Default)]
pub struct FixedScopeInference {
    grants: Vec<ResourceGrant>,
}

impl FixedScopeInference {
    pub fn new(grants: Vec<ResourceGrant>) -> Self {
        Self { grants }
    }
}

#[async_trait]
impl ScopeInference for FixedScopeInference {
    async fn infer(&self, _description: &str) -> Result<Vec<ResourceGrant>, ScopeError> {
        Ok(self.grants.clone())
    }
}
