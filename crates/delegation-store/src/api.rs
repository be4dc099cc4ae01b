use async_trait::async_trait;
use chrono::{DateTime, Utc};

use agentgate_core_types::TaskId;

use crate::errors::StoreError;
use crate::model::TaskGrant;

/// Registry of live task grants.
///
/// Mutations on a single task are linearizable: two concurrent transitions
/// on the same task cannot both win. Reads return owned snapshots so no
/// caller holds store locks across await points.
#[async_trait]
pub trait DelegationStore: Send + Sync {
    async fn create(&self, grant: TaskGrant) -> Result<TaskId, StoreError>;

    async fn get(&self, task: &TaskId) -> Result<TaskGrant, StoreError>;

    async fn mark_revoked(&self, task: &TaskId) -> Result<(), StoreError>;

    async fn mark_expired(&self, task: &TaskId) -> Result<(), StoreError>;

    /// Active tasks whose deadline is at or before `before`.
    async fn list_active_expiring(&self, before: DateTime<Utc>) -> Vec<TaskId>;
}
