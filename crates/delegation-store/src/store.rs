use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;

use agentgate_core_types::TaskId;

use crate::api::DelegationStore;
use crate::errors::StoreError;
use crate::model::{GrantStatus, TaskGrant};

/// In-memory delegation registry.
///
/// Each grant sits behind its own lock, so transitions on one task never
/// serialize against checks or transitions on another.
pub struct InMemoryDelegationStore {
    grants: DashMap<TaskId, Arc<RwLock<TaskGrant>>>,
}

impl InMemoryDelegationStore {
    pub fn new() -> Self {
        Self {
            grants: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.grants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    fn ensure(&self, task: &TaskId) -> Result<Arc<RwLock<TaskGrant>>, StoreError> {
        self.grants
            .get(task)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(StoreError::NotFound)
    }

    fn transition(&self, task: &TaskId, to: GrantStatus) -> Result<(), StoreError> {
        let entry = self.ensure(task)?;
        let mut grant = entry.write();
        if grant.status.is_terminal() {
            return Err(StoreError::AlreadyTerminal);
        }
        grant.status = to;
        Ok(())
    }
}

impl Default for InMemoryDelegationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DelegationStore for InMemoryDelegationStore {
    async fn create(&self, grant: TaskGrant) -> Result<TaskId, StoreError> {
        let id = grant.id.clone();
        if self.grants.contains_key(&id) {
            return Err(StoreError::Conflict);
        }
        self.grants
            .insert(id.clone(), Arc::new(RwLock::new(grant)));
        Ok(id)
    }

    async fn get(&self, task: &TaskId) -> Result<TaskGrant, StoreError> {
        let entry = self.ensure(task)?;
        let grant = entry.read().clone();
        Ok(grant)
    }

    async fn mark_revoked(&self, task: &TaskId) -> Result<(), StoreError> {
        self.transition(task, GrantStatus::Revoked)
    }

    async fn mark_expired(&self, task: &TaskId) -> Result<(), StoreError> {
        self.transition(task, GrantStatus::Expired)
    }

    async fn list_active_expiring(&self, before: DateTime<Utc>) -> Vec<TaskId> {
        self.grants
            .iter()
            .filter(|entry| {
                let grant = entry.value().read();
                grant.status == GrantStatus::Active && grant.expires_at <= before
            })
            .map(|entry| entry.key().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResourceGrant;
    use agentgate_core_types::{AccessLevel, AgentId, UserId};
    use std::time::Duration;

    fn sample_grant(ttl: Duration) -> (TaskId, TaskGrant) {
        TaskGrant::new(
            UserId("alice".into()),
            AgentId("agent-1".into()),
            "summarize the quarterly report",
            vec![ResourceGrant::new("doc-1", AccessLevel::Reader)],
            Utc::now(),
            ttl,
        )
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let store = InMemoryDelegationStore::new();
        let (id, grant) = sample_grant(Duration::from_secs(60));

        store.create(grant).await.unwrap();
        let fetched = store.get(&id).await.unwrap();

        assert_eq!(fetched.id, id);
        assert_eq!(fetched.status, GrantStatus::Active);
        assert!(fetched.covers(&fetched.resources[0].resource, AccessLevel::Reader));
        assert!(!fetched.covers(&fetched.resources[0].resource, AccessLevel::Writer));
    }

    #[tokio::test]
    async fn duplicate_create_conflicts() {
        let store = InMemoryDelegationStore::new();
        let (_, grant) = sample_grant(Duration::from_secs(60));

        store.create(grant.clone()).await.unwrap();
        assert_eq!(store.create(grant).await, Err(StoreError::Conflict));
    }

    #[tokio::test]
    async fn transitions_are_monotonic() {
        let store = InMemoryDelegationStore::new();
        let (id, grant) = sample_grant(Duration::from_secs(60));
        store.create(grant).await.unwrap();

        store.mark_revoked(&id).await.unwrap();
        assert_eq!(
            store.mark_revoked(&id).await,
            Err(StoreError::AlreadyTerminal)
        );
        assert_eq!(
            store.mark_expired(&id).await,
            Err(StoreError::AlreadyTerminal)
        );
        assert_eq!(store.get(&id).await.unwrap().status, GrantStatus::Revoked);
    }

    #[tokio::test]
    async fn unknown_task_is_not_found() {
        let store = InMemoryDelegationStore::new();
        assert_eq!(
            store.mark_revoked(&TaskId::new()).await,
            Err(StoreError::NotFound)
        );
    }

    #[tokio::test]
    async fn lists_only_active_tasks_past_deadline() {
        let store = InMemoryDelegationStore::new();
        let (expiring, grant) = sample_grant(Duration::from_secs(0));
        store.create(grant).await.unwrap();
        let (_fresh, grant) = sample_grant(Duration::from_secs(3600));
        store.create(grant).await.unwrap();
        let (revoked, grant) = sample_grant(Duration::from_secs(0));
        store.create(grant).await.unwrap();
        store.mark_revoked(&revoked).await.unwrap();

        let due = store.list_active_expiring(Utc::now()).await;
        assert_eq!(due, vec![expiring.clone()]);

        store.mark_expired(&expiring).await.unwrap();
        assert!(store.list_active_expiring(Utc::now()).await.is_empty());
    }

    #[tokio::test]
    async fn liveness_tracks_deadline() {
        let (_, grant) = sample_grant(Duration::from_secs(1800));
        assert!(grant.is_live(grant.created_at));
        assert!(!grant.is_live(grant.created_at + chrono::Duration::minutes(31)));
    }
}
