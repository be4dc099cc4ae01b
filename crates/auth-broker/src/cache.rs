use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

use agentgate_core_types::{AccessLevel, AgentId, Decision, ResourceId, TaskId, UserId};
use delegation_store::ResourceGrant;
use scope_infer::ScopeInference;

use crate::api::Authorizer;
use crate::errors::BrokerError;
use crate::metrics;
use crate::service::{AuthzService, TaskContext};

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
struct CacheKey {
    agent: AgentId,
    task: TaskId,
    resource: ResourceId,
    access: AccessLevel,
}

#[derive(Clone)]
struct CacheEntry {
    decision: Decision,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Memoizing decorator around [`AuthzService::check`].
///
/// Hits return the original decision without a backend call or a new audit
/// event (the underlying check audited the decision when it was made).
/// Denials are cached for a strictly shorter TTL than allows so transient
/// denials recover quickly.
///
/// Staleness bound: `revoke_task` and `sweep_expired` invalidate every
/// entry for the task synchronously after the inner transition and before
/// returning, so a check that starts after either returns can never see a
/// cached `Allow` for that task. A check already in flight at revocation
/// time may still re-insert the prior decision, which then lives at most
/// `allow_cache_ttl`. Losing the whole cache only adds backend load.
pub struct CachedAuthzService {
    inner: AuthzService,
    entries: DashMap<CacheKey, CacheEntry>,
}

impl CachedAuthzService {
    pub fn new(inner: AuthzService) -> Self {
        Self {
            inner,
            entries: DashMap::new(),
        }
    }

    pub fn inner(&self) -> &AuthzService {
        &self.inner
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.inner.now()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Drops every cached decision for the task. Returns how many entries
    /// were removed.
    pub fn invalidate(&self, task: &TaskId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| key.task != *task);
        let removed = before - self.entries.len();
        if removed > 0 {
            debug!(task = %task, removed, "decision cache invalidated");
        }
        removed
    }

    pub async fn check(
        &self,
        agent: &AgentId,
        task: &TaskId,
        resource: &ResourceId,
        access: AccessLevel,
    ) -> Result<Decision, BrokerError> {
        let key = CacheKey {
            agent: agent.clone(),
            task: task.clone(),
            resource: resource.clone(),
            access,
        };

        if let Some(entry) = self.entries.get(&key) {
            if !entry.value().is_expired() {
                metrics::record_cache_hit();
                debug!(task = %task, agent = %agent, "decision cache hit");
                return Ok(entry.value().decision.clone());
            }
            drop(entry);
            self.entries.remove(&key);
        }

        metrics::record_cache_miss();
        let decision = self.inner.check(agent, task, resource, access).await?;
        let ttl = if decision.is_allow() {
            self.inner.config().allow_cache_ttl
        } else {
            self.inner.config().deny_cache_ttl
        };
        self.entries.insert(
            key,
            CacheEntry {
                decision: decision.clone(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(decision)
    }

    pub async fn create_task_delegation(
        &self,
        user: UserId,
        agent: AgentId,
        description: impl Into<String>,
        resources: Vec<ResourceGrant>,
        ttl: std::time::Duration,
    ) -> Result<TaskId, BrokerError> {
        self.inner
            .create_task_delegation(user, agent, description, resources, ttl)
            .await
    }

    pub async fn initiate_task(
        &self,
        user: UserId,
        agent: AgentId,
        request: &str,
        scope: &dyn ScopeInference,
    ) -> Result<TaskContext, BrokerError> {
        self.inner.initiate_task(user, agent, request, scope).await
    }

    pub async fn revoke_task(&self, task: &TaskId) -> Result<bool, BrokerError> {
        let result = self.inner.revoke_task(task).await;
        self.invalidate(task);
        result
    }

    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<Vec<TaskId>, BrokerError> {
        let swept = self.inner.sweep_expired(now).await?;
        for task in &swept {
            self.invalidate(task);
        }
        Ok(swept)
    }
}

#[async_trait]
impl Authorizer for CachedAuthzService {
    async fn check(
        &self,
        agent: &AgentId,
        task: &TaskId,
        resource: &ResourceId,
        access: AccessLevel,
    ) -> Result<Decision, BrokerError> {
        CachedAuthzService::check(self, agent, task, resource, access).await
    }
}
