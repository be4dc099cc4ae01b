use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, info, warn};

use agentgate_audit_log::{AuditError, AuditEvent, AuditEventKind, AuditRecorder};
use agentgate_core_types::{
    AccessLevel, AgentId, Clock, Decision, DenialKind, ResourceId, TaskId, UserId,
};
use delegation_store::{DelegationStore, GrantStatus, ResourceGrant, StoreError, TaskGrant};
use rebac_adapter::{
    agent_ref, resource_ref, task_ref, user_ref, RelTuple, RelationshipBackend, REL_ASSIGNEE,
    REL_DELEGATOR,
};
use scope_infer::ScopeInference;

use crate::api::Authorizer;
use crate::config::BrokerConfig;
use crate::errors::BrokerError;
use crate::metrics;

/// Handed back to the caller once a delegation is in place, so the agent
/// run can carry its task id and granted scope.
#[derive(Clone, Debug)]
pub struct TaskContext {
    pub task: TaskId,
    pub agent: AgentId,
    pub resources: Vec<ResourceGrant>,
}

/// Orchestrates delegation creation, revocation, expiry and the check path.
///
/// Every collaborator arrives at construction; there are no process-wide
/// defaults. Backend and audit calls are the only await points and no store
/// lock is held across them.
pub struct AuthzService {
    store: Arc<dyn DelegationStore>,
    backend: Arc<dyn RelationshipBackend>,
    audit: Arc<dyn AuditRecorder>,
    clock: Arc<dyn Clock>,
    config: BrokerConfig,
}

impl AuthzService {
    pub fn new(
        store: Arc<dyn DelegationStore>,
        backend: Arc<dyn RelationshipBackend>,
        audit: Arc<dyn AuditRecorder>,
        clock: Arc<dyn Clock>,
        config: BrokerConfig,
    ) -> Self {
        Self {
            store,
            backend,
            audit,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Creates a task-scoped delegation and commits its backend tuples.
    ///
    /// All-or-nothing: the grant is stored as Active only after the tuple
    /// write committed; on backend failure nothing is persisted.
    pub async fn create_task_delegation(
        &self,
        user: UserId,
        agent: AgentId,
        description: impl Into<String>,
        resources: Vec<ResourceGrant>,
        ttl: Duration,
    ) -> Result<TaskId, BrokerError> {
        let description = description.into();
        if user.0.trim().is_empty() {
            return Err(BrokerError::Validation("user id must not be empty".into()));
        }
        if agent.0.trim().is_empty() {
            return Err(BrokerError::Validation("agent id must not be empty".into()));
        }
        if resources.is_empty() {
            return Err(BrokerError::Validation(
                "allowed resources must not be empty".into(),
            ));
        }
        if resources
            .iter()
            .any(|grant| grant.resource.0.trim().is_empty())
        {
            return Err(BrokerError::Validation(
                "resource id must not be empty".into(),
            ));
        }

        let now = self.clock.now();
        let (task, grant) = TaskGrant::new(
            user.clone(),
            agent.clone(),
            description.clone(),
            resources,
            now,
            ttl,
        );
        let tuples = grant_tuples(&grant);
        self.write_tuples(&tuples).await?;

        if let Err(err) = self.store.create(grant.clone()).await {
            // Undo the committed tuples so no grant edges outlive the task.
            if let Err(delete_err) = self.backend.delete(&tuples).await {
                warn!(task = %task, "tuple rollback failed: {delete_err}");
            }
            return Err(BrokerError::Internal(format!(
                "store rejected new grant: {err}"
            )));
        }

        metrics::record_grant_created();
        info!(
            task = %task,
            agent = %agent,
            resources = grant.resources.len(),
            "task delegation created"
        );
        self.record(
            AuditEvent::new(AuditEventKind::TaskCreated, now)
                .with_task(task.clone())
                .with_user(user)
                .with_agent(agent)
                .with_reason("task delegation created")
                .with_metadata(json!({
                    "description": description,
                    "ttl_secs": ttl.as_secs(),
                    "resource_count": grant.resources.len(),
                })),
        )
        .await?;
        Ok(task)
    }

    /// End-to-end flow: user request, scope inference, delegation.
    ///
    /// Inference failure aborts before any task or tuple exists. Inference
    /// is never consulted on the check path.
    pub async fn initiate_task(
        &self,
        user: UserId,
        agent: AgentId,
        request: &str,
        scope: &dyn ScopeInference,
    ) -> Result<TaskContext, BrokerError> {
        let grants = scope
            .infer(request)
            .await
            .map_err(|err| BrokerError::ScopeInference(err.to_string()))?;
        if grants.is_empty() {
            return Err(BrokerError::Validation(
                "scope inference produced no resources".into(),
            ));
        }
        let task = self
            .create_task_delegation(
                user,
                agent.clone(),
                request,
                grants.clone(),
                self.config.default_ttl,
            )
            .await?;
        Ok(TaskContext {
            task,
            agent,
            resources: grants,
        })
    }

    /// Checks whether `agent` may exercise `access` on `resource` under
    /// `task`. Local filters run first and answer without touching the
    /// backend; the backend is the second line of defense and fails closed.
    /// Every branch emits exactly one check audit event before returning.
    pub async fn check(
        &self,
        agent: &AgentId,
        task: &TaskId,
        resource: &ResourceId,
        access: AccessLevel,
    ) -> Result<Decision, BrokerError> {
        let now = self.clock.now();

        let grant = match self.store.get(task).await {
            Ok(grant) => grant,
            Err(StoreError::NotFound) => {
                return self
                    .deny(
                        now,
                        agent,
                        task,
                        resource,
                        access,
                        DenialKind::TaskInactive,
                        "task inactive",
                    )
                    .await;
            }
            Err(err) => return Err(BrokerError::Internal(err.to_string())),
        };

        if grant.status == GrantStatus::Active && now >= grant.expires_at {
            // Deadline passed before the sweeper got here.
            self.expire_grant(&grant, now).await;
            return self
                .deny(
                    now,
                    agent,
                    task,
                    resource,
                    access,
                    DenialKind::TaskInactive,
                    "task inactive",
                )
                .await;
        }
        if !grant.is_live(now) {
            return self
                .deny(
                    now,
                    agent,
                    task,
                    resource,
                    access,
                    DenialKind::TaskInactive,
                    "task inactive",
                )
                .await;
        }
        if grant.agent != *agent {
            return self
                .deny(
                    now,
                    agent,
                    task,
                    resource,
                    access,
                    DenialKind::NotAssigned,
                    "agent not assigned to this task",
                )
                .await;
        }
        if !grant.covers(resource, access) {
            return self
                .deny(
                    now,
                    agent,
                    task,
                    resource,
                    access,
                    DenialKind::OutOfScope,
                    "out of scope",
                )
                .await;
        }

        let assigned = match self
            .backend
            .check(&agent_ref(agent), REL_ASSIGNEE, &task_ref(task))
            .await
        {
            Ok(answer) => answer,
            Err(err) => {
                warn!(task = %task, "backend check failed: {err}");
                return self
                    .deny(
                        now,
                        agent,
                        task,
                        resource,
                        access,
                        DenialKind::BackendError,
                        "backend error",
                    )
                    .await;
            }
        };
        if !assigned {
            return self
                .deny(
                    now,
                    agent,
                    task,
                    resource,
                    access,
                    DenialKind::NotAssigned,
                    "agent not assigned to this task",
                )
                .await;
        }

        let granted = match self
            .backend
            .check(&task_ref(task), access.relation(), &resource_ref(resource))
            .await
        {
            Ok(answer) => answer,
            Err(err) => {
                warn!(task = %task, "backend check failed: {err}");
                return self
                    .deny(
                        now,
                        agent,
                        task,
                        resource,
                        access,
                        DenialKind::BackendError,
                        "backend error",
                    )
                    .await;
            }
        };
        if !granted {
            return self
                .deny(
                    now,
                    agent,
                    task,
                    resource,
                    access,
                    DenialKind::NotGranted,
                    "not granted",
                )
                .await;
        }

        metrics::record_check(true);
        self.record(
            AuditEvent::new(AuditEventKind::CheckAllowed, now)
                .with_task(task.clone())
                .with_agent(agent.clone())
                .with_resource(resource.clone())
                .with_access(access)
                .with_reason("authorized"),
        )
        .await?;
        Ok(Decision::Allow)
    }

    /// Revokes a task: marks it terminal, deletes its backend tuples and
    /// emits `TaskRevoked`. Returns `Ok(true)` when this call performed the
    /// transition; revoking an already-terminal task is an `Ok(false)`
    /// no-op that emits nothing.
    pub async fn revoke_task(&self, task: &TaskId) -> Result<bool, BrokerError> {
        let now = self.clock.now();
        let grant = match self.store.get(task).await {
            Ok(grant) => grant,
            Err(StoreError::NotFound) => return Err(BrokerError::NotFound),
            Err(err) => return Err(BrokerError::Internal(err.to_string())),
        };

        match self.store.mark_revoked(task).await {
            Ok(()) => {}
            Err(StoreError::AlreadyTerminal) => {
                debug!(task = %task, "revoke of terminal task is a no-op");
                return Ok(false);
            }
            Err(StoreError::NotFound) => return Err(BrokerError::NotFound),
            Err(err) => return Err(BrokerError::Internal(err.to_string())),
        }

        // The local record is terminal from here on, so checks deny even if
        // the tuple delete below cannot be committed.
        let tuples = grant_tuples(&grant);
        let delete_result = self.delete_tuples(&tuples).await;

        metrics::record_grant_revoked();
        info!(task = %task, "task delegation revoked");
        self.record(
            AuditEvent::new(AuditEventKind::TaskRevoked, now)
                .with_task(task.clone())
                .with_user(grant.user)
                .with_agent(grant.agent)
                .with_reason("task revoked")
                .with_metadata(json!({ "tuples_deleted": tuples.len() })),
        )
        .await?;

        delete_result?;
        Ok(true)
    }

    /// Transitions every active task past its deadline to Expired and
    /// returns the swept ids. Safe to run concurrently with itself: a task
    /// that lost the transition race is skipped.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<Vec<TaskId>, BrokerError> {
        let due = self.store.list_active_expiring(now).await;
        let mut swept = Vec::new();
        for task in due {
            let grant = match self.store.get(&task).await {
                Ok(grant) => grant,
                Err(_) => continue,
            };
            if self.store.mark_expired(&task).await.is_err() {
                continue;
            }
            self.finish_expiry(&grant, now).await?;
            swept.push(task);
        }
        if !swept.is_empty() {
            metrics::record_grants_expired(swept.len());
            info!(count = swept.len(), "expired task sweep");
        }
        Ok(swept)
    }

    async fn deny(
        &self,
        now: DateTime<Utc>,
        agent: &AgentId,
        task: &TaskId,
        resource: &ResourceId,
        access: AccessLevel,
        kind: DenialKind,
        reason: &str,
    ) -> Result<Decision, BrokerError> {
        metrics::record_check(false);
        debug!(task = %task, agent = %agent, reason, "check denied");
        self.record(
            AuditEvent::new(AuditEventKind::CheckDenied, now)
                .with_task(task.clone())
                .with_agent(agent.clone())
                .with_resource(resource.clone())
                .with_access(access)
                .with_reason(reason),
        )
        .await?;
        Ok(Decision::deny(kind, reason))
    }

    /// Lazy expiry from the check path. Losing the transition race to a
    /// concurrent sweep or revoke is fine; the grant is terminal either way.
    async fn expire_grant(&self, grant: &TaskGrant, now: DateTime<Utc>) {
        if self.store.mark_expired(&grant.id).await.is_err() {
            return;
        }
        metrics::record_grants_expired(1);
        if let Err(err) = self.finish_expiry(grant, now).await {
            warn!(task = %grant.id, "expiry finalization failed: {err}");
        }
    }

    async fn finish_expiry(&self, grant: &TaskGrant, now: DateTime<Utc>) -> Result<(), BrokerError> {
        let tuples = grant_tuples(grant);
        if let Err(err) = self.delete_tuples(&tuples).await {
            // The grant is already terminal locally; checks deny regardless.
            warn!(task = %grant.id, "tuple delete after expiry failed: {err}");
        }
        info!(task = %grant.id, "task expired");
        self.record(
            AuditEvent::new(AuditEventKind::TaskExpired, now)
                .with_task(grant.id.clone())
                .with_user(grant.user.clone())
                .with_agent(grant.agent.clone())
                .with_reason("task ttl elapsed"),
        )
        .await
    }

    async fn write_tuples(&self, tuples: &[RelTuple]) -> Result<(), BrokerError> {
        let retry = &self.config.write_retry;
        let attempts = retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.backend.write(tuples).await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_retriable() && attempt < attempts => {
                    debug!(attempt, "tuple write retry: {err}");
                    tokio::time::sleep(Duration::from_millis(retry.backoff_ms)).await;
                }
                Err(err) => return Err(BrokerError::BackendUnavailable(err.to_string())),
            }
        }
    }

    async fn delete_tuples(&self, tuples: &[RelTuple]) -> Result<(), BrokerError> {
        let retry = &self.config.write_retry;
        let attempts = retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.backend.delete(tuples).await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_retriable() && attempt < attempts => {
                    debug!(attempt, "tuple delete retry: {err}");
                    tokio::time::sleep(Duration::from_millis(retry.backoff_ms)).await;
                }
                Err(err) => return Err(BrokerError::BackendUnavailable(err.to_string())),
            }
        }
    }

    async fn record(&self, event: AuditEvent) -> Result<(), BrokerError> {
        self.audit
            .record(event)
            .await
            .map_err(|err: AuditError| BrokerError::Audit(err.to_string()))
    }
}

fn grant_tuples(grant: &TaskGrant) -> Vec<RelTuple> {
    let task = task_ref(&grant.id);
    let mut tuples = Vec::with_capacity(grant.resources.len() + 2);
    tuples.push(RelTuple::new(
        user_ref(&grant.user),
        REL_DELEGATOR,
        task.clone(),
    ));
    tuples.push(RelTuple::new(
        agent_ref(&grant.agent),
        REL_ASSIGNEE,
        task.clone(),
    ));
    for resource in &grant.resources {
        tuples.push(RelTuple::new(
            task.clone(),
            resource.access.relation(),
            resource_ref(&resource.resource),
        ));
    }
    tuples
}

#[async_trait]
impl Authorizer for AuthzService {
    async fn check(
        &self,
        agent: &AgentId,
        task: &TaskId,
        resource: &ResourceId,
        access: AccessLevel,
    ) -> Result<Decision, BrokerError> {
        AuthzService::check(self, agent, task, resource, access).await
    }
}
