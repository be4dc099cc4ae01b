use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use agentgate_audit_log::{AuditEventKind, InMemoryAuditLog};
use agentgate_core_types::{
    AccessLevel, AgentId, Decision, DenialKind, ManualClock, ResourceId, UserId,
};
use auth_broker::{spawn_sweeper, AuthzService, BrokerConfig, BrokerError, CachedAuthzService};
use delegation_store::{DelegationStore, GrantStatus, InMemoryDelegationStore, ResourceGrant};
use rebac_adapter::InMemoryRelationshipBackend;
use scope_infer::{FixedScopeInference, ScopeError, ScopeInference};

struct Harness {
    service: Arc<CachedAuthzService>,
    store: Arc<InMemoryDelegationStore>,
    backend: Arc<InMemoryRelationshipBackend>,
    audit: Arc<InMemoryAuditLog>,
    clock: Arc<ManualClock>,
}

fn harness() -> Harness {
    let config = BrokerConfig::default();
    let store = Arc::new(InMemoryDelegationStore::new());
    let backend = Arc::new(InMemoryRelationshipBackend::new());
    let audit = Arc::new(InMemoryAuditLog::default());
    let clock = Arc::new(ManualClock::starting_now());
    let service = AuthzService::new(
        store.clone(),
        backend.clone(),
        audit.clone(),
        clock.clone(),
        config,
    );
    Harness {
        service: Arc::new(CachedAuthzService::new(service)),
        store,
        backend,
        audit,
        clock,
    }
}

fn alice() -> UserId {
    UserId("alice".into())
}

fn agent() -> AgentId {
    AgentId("agent-1".into())
}

fn doc(id: &str) -> ResourceId {
    ResourceId(id.into())
}

fn reader_scope(id: &str) -> Vec<ResourceGrant> {
    vec![ResourceGrant::new(id, AccessLevel::Reader)]
}

fn count_kind(harness: &Harness, task: &agentgate_core_types::TaskId, kind: AuditEventKind) -> usize {
    harness
        .audit
        .events_for_task(task)
        .iter()
        .filter(|event| event.kind == kind)
        .count()
}

#[tokio::test]
async fn create_then_check_allows_in_scope_access() {
    let h = harness();
    let task = h
        .service
        .create_task_delegation(
            alice(),
            agent(),
            "summarize doc-1",
            reader_scope("doc-1"),
            Duration::from_secs(1800),
        )
        .await
        .unwrap();

    let decision = h
        .service
        .check(&agent(), &task, &doc("doc-1"), AccessLevel::Reader)
        .await
        .unwrap();

    assert_eq!(decision, Decision::Allow);
    assert_eq!(count_kind(&h, &task, AuditEventKind::TaskCreated), 1);
    let allowed = h.audit.events_for_task(&task);
    let allow_event = allowed
        .iter()
        .find(|event| event.kind == AuditEventKind::CheckAllowed)
        .expect("allow event recorded");
    assert_eq!(allow_event.resource, Some(doc("doc-1")));
    assert_eq!(allow_event.access, Some(AccessLevel::Reader));
}

#[tokio::test]
async fn out_of_scope_check_denies_without_backend_call() {
    let h = harness();
    let task = h
        .service
        .create_task_delegation(
            alice(),
            agent(),
            "summarize doc-1",
            reader_scope("doc-1"),
            Duration::from_secs(1800),
        )
        .await
        .unwrap();
    let checks_before = h.backend.check_calls();

    let decision = h
        .service
        .check(&agent(), &task, &doc("doc-2"), AccessLevel::Reader)
        .await
        .unwrap();

    assert_eq!(decision, Decision::deny(DenialKind::OutOfScope, "out of scope"));
    assert_eq!(h.backend.check_calls(), checks_before);
    assert_eq!(count_kind(&h, &task, AuditEventKind::CheckDenied), 1);
}

#[tokio::test]
async fn wrong_access_level_is_out_of_scope() {
    let h = harness();
    let task = h
        .service
        .create_task_delegation(
            alice(),
            agent(),
            "summarize doc-1",
            reader_scope("doc-1"),
            Duration::from_secs(1800),
        )
        .await
        .unwrap();

    let decision = h
        .service
        .check(&agent(), &task, &doc("doc-1"), AccessLevel::Writer)
        .await
        .unwrap();

    assert_eq!(decision, Decision::deny(DenialKind::OutOfScope, "out of scope"));
}

#[tokio::test]
async fn expired_task_denies_and_is_lazily_swept() {
    let h = harness();
    let task = h
        .service
        .create_task_delegation(
            alice(),
            agent(),
            "summarize doc-1",
            reader_scope("doc-1"),
            Duration::from_secs(30 * 60),
        )
        .await
        .unwrap();

    assert_eq!(
        h.service
            .check(&agent(), &task, &doc("doc-1"), AccessLevel::Reader)
            .await
            .unwrap(),
        Decision::Allow
    );

    h.clock.advance(chrono::Duration::minutes(31));
    // The cache keys off wall-clock Instants the manual clock cannot move,
    // so age the cached Allow out by hand to model the elapsed 31 minutes.
    h.service.invalidate(&task);

    let decision = h
        .service
        .check(&agent(), &task, &doc("doc-1"), AccessLevel::Reader)
        .await
        .unwrap();

    assert_eq!(
        decision,
        Decision::deny(DenialKind::TaskInactive, "task inactive")
    );
    assert_eq!(
        h.store.get(&task).await.unwrap().status,
        GrantStatus::Expired
    );
    assert_eq!(count_kind(&h, &task, AuditEventKind::TaskExpired), 1);
    assert_eq!(h.backend.tuple_count(), 0);
}

#[tokio::test]
async fn revoke_then_check_denies_with_one_audit_pair() {
    let h = harness();
    let task = h
        .service
        .create_task_delegation(
            alice(),
            agent(),
            "summarize doc-1",
            reader_scope("doc-1"),
            Duration::from_secs(1800),
        )
        .await
        .unwrap();
    let scope_before = h.store.get(&task).await.unwrap().resources.clone();

    assert!(h.service.revoke_task(&task).await.unwrap());

    let decision = h
        .service
        .check(&agent(), &task, &doc("doc-1"), AccessLevel::Reader)
        .await
        .unwrap();
    assert_eq!(
        decision,
        Decision::deny(DenialKind::TaskInactive, "task inactive")
    );
    assert_eq!(h.backend.tuple_count(), 0);
    assert_eq!(count_kind(&h, &task, AuditEventKind::TaskCreated), 1);
    assert_eq!(count_kind(&h, &task, AuditEventKind::TaskRevoked), 1);

    // Second revoke is an idempotent no-op and emits nothing new.
    assert!(!h.service.revoke_task(&task).await.unwrap());
    assert_eq!(count_kind(&h, &task, AuditEventKind::TaskRevoked), 1);

    // Scope is immutable through the whole lifecycle.
    assert_eq!(h.store.get(&task).await.unwrap().resources, scope_before);
}

#[tokio::test]
async fn revoking_unknown_task_is_not_found() {
    let h = harness();
    let err = h
        .service
        .revoke_task(&agentgate_core_types::TaskId::new())
        .await
        .unwrap_err();
    assert!(matches!(err, BrokerError::NotFound));
}

#[tokio::test]
async fn backend_outage_fails_closed() {
    let h = harness();
    let task = h
        .service
        .create_task_delegation(
            alice(),
            agent(),
            "summarize doc-1",
            reader_scope("doc-1"),
            Duration::from_secs(1800),
        )
        .await
        .unwrap();

    h.backend.set_available(false);
    let decision = h
        .service
        .check(&agent(), &task, &doc("doc-1"), AccessLevel::Reader)
        .await
        .unwrap();

    assert_eq!(
        decision,
        Decision::deny(DenialKind::BackendError, "backend error")
    );
}

#[tokio::test]
async fn create_with_backend_down_persists_nothing() {
    let h = harness();
    h.backend.set_available(false);

    let err = h
        .service
        .create_task_delegation(
            alice(),
            agent(),
            "summarize doc-1",
            reader_scope("doc-1"),
            Duration::from_secs(1800),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, BrokerError::BackendUnavailable(_)));
    assert!(h.store.is_empty());
    assert!(h.audit.is_empty());
}

#[tokio::test]
async fn transient_backend_fault_is_retried_on_create() {
    let h = harness();
    h.backend.fail_times(1);

    let task = h
        .service
        .create_task_delegation(
            alice(),
            agent(),
            "summarize doc-1",
            reader_scope("doc-1"),
            Duration::from_secs(1800),
        )
        .await
        .unwrap();

    assert_eq!(h.backend.write_calls(), 2);
    assert_eq!(
        h.service
            .check(&agent(), &task, &doc("doc-1"), AccessLevel::Reader)
            .await
            .unwrap(),
        Decision::Allow
    );
}

#[tokio::test]
async fn malformed_creation_input_is_rejected_before_side_effects() {
    let h = harness();

    let err = h
        .service
        .create_task_delegation(
            alice(),
            agent(),
            "do nothing",
            Vec::new(),
            Duration::from_secs(1800),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, BrokerError::Validation(_)));
    assert_eq!(h.backend.write_calls(), 0);
    assert!(h.store.is_empty());
    assert!(h.audit.is_empty());
}

#[tokio::test]
async fn cached_check_skips_backend_until_revocation() {
    let h = harness();
    let task = h
        .service
        .create_task_delegation(
            alice(),
            agent(),
            "summarize doc-1",
            reader_scope("doc-1"),
            Duration::from_secs(1800),
        )
        .await
        .unwrap();

    assert_eq!(
        h.service
            .check(&agent(), &task, &doc("doc-1"), AccessLevel::Reader)
            .await
            .unwrap(),
        Decision::Allow
    );
    let backend_checks = h.backend.check_calls();
    let audited = h.audit.len();

    // Hit: no backend traffic, no new audit event.
    assert_eq!(
        h.service
            .check(&agent(), &task, &doc("doc-1"), AccessLevel::Reader)
            .await
            .unwrap(),
        Decision::Allow
    );
    assert_eq!(h.backend.check_calls(), backend_checks);
    assert_eq!(h.audit.len(), audited);
    assert_eq!(h.service.entry_count(), 1);

    // After revoke returns, no cached Allow survives.
    h.service.revoke_task(&task).await.unwrap();
    assert_eq!(h.service.entry_count(), 0);
    let decision = h
        .service
        .check(&agent(), &task, &doc("doc-1"), AccessLevel::Reader)
        .await
        .unwrap();
    assert!(!decision.is_allow());
}

#[tokio::test]
async fn sweep_transitions_due_tasks_and_leaves_fresh_ones() {
    let h = harness();
    let due = h
        .service
        .create_task_delegation(
            alice(),
            agent(),
            "short-lived task",
            reader_scope("doc-1"),
            Duration::from_secs(60),
        )
        .await
        .unwrap();
    let fresh = h
        .service
        .create_task_delegation(
            alice(),
            agent(),
            "long-lived task",
            reader_scope("doc-2"),
            Duration::from_secs(3600),
        )
        .await
        .unwrap();

    h.clock.advance(chrono::Duration::minutes(2));
    let swept = h.service.sweep_expired(h.service.now()).await.unwrap();

    assert_eq!(swept, vec![due.clone()]);
    assert_eq!(h.store.get(&due).await.unwrap().status, GrantStatus::Expired);
    assert_eq!(h.store.get(&fresh).await.unwrap().status, GrantStatus::Active);
    assert_eq!(count_kind(&h, &due, AuditEventKind::TaskExpired), 1);

    // Idempotent: nothing left to sweep.
    assert!(h.service.sweep_expired(h.service.now()).await.unwrap().is_empty());
    assert_eq!(count_kind(&h, &due, AuditEventKind::TaskExpired), 1);
}

#[tokio::test]
async fn background_sweeper_expires_overdue_tasks() {
    let h = harness();
    let task = h
        .service
        .create_task_delegation(
            alice(),
            agent(),
            "short-lived task",
            reader_scope("doc-1"),
            Duration::from_secs(60),
        )
        .await
        .unwrap();
    h.clock.advance(chrono::Duration::minutes(2));

    let sweeper = spawn_sweeper(h.service.clone(), Duration::from_millis(10));
    tokio::time::sleep(Duration::from_millis(100)).await;
    sweeper.shutdown().await;

    assert_eq!(
        h.store.get(&task).await.unwrap().status,
        GrantStatus::Expired
    );
}

#[tokio::test]
async fn initiate_task_flows_through_scope_inference() {
    let h = harness();
    let scope = FixedScopeInference::new(reader_scope("doc-1"));

    let context = h
        .service
        .initiate_task(alice(), agent(), "summarize doc-1 for me", &scope)
        .await
        .unwrap();

    assert_eq!(context.resources, reader_scope("doc-1"));
    assert_eq!(
        h.service
            .check(&agent(), &context.task, &doc("doc-1"), AccessLevel::Reader)
            .await
            .unwrap(),
        Decision::Allow
    );
    let grant = h.store.get(&context.task).await.unwrap();
    assert_eq!(grant.description, "summarize doc-1 for me");
}

struct FailingScope;

#[async_trait]
impl ScopeInference for FailingScope {
    async fn infer(&self, _description: &str) -> Result<Vec<ResourceGrant>, ScopeError> {
        Err(ScopeError::Inference("model unavailable".into()))
    }
}

#[tokio::test]
async fn failed_scope_inference_creates_nothing() {
    let h = harness();

    let err = h
        .service
        .initiate_task(alice(), agent(), "summarize doc-1 for me", &FailingScope)
        .await
        .unwrap_err();

    assert!(matches!(err, BrokerError::ScopeInference(_)));
    assert!(h.store.is_empty());
    assert_eq!(h.backend.write_calls(), 0);
    assert!(h.audit.is_empty());
}

#[tokio::test]
async fn foreign_agent_is_denied_before_the_backend() {
    let h = harness();
    let task = h
        .service
        .create_task_delegation(
            alice(),
            agent(),
            "summarize doc-1",
            reader_scope("doc-1"),
            Duration::from_secs(1800),
        )
        .await
        .unwrap();
    let checks_before = h.backend.check_calls();

    let decision = h
        .service
        .check(
            &AgentId("agent-2".into()),
            &task,
            &doc("doc-1"),
            AccessLevel::Reader,
        )
        .await
        .unwrap();

    assert_eq!(
        decision,
        Decision::deny(DenialKind::NotAssigned, "agent not assigned to this task")
    );
    assert_eq!(h.backend.check_calls(), checks_before);
}
