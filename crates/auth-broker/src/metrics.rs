use lazy_static::lazy_static;
use prometheus::{core::Collector, opts, IntCounter, IntCounterVec, Registry};
use tracing::error;

lazy_static! {
    static ref AUTH_CHECKS_TOTAL: IntCounterVec = IntCounterVec::new(
        opts!(
            "agentgate_auth_checks_total",
            "Authorization checks grouped by outcome"
        ),
        &["outcome"]
    )
    .unwrap();
    static ref AUTH_CACHE_HITS_TOTAL: IntCounter = IntCounter::new(
        "agentgate_auth_cache_hits_total",
        "Decision cache hits",
    )
    .unwrap();
    static ref AUTH_CACHE_MISSES_TOTAL: IntCounter = IntCounter::new(
        "agentgate_auth_cache_misses_total",
        "Decision cache misses",
    )
    .unwrap();
    static ref GRANTS_CREATED_TOTAL: IntCounter = IntCounter::new(
        "agentgate_grants_created_total",
        "Task delegations created",
    )
    .unwrap();
    static ref GRANTS_REVOKED_TOTAL: IntCounter = IntCounter::new(
        "agentgate_grants_revoked_total",
        "Task delegations revoked",
    )
    .unwrap();
    static ref GRANTS_EXPIRED_TOTAL: IntCounter = IntCounter::new(
        "agentgate_grants_expired_total",
        "Task delegations expired by sweep or lazy check",
    )
    .unwrap();
}

fn register<C>(registry: &Registry, collector: C)
where
    C: Collector + Clone + Send + Sync + 'static,
{
    if let Err(err) = registry.register(Box::new(collector.clone())) {
        if !matches!(err, prometheus::Error::AlreadyReg) {
            error!(?err, "failed to register broker metric");
        }
    }
}

pub fn register_metrics(registry: &Registry) {
    register(registry, AUTH_CHECKS_TOTAL.clone());
    register(registry, AUTH_CACHE_HITS_TOTAL.clone());
    register(registry, AUTH_CACHE_MISSES_TOTAL.clone());
    register(registry, GRANTS_CREATED_TOTAL.clone());
    register(registry, GRANTS_REVOKED_TOTAL.clone());
    register(registry, GRANTS_EXPIRED_TOTAL.clone());
}

pub fn record_check(allowed: bool) {
    let outcome = if allowed { "allow" } else { "deny" };
    AUTH_CHECKS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_cache_hit() {
    AUTH_CACHE_HITS_TOTAL.inc();
}

pub fn record_cache_miss() {
    AUTH_CACHE_MISSES_TOTAL.inc();
}

pub fn record_grant_created() {
    GRANTS_CREATED_TOTAL.inc();
}

pub fn record_grant_revoked() {
    GRANTS_REVOKED_TOTAL.inc();
}

pub fn record_grants_expired(count: usize) {
    GRANTS_EXPIRED_TOTAL.inc_by(count as u64);
}
