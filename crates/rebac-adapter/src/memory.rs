use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashSet;

use crate::{BackendError, RelTuple, RelationshipBackend};

/// Exact-match tuple store suitable for unit tests and early integration.
///
/// Tracks call counts and supports fault injection so callers can assert
/// fail-closed behavior and "no backend call" fast paths.
#[derive(Debug)]
pub struct InMemoryRelationshipBackend {
    tuples: DashSet<RelTuple>,
    available: AtomicBool,
    fail_remaining: AtomicUsize,
    check_calls: AtomicUsize,
    write_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl InMemoryRelationshipBackend {
    pub fn new() -> Self {
        Self {
            tuples: DashSet::new(),
            available: AtomicBool::new(true),
            fail_remaining: AtomicUsize::new(0),
            check_calls: AtomicUsize::new(0),
            write_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
        }
    }

    /// Simulates an outage: every call fails until re-enabled.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Fails the next `count` calls, then recovers.
    pub fn fail_times(&self, count: usize) {
        self.fail_remaining.store(count, Ordering::SeqCst);
    }

    pub fn contains(&self, tuple: &RelTuple) -> bool {
        self.tuples.contains(tuple)
    }

    pub fn tuple_count(&self) -> usize {
        self.tuples.len()
    }

    pub fn check_calls(&self) -> usize {
        self.check_calls.load(Ordering::SeqCst)
    }

    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    fn gate(&self) -> Result<(), BackendError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable("backend offline".to_string()));
        }
        let failed = self
            .fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok();
        if failed {
            return Err(BackendError::Unavailable(
                "injected backend fault".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for InMemoryRelationshipBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RelationshipBackend for InMemoryRelationshipBackend {
    async fn check(
        &self,
        subject: &str,
        relation: &str,
        object: &str,
    ) -> Result<bool, BackendError> {
        self.check_calls.fetch_add(1, Ordering::SeqCst);
        self.gate()?;
        Ok(self
            .tuples
            .contains(&RelTuple::new(subject, relation, object)))
    }

    async fn write(&self, tuples: &[RelTuple]) -> Result<(), BackendError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        self.gate()?;
        for tuple in tuples {
            self.tuples.insert(tuple.clone());
        }
        Ok(())
    }

    async fn delete(&self, tuples: &[RelTuple]) -> Result<(), BackendError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.gate()?;
        for tuple in tuples {
            self.tuples.remove(tuple);
        }
        Ok(())
    }
}
