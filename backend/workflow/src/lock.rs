use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lecturebuddy_core::WorkflowStep;

use crate::store::WorkflowStore;

/// Generation counter deciding which async run is still authoritative.
#[derive(Debug, Clone, Default)]
pub struct Liveness(Arc<AtomicU64>);

impl Liveness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new run; all earlier tickets become stale.
    pub fn begin(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Make every outstanding ticket stale.
    pub fn invalidate(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    /// Ticket for work that must not supersede runs already in flight.
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, ticket: u64) -> bool {
        self.0.load(Ordering::SeqCst) == ticket
    }
}

/// Holds a step locked and the processing flag raised until dropped.
///
/// When bound to a [`Liveness`] ticket, a guard whose run has been superseded
/// releases nothing: whoever invalidated the run owns the cleanup.
#[must_use = "the step unlocks as soon as the guard is dropped"]
pub struct StepLock {
    store: Arc<WorkflowStore>,
    step: WorkflowStep,
    ticket: Option<(Liveness, u64)>,
}

impl StepLock {
    pub fn acquire(store: Arc<WorkflowStore>, step: WorkflowStep) -> Self {
        store.lock_step(step);
        store.set_processing(true);
        Self {
            store,
            step,
            ticket: None,
        }
    }

    pub fn bound_to(mut self, liveness: &Liveness, ticket: u64) -> Self {
        self.ticket = Some((liveness.clone(), ticket));
        self
    }

    pub fn step(&self) -> WorkflowStep {
        self.step
    }

    pub fn is_current(&self) -> bool {
        self.ticket
            .as_ref()
            .map_or(true, |(liveness, ticket)| liveness.is_current(*ticket))
    }

    pub fn release(self) {}
}

impl Drop for StepLock {
    fn drop(&mut self) {
        if !self.is_current() {
            return;
        }
        self.store.unlock_step(self.step);
        self.store.set_processing(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_locks_and_unlocks() {
        let store = Arc::new(WorkflowStore::in_memory());
        let guard = StepLock::acquire(store.clone(), WorkflowStep::Optimizer);
        let state = store.snapshot();
        assert!(state.is_locked(WorkflowStep::Optimizer));
        assert!(state.is_processing);

        guard.release();
        let state = store.snapshot();
        assert!(!state.is_locked(WorkflowStep::Optimizer));
        assert!(!state.is_processing);
    }

    #[test]
    fn guard_unlocks_on_panic() {
        let store = Arc::new(WorkflowStore::in_memory());
        let inner = store.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = StepLock::acquire(inner, WorkflowStep::Optimizer);
            panic!("ocr blew up");
        }));
        assert!(result.is_err());
        assert!(!store.snapshot().is_locked(WorkflowStep::Optimizer));
    }

    #[test]
    fn stale_guard_leaves_newer_lock_alone() {
        let store = Arc::new(WorkflowStore::in_memory());
        let liveness = Liveness::new();

        let first = liveness.begin();
        let stale = StepLock::acquire(store.clone(), WorkflowStep::Optimizer).bound_to(&liveness, first);

        let second = liveness.begin();
        let current = StepLock::acquire(store.clone(), WorkflowStep::Optimizer).bound_to(&liveness, second);

        drop(stale);
        assert!(store.snapshot().is_locked(WorkflowStep::Optimizer));
        assert!(store.snapshot().is_processing);

        drop(current);
        assert!(!store.snapshot().is_locked(WorkflowStep::Optimizer));
    }

    #[test]
    fn liveness_tickets() {
        let liveness = Liveness::new();
        let t = liveness.begin();
        assert!(liveness.is_current(t));
        liveness.invalidate();
        assert!(!liveness.is_current(t));
    }
}
