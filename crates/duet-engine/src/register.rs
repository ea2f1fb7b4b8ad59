use std::{
    pin::pin,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use tokio::sync::Notify;
use tracing::debug;

use crate::{EngineError, Gate, GateId};

/// Process-wide (per backend) gate bookkeeping.
///
/// Holds the gates in creation order, hands out strictly ascending gate ids,
/// and tracks per-phase completion with counters and a shared error slot.
/// Any gate failure fails both waits; the graph is not reusable afterwards.
#[derive(Default)]
pub struct GateRegister {
    next_id: AtomicU64,
    gates: Mutex<Vec<Box<dyn Gate>>>,
    num_needs_setup: AtomicUsize,
    num_needs_online: AtomicUsize,
    setup_done: AtomicUsize,
    online_done: AtomicUsize,
    error: Mutex<Option<Arc<EngineError>>>,
    notify: Notify,
}

impl GateRegister {
    /// Creates an empty register.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next gate id, advancing the counter.
    pub fn next_gate_id(&self) -> GateId {
        GateId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Registers a constructed gate.
    pub fn register_gate(&self, gate: Box<dyn Gate>) {
        if gate.needs_setup() {
            self.num_needs_setup.fetch_add(1, Ordering::Relaxed);
        }
        if gate.needs_online() {
            self.num_needs_online.fetch_add(1, Ordering::Relaxed);
        }
        self.gates.lock().unwrap().push(gate);
    }

    /// The number of registered gates.
    pub fn num_gates(&self) -> usize {
        self.gates.lock().unwrap().len()
    }

    /// The number of gates participating in the setup phase.
    pub fn num_needs_setup(&self) -> usize {
        self.num_needs_setup.load(Ordering::Relaxed)
    }

    /// The number of gates participating in the online phase.
    pub fn num_needs_online(&self) -> usize {
        self.num_needs_online.load(Ordering::Relaxed)
    }

    /// Takes the gates out of the register for evaluation.
    pub(crate) fn take_gates(&self) -> Vec<Box<dyn Gate>> {
        std::mem::take(&mut *self.gates.lock().unwrap())
    }

    /// Records one completed gate setup.
    pub fn increment_setup_counter(&self) {
        self.setup_done.fetch_add(1, Ordering::AcqRel);
        self.notify.notify_waiters();
    }

    /// Records one completed gate online phase.
    pub fn increment_online_counter(&self) {
        self.online_done.fetch_add(1, Ordering::AcqRel);
        self.notify.notify_waiters();
    }

    /// Reports a fatal gate failure. The first error wins; all subsequent
    /// waits return it.
    pub fn report_error(&self, err: EngineError) {
        debug!(%err, "gate reported a failure");
        let mut slot = self.error.lock().unwrap();
        if slot.is_none() {
            *slot = Some(Arc::new(err));
        }
        drop(slot);
        self.notify.notify_waiters();
    }

    fn stored_error(&self) -> Option<EngineError> {
        self.error
            .lock()
            .unwrap()
            .as_ref()
            .map(|err| EngineError::GateFailed(Arc::clone(err)))
    }

    /// Waits until every gate that needs setup has completed it.
    pub async fn wait_setup(&self) -> Result<(), EngineError> {
        self.wait_counter(&self.setup_done, &self.num_needs_setup)
            .await
    }

    /// Waits until every gate that needs an online phase has completed it.
    pub async fn wait_online(&self) -> Result<(), EngineError> {
        self.wait_counter(&self.online_done, &self.num_needs_online)
            .await
    }

    async fn wait_counter(
        &self,
        done: &AtomicUsize,
        expected: &AtomicUsize,
    ) -> Result<(), EngineError> {
        loop {
            let mut notified = pin!(self.notify.notified());
            notified.as_mut().enable();
            if let Some(err) = self.stored_error() {
                return Err(err);
            }
            if done.load(Ordering::Acquire) >= expected.load(Ordering::Relaxed) {
                return Ok(());
            }
            notified.await;
        }
    }

    /// Resets counters and the error slot between repetitions. Any gates
    /// still registered are dropped; the backend rebuilds the circuit.
    pub fn reset(&self) {
        self.gates.lock().unwrap().clear();
        self.next_id.store(0, Ordering::Relaxed);
        self.num_needs_setup.store(0, Ordering::Relaxed);
        self.num_needs_online.store(0, Ordering::Relaxed);
        self.setup_done.store(0, Ordering::Relaxed);
        self.online_done.store(0, Ordering::Relaxed);
        *self.error.lock().unwrap() = None;
    }
}

impl std::fmt::Debug for GateRegister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateRegister")
            .field("num_gates", &self.num_gates())
            .field("num_needs_setup", &self.num_needs_setup())
            .field("num_needs_online", &self.num_needs_online())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;

    struct NoopGate(GateId);

    #[async_trait]
    impl Gate for NoopGate {
        fn id(&self) -> GateId {
            self.0
        }

        async fn evaluate_online(&mut self) -> Result<(), EngineError> {
            Ok(())
        }
    }

    #[test]
    fn test_ids_strictly_ascend() {
        let register = GateRegister::new();
        let a = register.next_gate_id();
        let b = register.next_gate_id();
        let c = register.next_gate_id();
        assert!(a < b && b < c);
        assert_eq!(a.role_party(), 0);
        assert_eq!(b.role_party(), 1);
    }

    #[tokio::test]
    async fn test_wait_returns_once_counters_reach_expected() {
        let register = Arc::new(GateRegister::new());
        for _ in 0..3 {
            let id = register.next_gate_id();
            register.register_gate(Box::new(NoopGate(id)));
        }
        assert_eq!(register.num_needs_online(), 3);
        assert_eq!(register.num_needs_setup(), 0);

        // No setup gates: returns immediately.
        register.wait_setup().await.unwrap();

        let waiter = {
            let register = Arc::clone(&register);
            tokio::spawn(async move { register.wait_online().await })
        };
        for _ in 0..3 {
            register.increment_online_counter();
        }
        waiter.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_error_fails_waits() {
        let register = Arc::new(GateRegister::new());
        let id = register.next_gate_id();
        register.register_gate(Box::new(NoopGate(id)));

        register.report_error(EngineError::PeerAborted);
        assert!(matches!(
            register.wait_online().await,
            Err(EngineError::GateFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_reset_clears_state() {
        let register = GateRegister::new();
        let id = register.next_gate_id();
        register.register_gate(Box::new(NoopGate(id)));
        register.report_error(EngineError::PeerAborted);

        register.reset();
        assert_eq!(register.num_gates(), 0);
        assert_eq!(register.next_gate_id(), GateId(0));
        register.wait_online().await.unwrap();
    }
}
