use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use duet_comm::CommLayer;
use futures::future::BoxFuture;
use tokio::task::JoinSet;
use tracing::{info, instrument};

use crate::{EngineError, Gate, GateRegister};

/// Wall-clock durations of one repetition.
#[derive(Debug, Default, Clone)]
pub struct RunStats {
    /// Time spent in the preprocessing callable.
    pub preprocessing: Duration,
    /// Time spent in the gate setup phase.
    pub gates_setup: Duration,
    /// Time spent in the gate online phase.
    pub gates_online: Duration,
    /// Total evaluation time.
    pub evaluate: Duration,
}

/// The preprocessing callable run before the gate phases.
///
/// Supplied by the backend; expected to drive the OT extension and the
/// correlated-material providers to their ready state.
pub type Preprocessor = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), EngineError>> + Send>;

/// Evaluates a registered gate graph in two phases.
///
/// Every gate with setup work is posted as a task; once the register's setup
/// counter has reached its target the online phase is posted the same way.
/// An optional synchronization barrier runs between the phases.
pub struct GateExecutor {
    register: Arc<GateRegister>,
    preprocess: Mutex<Option<Preprocessor>>,
    sync_between_phases: Option<CommLayer>,
}

impl GateExecutor {
    /// Creates an executor for the register with the given preprocessing
    /// callable.
    pub fn new(register: Arc<GateRegister>, preprocess: Preprocessor) -> Self {
        Self {
            register,
            preprocess: Mutex::new(Some(preprocess)),
            sync_between_phases: None,
        }
    }

    /// Inserts a two-way barrier between the setup and online phases.
    pub fn sync_between_phases(mut self, comm: CommLayer) -> Self {
        self.sync_between_phases = Some(comm);
        self
    }

    /// Runs preprocessing, then the setup phase of every gate, then the
    /// online phase.
    ///
    /// Any gate failure aborts the repetition; setup failures abort before
    /// the online phase starts.
    #[instrument(level = "debug", skip_all, err)]
    pub async fn evaluate_setup_online(&self, stats: &mut RunStats) -> Result<(), EngineError> {
        let start = Instant::now();

        let preprocess = self
            .preprocess
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| EngineError::InternalInvariant("executor ran twice".into()))?;
        preprocess().await?;
        stats.preprocessing = start.elapsed();

        info!(
            num_gates = self.register.num_gates(),
            "evaluating gates (online after all finished setup)"
        );

        // ------------------------------ setup phase ------------------------
        let setup_start = Instant::now();
        let gates = self.register.take_gates();
        let mut idle = Vec::with_capacity(gates.len());
        let mut running: JoinSet<Box<dyn Gate>> = JoinSet::new();
        for mut gate in gates {
            if gate.needs_setup() {
                let register = Arc::clone(&self.register);
                running.spawn(async move {
                    match gate.evaluate_setup().await {
                        Ok(()) => register.increment_setup_counter(),
                        Err(err) => register.report_error(err),
                    }
                    gate
                });
            } else {
                idle.push(gate);
            }
        }
        self.register.wait_setup().await?;

        let mut gates = idle;
        while let Some(joined) = running.join_next().await {
            gates.push(joined.map_err(|err| {
                EngineError::InternalInvariant(format!("gate task panicked: {err}"))
            })?);
        }
        stats.gates_setup = setup_start.elapsed();

        if let Some(comm) = &self.sync_between_phases {
            comm.sync().await?;
        }

        // ------------------------------ online phase -----------------------
        let online_start = Instant::now();
        let mut running: JoinSet<Box<dyn Gate>> = JoinSet::new();
        for mut gate in gates {
            if gate.needs_online() {
                let register = Arc::clone(&self.register);
                running.spawn(async move {
                    match gate.evaluate_online().await {
                        Ok(()) => register.increment_online_counter(),
                        Err(err) => register.report_error(err),
                    }
                    gate
                });
            }
        }
        self.register.wait_online().await?;

        while let Some(joined) = running.join_next().await {
            joined.map_err(|err| {
                EngineError::InternalInvariant(format!("gate task panicked: {err}"))
            })?;
        }
        stats.gates_online = online_start.elapsed();

        stats.evaluate = start.elapsed();
        info!(?stats, "finished online phase");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use duet_comm::sync::SetOnce;

    use crate::GateId;

    use super::*;

    fn noop_preprocessor() -> Preprocessor {
        Box::new(|| Box::pin(async { Ok(()) }))
    }

    /// A gate that publishes a value in its online phase.
    struct Producer {
        id: GateId,
        out: Arc<SetOnce<u64>>,
        value: u64,
    }

    #[async_trait]
    impl Gate for Producer {
        fn id(&self) -> GateId {
            self.id
        }

        fn needs_setup(&self) -> bool {
            true
        }

        async fn evaluate_setup(&mut self) -> Result<(), EngineError> {
            Ok(())
        }

        async fn evaluate_online(&mut self) -> Result<(), EngineError> {
            self.out.set(self.value);
            Ok(())
        }
    }

    /// A gate that awaits a predecessor's value.
    struct Consumer {
        id: GateId,
        input: Arc<SetOnce<u64>>,
        result: Arc<SetOnce<u64>>,
    }

    #[async_trait]
    impl Gate for Consumer {
        fn id(&self) -> GateId {
            self.id
        }

        async fn evaluate_online(&mut self) -> Result<(), EngineError> {
            let value = self.input.wait().await;
            self.result.set(value * 2);
            Ok(())
        }
    }

    struct FailingGate {
        id: GateId,
        phase_setup: bool,
    }

    #[async_trait]
    impl Gate for FailingGate {
        fn id(&self) -> GateId {
            self.id
        }

        fn needs_setup(&self) -> bool {
            self.phase_setup
        }

        async fn evaluate_setup(&mut self) -> Result<(), EngineError> {
            if self.phase_setup {
                return Err(EngineError::PeerAborted);
            }
            Ok(())
        }

        async fn evaluate_online(&mut self) -> Result<(), EngineError> {
            Err(EngineError::PeerAborted)
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_dependency_order_is_respected() {
        let register = Arc::new(GateRegister::new());
        let slot = Arc::new(SetOnce::new());
        let result = Arc::new(SetOnce::new());

        // Register the consumer first: scheduling order must not matter.
        let id = register.next_gate_id();
        register.register_gate(Box::new(Consumer {
            id,
            input: Arc::clone(&slot),
            result: Arc::clone(&result),
        }));
        let id = register.next_gate_id();
        register.register_gate(Box::new(Producer {
            id,
            out: Arc::clone(&slot),
            value: 21,
        }));

        let executor = GateExecutor::new(Arc::clone(&register), noop_preprocessor());
        let mut stats = RunStats::default();
        executor.evaluate_setup_online(&mut stats).await.unwrap();

        assert_eq!(result.get(), Some(42));
        assert!(stats.evaluate >= stats.gates_online);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_setup_failure_aborts_before_online() {
        let register = Arc::new(GateRegister::new());
        let id = register.next_gate_id();
        register.register_gate(Box::new(FailingGate {
            id,
            phase_setup: true,
        }));

        let executor = GateExecutor::new(Arc::clone(&register), noop_preprocessor());
        let mut stats = RunStats::default();
        let err = executor.evaluate_setup_online(&mut stats).await.unwrap_err();
        assert!(matches!(err, EngineError::GateFailed(_)));
        assert_eq!(stats.gates_online, Duration::default());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_online_failure_propagates() {
        let register = Arc::new(GateRegister::new());
        let id = register.next_gate_id();
        register.register_gate(Box::new(FailingGate {
            id,
            phase_setup: false,
        }));

        let executor = GateExecutor::new(Arc::clone(&register), noop_preprocessor());
        let mut stats = RunStats::default();
        assert!(executor.evaluate_setup_online(&mut stats).await.is_err());
    }

    #[tokio::test]
    async fn test_executor_runs_once() {
        let register = Arc::new(GateRegister::new());
        let executor = GateExecutor::new(register, noop_preprocessor());
        let mut stats = RunStats::default();
        executor.evaluate_setup_online(&mut stats).await.unwrap();
        assert!(executor.evaluate_setup_online(&mut stats).await.is_err());
    }
}
