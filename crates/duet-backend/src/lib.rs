//! The two-party backend of the `duet` engine.
//!
//! A [`TwoPartyBackend`] owns one party's communication layer, OT provider,
//! correlated-material providers, gate register and protocol factories. The
//! application builds a circuit through [`TwoPartyBackend::gate_factory`],
//! fulfills the input promises, and calls [`TwoPartyBackend::run`], which
//! drives preprocessing and the two gate phases.
//!
//! All correlated material lives in memory; repetitions reset the backend
//! and re-run preprocessing.

#![deny(
    unsafe_code,
    missing_docs,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all
)]

use std::sync::Arc;

use duet_comm::{CommLayer, CommError, PartyId, Transport};
use duet_engine::{
    EngineError, GateExecutor, GateFactory, GateRegister, Preprocessor, Protocol, RunStats,
};
use duet_gmw::GmwFactory;
use duet_ot::OtProvider;
use duet_triples::{MtProvider, SbProvider, SpProvider};
use tracing::instrument;

/// A backend error.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The communication layer failed.
    #[error(transparent)]
    Comm(#[from] CommError),
    /// Circuit construction or evaluation failed.
    #[error(transparent)]
    Engine(#[from] EngineError),
    /// The configured protocol is not implemented.
    #[error("protocol {0:?} is not available")]
    UnsupportedProtocol(Protocol),
}

/// Backend configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// This party's id, `0` or `1`.
    pub my_id: PartyId,
    /// Worker threads for [`Config::build_runtime`]; `0` means hardware
    /// concurrency.
    pub threads: usize,
    /// The arithmetic sharing to use.
    pub arithmetic_protocol: Protocol,
    /// The boolean sharing to use.
    pub boolean_protocol: Protocol,
    /// SIMD lanes per logical value.
    pub num_simd: usize,
    /// Run a synchronization barrier between the setup and online phases.
    /// Must match on both parties.
    pub sync_between_setup_and_online: bool,
}

impl Config {
    /// A default configuration for the given party.
    pub fn new(my_id: PartyId) -> Self {
        Self {
            my_id,
            threads: 0,
            arithmetic_protocol: Protocol::ArithmeticGmw,
            boolean_protocol: Protocol::BooleanGmw,
            num_simd: 1,
            sync_between_setup_and_online: false,
        }
    }

    /// Builds a multi-threaded runtime with the configured worker count.
    pub fn build_runtime(&self) -> std::io::Result<tokio::runtime::Runtime> {
        let threads = if self.threads == 0 {
            num_cpus::get()
        } else {
            self.threads
        };
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(threads.max(1))
            .enable_all()
            .build()
    }
}

/// One party's instance of the engine.
pub struct TwoPartyBackend {
    config: Config,
    comm: CommLayer,
    ots: Arc<OtProvider>,
    mts: Arc<MtProvider>,
    sps: Arc<SpProvider>,
    sbs: Arc<SbProvider>,
    register: Arc<GateRegister>,
    gmw: GmwFactory,
}

impl TwoPartyBackend {
    /// Connects the communication layer and assembles the providers.
    ///
    /// Both parties must call this concurrently.
    pub async fn new(transport: Transport, config: Config) -> Result<Self, BackendError> {
        let comm = CommLayer::connect(transport, config.my_id).await?;
        Ok(Self::assemble(comm, config))
    }

    fn assemble(comm: CommLayer, config: Config) -> Self {
        let my_id = comm.my_id();
        let ots = Arc::new(OtProvider::new(comm.clone()));
        let mts = Arc::new(MtProvider::new(Arc::clone(&ots)));
        let sps = Arc::new(SpProvider::new(Arc::clone(&ots), my_id));
        let sbs = Arc::new(SbProvider::new(Arc::clone(&ots), my_id));
        let register = Arc::new(GateRegister::new());
        let gmw = GmwFactory::new(
            comm.clone(),
            Arc::clone(&register),
            Arc::clone(&mts),
            Arc::clone(&sps),
            Arc::clone(&sbs),
        );
        Self {
            config,
            comm,
            ots,
            mts,
            sps,
            sbs,
            register,
            gmw,
        }
    }

    /// This party's id.
    pub fn my_id(&self) -> PartyId {
        self.comm.my_id()
    }

    /// The gate register.
    pub fn register(&self) -> &Arc<GateRegister> {
        &self.register
    }

    /// Returns the gate factory for the protocol.
    pub fn gate_factory(&self, protocol: Protocol) -> Result<&dyn GateFactory, BackendError> {
        if protocol != self.config.arithmetic_protocol && protocol != self.config.boolean_protocol {
            return Err(BackendError::UnsupportedProtocol(protocol));
        }
        match protocol {
            Protocol::ArithmeticGmw | Protocol::BooleanGmw => Ok(&self.gmw),
            other => Err(BackendError::UnsupportedProtocol(other)),
        }
    }

    fn preprocessor(&self) -> Preprocessor {
        let ots = Arc::clone(&self.ots);
        let mts = Arc::clone(&self.mts);
        let sps = Arc::clone(&self.sps);
        let sbs = Arc::clone(&self.sbs);
        Box::new(move || {
            Box::pin(async move {
                // Register all OT demand before the extension is sized.
                mts.pre_setup()?;
                sps.pre_setup()?;
                sbs.pre_setup()?;

                let (send, recv) = tokio::join!(ots.send_setup(), ots.receive_setup());
                send?;
                recv?;

                let (mt, sp, sb) = tokio::join!(mts.setup(), sps.setup(), sbs.setup());
                mt?;
                sp?;
                sb?;

                tokio::join!(mts.wait_finished(), sps.wait_finished(), sbs.wait_finished());
                Ok(())
            })
        })
    }

    /// Evaluates the registered circuit: preprocessing, setup phase, online
    /// phase. Returns the run's timing statistics.
    #[instrument(level = "debug", skip(self), fields(my_id = self.my_id()), err)]
    pub async fn run(&self) -> Result<RunStats, BackendError> {
        let mut executor = GateExecutor::new(Arc::clone(&self.register), self.preprocessor());
        if self.config.sync_between_setup_and_online {
            executor = executor.sync_between_phases(self.comm.clone());
        }
        let mut stats = RunStats::default();
        executor.evaluate_setup_online(&mut stats).await?;
        Ok(stats)
    }

    /// Runs a two-way barrier with the peer.
    pub async fn sync(&self) -> Result<(), BackendError> {
        self.comm.sync().await.map_err(BackendError::from)
    }

    /// Resets the backend for another repetition: zeroes the register and
    /// replaces the providers. The previous circuit is dropped.
    pub fn reset(&mut self) {
        let comm = self.comm.clone();
        let config = self.config.clone();
        *self = Self::assemble(comm, config);
    }

    /// Shuts down the outgoing direction of the transport.
    pub fn shutdown(&self) {
        self.comm.shutdown();
    }
}

impl std::fmt::Debug for TwoPartyBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwoPartyBackend")
            .field("my_id", &self.my_id())
            .field("num_gates", &self.register.num_gates())
            .finish_non_exhaustive()
    }
}
