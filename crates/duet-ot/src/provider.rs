use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use duet_comm::{sync::SetOnce, CommLayer};
use duet_core::AesHash;
use tracing::instrument;

use crate::{
    receiver::{run_receive_setup, ReceiverPool},
    sender::{run_send_setup, SenderPool},
    OtError, OtProtocol, OtRecvVector, OtSendVector,
};

struct RoleState<V> {
    vectors: HashMap<u64, Arc<V>>,
    next_id: u64,
    total: usize,
    setup_started: bool,
}

impl<V> Default for RoleState<V> {
    fn default() -> Self {
        Self {
            vectors: HashMap::new(),
            next_id: 0,
            total: 0,
            setup_started: false,
        }
    }
}

impl<V> RoleState<V> {
    /// Reserves a vector slot, returning its id and pool offset.
    fn reserve(&mut self, count: usize) -> Result<(u64, usize), OtError> {
        if self.setup_started {
            return Err(OtError::RegistrationClosed);
        }
        let id = self.next_id;
        self.next_id += 1;
        let offset = self.total;
        self.total += count;
        Ok((id, offset))
    }
}

/// The duplex OT provider of one party.
///
/// Vectors are registered in either role before setup;
/// [`Self::send_setup`] / [`Self::receive_setup`] then extend the base OTs
/// into a pool covering all registered demand. Registration order must
/// mirror between the parties: this party's `n`-th sender vector is the
/// peer's `n`-th receiver vector.
pub struct OtProvider {
    comm: CommLayer,
    hash: AesHash,
    send_state: Mutex<RoleState<OtSendVector>>,
    recv_state: Mutex<RoleState<OtRecvVector>>,
    sender_pool: Arc<SetOnce<Arc<SenderPool>>>,
    receiver_pool: Arc<SetOnce<Arc<ReceiverPool>>>,
}

impl OtProvider {
    /// Creates a provider on top of the communication layer.
    pub fn new(comm: CommLayer) -> Self {
        Self {
            comm,
            hash: AesHash::fixed(),
            send_state: Mutex::new(RoleState::default()),
            recv_state: Mutex::new(RoleState::default()),
            sender_pool: Arc::new(SetOnce::new()),
            receiver_pool: Arc::new(SetOnce::new()),
        }
    }

    /// Registers a batch of OTs with this party as sender.
    pub fn register_send(
        &self,
        bitlen: usize,
        count: usize,
        protocol: OtProtocol,
    ) -> Result<Arc<OtSendVector>, OtError> {
        let mut state = self.send_state.lock().unwrap();
        let (id, offset) = state.reserve(count)?;
        let vector = Arc::new(OtSendVector {
            id,
            protocol,
            bitlen,
            count,
            offset,
            comm: self.comm.clone(),
            hash: self.hash.clone(),
            pool: Arc::clone(&self.sender_pool),
            inputs: Mutex::new(None),
            outputs: SetOnce::new(),
        });
        state.vectors.insert(id, Arc::clone(&vector));
        Ok(vector)
    }

    /// Registers a batch of OTs with this party as receiver.
    pub fn register_receive(
        &self,
        bitlen: usize,
        count: usize,
        protocol: OtProtocol,
    ) -> Result<Arc<OtRecvVector>, OtError> {
        let mut state = self.recv_state.lock().unwrap();
        let (id, offset) = state.reserve(count)?;
        let vector = Arc::new(OtRecvVector {
            id,
            protocol,
            bitlen,
            count,
            offset,
            comm: self.comm.clone(),
            hash: self.hash.clone(),
            pool: Arc::clone(&self.receiver_pool),
            choices: Mutex::new(None),
            outputs: tokio::sync::Mutex::new(None),
        });
        state.vectors.insert(id, Arc::clone(&vector));
        Ok(vector)
    }

    /// Looks up a registered sender vector by id.
    pub fn sent_ot(&self, id: u64) -> Result<Arc<OtSendVector>, OtError> {
        self.send_state
            .lock()
            .unwrap()
            .vectors
            .get(&id)
            .cloned()
            .ok_or(OtError::UnknownVector(id))
    }

    /// Looks up a registered receiver vector by id.
    pub fn received_ot(&self, id: u64) -> Result<Arc<OtRecvVector>, OtError> {
        self.recv_state
            .lock()
            .unwrap()
            .vectors
            .get(&id)
            .cloned()
            .ok_or(OtError::UnknownVector(id))
    }

    /// Total number of OTs registered in the sender role.
    pub fn num_ots_sender(&self) -> usize {
        self.send_state.lock().unwrap().total
    }

    /// Total number of OTs registered in the receiver role.
    pub fn num_ots_receiver(&self) -> usize {
        self.recv_state.lock().unwrap().total
    }

    /// Runs the extension setup for the sender role.
    ///
    /// Closes registration for this role; typically run concurrently with
    /// [`Self::receive_setup`].
    #[instrument(level = "debug", skip(self), err)]
    pub async fn send_setup(&self) -> Result<(), OtError> {
        let total = {
            let mut state = self.send_state.lock().unwrap();
            state.setup_started = true;
            state.total
        };
        let pool = run_send_setup(&self.comm, total).await?;
        self.sender_pool.set(Arc::new(pool));
        Ok(())
    }

    /// Runs the extension setup for the receiver role.
    #[instrument(level = "debug", skip(self), err)]
    pub async fn receive_setup(&self) -> Result<(), OtError> {
        let total = {
            let mut state = self.recv_state.lock().unwrap();
            state.setup_started = true;
            state.total
        };
        let pool = run_receive_setup(&self.comm, total).await?;
        self.receiver_pool.set(Arc::new(pool));
        Ok(())
    }
}

impl std::fmt::Debug for OtProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OtProvider")
            .field("num_ots_sender", &self.num_ots_sender())
            .field("num_ots_receiver", &self.num_ots_receiver())
            .finish_non_exhaustive()
    }
}
