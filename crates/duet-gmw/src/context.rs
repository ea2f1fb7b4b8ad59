use std::sync::Arc;

use duet_comm::{CommLayer, MessageType, PartyId};
use duet_engine::{ArithmeticWire, EngineError, GateId, GateRegister, Wire};
use duet_triples::{MtProvider, SbProvider, SpProvider};
use serde::{de::DeserializeOwned, Serialize};

/// Shared state of the GMW protocol instance: the communication layer, the
/// gate register and the correlated-material providers.
pub(crate) struct GmwContext {
    pub(crate) comm: CommLayer,
    pub(crate) register: Arc<GateRegister>,
    pub(crate) mts: Arc<MtProvider>,
    pub(crate) sps: Arc<SpProvider>,
    pub(crate) sbs: Arc<SbProvider>,
}

impl GmwContext {
    pub(crate) fn my_id(&self) -> PartyId {
        self.comm.my_id()
    }

    /// Sends this gate's message to the peer.
    pub(crate) fn send_msg<T: Serialize>(&self, id: GateId, msg: &T) -> Result<(), EngineError> {
        self.comm
            .send(MessageType::GmwGate, id.0, msg)
            .map_err(EngineError::from)
    }

    /// Receives this gate's message from the peer.
    pub(crate) async fn recv_msg<T: DeserializeOwned>(&self, id: GateId) -> Result<T, EngineError> {
        self.comm
            .recv(MessageType::GmwGate, id.0)
            .await
            .map_err(EngineError::from)
    }
}

/// Maps the ring types onto their wire variants, the GMW equivalent of the
/// original's wire downcasts.
pub(crate) trait GmwRing: duet_core::Ring {
    /// Wraps a typed wire into the tagged handle.
    fn wrap_wire(wire: Arc<ArithmeticWire<Self>>) -> Wire;

    /// Extracts the typed wire, if the handle carries this width.
    fn unwrap_wire(wire: &Wire) -> Option<Arc<ArithmeticWire<Self>>>;
}

macro_rules! impl_gmw_ring {
    ($($ty:ty => $variant:ident),*) => {
        $(
            impl GmwRing for $ty {
                fn wrap_wire(wire: Arc<ArithmeticWire<Self>>) -> Wire {
                    Wire::$variant(wire)
                }

                fn unwrap_wire(wire: &Wire) -> Option<Arc<ArithmeticWire<Self>>> {
                    match wire {
                        Wire::$variant(inner) => Some(Arc::clone(inner)),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_gmw_ring!(
    u8 => ArithmeticGmw8,
    u16 => ArithmeticGmw16,
    u32 => ArithmeticGmw32,
    u64 => ArithmeticGmw64
);
