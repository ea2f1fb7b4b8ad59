use std::sync::Arc;

use duet_comm::{CommError, PartyId};
use duet_ot::OtError;
use duet_triples::TripleError;

use crate::{Operation, Protocol};

/// An error raised while building or evaluating the gate graph.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A gate was created for the wrong party.
    #[error("party {party} cannot take this role for the gate")]
    ProtocolRoleMismatch {
        /// The party that attempted the construction.
        party: PartyId,
    },
    /// The protocol does not implement the operation.
    #[error("{protocol:?} does not support {op:?}")]
    UnsupportedOperation {
        /// The requested operation.
        op: Operation,
        /// The protocol it was requested for.
        protocol: Protocol,
    },
    /// The engine does not implement the protocol.
    #[error("protocol {0:?} is not available")]
    UnsupportedProtocol(Protocol),
    /// No conversion between the two protocols exists.
    #[error("no conversion from {from:?} to {to:?}")]
    UnsupportedConversion {
        /// Source protocol.
        from: Protocol,
        /// Target protocol.
        to: Protocol,
    },
    /// Wires of different bit sizes were combined.
    #[error("bit size mismatch: {0} vs {1}")]
    BitSizeMismatch(usize, usize),
    /// A gate received the wrong number of wires.
    #[error("wire count mismatch: expected {expected}, got {actual}")]
    WireCountMismatch {
        /// Expected number of wires.
        expected: usize,
        /// Provided number of wires.
        actual: usize,
    },
    /// The transport failed.
    #[error("transport error: {0}")]
    Transport(CommError),
    /// The peer aborted the protocol.
    #[error("peer aborted the protocol")]
    PeerAborted,
    /// The OT layer failed.
    #[error(transparent)]
    Ot(#[from] OtError),
    /// A correlated-material provider failed.
    #[error(transparent)]
    Triples(#[from] TripleError),
    /// An internal assertion failed during a phase.
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),
    /// Another gate of the same run failed first.
    #[error("a gate failed: {0}")]
    GateFailed(Arc<EngineError>),
}

impl From<CommError> for EngineError {
    fn from(err: CommError) -> Self {
        match err {
            CommError::PeerClosed => Self::PeerAborted,
            other => Self::Transport(other),
        }
    }
}
