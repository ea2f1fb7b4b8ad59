use duet_comm::PartyId;
use duet_core::BitVec;

use crate::{EngineError, Operation, Protocol, Wire, WireVector};

/// The application half of an input gate: fulfilled with the cleartext
/// values (one per SIMD lane) once the online phase runs.
pub type InputPromise<T> = tokio::sync::oneshot::Sender<Vec<T>>;

/// The application half of an output gate: resolves with the reconstructed
/// cleartext values when the gate's online phase completes.
pub type OutputFuture<T> = tokio::sync::oneshot::Receiver<Vec<T>>;

/// Who learns an output value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputRecipient {
    /// A single party.
    Party(PartyId),
    /// Both parties.
    Both,
}

impl OutputRecipient {
    /// Whether the given party receives the output.
    pub fn includes(&self, party: PartyId) -> bool {
        match self {
            Self::Party(p) => *p == party,
            Self::Both => true,
        }
    }
}

/// The uniform gate-construction surface of one protocol.
///
/// One factory instance exists per protocol per backend. All methods only
/// build and register gates; evaluation happens later through the executor.
/// Role checks happen at construction time: creating an input gate for the
/// wrong owner fails with [`EngineError::ProtocolRoleMismatch`].
pub trait GateFactory: Send + Sync {
    /// The protocol this factory builds gates for.
    fn protocol(&self) -> Protocol;

    /// Creates an 8-bit arithmetic input gate owned by this party.
    fn make_arithmetic_8_input_gate_my(
        &self,
        owner: PartyId,
        num_simd: usize,
    ) -> Result<(InputPromise<u8>, WireVector), EngineError>;

    /// Creates a 16-bit arithmetic input gate owned by this party.
    fn make_arithmetic_16_input_gate_my(
        &self,
        owner: PartyId,
        num_simd: usize,
    ) -> Result<(InputPromise<u16>, WireVector), EngineError>;

    /// Creates a 32-bit arithmetic input gate owned by this party.
    fn make_arithmetic_32_input_gate_my(
        &self,
        owner: PartyId,
        num_simd: usize,
    ) -> Result<(InputPromise<u32>, WireVector), EngineError>;

    /// Creates a 64-bit arithmetic input gate owned by this party.
    fn make_arithmetic_64_input_gate_my(
        &self,
        owner: PartyId,
        num_simd: usize,
    ) -> Result<(InputPromise<u64>, WireVector), EngineError>;

    /// Creates an 8-bit arithmetic input gate owned by the peer.
    fn make_arithmetic_8_input_gate_other(
        &self,
        owner: PartyId,
        num_simd: usize,
    ) -> Result<WireVector, EngineError>;

    /// Creates a 16-bit arithmetic input gate owned by the peer.
    fn make_arithmetic_16_input_gate_other(
        &self,
        owner: PartyId,
        num_simd: usize,
    ) -> Result<WireVector, EngineError>;

    /// Creates a 32-bit arithmetic input gate owned by the peer.
    fn make_arithmetic_32_input_gate_other(
        &self,
        owner: PartyId,
        num_simd: usize,
    ) -> Result<WireVector, EngineError>;

    /// Creates a 64-bit arithmetic input gate owned by the peer.
    fn make_arithmetic_64_input_gate_other(
        &self,
        owner: PartyId,
        num_simd: usize,
    ) -> Result<WireVector, EngineError>;

    /// Creates an 8-bit arithmetic output gate whose value this party learns.
    fn make_arithmetic_8_output_gate_my(
        &self,
        recipient: OutputRecipient,
        wires: &[Wire],
    ) -> Result<OutputFuture<u8>, EngineError>;

    /// Creates a 16-bit arithmetic output gate whose value this party learns.
    fn make_arithmetic_16_output_gate_my(
        &self,
        recipient: OutputRecipient,
        wires: &[Wire],
    ) -> Result<OutputFuture<u16>, EngineError>;

    /// Creates a 32-bit arithmetic output gate whose value this party learns.
    fn make_arithmetic_32_output_gate_my(
        &self,
        recipient: OutputRecipient,
        wires: &[Wire],
    ) -> Result<OutputFuture<u32>, EngineError>;

    /// Creates a 64-bit arithmetic output gate whose value this party learns.
    fn make_arithmetic_64_output_gate_my(
        &self,
        recipient: OutputRecipient,
        wires: &[Wire],
    ) -> Result<OutputFuture<u64>, EngineError>;

    /// Creates an arithmetic output gate whose value only the peer learns.
    fn make_arithmetic_output_gate_other(
        &self,
        recipient: PartyId,
        wires: &[Wire],
    ) -> Result<(), EngineError>;

    /// Creates a boolean input gate owned by this party.
    fn make_boolean_input_gate_my(
        &self,
        owner: PartyId,
        num_wires: usize,
        num_simd: usize,
    ) -> Result<(InputPromise<BitVec>, WireVector), EngineError>;

    /// Creates a boolean input gate owned by the peer.
    fn make_boolean_input_gate_other(
        &self,
        owner: PartyId,
        num_wires: usize,
        num_simd: usize,
    ) -> Result<WireVector, EngineError>;

    /// Creates a boolean output gate whose value this party learns.
    fn make_boolean_output_gate_my(
        &self,
        recipient: OutputRecipient,
        wires: &[Wire],
    ) -> Result<OutputFuture<BitVec>, EngineError>;

    /// Creates a boolean output gate whose value only the peer learns.
    fn make_boolean_output_gate_other(
        &self,
        recipient: PartyId,
        wires: &[Wire],
    ) -> Result<(), EngineError>;

    /// Creates a gate for a unary operation.
    fn make_unary_gate(
        &self,
        op: Operation,
        input: &[Wire],
    ) -> Result<WireVector, EngineError>;

    /// Creates a gate for a binary operation.
    fn make_binary_gate(
        &self,
        op: Operation,
        a: &[Wire],
        b: &[Wire],
    ) -> Result<WireVector, EngineError>;

    /// Converts the wires to the target protocol.
    fn convert(&self, target: Protocol, input: &[Wire]) -> Result<WireVector, EngineError>;
}
