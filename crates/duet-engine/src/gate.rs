use async_trait::async_trait;

use crate::EngineError;

/// A unique, strictly ascending gate identifier.
///
/// Assigned by the [`crate::GateRegister`]; `id % 2` deterministically picks
/// protocol roles that must be unique per gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GateId(pub u64);

impl GateId {
    /// The party selected for this gate's distinguished role.
    pub fn role_party(&self) -> duet_comm::PartyId {
        (self.0 % 2) as duet_comm::PartyId
    }
}

impl std::fmt::Display for GateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "gate {}", self.0)
    }
}

/// One node of the circuit.
///
/// A gate declares which of the two phases it participates in and implements
/// them as suspendable computations. During a phase, a gate may await
/// predecessor wires, peer messages and correlated material; the executor
/// imposes no further ordering within the phase.
#[async_trait]
pub trait Gate: Send {
    /// The gate's id.
    fn id(&self) -> GateId;

    /// Whether [`Self::evaluate_setup`] must run.
    fn needs_setup(&self) -> bool {
        false
    }

    /// Whether [`Self::evaluate_online`] must run.
    fn needs_online(&self) -> bool {
        true
    }

    /// Input-independent preprocessing work.
    async fn evaluate_setup(&mut self) -> Result<(), EngineError> {
        Ok(())
    }

    /// Input-dependent online work.
    async fn evaluate_online(&mut self) -> Result<(), EngineError>;
}
