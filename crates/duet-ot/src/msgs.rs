//! Wire messages of the base OT and the extension.

use duet_core::BitVec;
use serde::{Deserialize, Serialize};

/// Mux id carrying the receiver's extension row masks.
pub(crate) const MASKS_ID: u64 = u64::MAX;

/// Mux id of the corrections flow for a vector (receiver to sender).
pub(crate) fn corrections_id(vector_id: u64) -> u64 {
    vector_id << 1
}

/// Mux id of the message flow for a vector (sender to receiver).
pub(crate) fn messages_id(vector_id: u64) -> u64 {
    (vector_id << 1) | 1
}

/// The base-OT sender's public key.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct BaseOtCommit {
    pub(crate) point: [u8; 32],
}

/// The base-OT receiver's blinded choice points.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct BaseOtResponse {
    pub(crate) points: Vec<[u8; 32]>,
}

/// The extension receiver's row masks, one per base OT.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ExtensionMasks {
    pub(crate) rows: Vec<Vec<u8>>,
}

/// Per-vector choice corrections (true choices XOR random choices).
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Corrections {
    pub(crate) bits: BitVec,
}

/// The sender's masked messages for one vector.
///
/// `Got` carries both masked messages per OT; the correlated flavors carry a
/// single masked message per OT.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) enum VectorMessages {
    Pairs(Vec<[BitVec; 2]>),
    Single(Vec<BitVec>),
}
