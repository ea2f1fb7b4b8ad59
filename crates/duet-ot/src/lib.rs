//! Oblivious transfer for the `duet` engine.
//!
//! The [`OtProvider`] is a duplex: each party may register batches of OTs in
//! either role before setup. [`OtProvider::send_setup`] and
//! [`OtProvider::receive_setup`] then run an IKNP-style OT extension on top
//! of 128 Chou-Orlandi base OTs per direction, producing a pool of random
//! OTs from which every registered vector takes a contiguous slice.
//!
//! Four flavors are supported, mirroring their use by the correlated-material
//! providers: general ([`OtProtocol::Got`]), random ([`OtProtocol::Rot`]),
//! XOR-correlated ([`OtProtocol::Xcot`]) and additively-correlated
//! ([`OtProtocol::Acot`]).

#![deny(
    unsafe_code,
    missing_docs,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all
)]

mod arith;
mod base;
mod error;
mod msgs;
mod provider;
mod receiver;
mod sender;

pub use base::{base_ot_receive, base_ot_send};
pub use error::OtError;
pub use provider::OtProvider;
pub use receiver::OtRecvVector;
pub use sender::OtSendVector;

use duet_core::{AesHash, BitVec, Block, Prg};
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// The computational security parameter: number of base OTs per direction.
pub const KAPPA: usize = 128;

/// The OT flavor of a registered vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OtProtocol {
    /// General 1-out-of-2 OT: the sender chooses both messages.
    Got,
    /// Random OT: both messages are random and revealed to the sender.
    Rot,
    /// XOR-correlated OT: the sender chooses the XOR of the two messages.
    Xcot,
    /// Additively-correlated OT: the sender chooses the ring difference of
    /// the two messages.
    Acot,
}

/// Derives the per-OT output key of `bitlen` bits from an extension row.
///
/// The row is hashed under the global OT index as tweak; keys longer than a
/// block are expanded through the PRG.
fn derive_key(hash: &AesHash, index: u64, row: Block, bitlen: usize) -> BitVec {
    let key = hash.tweak_hash(index, row);
    if bitlen <= Block::BIT_LEN {
        BitVec::from_bytes(key.to_bytes().to_vec(), Block::BIT_LEN).subset(0..bitlen)
    } else {
        Prg::from_seed(key).random_bits(bitlen)
    }
}
