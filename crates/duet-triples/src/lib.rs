//! Correlated-material providers for the `duet` engine.
//!
//! Three providers turn the OT extension pool into the bulk preprocessing
//! material the online phase consumes:
//!
//! - [`MtProvider`]: multiplication triples `(a, b, c)` with `c = a·b`,
//!   boolean (AND) and for each integer width,
//! - [`SpProvider`]: square pairs `(a, c)` with `c = a²`,
//! - [`SbProvider`]: shared bits known both as boolean XOR shares and as
//!   additive shares in `Z_{2^k}`.
//!
//! All three follow the same two-pass lifecycle: consumers reserve offsets
//! with `request_*` while the circuit is built, `pre_setup` samples local
//! shares and registers the OT demand, `setup` drives the OT vectors and
//! assembles the pools, and the blocking getters hand out sub-range copies
//! once the provider has finished.

#![deny(
    unsafe_code,
    missing_docs,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all
)]

mod error;
mod mt;
mod sb;
mod sp;

pub use error::TripleError;
pub use mt::{BinaryTriples, MtProvider, RingTriples};
pub use sb::{SbProvider, SharedBits};
pub use sp::{SpProvider, SquarePairs};

/// Maximum number of OTs registered per vector; larger demand is split into
/// batches consumed in FIFO order.
pub(crate) const MAX_BATCH_SIZE: usize = 1 << 16;
