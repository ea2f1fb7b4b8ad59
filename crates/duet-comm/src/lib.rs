//! Typed two-party message channels for the `duet` engine.
//!
//! A [`Transport`] moves opaque frames between the two parties; the
//! [`CommLayer`] on top multiplexes typed messages keyed by a
//! [`MessageType`] and a numeric id. Protocol code registers a future for
//! the message it expects and suspends until the peer's frame arrives.
//!
//! The mux guarantees at-most-one pending future per key and FIFO delivery
//! of frames with the same key.

#![deny(
    unsafe_code,
    missing_docs,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all
)]

mod error;
mod layer;
mod message;
pub mod sync;
mod transport;

pub use error::CommError;
pub use layer::CommLayer;
pub use message::MessageType;
pub use transport::{memory_transport_pair, FrameSink, FrameStream, TcpTransport, Transport};

/// Identifies one of the two parties. Always `0` or `1`.
pub type PartyId = usize;

/// Returns the id of the other party.
#[inline]
pub fn other_party(id: PartyId) -> PartyId {
    1 - id
}
