//! GMW sharing protocols for the `duet` engine.
//!
//! Implements the two-party Arithmetic-GMW (`x = x_0 + x_1 mod 2^k`) and
//! Boolean-GMW (`x = x_0 ⊕ x_1`) sharings as gates over the engine's wire
//! types, and the conversion gates bridging them.
//!
//! Linear gates are local; multiplication and AND consume one fresh
//! multiplication triple per lane (Beaver), squaring one square pair, and
//! boolean→arithmetic conversion one shared bit per input bit and lane.
//! The [`GmwFactory`] exposes the uniform [`duet_engine::GateFactory`]
//! surface.

#![deny(
    unsafe_code,
    missing_docs,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all
)]

mod arithmetic;
mod boolean;
pub mod circuits;
mod context;
mod conversion;
mod factory;

pub use factory::GmwFactory;

pub(crate) use context::GmwContext;
