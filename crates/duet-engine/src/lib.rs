//! Gate graph and two-phase executor for the `duet` engine.
//!
//! A circuit is a set of [`Gate`]s registered with a [`GateRegister`] in
//! creation order. The [`GateExecutor`] first runs a preprocessing callable
//! (which drives the OT extension and the correlated-material providers),
//! then evaluates the setup phase of every gate that needs one, and finally
//! the online phase. Gates run as cooperative tasks and suspend only while
//! awaiting a peer message, correlated material, or a predecessor wire.
//!
//! Protocols plug in through the [`GateFactory`] trait and publish their
//! wire payloads through the shared [`Wire`] types.

#![deny(
    unsafe_code,
    missing_docs,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all
)]

mod error;
mod executor;
mod factory;
mod gate;
mod register;
mod wire;

pub use error::EngineError;
pub use executor::{GateExecutor, Preprocessor, RunStats};
pub use factory::{GateFactory, InputPromise, OutputFuture, OutputRecipient};
pub use gate::{Gate, GateId};
pub use register::GateRegister;
pub use wire::{ArithmeticWire, BooleanWire, Wire, WireVector};

use serde::{Deserialize, Serialize};

/// The secret-sharing protocol a wire or gate belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    /// Additive sharing over `Z_{2^k}`.
    ArithmeticGmw,
    /// XOR sharing of bits.
    BooleanGmw,
    /// Arithmetic BEAVY sharing (not implemented by this engine).
    ArithmeticBeavy,
    /// Boolean BEAVY sharing (not implemented by this engine).
    BooleanBeavy,
    /// Yao's garbled circuits (not implemented by this engine).
    Yao,
}

/// A primitive circuit operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    /// Boolean negation.
    Inv,
    /// Arithmetic negation.
    Neg,
    /// Squaring.
    Sqr,
    /// Bitwise XOR.
    Xor,
    /// Bitwise AND.
    And,
    /// Ring addition.
    Add,
    /// Ring subtraction.
    Sub,
    /// Ring multiplication.
    Mul,
}
