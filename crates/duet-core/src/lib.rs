//! Core primitives for the `duet` two-party computation engine.
//!
//! This crate provides the data types shared by every layer of the engine:
//! 128-bit [`Block`]s, the packed [`BitVec`] bit container, the AES-CTR
//! [`Prg`], a fixed-key correlation-robust hash, and the [`Ring`] trait
//! abstracting over the `2^k` integer rings the arithmetic protocols
//! compute in.
//!
//! This crate contains no protocol logic and performs no I/O.

#![deny(
    unsafe_code,
    missing_docs,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all
)]

mod aes_hash;
mod bitvec;
mod block;
mod prg;
mod ring;
mod transpose;

pub use aes_hash::AesHash;
pub use bitvec::BitVec;
pub use block::Block;
pub use prg::Prg;
pub use ring::Ring;
pub use transpose::transpose_bits;
