use bytemuck::Pod;
use rand::Rng;
use serde::{de::DeserializeOwned, Serialize};

/// An element of the ring `Z_{2^k}` for `k` in `{8, 16, 32, 64}`.
///
/// All arithmetic is wrapping, i.e. reduction modulo `2^k` is implicit.
/// The trait is implemented for the unsigned integer primitives and is the
/// value type of arithmetic wires, multiplication triples, square pairs and
/// additively-correlated OTs.
pub trait Ring:
    Copy
    + Clone
    + std::fmt::Debug
    + std::fmt::Display
    + Default
    + PartialEq
    + Eq
    + Send
    + Sync
    + Pod
    + Serialize
    + DeserializeOwned
    + 'static
{
    /// The bit width of the ring.
    const BITS: usize;

    /// The byte width of the ring.
    const BYTES: usize;

    /// The additive identity.
    const ZERO: Self;

    /// The multiplicative identity.
    const ONE: Self;

    /// Wrapping addition.
    fn wrapping_add(self, rhs: Self) -> Self;

    /// Wrapping subtraction.
    fn wrapping_sub(self, rhs: Self) -> Self;

    /// Wrapping multiplication.
    fn wrapping_mul(self, rhs: Self) -> Self;

    /// Wrapping negation.
    fn wrapping_neg(self) -> Self;

    /// Wrapping left shift.
    fn wrapping_shl(self, shift: u32) -> Self;

    /// Returns the bit at position `i` (LSB0 order).
    fn bit(self, i: usize) -> bool;

    /// Reads an element from the first `Self::BYTES` bytes in little-endian
    /// order.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is shorter than `Self::BYTES`.
    fn from_le_bytes(bytes: &[u8]) -> Self;

    /// Writes the element into `out` in little-endian order.
    ///
    /// # Panics
    ///
    /// Panics if `out` is shorter than `Self::BYTES`.
    fn to_le_bytes(self, out: &mut [u8]);

    /// Lifts a bit into the ring: `true` maps to one, `false` to zero.
    #[inline]
    fn from_bit(bit: bool) -> Self {
        if bit {
            Self::ONE
        } else {
            Self::ZERO
        }
    }

    /// Samples a uniformly random element.
    fn random<R: Rng + ?Sized>(rng: &mut R) -> Self;
}

macro_rules! impl_ring {
    ($($ty:ty),*) => {
        $(
            impl Ring for $ty {
                const BITS: usize = <$ty>::BITS as usize;
                const BYTES: usize = <$ty>::BITS as usize / 8;
                const ZERO: Self = 0;
                const ONE: Self = 1;

                #[inline]
                fn wrapping_add(self, rhs: Self) -> Self {
                    <$ty>::wrapping_add(self, rhs)
                }

                #[inline]
                fn wrapping_sub(self, rhs: Self) -> Self {
                    <$ty>::wrapping_sub(self, rhs)
                }

                #[inline]
                fn wrapping_mul(self, rhs: Self) -> Self {
                    <$ty>::wrapping_mul(self, rhs)
                }

                #[inline]
                fn wrapping_neg(self) -> Self {
                    <$ty>::wrapping_neg(self)
                }

                #[inline]
                fn wrapping_shl(self, shift: u32) -> Self {
                    <$ty>::wrapping_shl(self, shift)
                }

                #[inline]
                fn bit(self, i: usize) -> bool {
                    debug_assert!(i < Self::BITS as usize);
                    self >> i & 1 == 1
                }

                #[inline]
                fn from_le_bytes(bytes: &[u8]) -> Self {
                    <$ty>::from_le_bytes(bytes[..Self::BYTES].try_into().expect("slice has ring width"))
                }

                #[inline]
                fn to_le_bytes(self, out: &mut [u8]) {
                    out[..Self::BYTES].copy_from_slice(&self.to_le_bytes());
                }

                #[inline]
                fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
                    rng.gen()
                }
            }
        )*
    };
}

impl_ring!(u8, u16, u32, u64);
