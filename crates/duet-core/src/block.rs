use bytemuck::{Pod, Zeroable};
use itybity::ToBits;
use rand::{
    distributions::{Distribution, Standard},
    Rng,
};
use serde::{Deserialize, Serialize};

/// A 128-bit value.
///
/// Blocks are the unit of the OT layer: base-OT seeds, extension matrix rows
/// and 128-bit OT messages are all blocks.
#[repr(transparent)]
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize,
)]
pub struct Block([u8; 16]);

impl Block {
    /// The all-zero block.
    pub const ZERO: Self = Self([0; 16]);

    /// The all-one block.
    pub const ONES: Self = Self([0xff; 16]);

    /// The length of a block in bits.
    pub const BIT_LEN: usize = 128;

    /// Creates a block from bytes.
    #[inline]
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Returns the bytes of the block.
    #[inline]
    pub const fn to_bytes(self) -> [u8; 16] {
        self.0
    }

    /// Samples a uniformly random block.
    #[inline]
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(rng.gen())
    }

    /// Returns the bits of the block in LSB0 order.
    pub fn to_lsb0_vec(self) -> Vec<bool> {
        self.0.iter().flat_map(|byte| byte.to_lsb0_vec()).collect()
    }

    /// Returns the bit at position `i` (LSB0 order).
    #[inline]
    pub fn bit(&self, i: usize) -> bool {
        assert!(i < Self::BIT_LEN);
        self.0[i / 8] >> (i % 8) & 1 == 1
    }
}

impl From<[u8; 16]> for Block {
    #[inline]
    fn from(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }
}

impl From<Block> for [u8; 16] {
    #[inline]
    fn from(block: Block) -> Self {
        block.0
    }
}

impl From<u128> for Block {
    #[inline]
    fn from(value: u128) -> Self {
        Self(value.to_le_bytes())
    }
}

impl From<Block> for u128 {
    #[inline]
    fn from(block: Block) -> Self {
        u128::from_le_bytes(block.0)
    }
}

impl AsRef<[u8]> for Block {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl AsMut<[u8]> for Block {
    #[inline]
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

impl std::ops::BitXor for Block {
    type Output = Self;

    #[inline]
    fn bitxor(mut self, rhs: Self) -> Self {
        self ^= rhs;
        self
    }
}

impl std::ops::BitXorAssign for Block {
    #[inline]
    fn bitxor_assign(&mut self, rhs: Self) {
        for (a, b) in self.0.iter_mut().zip(rhs.0) {
            *a ^= b;
        }
    }
}

impl std::ops::BitAnd for Block {
    type Output = Self;

    #[inline]
    fn bitand(mut self, rhs: Self) -> Self {
        for (a, b) in self.0.iter_mut().zip(rhs.0) {
            *a &= b;
        }
        self
    }
}

impl Distribution<Block> for Standard {
    #[inline]
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Block {
        Block(rng.gen())
    }
}
