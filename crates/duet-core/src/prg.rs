use aes::{
    cipher::{BlockEncrypt, KeyInit},
    Aes128,
};
use rand::Rng;
use rand_core::{
    block::{BlockRng, BlockRngCore},
    CryptoRng, RngCore, SeedableRng,
};

use crate::{BitVec, Block};

// Number of AES blocks computed per refill.
const BLOCK_COUNT: usize = 8;

/// AES-128 in counter mode.
#[derive(Clone)]
struct PrgCore {
    aes: Aes128,
    counter: u64,
}

impl BlockRngCore for PrgCore {
    type Item = u32;
    type Results = [u32; 4 * BLOCK_COUNT];

    #[inline]
    fn generate(&mut self, results: &mut Self::Results) {
        let mut blocks: [aes::Block; BLOCK_COUNT] = std::array::from_fn(|_| {
            let mut bytes = [0u8; 16];
            bytes[..8].copy_from_slice(&self.counter.to_le_bytes());
            self.counter += 1;
            bytes.into()
        });
        self.aes.encrypt_blocks(&mut blocks);

        let out: &mut [u8] = bytemuck::cast_slice_mut(results);
        for (chunk, block) in out.chunks_exact_mut(16).zip(blocks) {
            let bytes: [u8; 16] = block.into();
            chunk.copy_from_slice(&bytes);
        }
    }
}

impl SeedableRng for PrgCore {
    type Seed = Block;

    #[inline]
    fn from_seed(seed: Self::Seed) -> Self {
        Self {
            aes: Aes128::new(&seed.to_bytes().into()),
            counter: 0,
        }
    }
}

impl CryptoRng for PrgCore {}

/// An AES-CTR pseudo-random generator.
///
/// Seeded with a [`Block`], e.g. an OT-derived key, and used wherever the
/// engine needs to expand a short seed into a long pseudo-random stream
/// (extension matrix rows, long OT messages).
#[derive(Clone)]
pub struct Prg(BlockRng<PrgCore>);

impl std::fmt::Debug for Prg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Prg { .. }")
    }
}

impl RngCore for Prg {
    #[inline]
    fn next_u32(&mut self) -> u32 {
        self.0.next_u32()
    }

    #[inline]
    fn next_u64(&mut self) -> u64 {
        self.0.next_u64()
    }

    #[inline]
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.0.fill_bytes(dest)
    }

    #[inline]
    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.0.try_fill_bytes(dest)
    }
}

impl SeedableRng for Prg {
    type Seed = Block;

    #[inline]
    fn from_seed(seed: Self::Seed) -> Self {
        Self(BlockRng::from_seed(seed))
    }
}

impl CryptoRng for Prg {}

impl Prg {
    /// Creates a generator with a random seed.
    pub fn new() -> Self {
        Self::from_seed(rand::random())
    }

    /// Generates a random block.
    #[inline]
    pub fn random_block(&mut self) -> Block {
        self.gen()
    }

    /// Generates a random bit vector of `len` bits.
    pub fn random_bits(&mut self, len: usize) -> BitVec {
        BitVec::random(self, len)
    }
}

impl Default for Prg {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prg_deterministic() {
        let seed = Block::from(42u128);
        let mut a = Prg::from_seed(seed);
        let mut b = Prg::from_seed(seed);
        assert_eq!(a.random_block(), b.random_block());
        assert_eq!(a.random_bits(100), b.random_bits(100));
    }

    #[test]
    fn test_prg_seeds_are_distinct() {
        let mut a = Prg::from_seed(Block::from(0u128));
        let mut b = Prg::from_seed(Block::from(1u128));
        assert_ne!(a.random_block(), b.random_block());
    }
}
