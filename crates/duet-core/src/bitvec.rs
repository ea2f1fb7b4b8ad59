use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::Ring;

/// A packed sequence of bits.
///
/// The bit length is tracked separately from the byte buffer; unused bits in
/// the final byte are always zero. Bits are addressed in LSB0 order within
/// each byte.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BitVec {
    data: Vec<u8>,
    len: usize,
}

#[inline]
fn byte_len(bits: usize) -> usize {
    bits.div_ceil(8)
}

impl BitVec {
    /// Creates an empty bit vector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a bit vector of `len` zero bits.
    pub fn zeros(len: usize) -> Self {
        Self {
            data: vec![0; byte_len(len)],
            len,
        }
    }

    /// Samples a uniformly random bit vector of `len` bits.
    pub fn random<R: Rng + ?Sized>(rng: &mut R, len: usize) -> Self {
        let mut data = vec![0u8; byte_len(len)];
        rng.fill_bytes(&mut data);
        let mut bv = Self { data, len };
        bv.mask_tail();
        bv
    }

    /// Creates a bit vector from a byte buffer and an explicit bit length.
    ///
    /// # Panics
    ///
    /// Panics if `data` is not exactly `len.div_ceil(8)` bytes long.
    pub fn from_bytes(data: Vec<u8>, len: usize) -> Self {
        assert_eq!(data.len(), byte_len(len), "byte buffer length mismatch");
        let mut bv = Self { data, len };
        bv.mask_tail();
        bv
    }

    /// Creates a bit vector from a slice of bools.
    pub fn from_bools(bits: &[bool]) -> Self {
        let mut bv = Self::zeros(bits.len());
        for (i, &bit) in bits.iter().enumerate() {
            bv.set(i, bit);
        }
        bv
    }

    /// Creates a bit vector holding a single bit.
    pub fn single(bit: bool) -> Self {
        Self::from_bools(&[bit])
    }

    /// Returns the number of bits.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the vector holds no bits.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the underlying bytes. Unused bits of the last byte are zero.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Returns the bit at position `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i` is out of bounds.
    #[inline]
    pub fn get(&self, i: usize) -> bool {
        assert!(i < self.len, "bit index {i} out of bounds ({})", self.len);
        self.data[i / 8] >> (i % 8) & 1 == 1
    }

    /// Sets the bit at position `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i` is out of bounds.
    #[inline]
    pub fn set(&mut self, i: usize, bit: bool) {
        assert!(i < self.len, "bit index {i} out of bounds ({})", self.len);
        if bit {
            self.data[i / 8] |= 1 << (i % 8);
        } else {
            self.data[i / 8] &= !(1 << (i % 8));
        }
    }

    /// Appends a bit.
    pub fn push(&mut self, bit: bool) {
        if self.len % 8 == 0 {
            self.data.push(0);
        }
        self.len += 1;
        self.set(self.len - 1, bit);
    }

    /// Copies the bits in `range` into a new vector.
    ///
    /// # Panics
    ///
    /// Panics if the range is out of bounds.
    pub fn subset(&self, range: std::ops::Range<usize>) -> Self {
        assert!(range.start <= range.end && range.end <= self.len);
        let len = range.end - range.start;
        if range.start % 8 == 0 {
            let start = range.start / 8;
            let mut bv = Self {
                data: self.data[start..start + byte_len(len)].to_vec(),
                len,
            };
            bv.mask_tail();
            return bv;
        }
        let mut bv = Self::zeros(len);
        for i in 0..len {
            bv.set(i, self.get(range.start + i));
        }
        bv
    }

    /// Iterates over the bits.
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len).map(move |i| self.get(i))
    }

    /// Returns the bits as a vector of bools.
    pub fn to_bools(&self) -> Vec<bool> {
        self.iter().collect()
    }

    /// Reinterprets the bits as a vector of ring elements.
    ///
    /// # Panics
    ///
    /// Panics if the bit length is not a multiple of `T::BITS`.
    pub fn to_ring_vec<T: Ring>(&self) -> Vec<T> {
        assert_eq!(
            self.len % T::BITS,
            0,
            "bit length {} is not a multiple of {}",
            self.len,
            T::BITS
        );
        self.data
            .chunks_exact(T::BYTES)
            .map(T::from_le_bytes)
            .collect()
    }

    /// Packs a slice of ring elements into a bit vector of
    /// `values.len() * T::BITS` bits.
    pub fn from_ring_slice<T: Ring>(values: &[T]) -> Self {
        let mut data = vec![0u8; values.len() * T::BYTES];
        for (value, chunk) in values.iter().zip(data.chunks_exact_mut(T::BYTES)) {
            value.to_le_bytes(chunk);
        }
        Self {
            data,
            len: values.len() * T::BITS,
        }
    }

    /// Zeroes the unused bits of the final byte.
    fn mask_tail(&mut self) {
        let tail = self.len % 8;
        if tail != 0 {
            if let Some(last) = self.data.last_mut() {
                *last &= (1u8 << tail) - 1;
            }
        }
    }
}

macro_rules! impl_bit_op {
    ($op:ident, $fn:ident, $op_assign:ident, $fn_assign:ident, $apply:expr) => {
        impl std::ops::$op_assign<&BitVec> for BitVec {
            fn $fn_assign(&mut self, rhs: &BitVec) {
                assert_eq!(self.len, rhs.len, "bit length mismatch");
                let apply: fn(&mut u8, u8) = $apply;
                for (a, b) in self.data.iter_mut().zip(&rhs.data) {
                    apply(a, *b);
                }
            }
        }

        impl std::ops::$op<&BitVec> for &BitVec {
            type Output = BitVec;

            fn $fn(self, rhs: &BitVec) -> BitVec {
                let mut out = self.clone();
                std::ops::$op_assign::$fn_assign(&mut out, rhs);
                out
            }
        }
    };
}

impl_bit_op!(BitXor, bitxor, BitXorAssign, bitxor_assign, |a, b| *a ^= b);
impl_bit_op!(BitAnd, bitand, BitAndAssign, bitand_assign, |a, b| *a &= b);

impl std::ops::Not for &BitVec {
    type Output = BitVec;

    fn not(self) -> BitVec {
        let mut out = BitVec {
            data: self.data.iter().map(|b| !b).collect(),
            len: self.len,
        };
        out.mask_tail();
        out
    }
}

impl FromIterator<bool> for BitVec {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        let mut bv = BitVec::new();
        for bit in iter {
            bv.push(bit);
        }
        bv
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(1)]
    #[case(7)]
    #[case(8)]
    #[case(64)]
    #[case(131)]
    fn test_zeros(#[case] len: usize) {
        let bv = BitVec::zeros(len);
        assert_eq!(bv.len(), len);
        assert_eq!(bv.as_bytes().len(), len.div_ceil(8));
        assert!(bv.iter().all(|bit| !bit));
    }

    #[test]
    fn test_get_set_push() {
        let mut bv = BitVec::zeros(10);
        assert_eq!(bv.len(), 10);
        bv.set(3, true);
        bv.set(9, true);
        assert!(bv.get(3));
        assert!(!bv.get(4));
        assert!(bv.get(9));

        bv.push(true);
        assert_eq!(bv.len(), 11);
        assert!(bv.get(10));
    }

    #[test]
    fn test_bit_ops() {
        let a = BitVec::from_bools(&[true, true, false, false]);
        let b = BitVec::from_bools(&[true, false, true, false]);
        assert_eq!(&a ^ &b, BitVec::from_bools(&[false, true, true, false]));
        assert_eq!(&a & &b, BitVec::from_bools(&[true, false, false, false]));
        assert_eq!(!&a, BitVec::from_bools(&[false, false, true, true]));
    }

    #[test]
    fn test_not_masks_tail() {
        let a = BitVec::zeros(3);
        let inverted = !&a;
        assert_eq!(inverted.as_bytes(), &[0b111]);
    }

    #[test]
    fn test_subset() {
        let mut rng = ChaCha12Rng::seed_from_u64(0);
        let bv = BitVec::random(&mut rng, 100);

        let aligned = bv.subset(16..40);
        assert_eq!(aligned.len(), 24);
        for i in 0..24 {
            assert_eq!(aligned.get(i), bv.get(16 + i));
        }

        let unaligned = bv.subset(3..62);
        assert_eq!(unaligned.len(), 59);
        for i in 0..59 {
            assert_eq!(unaligned.get(i), bv.get(3 + i));
        }
    }

    #[test]
    fn test_ring_reinterpretation() {
        let values: Vec<u16> = vec![0x0102, 0xfffe, 42];
        let bv = BitVec::from_ring_slice(&values);
        assert_eq!(bv.len(), 48);
        assert_eq!(bv.to_ring_vec::<u16>(), values);
        assert_eq!(bv.to_ring_vec::<u8>(), vec![0x02, 0x01, 0xfe, 0xff, 42, 0]);
    }

    #[test]
    fn test_random_has_masked_tail() {
        let mut rng = ChaCha12Rng::seed_from_u64(1);
        for len in [1, 7, 9, 100] {
            let bv = BitVec::random(&mut rng, len);
            let tail = len % 8;
            if tail != 0 {
                assert_eq!(bv.as_bytes().last().unwrap() >> tail, 0);
            }
        }
    }
}
