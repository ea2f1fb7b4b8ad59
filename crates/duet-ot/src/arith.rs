//! Little-endian modular arithmetic on packed bit vectors.
//!
//! The additively-correlated OT operates on ring elements of the vector's
//! registered bit length. Working on the packed little-endian encoding keeps
//! the OT layer monomorphic; consumers reinterpret via [`BitVec::to_ring_vec`].

use duet_core::BitVec;

/// Adds two equal-length bit vectors as little-endian integers modulo
/// `2^len`.
pub(crate) fn add_mod(a: &BitVec, b: &BitVec) -> BitVec {
    assert_eq!(a.len(), b.len(), "operand length mismatch");
    let mut out = Vec::with_capacity(a.as_bytes().len());
    let mut carry = 0u16;
    for (&x, &y) in a.as_bytes().iter().zip(b.as_bytes()) {
        let sum = x as u16 + y as u16 + carry;
        out.push(sum as u8);
        carry = sum >> 8;
    }
    BitVec::from_bytes(out, a.len())
}

/// Subtracts `b` from `a` as little-endian integers modulo `2^len`.
pub(crate) fn sub_mod(a: &BitVec, b: &BitVec) -> BitVec {
    assert_eq!(a.len(), b.len(), "operand length mismatch");
    let mut out = Vec::with_capacity(a.as_bytes().len());
    let mut borrow = 0i16;
    for (&x, &y) in a.as_bytes().iter().zip(b.as_bytes()) {
        let diff = x as i16 - y as i16 - borrow;
        out.push(diff as u8);
        borrow = i16::from(diff < 0);
    }
    BitVec::from_bytes(out, a.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enc(x: u32) -> BitVec {
        BitVec::from_ring_slice(&[x])
    }

    #[test]
    fn test_add_mod() {
        assert_eq!(add_mod(&enc(1), &enc(2)).to_ring_vec::<u32>(), vec![3]);
        assert_eq!(
            add_mod(&enc(u32::MAX), &enc(5)).to_ring_vec::<u32>(),
            vec![4]
        );
    }

    #[test]
    fn test_sub_mod() {
        assert_eq!(sub_mod(&enc(7), &enc(2)).to_ring_vec::<u32>(), vec![5]);
        assert_eq!(
            sub_mod(&enc(0), &enc(1)).to_ring_vec::<u32>(),
            vec![u32::MAX]
        );
    }

    #[test]
    fn test_add_sub_roundtrip() {
        let a = enc(0xdead_beef);
        let b = enc(0x1234_5678);
        assert_eq!(sub_mod(&add_mod(&a, &b), &b), a);
    }

    #[test]
    fn test_partial_byte_width() {
        // 4-bit ring: 12 + 7 = 3 mod 16.
        let a = BitVec::from_bytes(vec![12], 4);
        let b = BitVec::from_bytes(vec![7], 4);
        assert_eq!(add_mod(&a, &b).as_bytes(), &[3]);
    }
}
