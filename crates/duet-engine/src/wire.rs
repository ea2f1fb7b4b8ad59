use std::sync::Arc;

use duet_comm::sync::SetOnce;
use duet_core::{BitVec, Ring};

use crate::Protocol;

/// A boolean wire: one logical bit with `num_simd` parallel lanes.
///
/// The payload is this party's XOR share of each lane, published exactly
/// once when the producing gate finishes its online phase.
#[derive(Debug)]
pub struct BooleanWire {
    num_simd: usize,
    values: SetOnce<BitVec>,
}

impl BooleanWire {
    /// Creates an unevaluated wire with the given SIMD width.
    pub fn new(num_simd: usize) -> Arc<Self> {
        Arc::new(Self {
            num_simd,
            values: SetOnce::new(),
        })
    }

    /// The number of SIMD lanes.
    pub fn num_simd(&self) -> usize {
        self.num_simd
    }

    /// Publishes the share, waking all consumers.
    ///
    /// # Panics
    ///
    /// Panics if the lane count differs from the wire's SIMD width or the
    /// wire was already published.
    pub fn publish(&self, share: BitVec) {
        assert_eq!(share.len(), self.num_simd, "lane count mismatch");
        self.values.set(share);
    }

    /// Waits for the producing gate and returns the share.
    pub async fn value(&self) -> BitVec {
        self.values.wait().await
    }
}

/// An arithmetic wire: one ring element of width `T::BITS` with `num_simd`
/// parallel lanes, payload being this party's additive share per lane.
#[derive(Debug)]
pub struct ArithmeticWire<T> {
    num_simd: usize,
    values: SetOnce<Vec<T>>,
}

impl<T: Ring> ArithmeticWire<T> {
    /// Creates an unevaluated wire with the given SIMD width.
    pub fn new(num_simd: usize) -> Arc<Self> {
        Arc::new(Self {
            num_simd,
            values: SetOnce::new(),
        })
    }

    /// The number of SIMD lanes.
    pub fn num_simd(&self) -> usize {
        self.num_simd
    }

    /// Publishes the share, waking all consumers.
    ///
    /// # Panics
    ///
    /// Panics if the lane count differs from the wire's SIMD width or the
    /// wire was already published.
    pub fn publish(&self, share: Vec<T>) {
        assert_eq!(share.len(), self.num_simd, "lane count mismatch");
        self.values.set(share);
    }

    /// Waits for the producing gate and returns the share.
    pub async fn value(&self) -> Vec<T> {
        self.values.wait().await
    }
}

/// A protocol-tagged wire handle.
///
/// Wires are produced by exactly one gate and shared with all consumers;
/// cloning a `Wire` clones the handle, not the payload.
#[derive(Debug, Clone)]
pub enum Wire {
    /// A Boolean-GMW wire.
    BooleanGmw(Arc<BooleanWire>),
    /// An 8-bit Arithmetic-GMW wire.
    ArithmeticGmw8(Arc<ArithmeticWire<u8>>),
    /// A 16-bit Arithmetic-GMW wire.
    ArithmeticGmw16(Arc<ArithmeticWire<u16>>),
    /// A 32-bit Arithmetic-GMW wire.
    ArithmeticGmw32(Arc<ArithmeticWire<u32>>),
    /// A 64-bit Arithmetic-GMW wire.
    ArithmeticGmw64(Arc<ArithmeticWire<u64>>),
}

impl Wire {
    /// The wire's protocol tag.
    pub fn protocol(&self) -> Protocol {
        match self {
            Self::BooleanGmw(_) => Protocol::BooleanGmw,
            _ => Protocol::ArithmeticGmw,
        }
    }

    /// The wire's bit width: 1 for boolean wires, the ring width otherwise.
    pub fn bit_size(&self) -> usize {
        match self {
            Self::BooleanGmw(_) => 1,
            Self::ArithmeticGmw8(_) => 8,
            Self::ArithmeticGmw16(_) => 16,
            Self::ArithmeticGmw32(_) => 32,
            Self::ArithmeticGmw64(_) => 64,
        }
    }

    /// The number of SIMD lanes.
    pub fn num_simd(&self) -> usize {
        match self {
            Self::BooleanGmw(w) => w.num_simd(),
            Self::ArithmeticGmw8(w) => w.num_simd(),
            Self::ArithmeticGmw16(w) => w.num_simd(),
            Self::ArithmeticGmw32(w) => w.num_simd(),
            Self::ArithmeticGmw64(w) => w.num_simd(),
        }
    }
}

/// An ordered group of wires representing one logical value.
pub type WireVector = Vec<Wire>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wire_publish_and_read() {
        let wire = BooleanWire::new(4);
        let reader = {
            let wire = Arc::clone(&wire);
            tokio::spawn(async move { wire.value().await })
        };
        wire.publish(BitVec::from_bools(&[true, false, true, true]));
        assert_eq!(
            reader.await.unwrap(),
            BitVec::from_bools(&[true, false, true, true])
        );
    }

    #[tokio::test]
    async fn test_many_consumers() {
        let wire = ArithmeticWire::<u32>::new(2);
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let wire = Arc::clone(&wire);
                tokio::spawn(async move { wire.value().await })
            })
            .collect();
        wire.publish(vec![1, 2]);
        for reader in readers {
            assert_eq!(reader.await.unwrap(), vec![1, 2]);
        }
    }

    #[test]
    fn test_wire_tags() {
        let wire = Wire::ArithmeticGmw32(ArithmeticWire::<u32>::new(1));
        assert_eq!(wire.protocol(), Protocol::ArithmeticGmw);
        assert_eq!(wire.bit_size(), 32);
        assert_eq!(wire.num_simd(), 1);

        let wire = Wire::BooleanGmw(BooleanWire::new(8));
        assert_eq!(wire.protocol(), Protocol::BooleanGmw);
        assert_eq!(wire.bit_size(), 1);
    }
}
