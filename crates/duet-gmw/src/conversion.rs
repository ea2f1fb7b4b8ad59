//! Conversion gates bridging the boolean and arithmetic sharings.

use std::sync::Arc;

use async_trait::async_trait;
use duet_core::{BitVec, Ring};
use duet_engine::{ArithmeticWire, BooleanWire, EngineError, Gate, GateId};
use duet_triples::SharedBits;

use crate::GmwContext;

/// Boolean→arithmetic conversion.
///
/// Each of the `k` input bits is blinded with a shared bit, the blinded bit
/// is revealed, and the arithmetic sharing is recombined linearly:
/// `x_j = t_j ⊕ d_j` with `t_j` public, so
/// `[x_j] = t_j + (1 - 2·t_j)·[d_j]` and `[x] = Σ_j 2^j·[x_j]`.
pub(crate) struct BooleanToArithmeticGate<T: Ring> {
    pub(crate) id: GateId,
    pub(crate) ctx: Arc<GmwContext>,
    pub(crate) num_simd: usize,
    pub(crate) inputs: Vec<Arc<BooleanWire>>,
    pub(crate) output: Arc<ArithmeticWire<T>>,
    pub(crate) sb_offset: usize,
    pub(crate) shared_bits: Option<SharedBits<T>>,
}

#[async_trait]
impl<T: Ring> Gate for BooleanToArithmeticGate<T> {
    fn id(&self) -> GateId {
        self.id
    }

    fn needs_setup(&self) -> bool {
        true
    }

    async fn evaluate_setup(&mut self) -> Result<(), EngineError> {
        let count = self.inputs.len() * self.num_simd;
        self.shared_bits = Some(self.ctx.sbs.sbs::<T>(self.sb_offset, count).await?);
        Ok(())
    }

    async fn evaluate_online(&mut self) -> Result<(), EngineError> {
        let sbs = self
            .shared_bits
            .take()
            .ok_or_else(|| EngineError::InternalInvariant("conversion ran before setup".into()))?;

        let num_simd = self.num_simd;
        let mut blinded = Vec::with_capacity(self.inputs.len());
        for (j, wire) in self.inputs.iter().enumerate() {
            let x = wire.value().await;
            let blind = sbs.boolean.subset(j * num_simd..(j + 1) * num_simd);
            blinded.push(&x ^ &blind);
        }

        self.ctx.send_msg(self.id, &blinded)?;
        let peer_blinded: Vec<BitVec> = self.ctx.recv_msg(self.id).await?;
        if peer_blinded.len() != blinded.len()
            || peer_blinded.iter().any(|bits| bits.len() != num_simd)
        {
            return Err(EngineError::InternalInvariant(
                "peer sent conversion bits of the wrong shape".into(),
            ));
        }

        let party_0 = self.ctx.my_id() == 0;
        let values: Vec<T> = (0..num_simd)
            .map(|lane| {
                let mut acc = T::ZERO;
                for j in 0..self.inputs.len() {
                    let revealed = blinded[j].get(lane) ^ peer_blinded[j].get(lane);
                    let d = sbs.arith[j * num_simd + lane];
                    // t + (1 - 2t)·d, with the public t added by party 0.
                    let term = if revealed {
                        let t = if party_0 { T::ONE } else { T::ZERO };
                        t.wrapping_sub(d)
                    } else {
                        d
                    };
                    acc = acc.wrapping_add(term.wrapping_shl(j as u32));
                }
                acc
            })
            .collect();
        self.output.publish(values);
        Ok(())
    }
}

/// Locally decomposes an arithmetic sharing into two boolean sharings, one
/// per party's summand.
///
/// The first `k` output wires share party 0's summand (`(bits(x_0), 0)`),
/// the second `k` wires party 1's. A boolean adder circuit on the two
/// halves completes the arithmetic→boolean conversion.
pub(crate) struct ArithmeticShareSplitGate<T: Ring> {
    pub(crate) id: GateId,
    pub(crate) ctx: Arc<GmwContext>,
    pub(crate) input: Arc<ArithmeticWire<T>>,
    pub(crate) outputs: Vec<Arc<BooleanWire>>,
}

#[async_trait]
impl<T: Ring> Gate for ArithmeticShareSplitGate<T> {
    fn id(&self) -> GateId {
        self.id
    }

    async fn evaluate_online(&mut self) -> Result<(), EngineError> {
        let share = self.input.value().await;
        let num_simd = share.len();
        let my_id = self.ctx.my_id();

        for (index, wire) in self.outputs.iter().enumerate() {
            let owner = index / T::BITS;
            let bit = index % T::BITS;
            if owner == my_id {
                let bits: BitVec = share.iter().map(|&x| x.bit(bit)).collect();
                wire.publish(bits);
            } else {
                wire.publish(BitVec::zeros(num_simd));
            }
        }
        Ok(())
    }
}
