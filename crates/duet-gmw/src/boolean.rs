//! Boolean-GMW gates: `x = x_0 ⊕ x_1` per bit.

use std::sync::Arc;

use async_trait::async_trait;
use duet_core::BitVec;
use duet_engine::{BooleanWire, EngineError, Gate, GateId, OutputRecipient};
use duet_triples::BinaryTriples;
use tokio::sync::oneshot;

use crate::GmwContext;

fn dropped_promise() -> EngineError {
    EngineError::InternalInvariant("input promise dropped before the online phase".into())
}

async fn gather_values(wires: &[Arc<BooleanWire>]) -> Vec<BitVec> {
    let mut values = Vec::with_capacity(wires.len());
    for wire in wires {
        values.push(wire.value().await);
    }
    values
}

/// Input gate run by the owner.
pub(crate) struct BooleanInputGateSender {
    pub(crate) id: GateId,
    pub(crate) ctx: Arc<GmwContext>,
    pub(crate) num_simd: usize,
    pub(crate) input: Option<oneshot::Receiver<Vec<BitVec>>>,
    pub(crate) outputs: Vec<Arc<BooleanWire>>,
    pub(crate) masks: Vec<BitVec>,
}

#[async_trait]
impl Gate for BooleanInputGateSender {
    fn id(&self) -> GateId {
        self.id
    }

    fn needs_setup(&self) -> bool {
        true
    }

    async fn evaluate_setup(&mut self) -> Result<(), EngineError> {
        let mut rng = rand::thread_rng();
        self.masks = (0..self.outputs.len())
            .map(|_| BitVec::random(&mut rng, self.num_simd))
            .collect();
        Ok(())
    }

    async fn evaluate_online(&mut self) -> Result<(), EngineError> {
        let values = self
            .input
            .take()
            .ok_or_else(dropped_promise)?
            .await
            .map_err(|_| dropped_promise())?;
        if values.len() != self.outputs.len()
            || values.iter().any(|bits| bits.len() != self.num_simd)
        {
            return Err(EngineError::InternalInvariant(
                "boolean input does not match the gate's wire shape".into(),
            ));
        }

        // The owner keeps the masks as its shares and sends x ⊕ r.
        let corrections: Vec<BitVec> = values
            .iter()
            .zip(&self.masks)
            .map(|(x, r)| x ^ r)
            .collect();
        self.ctx.send_msg(self.id, &corrections)?;
        for (wire, mask) in self.outputs.iter().zip(self.masks.drain(..)) {
            wire.publish(mask);
        }
        Ok(())
    }
}

/// Input gate run by the peer.
pub(crate) struct BooleanInputGateReceiver {
    pub(crate) id: GateId,
    pub(crate) ctx: Arc<GmwContext>,
    pub(crate) num_simd: usize,
    pub(crate) outputs: Vec<Arc<BooleanWire>>,
}

#[async_trait]
impl Gate for BooleanInputGateReceiver {
    fn id(&self) -> GateId {
        self.id
    }

    async fn evaluate_online(&mut self) -> Result<(), EngineError> {
        let shares: Vec<BitVec> = self.ctx.recv_msg(self.id).await?;
        if shares.len() != self.outputs.len()
            || shares.iter().any(|bits| bits.len() != self.num_simd)
        {
            return Err(EngineError::InternalInvariant(
                "peer sent boolean input of the wrong shape".into(),
            ));
        }
        for (wire, share) in self.outputs.iter().zip(shares) {
            wire.publish(share);
        }
        Ok(())
    }
}

/// Output gate: share exchange and reconstruction.
pub(crate) struct BooleanOutputGate {
    pub(crate) id: GateId,
    pub(crate) ctx: Arc<GmwContext>,
    pub(crate) inputs: Vec<Arc<BooleanWire>>,
    pub(crate) recipient: OutputRecipient,
    pub(crate) result: Option<oneshot::Sender<Vec<BitVec>>>,
}

#[async_trait]
impl Gate for BooleanOutputGate {
    fn id(&self) -> GateId {
        self.id
    }

    async fn evaluate_online(&mut self) -> Result<(), EngineError> {
        let my_shares = gather_values(&self.inputs).await;
        let my_id = self.ctx.my_id();

        if self.recipient.includes(duet_comm::other_party(my_id)) {
            self.ctx.send_msg(self.id, &my_shares)?;
        }
        if self.recipient.includes(my_id) {
            let peer_shares: Vec<BitVec> = self.ctx.recv_msg(self.id).await?;
            if peer_shares.len() != my_shares.len() {
                return Err(EngineError::InternalInvariant(
                    "peer sent boolean output of the wrong shape".into(),
                ));
            }
            let values: Vec<BitVec> = my_shares
                .iter()
                .zip(&peer_shares)
                .map(|(mine, theirs)| mine ^ theirs)
                .collect();
            if let Some(result) = self.result.take() {
                let _ = result.send(values);
            }
        }
        Ok(())
    }
}

/// Local XOR.
pub(crate) struct BooleanXorGate {
    pub(crate) id: GateId,
    pub(crate) a: Vec<Arc<BooleanWire>>,
    pub(crate) b: Vec<Arc<BooleanWire>>,
    pub(crate) outputs: Vec<Arc<BooleanWire>>,
}

#[async_trait]
impl Gate for BooleanXorGate {
    fn id(&self) -> GateId {
        self.id
    }

    async fn evaluate_online(&mut self) -> Result<(), EngineError> {
        for ((a, b), out) in self.a.iter().zip(&self.b).zip(&self.outputs) {
            let x = a.value().await;
            let y = b.value().await;
            out.publish(&x ^ &y);
        }
        Ok(())
    }
}

/// Negation: only party 0 flips its share.
pub(crate) struct BooleanInvGate {
    pub(crate) id: GateId,
    pub(crate) ctx: Arc<GmwContext>,
    pub(crate) inputs: Vec<Arc<BooleanWire>>,
    pub(crate) outputs: Vec<Arc<BooleanWire>>,
}

#[async_trait]
impl Gate for BooleanInvGate {
    fn id(&self) -> GateId {
        self.id
    }

    async fn evaluate_online(&mut self) -> Result<(), EngineError> {
        let flip = self.ctx.my_id() == 0;
        for (input, out) in self.inputs.iter().zip(&self.outputs) {
            let share = input.value().await;
            out.publish(if flip { !&share } else { share });
        }
        Ok(())
    }
}

/// Beaver AND: one binary triple per wire and lane, one round of exchange.
pub(crate) struct BooleanAndGate {
    pub(crate) id: GateId,
    pub(crate) ctx: Arc<GmwContext>,
    pub(crate) num_simd: usize,
    pub(crate) a: Vec<Arc<BooleanWire>>,
    pub(crate) b: Vec<Arc<BooleanWire>>,
    pub(crate) outputs: Vec<Arc<BooleanWire>>,
    pub(crate) mt_offset: usize,
    pub(crate) triples: Option<BinaryTriples>,
}

impl BooleanAndGate {
    fn triple_slice(triples: &BitVec, wire: usize, num_simd: usize) -> BitVec {
        triples.subset(wire * num_simd..(wire + 1) * num_simd)
    }
}

#[async_trait]
impl Gate for BooleanAndGate {
    fn id(&self) -> GateId {
        self.id
    }

    fn needs_setup(&self) -> bool {
        true
    }

    async fn evaluate_setup(&mut self) -> Result<(), EngineError> {
        let count = self.a.len() * self.num_simd;
        self.triples = Some(self.ctx.mts.binary_mts(self.mt_offset, count).await?);
        Ok(())
    }

    async fn evaluate_online(&mut self) -> Result<(), EngineError> {
        let triples = self
            .triples
            .take()
            .ok_or_else(|| EngineError::InternalInvariant("AND ran before setup".into()))?;
        tracing::trace!(gate = %self.id, wires = self.a.len(), lanes = self.num_simd, "beaver AND");
        let x = gather_values(&self.a).await;
        let y = gather_values(&self.b).await;

        let num_simd = self.num_simd;
        let d: Vec<BitVec> = x
            .iter()
            .enumerate()
            .map(|(j, x)| x ^ &Self::triple_slice(&triples.a, j, num_simd))
            .collect();
        let e: Vec<BitVec> = y
            .iter()
            .enumerate()
            .map(|(j, y)| y ^ &Self::triple_slice(&triples.b, j, num_simd))
            .collect();

        self.ctx.send_msg(self.id, &(d.clone(), e.clone()))?;
        let (peer_d, peer_e): (Vec<BitVec>, Vec<BitVec>) = self.ctx.recv_msg(self.id).await?;
        if peer_d.len() != d.len() || peer_e.len() != e.len() {
            return Err(EngineError::InternalInvariant(
                "peer sent AND shares of the wrong shape".into(),
            ));
        }

        let party_0 = self.ctx.my_id() == 0;
        for (j, out) in self.outputs.iter().enumerate() {
            let big_d = &d[j] ^ &peer_d[j];
            let big_e = &e[j] ^ &peer_e[j];
            let a = Self::triple_slice(&triples.a, j, num_simd);
            let b = Self::triple_slice(&triples.b, j, num_simd);
            let c = Self::triple_slice(&triples.c, j, num_simd);

            let mut z = &(&c ^ &(&big_d & &b)) ^ &(&big_e & &a);
            if party_0 {
                z ^= &(&big_d & &big_e);
            }
            out.publish(z);
        }
        Ok(())
    }
}
