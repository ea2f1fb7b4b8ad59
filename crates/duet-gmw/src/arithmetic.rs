//! Arithmetic-GMW gates: `x = x_0 + x_1 mod 2^k`.

use std::sync::Arc;

use async_trait::async_trait;
use duet_core::Ring;
use duet_engine::{ArithmeticWire, EngineError, Gate, GateId, OutputRecipient};
use duet_triples::{RingTriples, SquarePairs};
use tokio::sync::oneshot;

use crate::GmwContext;

fn dropped_promise() -> EngineError {
    EngineError::InternalInvariant("input promise dropped before the online phase".into())
}

/// Input gate run by the owner: keeps the random summand, sends the
/// correction.
pub(crate) struct ArithmeticInputGateSender<T: Ring> {
    pub(crate) id: GateId,
    pub(crate) ctx: Arc<GmwContext>,
    pub(crate) num_simd: usize,
    pub(crate) input: Option<oneshot::Receiver<Vec<T>>>,
    pub(crate) output: Arc<ArithmeticWire<T>>,
    pub(crate) mask: Vec<T>,
}

#[async_trait]
impl<T: Ring> Gate for ArithmeticInputGateSender<T> {
    fn id(&self) -> GateId {
        self.id
    }

    fn needs_setup(&self) -> bool {
        true
    }

    async fn evaluate_setup(&mut self) -> Result<(), EngineError> {
        let mut rng = rand::thread_rng();
        self.mask = (0..self.num_simd).map(|_| T::random(&mut rng)).collect();
        Ok(())
    }

    async fn evaluate_online(&mut self) -> Result<(), EngineError> {
        let values = self
            .input
            .take()
            .ok_or_else(dropped_promise)?
            .await
            .map_err(|_| dropped_promise())?;
        if values.len() != self.num_simd {
            return Err(EngineError::InternalInvariant(format!(
                "expected {} input lanes, got {}",
                self.num_simd,
                values.len()
            )));
        }

        // The owner keeps the mask as its share and sends x - r.
        let correction: Vec<T> = values
            .iter()
            .zip(&self.mask)
            .map(|(&x, &r)| x.wrapping_sub(r))
            .collect();
        self.ctx.send_msg(self.id, &correction)?;
        self.output.publish(std::mem::take(&mut self.mask));
        Ok(())
    }
}

/// Input gate run by the peer: its share is the received correction.
pub(crate) struct ArithmeticInputGateReceiver<T: Ring> {
    pub(crate) id: GateId,
    pub(crate) ctx: Arc<GmwContext>,
    pub(crate) num_simd: usize,
    pub(crate) output: Arc<ArithmeticWire<T>>,
}

#[async_trait]
impl<T: Ring> Gate for ArithmeticInputGateReceiver<T> {
    fn id(&self) -> GateId {
        self.id
    }

    async fn evaluate_online(&mut self) -> Result<(), EngineError> {
        let share: Vec<T> = self.ctx.recv_msg(self.id).await?;
        if share.len() != self.num_simd {
            return Err(EngineError::InternalInvariant(
                "peer sent wrong number of input lanes".into(),
            ));
        }
        self.output.publish(share);
        Ok(())
    }
}

/// Output gate: the parties exchange shares and the recipients reconstruct.
pub(crate) struct ArithmeticOutputGate<T: Ring> {
    pub(crate) id: GateId,
    pub(crate) ctx: Arc<GmwContext>,
    pub(crate) input: Arc<ArithmeticWire<T>>,
    pub(crate) recipient: OutputRecipient,
    pub(crate) result: Option<oneshot::Sender<Vec<T>>>,
}

#[async_trait]
impl<T: Ring> Gate for ArithmeticOutputGate<T> {
    fn id(&self) -> GateId {
        self.id
    }

    async fn evaluate_online(&mut self) -> Result<(), EngineError> {
        let my_share = self.input.value().await;
        let my_id = self.ctx.my_id();

        if self.recipient.includes(duet_comm::other_party(my_id)) {
            self.ctx.send_msg(self.id, &my_share)?;
        }
        if self.recipient.includes(my_id) {
            let peer_share: Vec<T> = self.ctx.recv_msg(self.id).await?;
            if peer_share.len() != my_share.len() {
                return Err(EngineError::InternalInvariant(
                    "peer sent wrong number of output lanes".into(),
                ));
            }
            let values = my_share
                .iter()
                .zip(&peer_share)
                .map(|(&a, &b)| a.wrapping_add(b))
                .collect();
            if let Some(result) = self.result.take() {
                let _ = result.send(values);
            }
        }
        Ok(())
    }
}

/// Local addition.
pub(crate) struct ArithmeticAddGate<T: Ring> {
    pub(crate) id: GateId,
    pub(crate) a: Arc<ArithmeticWire<T>>,
    pub(crate) b: Arc<ArithmeticWire<T>>,
    pub(crate) output: Arc<ArithmeticWire<T>>,
}

#[async_trait]
impl<T: Ring> Gate for ArithmeticAddGate<T> {
    fn id(&self) -> GateId {
        self.id
    }

    async fn evaluate_online(&mut self) -> Result<(), EngineError> {
        let a = self.a.value().await;
        let b = self.b.value().await;
        self.output.publish(
            a.iter()
                .zip(&b)
                .map(|(&x, &y)| x.wrapping_add(y))
                .collect(),
        );
        Ok(())
    }
}

/// Local subtraction.
pub(crate) struct ArithmeticSubGate<T: Ring> {
    pub(crate) id: GateId,
    pub(crate) a: Arc<ArithmeticWire<T>>,
    pub(crate) b: Arc<ArithmeticWire<T>>,
    pub(crate) output: Arc<ArithmeticWire<T>>,
}

#[async_trait]
impl<T: Ring> Gate for ArithmeticSubGate<T> {
    fn id(&self) -> GateId {
        self.id
    }

    async fn evaluate_online(&mut self) -> Result<(), EngineError> {
        let a = self.a.value().await;
        let b = self.b.value().await;
        self.output.publish(
            a.iter()
                .zip(&b)
                .map(|(&x, &y)| x.wrapping_sub(y))
                .collect(),
        );
        Ok(())
    }
}

/// Local negation.
pub(crate) struct ArithmeticNegGate<T: Ring> {
    pub(crate) id: GateId,
    pub(crate) input: Arc<ArithmeticWire<T>>,
    pub(crate) output: Arc<ArithmeticWire<T>>,
}

#[async_trait]
impl<T: Ring> Gate for ArithmeticNegGate<T> {
    fn id(&self) -> GateId {
        self.id
    }

    async fn evaluate_online(&mut self) -> Result<(), EngineError> {
        let input = self.input.value().await;
        self.output
            .publish(input.iter().map(|&x| x.wrapping_neg()).collect());
        Ok(())
    }
}

/// Beaver multiplication: consumes one triple per lane, one round of share
/// exchange.
pub(crate) struct ArithmeticMulGate<T: Ring> {
    pub(crate) id: GateId,
    pub(crate) ctx: Arc<GmwContext>,
    pub(crate) num_simd: usize,
    pub(crate) a: Arc<ArithmeticWire<T>>,
    pub(crate) b: Arc<ArithmeticWire<T>>,
    pub(crate) output: Arc<ArithmeticWire<T>>,
    pub(crate) mt_offset: usize,
    pub(crate) triples: Option<RingTriples<T>>,
}

#[async_trait]
impl<T: Ring> Gate for ArithmeticMulGate<T> {
    fn id(&self) -> GateId {
        self.id
    }

    fn needs_setup(&self) -> bool {
        true
    }

    async fn evaluate_setup(&mut self) -> Result<(), EngineError> {
        self.triples = Some(self.ctx.mts.mts::<T>(self.mt_offset, self.num_simd).await?);
        Ok(())
    }

    async fn evaluate_online(&mut self) -> Result<(), EngineError> {
        let triples = self
            .triples
            .take()
            .ok_or_else(|| EngineError::InternalInvariant("multiplication ran before setup".into()))?;
        tracing::trace!(gate = %self.id, lanes = self.num_simd, "beaver multiplication");
        let x = self.a.value().await;
        let y = self.b.value().await;

        let d: Vec<T> = x
            .iter()
            .zip(&triples.a)
            .map(|(&x, &a)| x.wrapping_sub(a))
            .collect();
        let e: Vec<T> = y
            .iter()
            .zip(&triples.b)
            .map(|(&y, &b)| y.wrapping_sub(b))
            .collect();

        self.ctx.send_msg(self.id, &(d.clone(), e.clone()))?;
        let (peer_d, peer_e): (Vec<T>, Vec<T>) = self.ctx.recv_msg(self.id).await?;
        if peer_d.len() != self.num_simd || peer_e.len() != self.num_simd {
            return Err(EngineError::InternalInvariant(
                "peer sent wrong number of multiplication lanes".into(),
            ));
        }

        let party_0 = self.ctx.my_id() == 0;
        let z = (0..self.num_simd)
            .map(|i| {
                let big_d = d[i].wrapping_add(peer_d[i]);
                let big_e = e[i].wrapping_add(peer_e[i]);
                let mut z = triples.c[i]
                    .wrapping_add(big_d.wrapping_mul(triples.b[i]))
                    .wrapping_add(big_e.wrapping_mul(triples.a[i]));
                if party_0 {
                    z = z.wrapping_add(big_d.wrapping_mul(big_e));
                }
                z
            })
            .collect();
        self.output.publish(z);
        Ok(())
    }
}

/// Squaring via a square pair, one round of exchange.
pub(crate) struct ArithmeticSqrGate<T: Ring> {
    pub(crate) id: GateId,
    pub(crate) ctx: Arc<GmwContext>,
    pub(crate) num_simd: usize,
    pub(crate) input: Arc<ArithmeticWire<T>>,
    pub(crate) output: Arc<ArithmeticWire<T>>,
    pub(crate) sp_offset: usize,
    pub(crate) pairs: Option<SquarePairs<T>>,
}

#[async_trait]
impl<T: Ring> Gate for ArithmeticSqrGate<T> {
    fn id(&self) -> GateId {
        self.id
    }

    fn needs_setup(&self) -> bool {
        true
    }

    async fn evaluate_setup(&mut self) -> Result<(), EngineError> {
        self.pairs = Some(self.ctx.sps.sps::<T>(self.sp_offset, self.num_simd).await?);
        Ok(())
    }

    async fn evaluate_online(&mut self) -> Result<(), EngineError> {
        let pairs = self
            .pairs
            .take()
            .ok_or_else(|| EngineError::InternalInvariant("squaring ran before setup".into()))?;
        let x = self.input.value().await;

        let d: Vec<T> = x
            .iter()
            .zip(&pairs.a)
            .map(|(&x, &a)| x.wrapping_sub(a))
            .collect();
        self.ctx.send_msg(self.id, &d)?;
        let peer_d: Vec<T> = self.ctx.recv_msg(self.id).await?;
        if peer_d.len() != self.num_simd {
            return Err(EngineError::InternalInvariant(
                "peer sent wrong number of squaring lanes".into(),
            ));
        }

        let party_0 = self.ctx.my_id() == 0;
        let two = T::ONE.wrapping_add(T::ONE);
        // x² = c + 2·D·a + D² with D = x - a public.
        let z = (0..self.num_simd)
            .map(|i| {
                let big_d = d[i].wrapping_add(peer_d[i]);
                let mut z = pairs.c[i].wrapping_add(two.wrapping_mul(big_d).wrapping_mul(pairs.a[i]));
                if party_0 {
                    z = z.wrapping_add(big_d.wrapping_mul(big_d));
                }
                z
            })
            .collect();
        self.output.publish(z);
        Ok(())
    }
}
