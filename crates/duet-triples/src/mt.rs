//! The multiplication-triple provider.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use duet_comm::sync::Completion;
use duet_core::{BitVec, Ring};
use duet_ot::{OtProtocol, OtProvider, OtRecvVector, OtSendVector};
use rand::Rng;
use tracing::instrument;

use crate::{TripleError, MAX_BATCH_SIZE};

/// A range of boolean multiplication triples: `c = a & b` under XOR-shares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryTriples {
    /// Shares of the first factor.
    pub a: BitVec,
    /// Shares of the second factor.
    pub b: BitVec,
    /// Shares of the product.
    pub c: BitVec,
}

/// A range of integer multiplication triples: `c = a·b mod 2^k` under
/// additive shares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingTriples<T> {
    /// Shares of the first factor.
    pub a: Vec<T>,
    /// Shares of the second factor.
    pub b: Vec<T>,
    /// Shares of the product.
    pub c: Vec<T>,
}

#[derive(Default)]
struct BitPool {
    requested: usize,
    a: BitVec,
    b: BitVec,
    c: BitVec,
    send_ots: VecDeque<Arc<OtSendVector>>,
    recv_ots: VecDeque<Arc<OtRecvVector>>,
}

#[derive(Default)]
struct RingPool<T: Ring> {
    requested: usize,
    a: Vec<T>,
    b: Vec<T>,
    c: Vec<T>,
    send_ots: VecDeque<Arc<OtSendVector>>,
    recv_ots: VecDeque<Arc<OtRecvVector>>,
}

#[derive(Default)]
struct State {
    frozen: bool,
    bits: BitPool,
    r8: RingPool<u8>,
    r16: RingPool<u16>,
    r32: RingPool<u32>,
    r64: RingPool<u64>,
}

/// Produces multiplication triples from correlated OTs.
///
/// Consumers reserve offsets before preprocessing starts; `pre_setup`
/// samples the local `a`/`b` shares and registers the OT demand (XCOT for
/// boolean triples, one width-`k` ACOT per bit of `b` for integer triples);
/// `setup` drives both OT roles concurrently and folds the cross terms into
/// the `c` shares.
pub struct MtProvider {
    ots: Arc<OtProvider>,
    state: Mutex<State>,
    finished: Completion,
}

impl MtProvider {
    /// Creates a provider drawing from the given OT provider.
    pub fn new(ots: Arc<OtProvider>) -> Self {
        Self {
            ots,
            state: Mutex::new(State::default()),
            finished: Completion::new(),
        }
    }

    /// Reserves `n` boolean triples, returning their offset.
    pub fn request_binary_mts(&self, n: usize) -> Result<usize, TripleError> {
        let mut state = self.state.lock().unwrap();
        if state.frozen {
            return Err(TripleError::RequestsClosed);
        }
        let offset = state.bits.requested;
        state.bits.requested += n;
        Ok(offset)
    }

    /// Reserves `n` integer triples of width `T`, returning their offset.
    pub fn request_mts<T: Ring>(&self, n: usize) -> Result<usize, TripleError> {
        let mut state = self.state.lock().unwrap();
        if state.frozen {
            return Err(TripleError::RequestsClosed);
        }
        macro_rules! bump {
            ($pool:expr) => {{
                let offset = $pool.requested;
                $pool.requested += n;
                Ok(offset)
            }};
        }
        match T::BITS {
            8 => bump!(state.r8),
            16 => bump!(state.r16),
            32 => bump!(state.r32),
            64 => bump!(state.r64),
            bits => Err(TripleError::UnsupportedWidth(bits)),
        }
    }

    /// Returns whether any triples have been reserved.
    pub fn need_mts(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.bits.requested
            + state.r8.requested
            + state.r16.requested
            + state.r32.requested
            + state.r64.requested
            > 0
    }

    /// Samples the local shares and registers the OT demand.
    ///
    /// Must run on both parties with mirrored ordering before the OT
    /// extension setup.
    #[instrument(level = "debug", skip(self), err)]
    pub fn pre_setup(&self) -> Result<(), TripleError> {
        let mut state = self.state.lock().unwrap();
        state.frozen = true;
        let mut rng = rand::thread_rng();

        let n = state.bits.requested;
        if n > 0 {
            let a = BitVec::random(&mut rng, n);
            let b = BitVec::random(&mut rng, n);
            state.bits.c = &a & &b;

            let mut offset = 0;
            while offset < n {
                let batch = usize::min(MAX_BATCH_SIZE, n - offset);
                let snd = self.ots.register_send(1, batch, OtProtocol::Xcot)?;
                snd.set_correlations(
                    (0..batch)
                        .map(|k| BitVec::single(a.get(offset + k)))
                        .collect(),
                )?;
                let rcv = self.ots.register_receive(1, batch, OtProtocol::Xcot)?;
                rcv.set_choices(b.subset(offset..offset + batch))?;
                state.bits.send_ots.push_back(snd);
                state.bits.recv_ots.push_back(rcv);
                offset += batch;
            }

            state.bits.a = a;
            state.bits.b = b;
        }

        pre_setup_ring(&mut state.r8, &self.ots, &mut rng)?;
        pre_setup_ring(&mut state.r16, &self.ots, &mut rng)?;
        pre_setup_ring(&mut state.r32, &self.ots, &mut rng)?;
        pre_setup_ring(&mut state.r64, &self.ots, &mut rng)?;
        Ok(())
    }

    /// Runs the OT flows and assembles the triples.
    ///
    /// Requires completed OT extension setup on both parties.
    #[instrument(level = "debug", skip(self), err)]
    pub async fn setup(&self) -> Result<(), TripleError> {
        let (send_q, recv_q) = {
            let state = self.state.lock().unwrap();
            let send_q: Vec<Arc<OtSendVector>> = state
                .bits
                .send_ots
                .iter()
                .chain(&state.r8.send_ots)
                .chain(&state.r16.send_ots)
                .chain(&state.r32.send_ots)
                .chain(&state.r64.send_ots)
                .cloned()
                .collect();
            let recv_q: Vec<Arc<OtRecvVector>> = state
                .bits
                .recv_ots
                .iter()
                .chain(&state.r8.recv_ots)
                .chain(&state.r16.recv_ots)
                .chain(&state.r32.recv_ots)
                .chain(&state.r64.recv_ots)
                .cloned()
                .collect();
            (send_q, recv_q)
        };

        // The two OT roles run concurrently to keep both network directions
        // saturated.
        let send_side = async {
            for vector in &send_q {
                vector.send_messages().await?;
            }
            Ok::<_, TripleError>(())
        };
        let recv_side = async {
            for vector in &recv_q {
                vector.send_corrections().await?;
            }
            Ok::<_, TripleError>(())
        };
        tokio::try_join!(send_side, recv_side)?;

        self.parse_outputs().await?;
        self.finished.set();
        Ok(())
    }

    /// Waits until the triples have been produced.
    pub async fn wait_finished(&self) {
        self.finished.wait().await
    }

    /// Returns whether setup has completed.
    pub fn is_finished(&self) -> bool {
        self.finished.is_set()
    }

    /// Returns the boolean triples `[offset, offset + n)`, waiting for setup
    /// to finish.
    pub async fn binary_mts(&self, offset: usize, n: usize) -> Result<BinaryTriples, TripleError> {
        self.finished.wait().await;
        let state = self.state.lock().unwrap();
        check_range(offset, n, state.bits.a.len())?;
        Ok(BinaryTriples {
            a: state.bits.a.subset(offset..offset + n),
            b: state.bits.b.subset(offset..offset + n),
            c: state.bits.c.subset(offset..offset + n),
        })
    }

    /// Returns the integer triples `[offset, offset + n)` of width `T`,
    /// waiting for setup to finish.
    pub async fn mts<T: Ring>(&self, offset: usize, n: usize) -> Result<RingTriples<T>, TripleError> {
        self.finished.wait().await;
        let state = self.state.lock().unwrap();
        match T::BITS {
            8 => subset_triples(&state.r8, offset, n),
            16 => subset_triples(&state.r16, offset, n),
            32 => subset_triples(&state.r32, offset, n),
            64 => subset_triples(&state.r64, offset, n),
            bits => Err(TripleError::UnsupportedWidth(bits)),
        }
    }

    async fn parse_outputs(&self) -> Result<(), TripleError> {
        // Binary triples: c ^= x0_sender ^ out_receiver per OT.
        let (bit_send, bit_recv) = {
            let state = self.state.lock().unwrap();
            (state.bits.send_ots.clone(), state.bits.recv_ots.clone())
        };
        let mut offset = 0;
        for (snd, rcv) in bit_send.iter().zip(&bit_recv) {
            let souts = snd.outputs().await;
            let routs = rcv.outputs().await?;
            let mut state = self.state.lock().unwrap();
            for j in 0..snd.count() {
                let adjust = souts[j][0].get(0) ^ routs[j].get(0);
                if adjust {
                    let flipped = !state.bits.c.get(offset + j);
                    state.bits.c.set(offset + j, flipped);
                }
            }
            offset += snd.count();
        }

        self.parse_ring_outputs::<u8>(|state| &mut state.r8).await?;
        self.parse_ring_outputs::<u16>(|state| &mut state.r16)
            .await?;
        self.parse_ring_outputs::<u32>(|state| &mut state.r32)
            .await?;
        self.parse_ring_outputs::<u64>(|state| &mut state.r64)
            .await?;
        Ok(())
    }

    async fn parse_ring_outputs<T: Ring>(
        &self,
        pool: fn(&mut State) -> &mut RingPool<T>,
    ) -> Result<(), TripleError> {
        let (send_q, recv_q) = {
            let mut state = self.state.lock().unwrap();
            let pool = pool(&mut state);
            (pool.send_ots.clone(), pool.recv_ots.clone())
        };

        let mut offset = 0;
        for (snd, rcv) in send_q.iter().zip(&recv_q) {
            let souts = snd.outputs().await;
            let routs = rcv.outputs().await?;
            let triples = snd.count() / T::BITS;

            let mut state = self.state.lock().unwrap();
            let pool = pool(&mut state);
            for j in 0..triples {
                let mut cross = T::ZERO;
                for k in 0..T::BITS {
                    let index = j * T::BITS + k;
                    let x0 = souts[index][0].to_ring_vec::<T>()[0];
                    let received = routs[index].to_ring_vec::<T>()[0];
                    cross = cross.wrapping_add(received).wrapping_sub(x0);
                }
                pool.c[offset + j] = pool.c[offset + j].wrapping_add(cross);
            }
            offset += triples;
        }
        Ok(())
    }
}

fn pre_setup_ring<T: Ring>(
    pool: &mut RingPool<T>,
    ots: &OtProvider,
    rng: &mut impl Rng,
) -> Result<(), TripleError> {
    let n = pool.requested;
    if n == 0 {
        return Ok(());
    }

    pool.a = (0..n).map(|_| T::random(rng)).collect();
    pool.b = (0..n).map(|_| T::random(rng)).collect();
    pool.c = pool
        .a
        .iter()
        .zip(&pool.b)
        .map(|(&a, &b)| a.wrapping_mul(b))
        .collect();

    // One ACOT per bit of b: the sender correlates with a·2^k, the receiver
    // chooses with bit k of b (Gilboa multiplication).
    let triples_per_batch = usize::max(1, MAX_BATCH_SIZE / T::BITS);
    let mut offset = 0;
    while offset < n {
        let batch = usize::min(triples_per_batch, n - offset);
        let num_ots = batch * T::BITS;

        let snd = ots.register_send(T::BITS, num_ots, OtProtocol::Acot)?;
        let mut correlations = Vec::with_capacity(num_ots);
        for i in offset..offset + batch {
            for k in 0..T::BITS {
                correlations.push(BitVec::from_ring_slice(&[pool.a[i].wrapping_shl(k as u32)]));
            }
        }
        snd.set_correlations(correlations)?;

        let rcv = ots.register_receive(T::BITS, num_ots, OtProtocol::Acot)?;
        rcv.set_choices(BitVec::from_ring_slice(&pool.b[offset..offset + batch]))?;

        pool.send_ots.push_back(snd);
        pool.recv_ots.push_back(rcv);
        offset += batch;
    }
    Ok(())
}

fn subset_triples<S: Ring, T: Ring>(
    pool: &RingPool<S>,
    offset: usize,
    n: usize,
) -> Result<RingTriples<T>, TripleError> {
    check_range(offset, n, pool.a.len())?;
    Ok(RingTriples {
        a: bytemuck::cast_slice(&pool.a[offset..offset + n]).to_vec(),
        b: bytemuck::cast_slice(&pool.b[offset..offset + n]).to_vec(),
        c: bytemuck::cast_slice(&pool.c[offset..offset + n]).to_vec(),
    })
}

pub(crate) fn check_range(offset: usize, n: usize, size: usize) -> Result<(), TripleError> {
    if offset + n > size {
        return Err(TripleError::OutOfRange {
            offset,
            end: offset + n,
            size,
        });
    }
    Ok(())
}
