//! The square-pair provider.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use duet_comm::{sync::Completion, PartyId};
use duet_core::{BitVec, Ring};
use duet_ot::{OtProtocol, OtProvider, OtRecvVector, OtSendVector};
use rand::Rng;
use tracing::instrument;

use crate::{mt::check_range, TripleError, MAX_BATCH_SIZE};

/// A range of square pairs: `c = a² mod 2^k` under additive shares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SquarePairs<T> {
    /// Shares of the value.
    pub a: Vec<T>,
    /// Shares of its square.
    pub c: Vec<T>,
}

#[derive(Default)]
struct SpPool<T: Ring> {
    requested: usize,
    a: Vec<T>,
    c: Vec<T>,
    send_ots: VecDeque<Arc<OtSendVector>>,
    recv_ots: VecDeque<Arc<OtRecvVector>>,
}

#[derive(Default)]
struct State {
    frozen: bool,
    p8: SpPool<u8>,
    p16: SpPool<u16>,
    p32: SpPool<u32>,
    p64: SpPool<u64>,
}

/// Produces square pairs from correlated OTs.
///
/// `(a_0 + a_1)² = a_0² + a_1² + 2·a_0·a_1`; only one Gilboa multiplication
/// per pair is needed for the cross term, so party 0 always plays the ACOT
/// sender and party 1 the receiver.
pub struct SpProvider {
    ots: Arc<OtProvider>,
    my_id: PartyId,
    state: Mutex<State>,
    finished: Completion,
}

impl SpProvider {
    /// Creates a provider drawing from the given OT provider.
    pub fn new(ots: Arc<OtProvider>, my_id: PartyId) -> Self {
        Self {
            ots,
            my_id,
            state: Mutex::new(State::default()),
            finished: Completion::new(),
        }
    }

    /// Reserves `n` square pairs of width `T`, returning their offset.
    pub fn request_sps<T: Ring>(&self, n: usize) -> Result<usize, TripleError> {
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
            8 => bump!(state.p8),
            16 => bump!(state.p16),
            32 => bump!(state.p32),
            64 => bump!(state.p64),
            bits => Err(TripleError::UnsupportedWidth(bits)),
        }
    }

    /// Returns whether any pairs have been reserved.
    pub fn need_sps(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.p8.requested + state.p16.requested + state.p32.requested + state.p64.requested > 0
    }

    /// Samples the local shares and registers the OT demand.
    #[instrument(level = "debug", skip(self), err)]
    pub fn pre_setup(&self) -> Result<(), TripleError> {
        let mut state = self.state.lock().unwrap();
        state.frozen = true;
        let mut rng = rand::thread_rng();
        pre_setup_pool(&mut state.p8, &self.ots, self.my_id, &mut rng)?;
        pre_setup_pool(&mut state.p16, &self.ots, self.my_id, &mut rng)?;
        pre_setup_pool(&mut state.p32, &self.ots, self.my_id, &mut rng)?;
        pre_setup_pool(&mut state.p64, &self.ots, self.my_id, &mut rng)?;
        Ok(())
    }

    /// Runs the OT flows and assembles the pairs.
    #[instrument(level = "debug", skip(self), err)]
    pub async fn setup(&self) -> Result<(), TripleError> {
        let (send_q, recv_q) = {
            let state = self.state.lock().unwrap();
            let send_q: Vec<Arc<OtSendVector>> = state
                .p8
                .send_ots
                .iter()
                .chain(&state.p16.send_ots)
                .chain(&state.p32.send_ots)
                .chain(&state.p64.send_ots)
                .cloned()
                .collect();
            let recv_q: Vec<Arc<OtRecvVector>> = state
                .p8
                .recv_ots
                .iter()
                .chain(&state.p16.recv_ots)
                .chain(&state.p32.recv_ots)
                .chain(&state.p64.recv_ots)
                .cloned()
                .collect();
            (send_q, recv_q)
        };

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

        self.parse_pool::<u8>(|state| &mut state.p8).await?;
        self.parse_pool::<u16>(|state| &mut state.p16).await?;
        self.parse_pool::<u32>(|state| &mut state.p32).await?;
        self.parse_pool::<u64>(|state| &mut state.p64).await?;

        self.finished.set();
        Ok(())
    }

    /// Waits until the pairs have been produced.
    pub async fn wait_finished(&self) {
        self.finished.wait().await
    }

    /// Returns whether setup has completed.
    pub fn is_finished(&self) -> bool {
        self.finished.is_set()
    }

    /// Returns the square pairs `[offset, offset + n)` of width `T`,
    /// waiting for setup to finish.
    pub async fn sps<T: Ring>(&self, offset: usize, n: usize) -> Result<SquarePairs<T>, TripleError> {
        self.finished.wait().await;
        let state = self.state.lock().unwrap();
        macro_rules! subset {
            ($pool:expr) => {{
                check_range(offset, n, $pool.a.len())?;
                Ok(SquarePairs {
                    a: bytemuck::cast_slice(&$pool.a[offset..offset + n]).to_vec(),
                    c: bytemuck::cast_slice(&$pool.c[offset..offset + n]).to_vec(),
                })
            }};
        }
        match T::BITS {
            8 => subset!(state.p8),
            16 => subset!(state.p16),
            32 => subset!(state.p32),
            64 => subset!(state.p64),
            bits => Err(TripleError::UnsupportedWidth(bits)),
        }
    }

    async fn parse_pool<T: Ring>(
        &self,
        pool: fn(&mut State) -> &mut SpPool<T>,
    ) -> Result<(), TripleError> {
        let (send_q, recv_q) = {
            let mut state = self.state.lock().unwrap();
            let pool = pool(&mut state);
            (pool.send_ots.clone(), pool.recv_ots.clone())
        };

        let two = T::ONE.wrapping_add(T::ONE);
        let mut offset = 0;
        if self.my_id == 0 {
            for snd in &send_q {
                let souts = snd.outputs().await;
                let pairs = snd.count() / T::BITS;
                let mut state = self.state.lock().unwrap();
                let pool = pool(&mut state);
                for j in 0..pairs {
                    let mut cross = T::ZERO;
                    for k in 0..T::BITS {
                        cross = cross.wrapping_add(souts[j * T::BITS + k][0].to_ring_vec::<T>()[0]);
                    }
                    // c_0 = a_0² - 2·Σ x0
                    pool.c[offset + j] =
                        pool.c[offset + j].wrapping_sub(two.wrapping_mul(cross));
                }
                offset += pairs;
            }
        } else {
            for rcv in &recv_q {
                let routs = rcv.outputs().await?;
                let pairs = rcv.count() / T::BITS;
                let mut state = self.state.lock().unwrap();
                let pool = pool(&mut state);
                for j in 0..pairs {
                    let mut cross = T::ZERO;
                    for k in 0..T::BITS {
                        cross = cross.wrapping_add(routs[j * T::BITS + k].to_ring_vec::<T>()[0]);
                    }
                    // c_1 = a_1² + 2·Σ received
                    pool.c[offset + j] =
                        pool.c[offset + j].wrapping_add(two.wrapping_mul(cross));
                }
                offset += pairs;
            }
        }
        Ok(())
    }
}

fn pre_setup_pool<T: Ring>(
    pool: &mut SpPool<T>,
    ots: &OtProvider,
    my_id: PartyId,
    rng: &mut impl Rng,
) -> Result<(), TripleError> {
    let n = pool.requested;
    if n == 0 {
        return Ok(());
    }

    pool.a = (0..n).map(|_| T::random(rng)).collect();
    pool.c = pool.a.iter().map(|&a| a.wrapping_mul(a)).collect();

    let pairs_per_batch = usize::max(1, MAX_BATCH_SIZE / T::BITS);
    let mut offset = 0;
    while offset < n {
        let batch = usize::min(pairs_per_batch, n - offset);
        let num_ots = batch * T::BITS;
        if my_id == 0 {
            let snd = ots.register_send(T::BITS, num_ots, OtProtocol::Acot)?;
            let mut correlations = Vec::with_capacity(num_ots);
            for i in offset..offset + batch {
                for k in 0..T::BITS {
                    correlations
                        .push(BitVec::from_ring_slice(&[pool.a[i].wrapping_shl(k as u32)]));
                }
            }
            snd.set_correlations(correlations)?;
            pool.send_ots.push_back(snd);
        } else {
            let rcv = ots.register_receive(T::BITS, num_ots, OtProtocol::Acot)?;
            rcv.set_choices(BitVec::from_ring_slice(&pool.a[offset..offset + batch]))?;
            pool.recv_ots.push_back(rcv);
        }
        offset += batch;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use duet_comm::{memory_transport_pair, CommLayer};

    use super::*;

    async fn ot_pair() -> (Arc<OtProvider>, Arc<OtProvider>) {
        let (t0, t1) = memory_transport_pair();
        let (c0, c1) = tokio::join!(CommLayer::connect(t0, 0), CommLayer::connect(t1, 1));
        (
            Arc::new(OtProvider::new(c0.unwrap())),
            Arc::new(OtProvider::new(c1.unwrap())),
        )
    }

    async fn run_party(ots: Arc<OtProvider>, sps: Arc<SpProvider>) {
        sps.pre_setup().unwrap();
        let (send, recv) = tokio::join!(ots.send_setup(), ots.receive_setup());
        send.unwrap();
        recv.unwrap();
        sps.setup().await.unwrap();
    }

    async fn check_square_pairs<T: Ring>() {
        let (ot0, ot1) = ot_pair().await;
        let sp0 = Arc::new(SpProvider::new(Arc::clone(&ot0), 0));
        let sp1 = Arc::new(SpProvider::new(Arc::clone(&ot1), 1));

        sp0.request_sps::<T>(40).unwrap();
        sp1.request_sps::<T>(40).unwrap();

        tokio::join!(
            run_party(Arc::clone(&ot0), Arc::clone(&sp0)),
            run_party(Arc::clone(&ot1), Arc::clone(&sp1)),
        );

        let p0 = sp0.sps::<T>(0, 40).await.unwrap();
        let p1 = sp1.sps::<T>(0, 40).await.unwrap();

        for i in 0..40 {
            let a = p0.a[i].wrapping_add(p1.a[i]);
            let c = p0.c[i].wrapping_add(p1.c[i]);
            assert_eq!(c, a.wrapping_mul(a), "pair {i} does not recombine");
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_square_pairs_recombine_u16() {
        check_square_pairs::<u16>().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_square_pairs_recombine_u64() {
        check_square_pairs::<u64>().await;
    }
}
