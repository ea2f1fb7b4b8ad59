//! The shared-bit provider.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use duet_comm::{sync::Completion, PartyId};
use duet_core::{BitVec, Ring};
use duet_ot::{OtProtocol, OtProvider, OtRecvVector, OtSendVector};
use tracing::instrument;

use crate::{mt::check_range, TripleError, MAX_BATCH_SIZE};

/// A range of shared bits of width `T`.
///
/// Each bit `d` is known as a boolean XOR sharing (`boolean`) and as an
/// additive sharing of the same value in `Z_{2^k}` (`arith`). The conversion
/// gates blind boolean wire bits with these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedBits<T> {
    /// This party's XOR share of each bit.
    pub boolean: BitVec,
    /// This party's additive share of each bit.
    pub arith: Vec<T>,
}

#[derive(Default)]
struct SbPool<T: Ring> {
    requested: usize,
    my_bits: BitVec,
    arith: Vec<T>,
    send_ots: VecDeque<Arc<OtSendVector>>,
    recv_ots: VecDeque<Arc<OtRecvVector>>,
}

#[derive(Default)]
struct State {
    frozen: bool,
    p8: SbPool<u8>,
    p16: SbPool<u16>,
    p32: SbPool<u32>,
    p64: SbPool<u64>,
}

/// Produces shared bits from correlated OTs.
///
/// Each party samples a random bit `b_i`; the shared bit is `d = b_0 ⊕ b_1`,
/// so `b_i` is already the boolean share. One width-`k` ACOT per bit yields
/// additive shares of `b_0·b_1`, from which
/// `d = b_0 + b_1 − 2·b_0·b_1 mod 2^k` is shared linearly. Party 0 plays the
/// ACOT sender, party 1 the receiver.
pub struct SbProvider {
    ots: Arc<OtProvider>,
    my_id: PartyId,
    state: Mutex<State>,
    finished: Completion,
}

impl SbProvider {
    /// Creates a provider drawing from the given OT provider.
    pub fn new(ots: Arc<OtProvider>, my_id: PartyId) -> Self {
        Self {
            ots,
            my_id,
            state: Mutex::new(State::default()),
            finished: Completion::new(),
        }
    }

    /// Reserves `n` shared bits of width `T`, returning their offset.
    pub fn request_sbs<T: Ring>(&self, n: usize) -> Result<usize, TripleError> {
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

    /// Returns whether any shared bits have been reserved.
    pub fn need_sbs(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.p8.requested + state.p16.requested + state.p32.requested + state.p64.requested > 0
    }

    /// Samples the local bits and registers the OT demand.
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

    /// Runs the OT flows and assembles the shared bits.
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

    /// Waits until the shared bits have been produced.
    pub async fn wait_finished(&self) {
        self.finished.wait().await
    }

    /// Returns whether setup has completed.
    pub fn is_finished(&self) -> bool {
        self.finished.is_set()
    }

    /// Returns the shared bits `[offset, offset + n)` of width `T`, waiting
    /// for setup to finish.
    pub async fn sbs<T: Ring>(&self, offset: usize, n: usize) -> Result<SharedBits<T>, TripleError> {
        self.finished.wait().await;
        let state = self.state.lock().unwrap();
        macro_rules! subset {
            ($pool:expr) => {{
                check_range(offset, n, $pool.arith.len())?;
                Ok(SharedBits {
                    boolean: $pool.my_bits.subset(offset..offset + n),
                    arith: bytemuck::cast_slice(&$pool.arith[offset..offset + n]).to_vec(),
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
        pool: fn(&mut State) -> &mut SbPool<T>,
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
                let mut state = self.state.lock().unwrap();
                let pool = pool(&mut state);
                for j in 0..snd.count() {
                    let x0 = souts[j][0].to_ring_vec::<T>()[0];
                    let bit = T::from_bit(pool.my_bits.get(offset + j));
                    // d_0 = b_0 + 2·x0
                    pool.arith[offset + j] = bit.wrapping_add(two.wrapping_mul(x0));
                }
                offset += snd.count();
            }
        } else {
            for rcv in &recv_q {
                let routs = rcv.outputs().await?;
                let mut state = self.state.lock().unwrap();
                let pool = pool(&mut state);
                for j in 0..rcv.count() {
                    let received = routs[j].to_ring_vec::<T>()[0];
                    let bit = T::from_bit(pool.my_bits.get(offset + j));
                    // d_1 = b_1 - 2·received
                    pool.arith[offset + j] = bit.wrapping_sub(two.wrapping_mul(received));
                }
                offset += rcv.count();
            }
        }
        Ok(())
    }
}

fn pre_setup_pool<T: Ring>(
    pool: &mut SbPool<T>,
    ots: &OtProvider,
    my_id: PartyId,
    rng: &mut impl rand::Rng,
) -> Result<(), TripleError> {
    let n = pool.requested;
    if n == 0 {
        return Ok(());
    }

    pool.my_bits = BitVec::random(rng, n);
    pool.arith = vec![T::ZERO; n];

    let mut offset = 0;
    while offset < n {
        let batch = usize::min(MAX_BATCH_SIZE, n - offset);
        if my_id == 0 {
            let snd = ots.register_send(T::BITS, batch, OtProtocol::Acot)?;
            snd.set_correlations(
                (0..batch)
                    .map(|j| {
                        BitVec::from_ring_slice(&[T::from_bit(pool.my_bits.get(offset + j))])
                    })
                    .collect(),
            )?;
            pool.send_ots.push_back(snd);
        } else {
            let rcv = ots.register_receive(T::BITS, batch, OtProtocol::Acot)?;
            rcv.set_choices(pool.my_bits.subset(offset..offset + batch))?;
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

    async fn run_party(ots: Arc<OtProvider>, sbs: Arc<SbProvider>) {
        sbs.pre_setup().unwrap();
        let (send, recv) = tokio::join!(ots.send_setup(), ots.receive_setup());
        send.unwrap();
        recv.unwrap();
        sbs.setup().await.unwrap();
    }

    async fn check_shared_bits<T: Ring>() {
        let (ot0, ot1) = ot_pair().await;
        let sb0 = Arc::new(SbProvider::new(Arc::clone(&ot0), 0));
        let sb1 = Arc::new(SbProvider::new(Arc::clone(&ot1), 1));

        sb0.request_sbs::<T>(100).unwrap();
        sb1.request_sbs::<T>(100).unwrap();

        tokio::join!(
            run_party(Arc::clone(&ot0), Arc::clone(&sb0)),
            run_party(Arc::clone(&ot1), Arc::clone(&sb1)),
        );

        let s0 = sb0.sbs::<T>(0, 100).await.unwrap();
        let s1 = sb1.sbs::<T>(0, 100).await.unwrap();

        let mut saw_one = false;
        let mut saw_zero = false;
        for i in 0..100 {
            let boolean = s0.boolean.get(i) ^ s1.boolean.get(i);
            let arith = s0.arith[i].wrapping_add(s1.arith[i]);
            assert_eq!(arith, T::from_bit(boolean), "shared bit {i} mismatch");
            saw_one |= boolean;
            saw_zero |= !boolean;
        }
        // 100 random bits should include both values.
        assert!(saw_one && saw_zero);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_shared_bits_recombine_u16() {
        check_shared_bits::<u16>().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_shared_bits_recombine_u64() {
        check_shared_bits::<u64>().await;
    }
}
