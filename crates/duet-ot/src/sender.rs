//! The sender side of the OT extension.

use std::sync::{Arc, Mutex};

use duet_comm::{sync::SetOnce, CommLayer, MessageType};
use duet_core::{transpose_bits, AesHash, BitVec, Block, Prg};
use rand::{RngCore, SeedableRng};
use tracing::instrument;

use crate::{
    arith::add_mod,
    base::base_ot_receive,
    derive_key,
    msgs::{corrections_id, messages_id, Corrections, ExtensionMasks, VectorMessages, MASKS_ID},
    OtError, OtProtocol, KAPPA,
};

/// The sender's pool of extended OTs.
///
/// `rows[j]` is the row `q_j = t_j ⊕ r_j·Δ`; together with `delta` it
/// determines both output keys of OT `j`.
#[derive(Debug)]
pub(crate) struct SenderPool {
    pub(crate) delta: Block,
    pub(crate) rows: Vec<Block>,
}

impl SenderPool {
    /// Derives the corrected key pair of OT `index` such that the receiver
    /// holds the key matching its true choice bit.
    fn corrected_keys(
        &self,
        hash: &AesHash,
        index: usize,
        correction: bool,
        bitlen: usize,
    ) -> [BitVec; 2] {
        let q = self.rows[index];
        let (row0, row1) = if correction {
            (q ^ self.delta, q)
        } else {
            (q, q ^ self.delta)
        };
        [
            derive_key(hash, index as u64, row0, bitlen),
            derive_key(hash, index as u64, row1, bitlen),
        ]
    }
}

/// Runs the extension setup for the sender role: base OTs with the delta
/// choice bits, then reconstruction of the `Q` matrix from the receiver's
/// row masks.
#[instrument(level = "debug", skip(comm), err)]
pub(crate) async fn run_send_setup(comm: &CommLayer, total: usize) -> Result<SenderPool, OtError> {
    if total == 0 {
        return Ok(SenderPool {
            delta: Block::random(&mut rand::thread_rng()),
            rows: Vec::new(),
        });
    }

    let delta = Block::random(&mut rand::thread_rng());
    let session = comm.my_id() as u64;
    let seeds = base_ot_receive(comm, session, &delta.to_lsb0_vec()).await?;

    let num = total.next_multiple_of(KAPPA);
    let width = num / 8;

    let masks: ExtensionMasks = comm.recv(MessageType::OtExtension, MASKS_ID).await?;
    if masks.rows.len() != KAPPA || masks.rows.iter().any(|row| row.len() != width) {
        return Err(OtError::MalformedMessage(
            "row mask dimensions do not match the registered demand".into(),
        ));
    }

    let mut matrix = vec![0u8; KAPPA * width];
    for (i, seed) in seeds.into_iter().enumerate() {
        let row = &mut matrix[i * width..(i + 1) * width];
        Prg::from_seed(seed).fill_bytes(row);
        if delta.bit(i) {
            for (byte, mask) in row.iter_mut().zip(&masks.rows[i]) {
                *byte ^= mask;
            }
        }
    }

    let rows = transpose_bits(&matrix, KAPPA, num)
        .chunks_exact(16)
        .map(|chunk| Block::new(chunk.try_into().expect("chunk is one block")))
        .collect();

    Ok(SenderPool { delta, rows })
}

/// The sender's messages and inputs of one vector.
#[derive(Debug)]
pub(crate) enum SenderInputs {
    /// Chosen message pairs (GOT).
    Messages(Vec<[BitVec; 2]>),
    /// Per-OT correlations (XCOT and ACOT).
    Correlations(Vec<BitVec>),
}

/// A registered batch of OTs in the sender role.
///
/// Returned by [`crate::OtProvider::register_send`]. Inputs must be set
/// before [`Self::send_messages`]; outputs become available once the
/// messages have been sent.
#[derive(Debug)]
pub struct OtSendVector {
    pub(crate) id: u64,
    pub(crate) protocol: OtProtocol,
    pub(crate) bitlen: usize,
    pub(crate) count: usize,
    pub(crate) offset: usize,
    pub(crate) comm: CommLayer,
    pub(crate) hash: AesHash,
    pub(crate) pool: Arc<SetOnce<Arc<SenderPool>>>,
    pub(crate) inputs: Mutex<Option<SenderInputs>>,
    pub(crate) outputs: SetOnce<Vec<[BitVec; 2]>>,
}

impl OtSendVector {
    /// The vector id within the sender role.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The registered OT flavor.
    pub fn protocol(&self) -> OtProtocol {
        self.protocol
    }

    /// The registered per-message bit length.
    pub fn bitlen(&self) -> usize {
        self.bitlen
    }

    /// The number of OTs in the vector.
    pub fn count(&self) -> usize {
        self.count
    }

    fn check_inputs(&self, len: usize, bitlens: impl Iterator<Item = usize>) -> Result<(), OtError> {
        if len != self.count {
            return Err(OtError::InputCountMismatch {
                expected: self.count,
                actual: len,
            });
        }
        for bitlen in bitlens {
            if bitlen != self.bitlen {
                return Err(OtError::BitLengthMismatch {
                    expected: self.bitlen,
                    actual: bitlen,
                });
            }
        }
        Ok(())
    }

    fn store_inputs(&self, inputs: SenderInputs) -> Result<(), OtError> {
        let mut guard = self.inputs.lock().unwrap();
        if guard.is_some() {
            return Err(OtError::InputsAlreadySet);
        }
        *guard = Some(inputs);
        Ok(())
    }

    /// Sets the two messages of every OT (general OT only).
    pub fn set_inputs(&self, msgs: Vec<[BitVec; 2]>) -> Result<(), OtError> {
        if self.protocol != OtProtocol::Got {
            return Err(OtError::UnsupportedFlavor(self.protocol));
        }
        self.check_inputs(
            msgs.len(),
            msgs.iter().flat_map(|pair| pair.iter().map(BitVec::len)),
        )?;
        self.store_inputs(SenderInputs::Messages(msgs))
    }

    /// Sets the per-OT correlations (correlated flavors only).
    ///
    /// For `Xcot` the receiver obtains `x0 ⊕ b·Δ_i`; for `Acot` the
    /// correlation is interpreted as a little-endian ring element and the
    /// receiver obtains `x0 + b·Δ_i mod 2^bitlen`.
    pub fn set_correlations(&self, correlations: Vec<BitVec>) -> Result<(), OtError> {
        if !matches!(self.protocol, OtProtocol::Xcot | OtProtocol::Acot) {
            return Err(OtError::UnsupportedFlavor(self.protocol));
        }
        self.check_inputs(correlations.len(), correlations.iter().map(BitVec::len))?;
        self.store_inputs(SenderInputs::Correlations(correlations))
    }

    /// Runs the sender's online flow of this vector.
    ///
    /// For the non-random flavors this suspends until the receiver's
    /// corrections have arrived, then transmits the masked messages. The
    /// sender outputs become available afterwards.
    #[instrument(level = "trace", skip(self), fields(id = self.id, count = self.count))]
    pub async fn send_messages(&self) -> Result<(), OtError> {
        let pool = self.pool.wait().await;

        if self.protocol == OtProtocol::Rot {
            // Random OT: both messages are the derived keys; nothing is sent.
            let outputs = (0..self.count)
                .map(|j| {
                    let index = self.offset + j;
                    let q = pool.rows[index];
                    [
                        derive_key(&self.hash, index as u64, q, self.bitlen),
                        derive_key(&self.hash, index as u64, q ^ pool.delta, self.bitlen),
                    ]
                })
                .collect();
            self.outputs.set(outputs);
            return Ok(());
        }

        let corrections: Corrections = self
            .comm
            .recv(MessageType::OtExtension, corrections_id(self.id))
            .await?;
        if corrections.bits.len() != self.count {
            return Err(OtError::MalformedMessage(format!(
                "expected {} correction bits, got {}",
                self.count,
                corrections.bits.len()
            )));
        }

        let inputs = self
            .inputs
            .lock()
            .unwrap()
            .take()
            .ok_or(OtError::InputsMissing)?;

        let keys: Vec<[BitVec; 2]> = (0..self.count)
            .map(|j| {
                pool.corrected_keys(
                    &self.hash,
                    self.offset + j,
                    corrections.bits.get(j),
                    self.bitlen,
                )
            })
            .collect();

        let (message, outputs) = match (&self.protocol, inputs) {
            (OtProtocol::Got, SenderInputs::Messages(msgs)) => {
                let masked = msgs
                    .iter()
                    .zip(&keys)
                    .map(|(pair, key)| [&pair[0] ^ &key[0], &pair[1] ^ &key[1]])
                    .collect();
                (VectorMessages::Pairs(masked), msgs)
            }
            (OtProtocol::Xcot, SenderInputs::Correlations(correlations)) => {
                let mut masked = Vec::with_capacity(self.count);
                let mut outputs = Vec::with_capacity(self.count);
                for (delta, key) in correlations.iter().zip(&keys) {
                    let x0 = key[0].clone();
                    let x1 = &x0 ^ delta;
                    masked.push(&x1 ^ &key[1]);
                    outputs.push([x0, x1]);
                }
                (VectorMessages::Single(masked), outputs)
            }
            (OtProtocol::Acot, SenderInputs::Correlations(correlations)) => {
                let mut masked = Vec::with_capacity(self.count);
                let mut outputs = Vec::with_capacity(self.count);
                for (delta, key) in correlations.iter().zip(&keys) {
                    let x0 = key[0].clone();
                    let x1 = add_mod(&x0, delta);
                    masked.push(add_mod(&x1, &key[1]));
                    outputs.push([x0, x1]);
                }
                (VectorMessages::Single(masked), outputs)
            }
            _ => return Err(OtError::UnsupportedFlavor(self.protocol)),
        };

        self.comm
            .send(MessageType::OtExtension, messages_id(self.id), &message)?;
        self.outputs.set(outputs);
        Ok(())
    }

    /// Returns both output messages of every OT, waiting until
    /// [`Self::send_messages`] has run.
    pub async fn outputs(&self) -> Vec<[BitVec; 2]> {
        self.outputs.wait().await
    }
}
