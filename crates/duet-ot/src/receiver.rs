//! The receiver side of the OT extension.

use std::sync::{Arc, Mutex};

use duet_comm::{sync::SetOnce, CommLayer, MessageType};
use duet_core::{transpose_bits, AesHash, BitVec, Block, Prg};
use rand::{RngCore, SeedableRng};
use tracing::instrument;

use crate::{
    arith::sub_mod,
    base::base_ot_send,
    derive_key,
    msgs::{corrections_id, messages_id, Corrections, ExtensionMasks, VectorMessages, MASKS_ID},
    OtError, OtProtocol, KAPPA,
};

/// The receiver's pool of extended OTs: the `T` matrix rows and the random
/// choices sampled during setup.
#[derive(Debug)]
pub(crate) struct ReceiverPool {
    pub(crate) random_choices: BitVec,
    pub(crate) rows: Vec<Block>,
}

/// Runs the extension setup for the receiver role: base OTs as the seed
/// sender, then transmission of the masked rows `u_i = t_i ⊕ w_i ⊕ r`.
#[instrument(level = "debug", skip(comm), err)]
pub(crate) async fn run_receive_setup(
    comm: &CommLayer,
    total: usize,
) -> Result<ReceiverPool, OtError> {
    if total == 0 {
        return Ok(ReceiverPool {
            random_choices: BitVec::new(),
            rows: Vec::new(),
        });
    }

    // This direction's extension sender is the peer.
    let session = comm.peer_id() as u64;
    let seed_pairs = base_ot_send(comm, session, KAPPA).await?;

    let num = total.next_multiple_of(KAPPA);
    let width = num / 8;
    let random_choices = BitVec::random(&mut rand::thread_rng(), num);

    let mut matrix = vec![0u8; KAPPA * width];
    let mut mask_rows = Vec::with_capacity(KAPPA);
    for (i, [seed0, seed1]) in seed_pairs.into_iter().enumerate() {
        let row = &mut matrix[i * width..(i + 1) * width];
        Prg::from_seed(seed0).fill_bytes(row);

        let mut mask = vec![0u8; width];
        Prg::from_seed(seed1).fill_bytes(&mut mask);
        for ((mask_byte, &t_byte), &r_byte) in
            mask.iter_mut().zip(row.iter()).zip(random_choices.as_bytes())
        {
            *mask_byte ^= t_byte ^ r_byte;
        }
        mask_rows.push(mask);
    }

    comm.send(
        MessageType::OtExtension,
        MASKS_ID,
        &ExtensionMasks { rows: mask_rows },
    )?;

    let rows = transpose_bits(&matrix, KAPPA, num)
        .chunks_exact(16)
        .map(|chunk| Block::new(chunk.try_into().expect("chunk is one block")))
        .collect();

    Ok(ReceiverPool {
        random_choices,
        rows,
    })
}

/// A registered batch of OTs in the receiver role.
///
/// Returned by [`crate::OtProvider::register_receive`]. For the non-random
/// flavors, choices must be set and [`Self::send_corrections`] called before
/// the sender can transmit; [`Self::outputs`] suspends until the sender's
/// messages have arrived.
#[derive(Debug)]
pub struct OtRecvVector {
    pub(crate) id: u64,
    pub(crate) protocol: OtProtocol,
    pub(crate) bitlen: usize,
    pub(crate) count: usize,
    pub(crate) offset: usize,
    pub(crate) comm: CommLayer,
    pub(crate) hash: AesHash,
    pub(crate) pool: Arc<SetOnce<Arc<ReceiverPool>>>,
    pub(crate) choices: Mutex<Option<BitVec>>,
    pub(crate) outputs: tokio::sync::Mutex<Option<Vec<BitVec>>>,
}

impl OtRecvVector {
    /// The vector id within the receiver role.
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

    /// Sets the true choice bits (not available for random OT).
    pub fn set_choices(&self, choices: BitVec) -> Result<(), OtError> {
        if self.protocol == OtProtocol::Rot {
            return Err(OtError::UnsupportedFlavor(self.protocol));
        }
        if choices.len() != self.count {
            return Err(OtError::InputCountMismatch {
                expected: self.count,
                actual: choices.len(),
            });
        }
        let mut guard = self.choices.lock().unwrap();
        if guard.is_some() {
            return Err(OtError::ChoicesAlreadySet);
        }
        *guard = Some(choices);
        Ok(())
    }

    /// Returns the effective choice bits: the set choices, or for random OT
    /// the choices sampled during setup.
    pub async fn choices(&self) -> Result<BitVec, OtError> {
        if self.protocol == OtProtocol::Rot {
            let pool = self.pool.wait().await;
            return Ok(pool
                .random_choices
                .subset(self.offset..self.offset + self.count));
        }
        self.choices
            .lock()
            .unwrap()
            .clone()
            .ok_or(OtError::ChoicesMissing)
    }

    /// Sends the delta between the true choices and the random choices
    /// prepared during extension.
    #[instrument(level = "trace", skip(self), fields(id = self.id, count = self.count))]
    pub async fn send_corrections(&self) -> Result<(), OtError> {
        if self.protocol == OtProtocol::Rot {
            return Err(OtError::UnsupportedFlavor(self.protocol));
        }
        let pool = self.pool.wait().await;
        let choices = self
            .choices
            .lock()
            .unwrap()
            .clone()
            .ok_or(OtError::ChoicesMissing)?;
        let random = pool
            .random_choices
            .subset(self.offset..self.offset + self.count);
        self.comm.send(
            MessageType::OtExtension,
            corrections_id(self.id),
            &Corrections {
                bits: &choices ^ &random,
            },
        )?;
        Ok(())
    }

    /// Returns the chosen message of every OT, suspending until the sender's
    /// messages for this vector have arrived.
    pub async fn outputs(&self) -> Result<Vec<BitVec>, OtError> {
        let mut guard = self.outputs.lock().await;
        if let Some(outputs) = guard.as_ref() {
            return Ok(outputs.clone());
        }

        let pool = self.pool.wait().await;
        let keys: Vec<BitVec> = (0..self.count)
            .map(|j| {
                let index = self.offset + j;
                derive_key(&self.hash, index as u64, pool.rows[index], self.bitlen)
            })
            .collect();

        let outputs = if self.protocol == OtProtocol::Rot {
            keys
        } else {
            let choices = self
                .choices
                .lock()
                .unwrap()
                .clone()
                .ok_or(OtError::ChoicesMissing)?;
            let msgs: VectorMessages = self
                .comm
                .recv(MessageType::OtExtension, messages_id(self.id))
                .await?;
            self.decode(&choices, keys, msgs)?
        };

        *guard = Some(outputs.clone());
        Ok(outputs)
    }

    fn decode(
        &self,
        choices: &BitVec,
        keys: Vec<BitVec>,
        msgs: VectorMessages,
    ) -> Result<Vec<BitVec>, OtError> {
        match (self.protocol, msgs) {
            (OtProtocol::Got, VectorMessages::Pairs(pairs)) => {
                self.check_len(pairs.len())?;
                Ok(pairs
                    .iter()
                    .zip(keys)
                    .enumerate()
                    .map(|(j, (pair, key))| &pair[choices.get(j) as usize] ^ &key)
                    .collect())
            }
            (OtProtocol::Xcot, VectorMessages::Single(masked)) => {
                self.check_len(masked.len())?;
                Ok(masked
                    .iter()
                    .zip(keys)
                    .enumerate()
                    .map(|(j, (y, key))| if choices.get(j) { y ^ &key } else { key })
                    .collect())
            }
            (OtProtocol::Acot, VectorMessages::Single(masked)) => {
                self.check_len(masked.len())?;
                Ok(masked
                    .iter()
                    .zip(keys)
                    .enumerate()
                    .map(|(j, (y, key))| {
                        if choices.get(j) {
                            sub_mod(y, &key)
                        } else {
                            key
                        }
                    })
                    .collect())
            }
            _ => Err(OtError::MalformedMessage(
                "message kind does not match the vector's flavor".into(),
            )),
        }
    }

    fn check_len(&self, actual: usize) -> Result<(), OtError> {
        if actual != self.count {
            return Err(OtError::MalformedMessage(format!(
                "expected {} messages, got {actual}",
                self.count
            )));
        }
        Ok(())
    }
}
