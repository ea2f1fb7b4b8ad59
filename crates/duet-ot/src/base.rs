//! Chou-Orlandi base oblivious transfer.
//!
//! Produces random-OT outputs: the sender obtains `count` key pairs, the
//! receiver one key per choice bit. The extension consumes these as seeds;
//! any authenticated channel suffices underneath.

use curve25519_dalek::{
    constants::RISTRETTO_BASEPOINT_POINT,
    ristretto::{CompressedRistretto, RistrettoPoint},
    scalar::Scalar,
};
use duet_comm::{CommLayer, MessageType};
use duet_core::Block;
use rand::rngs::OsRng;
use tracing::instrument;

use crate::{
    msgs::{BaseOtCommit, BaseOtResponse},
    OtError,
};

fn derive_block(session: u64, index: usize, point: &RistrettoPoint) -> Block {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&session.to_le_bytes());
    hasher.update(&(index as u64).to_le_bytes());
    hasher.update(point.compress().as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest.as_bytes()[..16]);
    Block::new(bytes)
}

/// Runs the sender side of `count` base OTs, returning the key pairs.
///
/// `session` keys the messages on the mux; both parties must use the same
/// session id for one run.
#[instrument(level = "debug", skip(comm), err)]
pub async fn base_ot_send(
    comm: &CommLayer,
    session: u64,
    count: usize,
) -> Result<Vec<[Block; 2]>, OtError> {
    let a = Scalar::random(&mut OsRng);
    let big_a = RISTRETTO_BASEPOINT_POINT * a;

    comm.send(
        MessageType::BaseOt,
        session << 1,
        &BaseOtCommit {
            point: big_a.compress().to_bytes(),
        },
    )?;

    let response: BaseOtResponse = comm.recv(MessageType::BaseOt, session << 1 | 1).await?;
    if response.points.len() != count {
        return Err(OtError::MalformedMessage(format!(
            "expected {count} points, got {}",
            response.points.len()
        )));
    }

    let a_big_a = big_a * a;
    response
        .points
        .iter()
        .enumerate()
        .map(|(i, bytes)| {
            let big_b = CompressedRistretto(*bytes)
                .decompress()
                .ok_or(OtError::InvalidPoint)?;
            let shared = big_b * a;
            Ok([
                derive_block(session, i, &shared),
                derive_block(session, i, &(shared - a_big_a)),
            ])
        })
        .collect()
}

/// Runs the receiver side of the base OTs, returning one key per choice.
#[instrument(level = "debug", skip(comm, choices), err)]
pub async fn base_ot_receive(
    comm: &CommLayer,
    session: u64,
    choices: &[bool],
) -> Result<Vec<Block>, OtError> {
    let commit: BaseOtCommit = comm.recv(MessageType::BaseOt, session << 1).await?;
    let big_a = CompressedRistretto(commit.point)
        .decompress()
        .ok_or(OtError::InvalidPoint)?;

    let mut scalars = Vec::with_capacity(choices.len());
    let mut points = Vec::with_capacity(choices.len());
    for &bit in choices {
        let x = Scalar::random(&mut OsRng);
        let mut big_b = RISTRETTO_BASEPOINT_POINT * x;
        if bit {
            big_b += big_a;
        }
        scalars.push(x);
        points.push(big_b.compress().to_bytes());
    }

    comm.send(
        MessageType::BaseOt,
        session << 1 | 1,
        &BaseOtResponse { points },
    )?;

    Ok(scalars
        .iter()
        .enumerate()
        .map(|(i, x)| derive_block(session, i, &(big_a * x)))
        .collect())
}

#[cfg(test)]
mod tests {
    use duet_comm::memory_transport_pair;
    use rand::Rng;

    use super::*;

    async fn comm_pair() -> (CommLayer, CommLayer) {
        let (t0, t1) = memory_transport_pair();
        let (a, b) = tokio::join!(CommLayer::connect(t0, 0), CommLayer::connect(t1, 1));
        (a.unwrap(), b.unwrap())
    }

    #[tokio::test]
    async fn test_base_ot_correctness() {
        let (c0, c1) = comm_pair().await;
        let choices: Vec<bool> = (0..64).map(|_| rand::thread_rng().gen()).collect();

        let choices_clone = choices.clone();
        let (pairs, received) = tokio::join!(
            base_ot_send(&c0, 0, 64),
            base_ot_receive(&c1, 0, &choices_clone),
        );
        let pairs = pairs.unwrap();
        let received = received.unwrap();

        for (i, &bit) in choices.iter().enumerate() {
            assert_eq!(received[i], pairs[i][bit as usize]);
            assert_ne!(received[i], pairs[i][!bit as usize]);
        }
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let (c0, c1) = comm_pair().await;

        let (first, second) = tokio::join!(
            async {
                let a = base_ot_send(&c0, 0, 8).await.unwrap();
                let b = base_ot_send(&c0, 1, 8).await.unwrap();
                (a, b)
            },
            async {
                let a = base_ot_receive(&c1, 0, &[false; 8]).await.unwrap();
                let b = base_ot_receive(&c1, 1, &[false; 8]).await.unwrap();
                (a, b)
            }
        );
        for i in 0..8 {
            assert_eq!(second.0[i], first.0[i][0]);
            assert_eq!(second.1[i], first.1[i][0]);
            assert_ne!(first.0[i][0], first.1[i][0]);
        }
    }
}
