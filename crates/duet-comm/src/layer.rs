use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

use crate::{
    message::{decode_frame, encode_frame},
    other_party, CommError, MessageType, PartyId, Transport,
};

#[derive(Default)]
struct Slot {
    queue: VecDeque<Vec<u8>>,
    waiter: Option<oneshot::Sender<Vec<u8>>>,
}

#[derive(Default)]
struct SlotMap {
    map: HashMap<(MessageType, u64), Slot>,
    closed: Option<CommError>,
}

impl SlotMap {
    fn close(&mut self, err: CommError) {
        if self.closed.is_none() {
            self.closed = Some(err);
        }
        // Dropping the waiters fails their pending futures.
        for slot in self.map.values_mut() {
            slot.waiter = None;
        }
    }
}

enum Outgoing {
    Frame(Vec<u8>),
    Shutdown,
}

struct Inner {
    my_id: PartyId,
    outbox: mpsc::UnboundedSender<Outgoing>,
    slots: Arc<Mutex<SlotMap>>,
    sync_round: AtomicU64,
}

/// The typed message multiplexer between the two parties.
///
/// Cloning is cheap; all clones share the same transport and routing state.
/// Messages are keyed by `(MessageType, id)`; for every key at most one
/// receive future may be pending at a time, and frames with the same key are
/// delivered in the order they were sent.
#[derive(Clone)]
pub struct CommLayer {
    inner: Arc<Inner>,
}

impl CommLayer {
    /// Establishes the layer over a connected transport.
    ///
    /// Spawns the writer and demultiplexer tasks and performs the hello
    /// handshake; both parties must call this concurrently.
    pub async fn connect(transport: Transport, my_id: PartyId) -> Result<Self, CommError> {
        assert!(my_id <= 1, "party id must be 0 or 1");
        let Transport {
            mut sink,
            mut stream,
        } = transport;

        let slots = Arc::new(Mutex::new(SlotMap::default()));
        let (outbox, mut outbox_rx) = mpsc::unbounded_channel::<Outgoing>();

        let writer_slots = Arc::clone(&slots);
        tokio::spawn(async move {
            while let Some(out) = outbox_rx.recv().await {
                match out {
                    Outgoing::Frame(frame) => {
                        if let Err(err) = sink.send(frame).await {
                            writer_slots.lock().unwrap().close(err);
                            return;
                        }
                    }
                    Outgoing::Shutdown => {
                        let _ = sink.shutdown().await;
                        return;
                    }
                }
            }
        });

        let reader_slots = Arc::clone(&slots);
        tokio::spawn(async move {
            loop {
                match stream.recv().await {
                    Ok(Some(frame)) => {
                        let (ty, id, payload) = match decode_frame(frame) {
                            Ok(parts) => parts,
                            Err(err) => {
                                reader_slots.lock().unwrap().close(err);
                                return;
                            }
                        };
                        trace!(?ty, id, len = payload.len(), "frame received");
                        let mut slots = reader_slots.lock().unwrap();
                        let slot = slots.map.entry((ty, id)).or_default();
                        if let Some(waiter) = slot.waiter.take() {
                            // The waiter may have been dropped; requeue then.
                            if let Err(payload) = waiter.send(payload) {
                                slot.queue.push_back(payload);
                            }
                        } else {
                            slot.queue.push_back(payload);
                        }
                    }
                    Ok(None) => {
                        debug!("peer closed the connection");
                        reader_slots.lock().unwrap().close(CommError::PeerClosed);
                        return;
                    }
                    Err(err) => {
                        reader_slots.lock().unwrap().close(err);
                        return;
                    }
                }
            }
        });

        let layer = Self {
            inner: Arc::new(Inner {
                my_id,
                outbox,
                slots,
                sync_round: AtomicU64::new(0),
            }),
        };

        layer.send(MessageType::Hello, 0, &(my_id as u64))?;
        let peer_id: u64 = layer.recv(MessageType::Hello, 0).await?;
        if peer_id as usize != other_party(my_id) {
            return Err(CommError::Handshake(format!(
                "peer announced party id {peer_id}, expected {}",
                other_party(my_id)
            )));
        }

        Ok(layer)
    }

    /// Returns this party's id.
    pub fn my_id(&self) -> PartyId {
        self.inner.my_id
    }

    /// Returns the peer's id.
    pub fn peer_id(&self) -> PartyId {
        other_party(self.inner.my_id)
    }

    /// Serializes and sends a message to the peer.
    pub fn send<T: Serialize>(&self, ty: MessageType, id: u64, msg: &T) -> Result<(), CommError> {
        let payload = bincode::serialize(msg)?;
        trace!(?ty, id, len = payload.len(), "frame sent");
        self.inner
            .outbox
            .send(Outgoing::Frame(encode_frame(ty, id, &payload)))
            .map_err(|_| CommError::PeerClosed)
    }

    /// Receives the message with the given key, suspending until it arrives.
    ///
    /// Returns [`CommError::DuplicateReceiver`] if a future for this key is
    /// already pending.
    pub async fn recv<T: DeserializeOwned>(
        &self,
        ty: MessageType,
        id: u64,
    ) -> Result<T, CommError> {
        let pending = {
            let mut guard = self.inner.slots.lock().unwrap();
            let slots = &mut *guard;
            let slot = slots.map.entry((ty, id)).or_default();
            if let Some(payload) = slot.queue.pop_front() {
                if slot.queue.is_empty() && slot.waiter.is_none() {
                    slots.map.remove(&(ty, id));
                }
                Ok(payload)
            } else if let Some(err) = &slots.closed {
                return Err(err.clone());
            } else if slot.waiter.is_some() {
                return Err(CommError::DuplicateReceiver(ty, id));
            } else {
                let (tx, rx) = oneshot::channel();
                slot.waiter = Some(tx);
                Err(rx)
            }
        };

        let payload = match pending {
            Ok(payload) => payload,
            Err(rx) => rx.await.map_err(|_| self.closed_error())?,
        };

        bincode::deserialize(&payload).map_err(Into::into)
    }

    /// Runs a two-way synchronization barrier with the peer.
    ///
    /// Both parties must call this the same number of times.
    pub async fn sync(&self) -> Result<(), CommError> {
        let round = self.inner.sync_round.fetch_add(1, Ordering::Relaxed);
        self.send(MessageType::Sync, round, &())?;
        self.recv::<()>(MessageType::Sync, round).await
    }

    /// Flushes and shuts down the outgoing direction.
    pub fn shutdown(&self) {
        let _ = self.inner.outbox.send(Outgoing::Shutdown);
    }

    fn closed_error(&self) -> CommError {
        self.inner
            .slots
            .lock()
            .unwrap()
            .closed
            .clone()
            .unwrap_or(CommError::PeerClosed)
    }
}

impl std::fmt::Debug for CommLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommLayer")
            .field("my_id", &self.inner.my_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use crate::memory_transport_pair;

    use super::*;

    async fn connected_pair() -> (CommLayer, CommLayer) {
        let (t0, t1) = memory_transport_pair();
        let (a, b) = tokio::join!(CommLayer::connect(t0, 0), CommLayer::connect(t1, 1));
        (a.unwrap(), b.unwrap())
    }

    #[tokio::test]
    async fn test_send_then_recv() {
        let (a, b) = connected_pair().await;
        a.send(MessageType::GmwGate, 7, &vec![1u64, 2, 3]).unwrap();
        let msg: Vec<u64> = b.recv(MessageType::GmwGate, 7).await.unwrap();
        assert_eq!(msg, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_recv_before_send() {
        let (a, b) = connected_pair().await;
        let pending = tokio::spawn(async move { b.recv::<u32>(MessageType::GmwGate, 1).await });
        tokio::task::yield_now().await;
        a.send(MessageType::GmwGate, 1, &99u32).unwrap();
        assert_eq!(pending.await.unwrap().unwrap(), 99);
    }

    #[tokio::test]
    async fn test_fifo_per_key() {
        let (a, b) = connected_pair().await;
        for i in 0..10u32 {
            a.send(MessageType::OtExtension, 3, &i).unwrap();
        }
        for i in 0..10u32 {
            assert_eq!(b.recv::<u32>(MessageType::OtExtension, 3).await.unwrap(), i);
        }
    }

    #[tokio::test]
    async fn test_keys_do_not_interfere() {
        let (a, b) = connected_pair().await;
        a.send(MessageType::GmwGate, 2, &2u8).unwrap();
        a.send(MessageType::GmwGate, 1, &1u8).unwrap();
        assert_eq!(b.recv::<u8>(MessageType::GmwGate, 1).await.unwrap(), 1);
        assert_eq!(b.recv::<u8>(MessageType::GmwGate, 2).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_sync_barrier() {
        let (a, b) = connected_pair().await;
        let (ra, rb) = tokio::join!(a.sync(), b.sync());
        ra.unwrap();
        rb.unwrap();
    }

    #[tokio::test]
    async fn test_peer_drop_fails_pending_recv() {
        let (a, b) = connected_pair().await;
        let pending = tokio::spawn(async move { b.recv::<u32>(MessageType::GmwGate, 1).await });
        tokio::task::yield_now().await;
        a.shutdown();
        drop(a);
        assert!(pending.await.unwrap().is_err());
    }
}
