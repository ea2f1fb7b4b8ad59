use async_trait::async_trait;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream, ToSocketAddrs,
    },
    sync::mpsc,
};

use crate::CommError;

/// The outgoing half of a transport.
#[async_trait]
pub trait FrameSink: Send + 'static {
    /// Sends one frame to the peer.
    async fn send(&mut self, frame: Vec<u8>) -> Result<(), CommError>;

    /// Flushes and shuts down the outgoing direction.
    async fn shutdown(&mut self) -> Result<(), CommError>;
}

/// The incoming half of a transport.
#[async_trait]
pub trait FrameStream: Send + 'static {
    /// Receives one frame from the peer. Returns `None` once the peer has
    /// shut down its outgoing direction.
    async fn recv(&mut self) -> Result<Option<Vec<u8>>, CommError>;
}

/// A frame-oriented byte channel to the peer, split into its two directions
/// so that sending and receiving can proceed concurrently.
pub struct Transport {
    /// The outgoing half.
    pub sink: Box<dyn FrameSink>,
    /// The incoming half.
    pub stream: Box<dyn FrameStream>,
}

// ---------------------------------------------------------------------------
// In-memory transport
// ---------------------------------------------------------------------------

struct MemorySink(mpsc::UnboundedSender<Vec<u8>>);

struct MemoryStream(mpsc::UnboundedReceiver<Vec<u8>>);

#[async_trait]
impl FrameSink for MemorySink {
    async fn send(&mut self, frame: Vec<u8>) -> Result<(), CommError> {
        self.0.send(frame).map_err(|_| CommError::PeerClosed)
    }

    async fn shutdown(&mut self) -> Result<(), CommError> {
        Ok(())
    }
}

#[async_trait]
impl FrameStream for MemoryStream {
    async fn recv(&mut self) -> Result<Option<Vec<u8>>, CommError> {
        Ok(self.0.recv().await)
    }
}

/// Creates a connected pair of in-memory transports, one per party.
pub fn memory_transport_pair() -> (Transport, Transport) {
    let (tx0, rx0) = mpsc::unbounded_channel();
    let (tx1, rx1) = mpsc::unbounded_channel();
    (
        Transport {
            sink: Box::new(MemorySink(tx0)),
            stream: Box::new(MemoryStream(rx1)),
        },
        Transport {
            sink: Box::new(MemorySink(tx1)),
            stream: Box::new(MemoryStream(rx0)),
        },
    )
}

// ---------------------------------------------------------------------------
// TCP transport
// ---------------------------------------------------------------------------

/// A TCP transport with length-prefixed frames.
pub struct TcpTransport;

struct TcpSink(OwnedWriteHalf);

struct TcpStreamHalf(OwnedReadHalf);

impl TcpTransport {
    /// Connects to a listening peer.
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Transport, CommError> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self::from_stream(stream))
    }

    /// Accepts a single connection from the peer.
    pub async fn accept<A: ToSocketAddrs>(addr: A) -> Result<Transport, CommError> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let (stream, _) = listener.accept().await?;
        Ok(Self::from_stream(stream))
    }

    /// Wraps an established TCP stream.
    pub fn from_stream(stream: TcpStream) -> Transport {
        let _ = stream.set_nodelay(true);
        let (read, write) = stream.into_split();
        Transport {
            sink: Box::new(TcpSink(write)),
            stream: Box::new(TcpStreamHalf(read)),
        }
    }
}

#[async_trait]
impl FrameSink for TcpSink {
    async fn send(&mut self, frame: Vec<u8>) -> Result<(), CommError> {
        let len = u32::try_from(frame.len()).map_err(|_| {
            CommError::Transport(format!("frame of {} bytes exceeds u32", frame.len()))
        })?;
        self.0.write_all(&len.to_le_bytes()).await?;
        self.0.write_all(&frame).await?;
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), CommError> {
        self.0.shutdown().await?;
        Ok(())
    }
}

#[async_trait]
impl FrameStream for TcpStreamHalf {
    async fn recv(&mut self) -> Result<Option<Vec<u8>>, CommError> {
        let mut len_bytes = [0u8; 4];
        match self.0.read_exact(&mut len_bytes).await {
            Ok(_) => {}
            Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(err) => return Err(err.into()),
        }
        let len = u32::from_le_bytes(len_bytes) as usize;
        let mut frame = vec![0u8; len];
        self.0.read_exact(&mut frame).await?;
        Ok(Some(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_transport_delivers_in_order() {
        let (mut a, mut b) = memory_transport_pair();
        a.sink.send(vec![1]).await.unwrap();
        a.sink.send(vec![2]).await.unwrap();
        assert_eq!(b.stream.recv().await.unwrap(), Some(vec![1]));
        assert_eq!(b.stream.recv().await.unwrap(), Some(vec![2]));
    }

    #[tokio::test]
    async fn test_memory_transport_close() {
        let (a, mut b) = memory_transport_pair();
        drop(a);
        assert_eq!(b.stream.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_tcp_transport_roundtrip() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let accept = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            TcpTransport::from_stream(stream)
        });
        let mut client = TcpTransport::connect(addr).await.unwrap();
        let mut server = accept.await.unwrap();

        client.sink.send(b"ping".to_vec()).await.unwrap();
        assert_eq!(server.stream.recv().await.unwrap(), Some(b"ping".to_vec()));

        server.sink.send(b"pong".to_vec()).await.unwrap();
        assert_eq!(client.stream.recv().await.unwrap(), Some(b"pong".to_vec()));
    }
}
