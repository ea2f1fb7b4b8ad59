use crate::MessageType;

/// An error raised by the communication layer.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CommError {
    /// The underlying transport failed.
    #[error("transport error: {0}")]
    Transport(String),
    /// The peer closed the connection or aborted the protocol.
    #[error("peer closed the connection")]
    PeerClosed,
    /// A message could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serde(String),
    /// A future for this key is already pending.
    #[error("a receiver for ({0:?}, {1}) is already registered")]
    DuplicateReceiver(MessageType, u64),
    /// An incoming frame was too short or malformed.
    #[error("malformed frame")]
    MalformedFrame,
    /// The handshake failed.
    #[error("handshake error: {0}")]
    Handshake(String),
}

impl From<std::io::Error> for CommError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<bincode::Error> for CommError {
    fn from(err: bincode::Error) -> Self {
        Self::Serde(err.to_string())
    }
}
