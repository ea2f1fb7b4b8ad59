use crate::CommError;

/// The kind of a multiplexed message.
///
/// Every frame on the wire carries one of these tags followed by the numeric
/// id of the target (gate id, OT vector id, sync round). The payload schema
/// is defined per kind by the layer that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Connection handshake carrying the sender's party id.
    Hello = 0,
    /// Two-way synchronization barrier.
    Sync = 1,
    /// Base oblivious transfer.
    BaseOt = 2,
    /// OT extension: row masks, corrections and sender messages.
    OtExtension = 3,
    /// GMW gate messages, keyed by gate id.
    GmwGate = 4,
    /// BEAVY gate messages, keyed by gate id.
    BeavyGate = 5,
    /// Yao gate messages, keyed by gate id.
    YaoGate = 6,
}

impl MessageType {
    fn from_u8(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => Self::Hello,
            1 => Self::Sync,
            2 => Self::BaseOt,
            3 => Self::OtExtension,
            4 => Self::GmwGate,
            5 => Self::BeavyGate,
            6 => Self::YaoGate,
            _ => return None,
        })
    }
}

/// Header length: 1-byte tag + 8-byte id.
const HEADER_LEN: usize = 9;

/// Encodes a frame: tag, id, payload.
pub(crate) fn encode_frame(ty: MessageType, id: u64, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.push(ty as u8);
    frame.extend_from_slice(&id.to_le_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// Decodes a frame into tag, id and payload.
pub(crate) fn decode_frame(frame: Vec<u8>) -> Result<(MessageType, u64, Vec<u8>), CommError> {
    if frame.len() < HEADER_LEN {
        return Err(CommError::MalformedFrame);
    }
    let ty = MessageType::from_u8(frame[0]).ok_or(CommError::MalformedFrame)?;
    let id = u64::from_le_bytes(frame[1..9].try_into().expect("header has id bytes"));
    Ok((ty, id, frame[HEADER_LEN..].to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_roundtrip() {
        let frame = encode_frame(MessageType::GmwGate, 42, b"payload");
        let (ty, id, payload) = decode_frame(frame).unwrap();
        assert_eq!(ty, MessageType::GmwGate);
        assert_eq!(id, 42);
        assert_eq!(payload, b"payload");
    }

    #[test]
    fn test_short_frame_rejected() {
        assert!(matches!(
            decode_frame(vec![4, 0, 0]),
            Err(CommError::MalformedFrame)
        ));
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let frame = encode_frame(MessageType::Hello, 0, &[]);
        let mut bad = frame;
        bad[0] = 0xff;
        assert!(matches!(decode_frame(bad), Err(CommError::MalformedFrame)));
    }
}
