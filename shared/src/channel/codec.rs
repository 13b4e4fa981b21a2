//! Length-prefixed framing for channel messages.
//!
//! Wire format: one byte event type, four bytes little-endian body length,
//! then the JSON-serialized [`ChannelMessage`] envelope. The leading type
//! byte lets a reader reject unknown traffic before touching the body; the
//! envelope rides inside the body so request and correlation ids survive
//! the network.

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::channel::{ChannelMessage, EventType};

/// Frames larger than this are rejected outright. Print payloads are at most
/// a few hundred kilobytes of escape codes; anything bigger is a protocol
/// violation.
pub const MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid event type byte {0}")]
    InvalidEventType(u8),

    #[error("frame of {0} bytes exceeds limit")]
    Oversized(usize),

    #[error("malformed envelope: {0}")]
    Envelope(#[from] serde_json::Error),

    #[error("envelope type {envelope} does not match frame type {frame}")]
    TypeMismatch { frame: EventType, envelope: EventType },

    #[error("channel error: {0}")]
    Channel(String),
}

/// Read one framed message.
pub async fn read_message<R: AsyncReadExt + Unpin>(
    reader: &mut R,
) -> Result<ChannelMessage, CodecError> {
    // Event type (1 byte)
    let mut type_buf = [0u8; 1];
    reader.read_exact(&mut type_buf).await?;
    let frame_type =
        EventType::try_from(type_buf[0]).map_err(|_| CodecError::InvalidEventType(type_buf[0]))?;

    // Body length (4 bytes)
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_BYTES {
        return Err(CodecError::Oversized(len));
    }

    // Body
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;

    let msg: ChannelMessage = serde_json::from_slice(&body)?;
    if msg.event_type != frame_type {
        return Err(CodecError::TypeMismatch {
            frame: frame_type,
            envelope: msg.event_type,
        });
    }

    Ok(msg)
}

/// Write one framed message.
pub async fn write_message<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    msg: &ChannelMessage,
) -> Result<(), CodecError> {
    let body = serde_json::to_vec(msg)?;

    let mut data = Vec::with_capacity(5 + body.len());
    data.push(msg.event_type as u8);
    data.extend_from_slice(&(body.len() as u32).to_le_bytes());
    data.extend_from_slice(&body);

    writer.write_all(&data).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MethodCallPayload;

    #[tokio::test]
    async fn test_round_trip() {
        let msg = ChannelMessage::method_call(&MethodCallPayload::new("getList"));

        let mut buf = Vec::new();
        write_message(&mut buf, &msg).await.unwrap();

        assert_eq!(buf[0], EventType::MethodCall as u8);
        let body_len = u32::from_le_bytes([buf[1], buf[2], buf[3], buf[4]]) as usize;
        assert_eq!(buf.len(), 5 + body_len);

        let decoded = read_message(&mut buf.as_slice()).await.unwrap();
        assert_eq!(decoded, msg);
    }

    #[tokio::test]
    async fn test_two_frames_back_to_back() {
        let first = ChannelMessage::method_call(&MethodCallPayload::new("close"));
        let second = ChannelMessage::method_call(&MethodCallPayload::new("getList"));

        let mut buf = Vec::new();
        write_message(&mut buf, &first).await.unwrap();
        write_message(&mut buf, &second).await.unwrap();

        let mut reader = buf.as_slice();
        assert_eq!(read_message(&mut reader).await.unwrap(), first);
        assert_eq!(read_message(&mut reader).await.unwrap(), second);
    }

    #[tokio::test]
    async fn test_invalid_event_type_rejected() {
        let buf = vec![9u8, 0, 0, 0, 0];
        let err = read_message(&mut buf.as_slice()).await.unwrap_err();
        assert!(matches!(err, CodecError::InvalidEventType(9)));
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let mut buf = vec![EventType::MethodCall as u8];
        buf.extend_from_slice(&(u32::MAX).to_le_bytes());
        let err = read_message(&mut buf.as_slice()).await.unwrap_err();
        assert!(matches!(err, CodecError::Oversized(_)));
    }

    #[tokio::test]
    async fn test_frame_type_must_match_envelope() {
        let msg = ChannelMessage::method_call(&MethodCallPayload::new("close"));
        let mut buf = Vec::new();
        write_message(&mut buf, &msg).await.unwrap();

        // Corrupt the frame type byte
        buf[0] = EventType::StateEvent as u8;
        let err = read_message(&mut buf.as_slice()).await.unwrap_err();
        assert!(matches!(err, CodecError::TypeMismatch { .. }));
    }
}
