//! Checksummed message framing codec.
//!
//! Messages are framed as:
//! - 4 bytes: network magic
//! - 12 bytes: ASCII command, NUL padded
//! - 4 bytes: little-endian payload length
//! - 4 bytes: first 4 bytes of SHA-256d(payload)
//! - N bytes: bincode payload

use bytes::{Buf, BufMut, BytesMut};
use squeak_core::crypto::sha256d;
use tokio_util::codec::{Decoder, Encoder};

use crate::config::{MAX_MESSAGE_SIZE, NETWORK_MAGIC};
use crate::error::{P2pError, P2pResult};
use crate::protocol::messages::COMMAND_SIZE;
use crate::protocol::Message;

/// Header size: magic + command + length + checksum.
pub const HEADER_SIZE: usize = 4 + COMMAND_SIZE + 4 + 4;

/// Largest payload that fits in a frame.
pub const MAX_PAYLOAD_SIZE: usize = MAX_MESSAGE_SIZE - HEADER_SIZE;

#[derive(Debug, Clone)]
struct Header {
    command: String,
    length: usize,
    checksum: [u8; 4],
}

/// Codec for checksummed message frames.
#[derive(Debug, Default)]
pub struct MessageCodec {
    /// Header of the frame being assembled, once it has been parsed.
    current: Option<Header>,
}

impl MessageCodec {
    /// Create a new message codec.
    pub fn new() -> Self {
        Self { current: None }
    }
}

fn checksum(payload: &[u8]) -> [u8; 4] {
    let digest = sha256d(payload);
    let mut out = [0u8; 4];
    out.copy_from_slice(&digest[..4]);
    out
}

fn parse_header(src: &[u8]) -> P2pResult<Header> {
    if src[..4] != NETWORK_MAGIC {
        return Err(P2pError::CorruptFrame(format!(
            "bad magic {:02x?}",
            &src[..4]
        )));
    }

    let raw_command = &src[4..4 + COMMAND_SIZE];
    let end = raw_command
        .iter()
        .position(|b| *b == 0)
        .unwrap_or(COMMAND_SIZE);
    if raw_command[end..].iter().any(|b| *b != 0) {
        return Err(P2pError::CorruptFrame("command not NUL padded".to_string()));
    }
    let command = std::str::from_utf8(&raw_command[..end])
        .map_err(|_| P2pError::CorruptFrame("command is not ASCII".to_string()))?
        .to_string();

    let mut length_bytes = [0u8; 4];
    length_bytes.copy_from_slice(&src[16..20]);
    let length = u32::from_le_bytes(length_bytes) as usize;
    if length > MAX_PAYLOAD_SIZE {
        return Err(P2pError::FrameTooLarge {
            size: HEADER_SIZE + length,
            max: MAX_MESSAGE_SIZE,
        });
    }

    let mut checksum = [0u8; 4];
    checksum.copy_from_slice(&src[20..24]);

    Ok(Header {
        command,
        length,
        checksum,
    })
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = P2pError;

    fn decode(&mut self, src: &mut BytesMut) -> P2pResult<Option<Self::Item>> {
        let header = match self.current.take() {
            Some(header) => header,
            None => {
                if src.len() < HEADER_SIZE {
                    return Ok(None);
                }
                parse_header(src)?
            }
        };

        // Nothing is consumed until the whole frame is buffered.
        if src.len() < HEADER_SIZE + header.length {
            src.reserve(HEADER_SIZE + header.length - src.len());
            self.current = Some(header);
            return Ok(None);
        }

        src.advance(HEADER_SIZE);
        let payload = src.split_to(header.length);

        if checksum(&payload) != header.checksum {
            return Err(P2pError::CorruptFrame(format!(
                "checksum mismatch on {}",
                header.command
            )));
        }

        Message::decode(&header.command, &payload)
            .map(Some)
            .map_err(|e| P2pError::CorruptFrame(format!("{}: {}", header.command, e)))
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = P2pError;

    fn encode(&mut self, message: Message, dst: &mut BytesMut) -> P2pResult<()> {
        let payload = message.encode_payload()?;
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(P2pError::FrameTooLarge {
                size: HEADER_SIZE + payload.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }

        let mut command = [0u8; COMMAND_SIZE];
        let name = message.command().as_bytes();
        let n = name.len().min(COMMAND_SIZE);
        command[..n].copy_from_slice(&name[..n]);

        dst.reserve(HEADER_SIZE + payload.len());
        dst.put_slice(&NETWORK_MAGIC);
        dst.put_slice(&command);
        dst.put_u32_le(payload.len() as u32);
        dst.put_slice(&checksum(&payload));
        dst.put_slice(&payload);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(command: &str, payload: &[u8]) -> BytesMut {
        let mut buf = BytesMut::new();
        let mut cmd = [0u8; COMMAND_SIZE];
        cmd[..command.len()].copy_from_slice(command.as_bytes());
        buf.put_slice(&NETWORK_MAGIC);
        buf.put_slice(&cmd);
        buf.put_u32_le(payload.len() as u32);
        buf.put_slice(&checksum(payload));
        buf.put_slice(payload);
        buf
    }

    #[test]
    fn test_roundtrip_ping() {
        let mut codec = MessageCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(Message::Ping(42), &mut buf).unwrap();

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, Message::Ping(42));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_empty_payload_frame() {
        let mut codec = MessageCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(Message::VersionAck, &mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE);

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, Message::VersionAck);
    }

    #[test]
    fn test_partial_header() {
        let mut codec = MessageCodec::new();
        let mut buf = BytesMut::new();
        buf.put_slice(&NETWORK_MAGIC);

        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn test_partial_payload_not_consumed() {
        let mut codec = MessageCodec::new();
        let mut full = BytesMut::new();
        codec.encode(Message::Pong(9), &mut full).unwrap();

        let mut buf = BytesMut::from(&full[..full.len() - 3]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), full.len() - 3);

        buf.put_slice(&full[full.len() - 3..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Message::Pong(9)));
    }

    #[test]
    fn test_invalid_magic() {
        let mut codec = MessageCodec::new();
        let mut buf = frame("verack", &[]);
        buf[0] = 0xFF;

        let result = codec.decode(&mut buf);
        assert!(matches!(result, Err(P2pError::CorruptFrame(_))));
    }

    #[test]
    fn test_bad_checksum() {
        let mut codec = MessageCodec::new();
        let mut buf = frame("ping", &7u64.to_le_bytes());
        let last = buf.len() - 1;
        buf[last] ^= 0x01;

        let result = codec.decode(&mut buf);
        assert!(matches!(result, Err(P2pError::CorruptFrame(_))));
    }

    #[test]
    fn test_undecodable_payload() {
        let mut codec = MessageCodec::new();
        let mut buf = frame("ping", &[1, 2, 3]);

        let result = codec.decode(&mut buf);
        assert!(matches!(result, Err(P2pError::CorruptFrame(_))));
    }

    #[test]
    fn test_declared_length_too_large() {
        let mut codec = MessageCodec::new();
        let mut buf = BytesMut::new();
        buf.put_slice(&NETWORK_MAGIC);
        buf.put_slice(&[0u8; COMMAND_SIZE]);
        buf.put_u32_le(MAX_MESSAGE_SIZE as u32);
        buf.put_slice(&[0u8; 4]);

        let result = codec.decode(&mut buf);
        assert!(matches!(result, Err(P2pError::FrameTooLarge { .. })));
    }

    #[test]
    fn test_unknown_command() {
        let mut codec = MessageCodec::new();
        let mut buf = frame("offer", &[0xAA, 0xBB]);

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(
            decoded,
            Message::Unknown {
                command: "offer".to_string()
            }
        );
    }

    #[test]
    fn test_multiple_messages() {
        let mut codec = MessageCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(Message::Ping(1), &mut buf).unwrap();
        codec.encode(Message::Pong(2), &mut buf).unwrap();

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Message::Ping(1)));
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Message::Pong(2)));
        assert!(buf.is_empty());
    }
}
