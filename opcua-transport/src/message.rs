//! UA TCP message header and the connection handshake messages

use crate::error::{UaError, UaResult};
use opcua_codec::{BinaryDecoder, BinaryEncodable, BinaryEncoder, DecodingLimits};
use opcua_core::{StatusCode, UaString};

/// Size of the common message header
pub const MESSAGE_HEADER_SIZE: usize = 8;

/// Protocol version spoken by this stack
pub const PROTOCOL_VERSION: u32 = 0;

/// Three-letter message type token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Hello,
    Acknowledge,
    Error,
    OpenSecureChannel,
    CloseSecureChannel,
    Message,
}

impl MessageType {
    pub const fn token(&self) -> &'static [u8; 3] {
        match self {
            MessageType::Hello => b"HEL",
            MessageType::Acknowledge => b"ACK",
            MessageType::Error => b"ERR",
            MessageType::OpenSecureChannel => b"OPN",
            MessageType::CloseSecureChannel => b"CLO",
            MessageType::Message => b"MSG",
        }
    }

    pub fn from_token(token: &[u8]) -> Option<Self> {
        match token {
            b"HEL" => Some(MessageType::Hello),
            b"ACK" => Some(MessageType::Acknowledge),
            b"ERR" => Some(MessageType::Error),
            b"OPN" => Some(MessageType::OpenSecureChannel),
            b"CLO" => Some(MessageType::CloseSecureChannel),
            b"MSG" => Some(MessageType::Message),
            _ => None,
        }
    }

    /// Whether messages of this type travel inside a secure channel
    pub const fn is_secure(&self) -> bool {
        matches!(
            self,
            MessageType::OpenSecureChannel | MessageType::CloseSecureChannel | MessageType::Message
        )
    }
}

/// Chunk type flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkType {
    /// Last (or only) chunk of a message
    Final,
    /// More chunks follow
    Intermediate,
    /// The sender gave up on the message
    Abort,
}

impl ChunkType {
    pub const fn as_byte(&self) -> u8 {
        match self {
            ChunkType::Final => b'F',
            ChunkType::Intermediate => b'C',
            ChunkType::Abort => b'A',
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'F' => Some(ChunkType::Final),
            b'C' => Some(ChunkType::Intermediate),
            b'A' => Some(ChunkType::Abort),
            _ => None,
        }
    }
}

/// The 8-byte header common to every message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub message_type: MessageType,
    pub chunk_type: ChunkType,
    /// Total message size including this header
    pub message_size: u32,
}

impl MessageHeader {
    pub fn new(message_type: MessageType, chunk_type: ChunkType, message_size: u32) -> Self {
        Self {
            message_type,
            chunk_type,
            message_size,
        }
    }

    pub fn encode(&self, encoder: &mut BinaryEncoder) -> UaResult<()> {
        encoder.encode_raw(self.message_type.token())?;
        encoder.encode_u8(self.chunk_type.as_byte())?;
        encoder.encode_u32(self.message_size)
    }

    /// Decode a header from the first 8 bytes of `data`
    pub fn decode(data: &[u8]) -> UaResult<Self> {
        if data.len() < MESSAGE_HEADER_SIZE {
            return Err(UaError::Decoding(format!(
                "Message header too short: expected {}, got {}",
                MESSAGE_HEADER_SIZE,
                data.len()
            )));
        }
        let message_type = MessageType::from_token(&data[0..3])
            .ok_or(UaError::Status(StatusCode::BAD_TCP_MESSAGE_TYPE_INVALID))?;
        let chunk_type = ChunkType::from_byte(data[3])
            .ok_or(UaError::Status(StatusCode::BAD_TCP_MESSAGE_TYPE_INVALID))?;
        if !message_type.is_secure() && chunk_type != ChunkType::Final {
            return Err(UaError::Status(StatusCode::BAD_TCP_MESSAGE_TYPE_INVALID));
        }
        let message_size = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
        Ok(Self {
            message_type,
            chunk_type,
            message_size,
        })
    }
}

/// Prefix an encoded body with a Final header of `message_type`
fn frame(message_type: MessageType, body: &[u8]) -> UaResult<Vec<u8>> {
    let size = u32::try_from(MESSAGE_HEADER_SIZE + body.len())
        .map_err(|_| UaError::Encoding("Message too large".to_string()))?;
    let mut encoder = BinaryEncoder::with_capacity(size as usize);
    MessageHeader::new(message_type, ChunkType::Final, size).encode(&mut encoder)?;
    encoder.encode_raw(body)?;
    Ok(encoder.into_bytes())
}

/// Body of a message after its header
fn body_of(message: &[u8], expected: MessageType) -> UaResult<&[u8]> {
    let header = MessageHeader::decode(message)?;
    if header.message_type != expected {
        return Err(UaError::Protocol(format!(
            "Expected {:?} message, received {:?}",
            expected, header.message_type
        )));
    }
    Ok(&message[MESSAGE_HEADER_SIZE..])
}

/// Hello: the client's proposed connection limits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelloMessage {
    pub protocol_version: u32,
    pub receive_buffer_size: u32,
    pub send_buffer_size: u32,
    /// Largest response the client accepts, 0 for no limit
    pub max_message_size: u32,
    /// Most chunks per response the client accepts, 0 for no limit
    pub max_chunk_count: u32,
    pub endpoint_url: UaString,
}

impl BinaryEncodable for HelloMessage {
    fn encode(&self, encoder: &mut BinaryEncoder) -> UaResult<()> {
        encoder.encode_u32(self.protocol_version)?;
        encoder.encode_u32(self.receive_buffer_size)?;
        encoder.encode_u32(self.send_buffer_size)?;
        encoder.encode_u32(self.max_message_size)?;
        encoder.encode_u32(self.max_chunk_count)?;
        encoder.encode_string(&self.endpoint_url)
    }

    fn decode(decoder: &mut BinaryDecoder<'_>) -> UaResult<Self> {
        Ok(Self {
            protocol_version: decoder.decode_u32()?,
            receive_buffer_size: decoder.decode_u32()?,
            send_buffer_size: decoder.decode_u32()?,
            max_message_size: decoder.decode_u32()?,
            max_chunk_count: decoder.decode_u32()?,
            endpoint_url: decoder.decode_string()?,
        })
    }
}

/// Acknowledge: the limits the server accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcknowledgeMessage {
    pub protocol_version: u32,
    pub receive_buffer_size: u32,
    pub send_buffer_size: u32,
    /// Largest request the server accepts, 0 for no limit
    pub max_message_size: u32,
    /// Most chunks per request the server accepts, 0 for no limit
    pub max_chunk_count: u32,
}

impl BinaryEncodable for AcknowledgeMessage {
    fn encode(&self, encoder: &mut BinaryEncoder) -> UaResult<()> {
        encoder.encode_u32(self.protocol_version)?;
        encoder.encode_u32(self.receive_buffer_size)?;
        encoder.encode_u32(self.send_buffer_size)?;
        encoder.encode_u32(self.max_message_size)?;
        encoder.encode_u32(self.max_chunk_count)
    }

    fn decode(decoder: &mut BinaryDecoder<'_>) -> UaResult<Self> {
        Ok(Self {
            protocol_version: decoder.decode_u32()?,
            receive_buffer_size: decoder.decode_u32()?,
            send_buffer_size: decoder.decode_u32()?,
            max_message_size: decoder.decode_u32()?,
            max_chunk_count: decoder.decode_u32()?,
        })
    }
}

/// Error: sent by either side right before closing the connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMessage {
    pub error: StatusCode,
    pub reason: UaString,
}

impl ErrorMessage {
    pub fn new(error: StatusCode, reason: &str) -> Self {
        Self {
            error,
            reason: UaString::from(reason),
        }
    }
}

impl BinaryEncodable for ErrorMessage {
    fn encode(&self, encoder: &mut BinaryEncoder) -> UaResult<()> {
        self.error.encode(encoder)?;
        encoder.encode_string(&self.reason)
    }

    fn decode(decoder: &mut BinaryDecoder<'_>) -> UaResult<Self> {
        Ok(Self {
            error: StatusCode::decode(decoder)?,
            reason: decoder.decode_string()?,
        })
    }
}

/// A handshake message with its fixed message type
pub trait HandshakeMessage: BinaryEncodable {
    const MESSAGE_TYPE: MessageType;

    /// Encode with the message header
    fn to_message(&self) -> UaResult<Vec<u8>> {
        frame(Self::MESSAGE_TYPE, &self.encode_to_vec()?)
    }

    /// Decode a complete message, header included
    fn from_message(message: &[u8], limits: &DecodingLimits) -> UaResult<Self> {
        Self::decode_exact(body_of(message, Self::MESSAGE_TYPE)?, limits)
    }
}

impl HandshakeMessage for HelloMessage {
    const MESSAGE_TYPE: MessageType = MessageType::Hello;
}

impl HandshakeMessage for AcknowledgeMessage {
    const MESSAGE_TYPE: MessageType = MessageType::Acknowledge;
}

impl HandshakeMessage for ErrorMessage {
    const MESSAGE_TYPE: MessageType = MessageType::Error;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hello_wire_layout() {
        let hello = HelloMessage {
            protocol_version: 0,
            receive_buffer_size: 65_536,
            send_buffer_size: 65_536,
            max_message_size: 0,
            max_chunk_count: 0,
            endpoint_url: UaString::from("opc.tcp://h:4840"),
        };
        let bytes = hello.to_message().unwrap();
        assert_eq!(&bytes[..4], b"HELF");
        assert_eq!(u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize, bytes.len());
        let decoded = HelloMessage::from_message(&bytes, &DecodingLimits::default()).unwrap();
        assert_eq!(decoded, hello);
    }

    #[test]
    fn test_wrong_message_type_rejected() {
        let error = ErrorMessage::new(StatusCode::BAD_TCP_INTERNAL_ERROR, "boom");
        let bytes = error.to_message().unwrap();
        assert!(HelloMessage::from_message(&bytes, &DecodingLimits::default()).is_err());
        let decoded = ErrorMessage::from_message(&bytes, &DecodingLimits::default()).unwrap();
        assert_eq!(decoded.reason.as_str(), "boom");
    }

    #[test]
    fn test_header_rejects_unknown_tokens() {
        assert!(MessageHeader::decode(b"XYZF\x08\0\0\0").is_err());
        assert!(MessageHeader::decode(b"HELC\x08\0\0\0").is_err());
        let header = MessageHeader::decode(b"MSGA\x10\0\0\0").unwrap();
        assert_eq!(header.chunk_type, ChunkType::Abort);
        assert_eq!(header.message_size, 16);
    }
}
