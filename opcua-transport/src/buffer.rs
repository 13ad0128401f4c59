//! Reassembly of whole messages from a byte stream

use crate::error::{UaError, UaResult};
use crate::message::{MESSAGE_HEADER_SIZE, MessageHeader};
use crate::stream::ByteStream;
use bytes::BytesMut;
use opcua_core::StatusCode;

const READ_CHUNK: usize = 8192;

/// One complete message as read from the wire, header included
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub header: MessageHeader,
    pub data: Vec<u8>,
}

/// Accumulates stream bytes and cuts them into messages
///
/// The header's size field is validated as soon as 8 bytes are present,
/// so an oversized message is rejected before its body is buffered.
#[derive(Debug)]
pub struct MessageBuffer {
    buffer: BytesMut,
    max_message_size: usize,
}

impl MessageBuffer {
    pub fn new(max_message_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(READ_CHUNK),
            max_message_size,
        }
    }

    /// Bound a single message, typically the negotiated receive buffer size
    pub fn set_max_message_size(&mut self, max_message_size: usize) {
        self.max_message_size = max_message_size;
    }

    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Take the next complete message, if one is buffered
    pub fn next_message(&mut self) -> UaResult<Option<RawMessage>> {
        if self.buffer.len() < MESSAGE_HEADER_SIZE {
            return Ok(None);
        }
        let header = MessageHeader::decode(&self.buffer[..MESSAGE_HEADER_SIZE])?;
        let size = header.message_size as usize;
        if size < MESSAGE_HEADER_SIZE {
            return Err(UaError::Status(StatusCode::BAD_TCP_INTERNAL_ERROR));
        }
        if size > self.max_message_size {
            return Err(UaError::Status(StatusCode::BAD_TCP_MESSAGE_TOO_LARGE));
        }
        if self.buffer.len() < size {
            return Ok(None);
        }
        let data = self.buffer.split_to(size).to_vec();
        Ok(Some(RawMessage { header, data }))
    }
}

/// Read until `buffer` yields a complete message
///
/// Cancel safe as long as `buffer` outlives the future: bytes already read
/// stay in the buffer.
pub async fn read_message<S>(stream: &mut S, buffer: &mut MessageBuffer) -> UaResult<RawMessage>
where
    S: ByteStream + ?Sized,
{
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        if let Some(message) = buffer.next_message()? {
            return Ok(message);
        }
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(UaError::Connection(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "Connection closed by peer",
            )));
        }
        buffer.extend(&chunk[..n]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryTransport;
    use crate::message::{ErrorMessage, HandshakeMessage, MessageType};
    use tokio_test::assert_ok;

    #[test]
    fn test_split_across_reads() {
        let message = ErrorMessage::new(StatusCode::BAD_TIMEOUT, "late").to_message().unwrap();
        let mut buffer = MessageBuffer::new(65_535);
        buffer.extend(&message[..5]);
        assert!(buffer.next_message().unwrap().is_none());
        buffer.extend(&message[5..]);
        buffer.extend(&message[..3]);
        let raw = buffer.next_message().unwrap().unwrap();
        assert_eq!(raw.header.message_type, MessageType::Error);
        assert_eq!(raw.data, message);
        assert_eq!(buffer.buffered(), 3);
    }

    #[test]
    fn test_oversized_message_rejected_from_header() {
        let mut buffer = MessageBuffer::new(8192);
        buffer.extend(b"MSGF\x00\x00\x01\x00");
        let err = buffer.next_message().unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_TCP_MESSAGE_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_read_message_from_stream() {
        let (mut a, mut b) = MemoryTransport::pair(1024);
        let first = ErrorMessage::new(StatusCode::BAD_TIMEOUT, "a").to_message().unwrap();
        let second = ErrorMessage::new(StatusCode::BAD_SHUTDOWN, "b").to_message().unwrap();
        let mut both = first.clone();
        both.extend_from_slice(&second);
        a.write_all(&both).await.unwrap();

        let mut buffer = MessageBuffer::new(65_535);
        let raw = assert_ok!(read_message(&mut b, &mut buffer).await);
        assert_eq!(raw.data, first);
        let raw = assert_ok!(read_message(&mut b, &mut buffer).await);
        assert_eq!(raw.data, second);

        a.close().await.unwrap();
        assert!(read_message(&mut b, &mut buffer).await.is_err());
    }
}
