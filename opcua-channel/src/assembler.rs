//! Reassembly of chunk bodies into whole messages

use crate::error::{UaError, UaResult};
use opcua_codec::{BinaryDecoder, BinaryEncodable, DecodingLimits};
use opcua_core::StatusCode;
use opcua_transport::{ChunkType, MessageType};
use std::collections::HashMap;

/// Messages one channel may have half assembled at a time
pub const DEFAULT_MAX_PENDING_MESSAGES: usize = 16;

/// Result of feeding one opened chunk
#[derive(Debug, Clone, PartialEq)]
pub enum Assembled {
    /// More chunks are needed
    Partial,
    /// A Final chunk completed a message
    Complete {
        message_type: MessageType,
        request_id: u32,
        body: Vec<u8>,
    },
    /// The sender aborted the message for `request_id`
    Aborted {
        request_id: u32,
        status: StatusCode,
        reason: String,
    },
}

#[derive(Debug)]
struct Partial {
    message_type: MessageType,
    body: Vec<u8>,
    chunks: usize,
}

/// Collects chunk bodies per request id
#[derive(Debug)]
pub struct MessageAssembler {
    partial: HashMap<u32, Partial>,
    /// 0 for no limit
    max_message_size: usize,
    /// 0 for no limit
    max_chunk_count: usize,
    max_pending: usize,
}

impl MessageAssembler {
    pub fn new(max_message_size: usize, max_chunk_count: usize) -> Self {
        Self {
            partial: HashMap::new(),
            max_message_size,
            max_chunk_count,
            max_pending: DEFAULT_MAX_PENDING_MESSAGES,
        }
    }

    /// Bound the number of request ids awaiting more chunks
    pub fn set_max_pending(&mut self, max_pending: usize) {
        self.max_pending = max_pending.max(1);
    }

    pub fn set_limits(&mut self, max_message_size: usize, max_chunk_count: usize) {
        self.max_message_size = max_message_size;
        self.max_chunk_count = max_chunk_count;
    }

    /// Number of messages awaiting more chunks
    pub fn pending(&self) -> usize {
        self.partial.len()
    }

    /// Add an opened chunk body
    ///
    /// # Errors
    /// `BadTcpMessageTooLarge` when the message grows past the negotiated
    /// size or chunk count, `BadTcpNotEnoughResources` when a new message
    /// would exceed the pending message bound; chunks of one request id
    /// changing message type are a protocol error
    pub fn push(
        &mut self,
        message_type: MessageType,
        chunk_type: ChunkType,
        request_id: u32,
        segment: Vec<u8>,
        limits: &DecodingLimits,
    ) -> UaResult<Assembled> {
        if chunk_type == ChunkType::Abort {
            self.partial.remove(&request_id);
            let mut decoder = BinaryDecoder::new(&segment, limits);
            let status = StatusCode::decode(&mut decoder)?;
            let reason = decoder.decode_string()?.into_inner().unwrap_or_default();
            return Ok(Assembled::Aborted {
                request_id,
                status,
                reason,
            });
        }

        if chunk_type == ChunkType::Intermediate
            && !self.partial.contains_key(&request_id)
            && self.partial.len() >= self.max_pending
        {
            return Err(UaError::Status(StatusCode::BAD_TCP_NOT_ENOUGH_RESOURCES));
        }

        let partial = self.partial.entry(request_id).or_insert_with(|| Partial {
            message_type,
            body: Vec::new(),
            chunks: 0,
        });
        if partial.message_type != message_type {
            return Err(UaError::Protocol(format!(
                "Request {} mixes {:?} and {:?} chunks",
                request_id, partial.message_type, message_type
            )));
        }
        partial.chunks += 1;
        partial.body.extend_from_slice(&segment);

        let too_many_chunks = self.max_chunk_count > 0 && partial.chunks > self.max_chunk_count;
        let too_large = self.max_message_size > 0 && partial.body.len() > self.max_message_size;
        if too_many_chunks || too_large {
            self.partial.remove(&request_id);
            return Err(UaError::Status(StatusCode::BAD_TCP_MESSAGE_TOO_LARGE));
        }

        if chunk_type == ChunkType::Final {
            if let Some(done) = self.partial.remove(&request_id) {
                return Ok(Assembled::Complete {
                    message_type: done.message_type,
                    request_id,
                    body: done.body,
                });
            }
        }
        Ok(Assembled::Partial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opcua_codec::BinaryEncoder;
    use opcua_core::UaString;

    fn push(
        assembler: &mut MessageAssembler,
        chunk_type: ChunkType,
        request_id: u32,
        segment: &[u8],
    ) -> UaResult<Assembled> {
        assembler.push(
            MessageType::Message,
            chunk_type,
            request_id,
            segment.to_vec(),
            &DecodingLimits::default(),
        )
    }

    #[test]
    fn test_interleaved_requests() {
        let mut assembler = MessageAssembler::new(0, 0);
        assert_eq!(push(&mut assembler, ChunkType::Intermediate, 1, b"ab").unwrap(), Assembled::Partial);
        assert_eq!(push(&mut assembler, ChunkType::Intermediate, 2, b"xy").unwrap(), Assembled::Partial);
        assert_eq!(
            push(&mut assembler, ChunkType::Final, 1, b"c").unwrap(),
            Assembled::Complete {
                message_type: MessageType::Message,
                request_id: 1,
                body: b"abc".to_vec()
            }
        );
        assert_eq!(assembler.pending(), 1);
    }

    #[test]
    fn test_abort_discards_only_its_request() {
        let mut assembler = MessageAssembler::new(0, 0);
        push(&mut assembler, ChunkType::Intermediate, 1, b"ab").unwrap();
        push(&mut assembler, ChunkType::Intermediate, 2, b"xy").unwrap();

        let mut encoder = BinaryEncoder::new();
        StatusCode::BAD_REQUEST_TOO_LARGE.encode(&mut encoder).unwrap();
        encoder.encode_string(&UaString::from("too big")).unwrap();
        let aborted = push(&mut assembler, ChunkType::Abort, 1, &encoder.into_bytes()).unwrap();
        assert_eq!(
            aborted,
            Assembled::Aborted {
                request_id: 1,
                status: StatusCode::BAD_REQUEST_TOO_LARGE,
                reason: "too big".to_string()
            }
        );
        match push(&mut assembler, ChunkType::Final, 2, b"z").unwrap() {
            Assembled::Complete { body, .. } => assert_eq!(body, b"xyz"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_limits() {
        let mut assembler = MessageAssembler::new(4, 0);
        push(&mut assembler, ChunkType::Intermediate, 1, b"abc").unwrap();
        let err = push(&mut assembler, ChunkType::Final, 1, b"de").unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_TCP_MESSAGE_TOO_LARGE);

        let mut assembler = MessageAssembler::new(0, 2);
        push(&mut assembler, ChunkType::Intermediate, 1, b"a").unwrap();
        push(&mut assembler, ChunkType::Intermediate, 1, b"b").unwrap();
        assert!(push(&mut assembler, ChunkType::Final, 1, b"c").is_err());
    }

    #[test]
    fn test_pending_messages_are_bounded() {
        let mut assembler = MessageAssembler::new(1024, 4);
        assembler.set_max_pending(4);
        for request_id in 1..=4 {
            push(&mut assembler, ChunkType::Intermediate, request_id, &[0u8; 512]).unwrap();
        }
        let err = push(&mut assembler, ChunkType::Intermediate, 5, &[0u8; 512]).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_TCP_NOT_ENOUGH_RESOURCES);
        assert!(err.is_fatal());
        assert_eq!(assembler.pending(), 4);

        // Known ids continue and single chunk messages still pass
        push(&mut assembler, ChunkType::Intermediate, 1, b"a").unwrap();
        assert!(matches!(
            push(&mut assembler, ChunkType::Final, 9, b"x").unwrap(),
            Assembled::Complete { request_id: 9, .. }
        ));
        assert!(matches!(
            push(&mut assembler, ChunkType::Final, 2, b"b").unwrap(),
            Assembled::Complete { request_id: 2, .. }
        ));
        push(&mut assembler, ChunkType::Intermediate, 5, b"c").unwrap();
        assert_eq!(assembler.pending(), 4);
    }
}
