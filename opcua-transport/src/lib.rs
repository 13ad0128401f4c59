//! Transport layer for the OPC UA binary TCP mapping
//!
//! This crate provides the byte-stream abstraction (TCP and in-memory),
//! the common message header, the Hello/Acknowledge/Error handshake
//! messages with limit negotiation, and the framing buffer that cuts a
//! stream into whole messages.

pub mod buffer;
pub mod error;
pub mod limits;
pub mod memory;
pub mod message;
pub mod stream;
pub mod tcp;

pub use buffer::{MessageBuffer, RawMessage, read_message};
pub use error::{UaError, UaResult};
pub use limits::{MIN_BUFFER_SIZE, NegotiatedLimits, TransportLimits};
pub use memory::MemoryTransport;
pub use message::{
    AcknowledgeMessage, ChunkType, ErrorMessage, HandshakeMessage, HelloMessage,
    MESSAGE_HEADER_SIZE, MessageHeader, MessageType, PROTOCOL_VERSION,
};
pub use stream::{ByteStream, Connectable};
pub use tcp::{TcpSettings, TcpTransport};
