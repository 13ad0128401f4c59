//! Connection limit negotiation

use crate::error::{UaError, UaResult};
use crate::message::{AcknowledgeMessage, HelloMessage, PROTOCOL_VERSION};
use opcua_core::{StatusCode, UaString};
use serde::{Deserialize, Serialize};

/// Smallest buffer size either side may propose
pub const MIN_BUFFER_SIZE: u32 = 8192;

/// Locally configured connection limits
///
/// A value of 0 for `max_message_size` or `max_chunk_count` means
/// "no limit".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportLimits {
    pub receive_buffer_size: u32,
    pub send_buffer_size: u32,
    pub max_message_size: u32,
    pub max_chunk_count: u32,
}

impl Default for TransportLimits {
    fn default() -> Self {
        Self {
            receive_buffer_size: 65_535,
            send_buffer_size: 65_535,
            max_message_size: 16 * 1024 * 1024,
            max_chunk_count: 4096,
        }
    }
}

/// Limits in force on an established connection
///
/// Buffer sizes bound single chunks; message size and chunk count bound
/// whole messages. Both sides settle on the smaller non-zero message size
/// and chunk count, 0 meaning no limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiatedLimits {
    pub send_buffer_size: u32,
    pub receive_buffer_size: u32,
    pub send_max_message_size: u32,
    pub receive_max_message_size: u32,
    pub send_max_chunk_count: u32,
    pub receive_max_chunk_count: u32,
}

impl NegotiatedLimits {
    /// Limits usable before the handshake completed
    pub fn from_local(limits: &TransportLimits) -> Self {
        Self {
            send_buffer_size: limits.send_buffer_size,
            receive_buffer_size: limits.receive_buffer_size,
            send_max_message_size: limits.max_message_size,
            receive_max_message_size: limits.max_message_size,
            send_max_chunk_count: limits.max_chunk_count,
            receive_max_chunk_count: limits.max_chunk_count,
        }
    }
}

/// Smaller of two limits where 0 means unlimited
fn min_nonzero(a: u32, b: u32) -> u32 {
    match (a, b) {
        (0, b) => b,
        (a, 0) => a,
        (a, b) => a.min(b),
    }
}

fn check_buffer_sizes(receive: u32, send: u32) -> UaResult<()> {
    if receive < MIN_BUFFER_SIZE || send < MIN_BUFFER_SIZE {
        return Err(UaError::Status(StatusCode::BAD_TCP_NOT_ENOUGH_RESOURCES));
    }
    Ok(())
}

impl TransportLimits {
    /// The Hello a client sends for these limits
    pub fn hello(&self, endpoint_url: &str) -> HelloMessage {
        HelloMessage {
            protocol_version: PROTOCOL_VERSION,
            receive_buffer_size: self.receive_buffer_size,
            send_buffer_size: self.send_buffer_size,
            max_message_size: self.max_message_size,
            max_chunk_count: self.max_chunk_count,
            endpoint_url: UaString::from(endpoint_url),
        }
    }

    /// Server side: revise the client's proposal
    ///
    /// # Returns
    /// The limits to apply and the Acknowledge to send back
    ///
    /// # Errors
    /// `BadTcpNotEnoughResources` when the client proposes buffers below
    /// the protocol minimum
    pub fn negotiate_hello(&self, hello: &HelloMessage) -> UaResult<(NegotiatedLimits, AcknowledgeMessage)> {
        check_buffer_sizes(hello.receive_buffer_size, hello.send_buffer_size)?;
        let receive_buffer_size = self.receive_buffer_size.min(hello.send_buffer_size);
        let send_buffer_size = self.send_buffer_size.min(hello.receive_buffer_size);
        let negotiated = NegotiatedLimits {
            send_buffer_size,
            receive_buffer_size,
            send_max_message_size: min_nonzero(hello.max_message_size, self.max_message_size),
            receive_max_message_size: min_nonzero(hello.max_message_size, self.max_message_size),
            send_max_chunk_count: min_nonzero(hello.max_chunk_count, self.max_chunk_count),
            receive_max_chunk_count: min_nonzero(hello.max_chunk_count, self.max_chunk_count),
        };
        let ack = AcknowledgeMessage {
            protocol_version: PROTOCOL_VERSION,
            receive_buffer_size,
            send_buffer_size,
            max_message_size: self.max_message_size,
            max_chunk_count: self.max_chunk_count,
        };
        Ok((negotiated, ack))
    }

    /// Client side: adopt the server's answer
    ///
    /// # Errors
    /// Fails when the server revised a buffer above what was proposed or
    /// below the protocol minimum
    pub fn apply_acknowledge(&self, ack: &AcknowledgeMessage) -> UaResult<NegotiatedLimits> {
        check_buffer_sizes(ack.receive_buffer_size, ack.send_buffer_size)?;
        if ack.send_buffer_size > self.receive_buffer_size {
            return Err(UaError::Protocol(format!(
                "Server send buffer {} exceeds proposed receive buffer {}",
                ack.send_buffer_size, self.receive_buffer_size
            )));
        }
        Ok(NegotiatedLimits {
            send_buffer_size: ack.receive_buffer_size.min(self.send_buffer_size),
            receive_buffer_size: ack.send_buffer_size,
            send_max_message_size: min_nonzero(ack.max_message_size, self.max_message_size),
            receive_max_message_size: min_nonzero(ack.max_message_size, self.max_message_size),
            send_max_chunk_count: min_nonzero(ack.max_chunk_count, self.max_chunk_count),
            receive_max_chunk_count: min_nonzero(ack.max_chunk_count, self.max_chunk_count),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_takes_smaller_buffers() {
        let server = TransportLimits {
            receive_buffer_size: 32_768,
            send_buffer_size: 65_535,
            max_message_size: 1_000_000,
            max_chunk_count: 10,
        };
        let client = TransportLimits {
            receive_buffer_size: 16_384,
            send_buffer_size: 65_535,
            max_message_size: 2_000_000,
            max_chunk_count: 0,
        };
        let (server_side, ack) = server.negotiate_hello(&client.hello("opc.tcp://x")).unwrap();
        assert_eq!(server_side.receive_buffer_size, 32_768);
        assert_eq!(server_side.send_buffer_size, 16_384);
        assert_eq!(server_side.send_max_message_size, 1_000_000);
        assert_eq!(server_side.receive_max_chunk_count, 10);

        let client_side = client.apply_acknowledge(&ack).unwrap();
        assert_eq!(client_side.send_buffer_size, 32_768);
        assert_eq!(client_side.receive_buffer_size, 16_384);
        assert_eq!(client_side.send_max_message_size, 1_000_000);
        assert_eq!(client_side.send_max_chunk_count, 10);
    }

    #[test]
    fn test_tiny_buffers_rejected() {
        let mut hello = TransportLimits::default().hello("opc.tcp://x");
        hello.receive_buffer_size = 1024;
        let err = TransportLimits::default().negotiate_hello(&hello).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_TCP_NOT_ENOUGH_RESOURCES);
    }
}
