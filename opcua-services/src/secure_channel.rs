//! OpenSecureChannel and CloseSecureChannel messages

use crate::header::{RequestHeader, ResponseHeader};
use opcua_codec::{BinaryDecoder, BinaryEncodable, BinaryEncoder};
use opcua_core::{ByteString, DateTime, UaError, UaResult};
use opcua_security::MessageSecurityMode;

ua_enum! {
    /// Whether an OpenSecureChannel creates a channel or renews its token
    pub enum SecurityTokenRequestType {
        Issue = 0,
        Renew = 1,
    }
}

pub(crate) fn encode_mode(mode: MessageSecurityMode, encoder: &mut BinaryEncoder) -> UaResult<()> {
    encoder.encode_i32(mode.id() as i32)
}

pub(crate) fn decode_mode(decoder: &mut BinaryDecoder<'_>) -> UaResult<MessageSecurityMode> {
    let value = decoder.decode_i32()?;
    u32::try_from(value)
        .map_err(|_| UaError::Decoding(format!("Invalid message security mode: {}", value)))
        .and_then(MessageSecurityMode::from_id)
}

ua_struct! {
    /// The token a server issued for a channel
    pub struct ChannelSecurityToken {
        pub channel_id: u32,
        pub token_id: u32,
        pub created_at: DateTime,
        /// Milliseconds
        pub revised_lifetime: u32,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenSecureChannelRequest {
    pub request_header: RequestHeader,
    pub client_protocol_version: u32,
    pub request_type: SecurityTokenRequestType,
    pub security_mode: MessageSecurityMode,
    pub client_nonce: ByteString,
    /// Milliseconds
    pub requested_lifetime: u32,
}

impl BinaryEncodable for OpenSecureChannelRequest {
    fn encode(&self, encoder: &mut BinaryEncoder) -> UaResult<()> {
        self.request_header.encode(encoder)?;
        encoder.encode_u32(self.client_protocol_version)?;
        self.request_type.encode(encoder)?;
        encode_mode(self.security_mode, encoder)?;
        encoder.encode_byte_string(&self.client_nonce)?;
        encoder.encode_u32(self.requested_lifetime)
    }

    fn decode(decoder: &mut BinaryDecoder<'_>) -> UaResult<Self> {
        Ok(Self {
            request_header: decoder.decode()?,
            client_protocol_version: decoder.decode_u32()?,
            request_type: decoder.decode()?,
            security_mode: decode_mode(decoder)?,
            client_nonce: decoder.decode_byte_string()?,
            requested_lifetime: decoder.decode_u32()?,
        })
    }
}

ua_struct! {
    pub struct OpenSecureChannelResponse {
        pub response_header: ResponseHeader,
        pub server_protocol_version: u32,
        pub security_token: ChannelSecurityToken,
        pub server_nonce: ByteString,
    }
}

ua_struct! {
    pub struct CloseSecureChannelRequest {
        pub request_header: RequestHeader,
    }
}

ua_struct! {
    pub struct CloseSecureChannelResponse {
        pub response_header: ResponseHeader,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opcua_codec::DecodingLimits;

    #[test]
    fn test_open_request_round_trip() {
        let request = OpenSecureChannelRequest {
            request_header: RequestHeader::default(),
            client_protocol_version: 0,
            request_type: SecurityTokenRequestType::Renew,
            security_mode: MessageSecurityMode::SignAndEncrypt,
            client_nonce: ByteString::from(vec![3u8; 32]),
            requested_lifetime: 60_000,
        };
        let bytes = request.encode_to_vec().unwrap();
        let decoded = OpenSecureChannelRequest::decode_exact(&bytes, &DecodingLimits::default()).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_invalid_request_type_rejected() {
        let mut bytes = RequestHeader::default().encode_to_vec().unwrap();
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&7i32.to_le_bytes());
        assert!(OpenSecureChannelRequest::decode_exact(&bytes, &DecodingLimits::default()).is_err());
    }
}
