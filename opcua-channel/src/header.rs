//! Security and sequence headers of secure channel chunks

use crate::error::UaResult;
use opcua_codec::{BinaryDecoder, BinaryEncodable, BinaryEncoder};
use opcua_core::{ByteString, UaString};

/// Size of the sequence header
pub const SEQUENCE_HEADER_SIZE: usize = 8;

/// Header of OpenSecureChannel chunks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsymmetricSecurityHeader {
    pub security_policy_uri: UaString,
    /// DER certificate of the sender, null for policy None
    pub sender_certificate: ByteString,
    /// SHA-1 thumbprint of the receiver's certificate, null for policy None
    pub receiver_certificate_thumbprint: ByteString,
}

impl AsymmetricSecurityHeader {
    pub fn none(security_policy_uri: &str) -> Self {
        Self {
            security_policy_uri: UaString::from(security_policy_uri),
            sender_certificate: ByteString::null(),
            receiver_certificate_thumbprint: ByteString::null(),
        }
    }
}

impl BinaryEncodable for AsymmetricSecurityHeader {
    fn encode(&self, encoder: &mut BinaryEncoder) -> UaResult<()> {
        encoder.encode_string(&self.security_policy_uri)?;
        encoder.encode_byte_string(&self.sender_certificate)?;
        encoder.encode_byte_string(&self.receiver_certificate_thumbprint)
    }

    fn decode(decoder: &mut BinaryDecoder<'_>) -> UaResult<Self> {
        Ok(Self {
            security_policy_uri: decoder.decode_string()?,
            sender_certificate: decoder.decode_byte_string()?,
            receiver_certificate_thumbprint: decoder.decode_byte_string()?,
        })
    }
}

/// Header of MSG and CLO chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymmetricSecurityHeader {
    pub token_id: u32,
}

impl BinaryEncodable for SymmetricSecurityHeader {
    fn encode(&self, encoder: &mut BinaryEncoder) -> UaResult<()> {
        encoder.encode_u32(self.token_id)
    }

    fn decode(decoder: &mut BinaryDecoder<'_>) -> UaResult<Self> {
        Ok(Self {
            token_id: decoder.decode_u32()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityHeader {
    Asymmetric(AsymmetricSecurityHeader),
    Symmetric(SymmetricSecurityHeader),
}

impl SecurityHeader {
    pub fn encode(&self, encoder: &mut BinaryEncoder) -> UaResult<()> {
        match self {
            SecurityHeader::Asymmetric(header) => header.encode(encoder),
            SecurityHeader::Symmetric(header) => header.encode(encoder),
        }
    }
}

/// Sequence number and request id of one chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceHeader {
    pub sequence_number: u32,
    pub request_id: u32,
}

impl BinaryEncodable for SequenceHeader {
    fn encode(&self, encoder: &mut BinaryEncoder) -> UaResult<()> {
        encoder.encode_u32(self.sequence_number)?;
        encoder.encode_u32(self.request_id)
    }

    fn decode(decoder: &mut BinaryDecoder<'_>) -> UaResult<Self> {
        Ok(Self {
            sequence_number: decoder.decode_u32()?,
            request_id: decoder.decode_u32()?,
        })
    }
}
