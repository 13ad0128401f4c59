//! OPC UA binary encoding
//!
//! `BinaryEncoder` and `BinaryDecoder` handle the primitive wire rules;
//! structured types implement `BinaryEncodable` on top of them.

pub mod builtin;
pub mod decoder;
pub mod encoder;
pub mod extension;
pub mod limits;

pub use decoder::BinaryDecoder;
pub use encoder::BinaryEncoder;
pub use extension::ExtensionObjectExt;
pub use limits::DecodingLimits;

use crate::error::{UaError, UaResult};

/// A type with a binary wire representation
pub trait BinaryEncodable: Sized {
    fn encode(&self, encoder: &mut BinaryEncoder) -> UaResult<()>;

    fn decode(decoder: &mut BinaryDecoder<'_>) -> UaResult<Self>;

    /// Encode into a fresh buffer
    fn encode_to_vec(&self) -> UaResult<Vec<u8>> {
        let mut encoder = BinaryEncoder::new();
        self.encode(&mut encoder)?;
        Ok(encoder.into_bytes())
    }

    /// Decode a value that must occupy the whole slice
    fn decode_exact(bytes: &[u8], limits: &DecodingLimits) -> UaResult<Self> {
        let mut decoder = BinaryDecoder::new(bytes, limits);
        let value = Self::decode(&mut decoder)?;
        if !decoder.is_empty() {
            return Err(UaError::Decoding(format!(
                "{} trailing bytes after value",
                decoder.remaining()
            )));
        }
        Ok(value)
    }
}
