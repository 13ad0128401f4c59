//! Binary encoder

use crate::binary::BinaryEncodable;
use crate::error::{UaError, UaResult};
use bytes::{BufMut, BytesMut};
use opcua_core::{ByteString, UaString};

/// Little-endian binary encoder
///
/// Values are appended to an internal buffer; `into_bytes` hands it over.
#[derive(Debug, Default)]
pub struct BinaryEncoder {
    buffer: BytesMut,
}

impl BinaryEncoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    pub fn encode_bool(&mut self, value: bool) -> UaResult<()> {
        self.buffer.put_u8(u8::from(value));
        Ok(())
    }

    pub fn encode_u8(&mut self, value: u8) -> UaResult<()> {
        self.buffer.put_u8(value);
        Ok(())
    }

    pub fn encode_i8(&mut self, value: i8) -> UaResult<()> {
        self.buffer.put_i8(value);
        Ok(())
    }

    pub fn encode_u16(&mut self, value: u16) -> UaResult<()> {
        self.buffer.put_u16_le(value);
        Ok(())
    }

    pub fn encode_i16(&mut self, value: i16) -> UaResult<()> {
        self.buffer.put_i16_le(value);
        Ok(())
    }

    pub fn encode_u32(&mut self, value: u32) -> UaResult<()> {
        self.buffer.put_u32_le(value);
        Ok(())
    }

    pub fn encode_i32(&mut self, value: i32) -> UaResult<()> {
        self.buffer.put_i32_le(value);
        Ok(())
    }

    pub fn encode_u64(&mut self, value: u64) -> UaResult<()> {
        self.buffer.put_u64_le(value);
        Ok(())
    }

    pub fn encode_i64(&mut self, value: i64) -> UaResult<()> {
        self.buffer.put_i64_le(value);
        Ok(())
    }

    pub fn encode_f32(&mut self, value: f32) -> UaResult<()> {
        self.buffer.put_f32_le(value);
        Ok(())
    }

    pub fn encode_f64(&mut self, value: f64) -> UaResult<()> {
        self.buffer.put_f64_le(value);
        Ok(())
    }

    /// Append raw bytes without a length prefix
    pub fn encode_raw(&mut self, bytes: &[u8]) -> UaResult<()> {
        self.buffer.put_slice(bytes);
        Ok(())
    }

    /// Encode an int32 length prefix, -1 for null
    pub fn encode_length(&mut self, length: Option<usize>) -> UaResult<()> {
        match length {
            None => self.encode_i32(-1),
            Some(len) => {
                let len = i32::try_from(len).map_err(|_| {
                    UaError::Encoding(format!("Length {} does not fit a 32-bit prefix", len))
                })?;
                self.encode_i32(len)
            }
        }
    }

    pub fn encode_string(&mut self, value: &UaString) -> UaResult<()> {
        match value.value() {
            None => self.encode_length(None),
            Some(s) => {
                self.encode_length(Some(s.len()))?;
                self.encode_raw(s.as_bytes())
            }
        }
    }

    pub fn encode_byte_string(&mut self, value: &ByteString) -> UaResult<()> {
        match value.value() {
            None => self.encode_length(None),
            Some(bytes) => {
                self.encode_length(Some(bytes.len()))?;
                self.encode_raw(bytes)
            }
        }
    }

    /// Encode any encodable value
    pub fn encode<T: BinaryEncodable>(&mut self, value: &T) -> UaResult<()> {
        value.encode(self)
    }

    /// Encode a nullable array: `None` is written as count -1
    pub fn encode_array<T: BinaryEncodable>(&mut self, values: Option<&[T]>) -> UaResult<()> {
        match values {
            None => self.encode_length(None),
            Some(values) => self.encode_slice(values),
        }
    }

    /// Encode a non-null array
    pub fn encode_slice<T: BinaryEncodable>(&mut self, values: &[T]) -> UaResult<()> {
        self.encode_length(Some(values.len()))?;
        for value in values {
            value.encode(self)?;
        }
        Ok(())
    }

    /// Number of bytes written so far
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_little_endian() {
        let mut encoder = BinaryEncoder::new();
        encoder.encode_u32(0x0102_0304).unwrap();
        encoder.encode_i16(-2).unwrap();
        assert_eq!(encoder.into_bytes(), vec![0x04, 0x03, 0x02, 0x01, 0xFE, 0xFF]);
    }

    #[test]
    fn test_null_and_empty_string() {
        let mut encoder = BinaryEncoder::new();
        encoder.encode_string(&UaString::null()).unwrap();
        encoder.encode_string(&UaString::from("")).unwrap();
        assert_eq!(
            encoder.into_bytes(),
            vec![0xFF, 0xFF, 0xFF, 0xFF, 0x00, 0x00, 0x00, 0x00]
        );
    }
}
