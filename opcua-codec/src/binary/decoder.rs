//! Binary decoder

use crate::binary::BinaryEncodable;
use crate::binary::limits::DecodingLimits;
use crate::error::{UaError, UaResult};
use opcua_core::{ByteString, UaString};

/// Little-endian binary decoder over a borrowed buffer
///
/// Every length prefix is checked against the sentinel, the configured
/// limits and the bytes actually remaining before anything is allocated.
pub struct BinaryDecoder<'a> {
    buffer: &'a [u8],
    position: usize,
    limits: &'a DecodingLimits,
    depth: usize,
}

impl<'a> BinaryDecoder<'a> {
    pub fn new(buffer: &'a [u8], limits: &'a DecodingLimits) -> Self {
        Self {
            buffer,
            position: 0,
            limits,
            depth: 0,
        }
    }

    pub fn limits(&self) -> &DecodingLimits {
        self.limits
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.position
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Borrow the next `len` bytes
    pub fn decode_raw(&mut self, len: usize) -> UaResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(UaError::Decoding(format!(
                "Not enough bytes: need {}, have {}",
                len,
                self.remaining()
            )));
        }
        let bytes = &self.buffer[self.position..self.position + len];
        self.position += len;
        Ok(bytes)
    }

    fn decode_fixed<const N: usize>(&mut self) -> UaResult<[u8; N]> {
        let bytes = self.decode_raw(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn decode_bool(&mut self) -> UaResult<bool> {
        Ok(self.decode_u8()? != 0)
    }

    pub fn decode_u8(&mut self) -> UaResult<u8> {
        Ok(self.decode_fixed::<1>()?[0])
    }

    pub fn decode_i8(&mut self) -> UaResult<i8> {
        Ok(i8::from_le_bytes(self.decode_fixed()?))
    }

    pub fn decode_u16(&mut self) -> UaResult<u16> {
        Ok(u16::from_le_bytes(self.decode_fixed()?))
    }

    pub fn decode_i16(&mut self) -> UaResult<i16> {
        Ok(i16::from_le_bytes(self.decode_fixed()?))
    }

    pub fn decode_u32(&mut self) -> UaResult<u32> {
        Ok(u32::from_le_bytes(self.decode_fixed()?))
    }

    pub fn decode_i32(&mut self) -> UaResult<i32> {
        Ok(i32::from_le_bytes(self.decode_fixed()?))
    }

    pub fn decode_u64(&mut self) -> UaResult<u64> {
        Ok(u64::from_le_bytes(self.decode_fixed()?))
    }

    pub fn decode_i64(&mut self) -> UaResult<i64> {
        Ok(i64::from_le_bytes(self.decode_fixed()?))
    }

    pub fn decode_f32(&mut self) -> UaResult<f32> {
        Ok(f32::from_le_bytes(self.decode_fixed()?))
    }

    pub fn decode_f64(&mut self) -> UaResult<f64> {
        Ok(f64::from_le_bytes(self.decode_fixed()?))
    }

    /// Decode an int32 length prefix
    ///
    /// Returns `None` for the null sentinel -1. Any other negative value,
    /// or a value above `max`, is a decoding error.
    pub fn decode_length(&mut self, max: usize, what: &str) -> UaResult<Option<usize>> {
        let raw = self.decode_i32()?;
        if raw == -1 {
            return Ok(None);
        }
        let len = usize::try_from(raw).map_err(|_| {
            UaError::Decoding(format!("Invalid {} length {}", what, raw))
        })?;
        if len > max {
            return Err(UaError::Decoding(format!(
                "{} length {} exceeds limit {}",
                what, len, max
            )));
        }
        Ok(Some(len))
    }

    pub fn decode_string(&mut self) -> UaResult<UaString> {
        let max = self.limits.max_string_length;
        match self.decode_length(max, "String")? {
            None => Ok(UaString::null()),
            Some(len) => {
                let bytes = self.decode_raw(len)?;
                let s = std::str::from_utf8(bytes)
                    .map_err(|e| UaError::Decoding(format!("Invalid UTF-8 in string: {}", e)))?;
                Ok(UaString::from(s))
            }
        }
    }

    pub fn decode_byte_string(&mut self) -> UaResult<ByteString> {
        let max = self.limits.max_byte_string_length;
        match self.decode_length(max, "ByteString")? {
            None => Ok(ByteString::null()),
            Some(len) => Ok(ByteString::from(self.decode_raw(len)?)),
        }
    }

    /// Decode any encodable value
    pub fn decode<T: BinaryEncodable>(&mut self) -> UaResult<T> {
        T::decode(self)
    }

    /// Decode a nullable array: count -1 yields `None`
    pub fn decode_array<T: BinaryEncodable>(&mut self) -> UaResult<Option<Vec<T>>> {
        let max = self.limits.max_array_length;
        let Some(len) = self.decode_length(max, "Array")? else {
            return Ok(None);
        };
        // every element occupies at least one byte
        if len > self.remaining() {
            return Err(UaError::Decoding(format!(
                "Array length {} exceeds remaining {} bytes",
                len,
                self.remaining()
            )));
        }
        let mut values = Vec::with_capacity(len);
        for _ in 0..len {
            values.push(T::decode(self)?);
        }
        Ok(Some(values))
    }

    /// Decode an array, mapping the null array to an empty one
    pub fn decode_vec<T: BinaryEncodable>(&mut self) -> UaResult<Vec<T>> {
        Ok(self.decode_array()?.unwrap_or_default())
    }

    /// Run `f` one nesting level deeper
    pub fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> UaResult<T>) -> UaResult<T> {
        if self.depth >= self.limits.max_recursion_depth {
            return Err(UaError::Decoding(format!(
                "Nesting depth exceeds limit {}",
                self.limits.max_recursion_depth
            )));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_length_other_than_null_is_rejected() {
        let limits = DecodingLimits::default();
        let data = (-2i32).to_le_bytes();
        let mut decoder = BinaryDecoder::new(&data, &limits);
        assert!(matches!(decoder.decode_string(), Err(UaError::Decoding(_))));
    }

    #[test]
    fn test_length_above_limit_is_rejected() {
        let limits = DecodingLimits {
            max_string_length: 4,
            ..Default::default()
        };
        let mut data = 5i32.to_le_bytes().to_vec();
        data.extend_from_slice(b"hello");
        let mut decoder = BinaryDecoder::new(&data, &limits);
        assert!(decoder.decode_string().is_err());
    }

    #[test]
    fn test_underrun() {
        let limits = DecodingLimits::default();
        let data = [0x10, 0x00, 0x00, 0x00, b'a'];
        let mut decoder = BinaryDecoder::new(&data, &limits);
        assert!(decoder.decode_byte_string().is_err());
        let mut decoder = BinaryDecoder::new(&data[..3], &limits);
        assert!(decoder.decode_u32().is_err());
    }

    #[test]
    fn test_array_count_larger_than_buffer() {
        let limits = DecodingLimits::default();
        let data = 1000i32.to_le_bytes();
        let mut decoder = BinaryDecoder::new(&data, &limits);
        assert!(decoder.decode_array::<u32>().is_err());
    }
}
