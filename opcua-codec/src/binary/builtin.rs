//! Encodings of the built-in types

use crate::binary::{BinaryDecoder, BinaryEncodable, BinaryEncoder};
use crate::error::{UaError, UaResult};
use opcua_core::{
    ByteString, DataValue, DateTime, DiagnosticInfo, ExtensionObject, ExtensionObjectBody, Guid,
    Identifier, LocalizedText, NodeId, QualifiedName, StatusCode, UaString, Variant, VariantArray,
    VariantType,
};

macro_rules! primitive {
    ($ty:ty, $encode:ident, $decode:ident) => {
        impl BinaryEncodable for $ty {
            fn encode(&self, encoder: &mut BinaryEncoder) -> UaResult<()> {
                encoder.$encode(*self)
            }

            fn decode(decoder: &mut BinaryDecoder<'_>) -> UaResult<Self> {
                decoder.$decode()
            }
        }
    };
}

primitive!(bool, encode_bool, decode_bool);
primitive!(u8, encode_u8, decode_u8);
primitive!(i8, encode_i8, decode_i8);
primitive!(u16, encode_u16, decode_u16);
primitive!(i16, encode_i16, decode_i16);
primitive!(u32, encode_u32, decode_u32);
primitive!(i32, encode_i32, decode_i32);
primitive!(u64, encode_u64, decode_u64);
primitive!(i64, encode_i64, decode_i64);
primitive!(f32, encode_f32, decode_f32);
primitive!(f64, encode_f64, decode_f64);

impl BinaryEncodable for UaString {
    fn encode(&self, encoder: &mut BinaryEncoder) -> UaResult<()> {
        encoder.encode_string(self)
    }

    fn decode(decoder: &mut BinaryDecoder<'_>) -> UaResult<Self> {
        decoder.decode_string()
    }
}

impl BinaryEncodable for ByteString {
    fn encode(&self, encoder: &mut BinaryEncoder) -> UaResult<()> {
        encoder.encode_byte_string(self)
    }

    fn decode(decoder: &mut BinaryDecoder<'_>) -> UaResult<Self> {
        decoder.decode_byte_string()
    }
}

/// Nullable arrays of any encodable element
impl<T: BinaryEncodable> BinaryEncodable for Option<Vec<T>> {
    fn encode(&self, encoder: &mut BinaryEncoder) -> UaResult<()> {
        encoder.encode_array(self.as_deref())
    }

    fn decode(decoder: &mut BinaryDecoder<'_>) -> UaResult<Self> {
        decoder.decode_array()
    }
}

/// Arrays where null and empty mean the same thing; null decodes as empty
impl<T: BinaryEncodable> BinaryEncodable for Vec<T> {
    fn encode(&self, encoder: &mut BinaryEncoder) -> UaResult<()> {
        encoder.encode_slice(self)
    }

    fn decode(decoder: &mut BinaryDecoder<'_>) -> UaResult<Self> {
        decoder.decode_vec()
    }
}

impl BinaryEncodable for DateTime {
    fn encode(&self, encoder: &mut BinaryEncoder) -> UaResult<()> {
        encoder.encode_i64(self.ticks())
    }

    fn decode(decoder: &mut BinaryDecoder<'_>) -> UaResult<Self> {
        Ok(DateTime::from_ticks(decoder.decode_i64()?))
    }
}

impl BinaryEncodable for Guid {
    fn encode(&self, encoder: &mut BinaryEncoder) -> UaResult<()> {
        encoder.encode_raw(self.as_bytes())
    }

    fn decode(decoder: &mut BinaryDecoder<'_>) -> UaResult<Self> {
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(decoder.decode_raw(16)?);
        Ok(Guid::from_bytes(bytes))
    }
}

impl BinaryEncodable for StatusCode {
    fn encode(&self, encoder: &mut BinaryEncoder) -> UaResult<()> {
        encoder.encode_u32(self.bits())
    }

    fn decode(decoder: &mut BinaryDecoder<'_>) -> UaResult<Self> {
        Ok(StatusCode::from_u32(decoder.decode_u32()?))
    }
}

const NODE_ID_TWO_BYTE: u8 = 0x00;
const NODE_ID_FOUR_BYTE: u8 = 0x01;
const NODE_ID_NUMERIC: u8 = 0x02;
const NODE_ID_STRING: u8 = 0x03;
const NODE_ID_GUID: u8 = 0x04;
const NODE_ID_BYTE_STRING: u8 = 0x05;

impl BinaryEncodable for NodeId {
    fn encode(&self, encoder: &mut BinaryEncoder) -> UaResult<()> {
        match &self.identifier {
            Identifier::Numeric(value) => {
                if self.namespace == 0 && *value <= 0xFF {
                    encoder.encode_u8(NODE_ID_TWO_BYTE)?;
                    encoder.encode_u8(*value as u8)
                } else if self.namespace <= 0xFF && *value <= 0xFFFF {
                    encoder.encode_u8(NODE_ID_FOUR_BYTE)?;
                    encoder.encode_u8(self.namespace as u8)?;
                    encoder.encode_u16(*value as u16)
                } else {
                    encoder.encode_u8(NODE_ID_NUMERIC)?;
                    encoder.encode_u16(self.namespace)?;
                    encoder.encode_u32(*value)
                }
            }
            Identifier::String(value) => {
                encoder.encode_u8(NODE_ID_STRING)?;
                encoder.encode_u16(self.namespace)?;
                encoder.encode_string(&UaString::from(value.as_str()))
            }
            Identifier::Guid(value) => {
                encoder.encode_u8(NODE_ID_GUID)?;
                encoder.encode_u16(self.namespace)?;
                value.encode(encoder)
            }
            Identifier::ByteString(value) => {
                encoder.encode_u8(NODE_ID_BYTE_STRING)?;
                encoder.encode_u16(self.namespace)?;
                encoder.encode_byte_string(&ByteString::from(value.as_slice()))
            }
        }
    }

    fn decode(decoder: &mut BinaryDecoder<'_>) -> UaResult<Self> {
        let encoding = decoder.decode_u8()?;
        // namespace URI and server index flags belong to ExpandedNodeId only
        if encoding & 0xC0 != 0 {
            return Err(UaError::Decoding(format!(
                "Expanded NodeId flags 0x{:02X} not allowed here",
                encoding
            )));
        }
        let node_id = match encoding {
            NODE_ID_TWO_BYTE => NodeId::numeric(0, u32::from(decoder.decode_u8()?)),
            NODE_ID_FOUR_BYTE => {
                let namespace = u16::from(decoder.decode_u8()?);
                NodeId::numeric(namespace, u32::from(decoder.decode_u16()?))
            }
            NODE_ID_NUMERIC => {
                let namespace = decoder.decode_u16()?;
                NodeId::numeric(namespace, decoder.decode_u32()?)
            }
            NODE_ID_STRING => {
                let namespace = decoder.decode_u16()?;
                let value = decoder.decode_string()?;
                NodeId::new(namespace, Identifier::String(value.into_inner().unwrap_or_default()))
            }
            NODE_ID_GUID => {
                let namespace = decoder.decode_u16()?;
                NodeId::guid(namespace, Guid::decode(decoder)?)
            }
            NODE_ID_BYTE_STRING => {
                let namespace = decoder.decode_u16()?;
                let value = decoder.decode_byte_string()?;
                NodeId::byte_string(namespace, value.into_inner().unwrap_or_default())
            }
            other => {
                return Err(UaError::Decoding(format!(
                    "Unknown NodeId encoding 0x{:02X}",
                    other
                )));
            }
        };
        Ok(node_id)
    }
}

impl BinaryEncodable for QualifiedName {
    fn encode(&self, encoder: &mut BinaryEncoder) -> UaResult<()> {
        encoder.encode_u16(self.namespace_index)?;
        encoder.encode_string(&self.name)
    }

    fn decode(decoder: &mut BinaryDecoder<'_>) -> UaResult<Self> {
        Ok(QualifiedName {
            namespace_index: decoder.decode_u16()?,
            name: decoder.decode_string()?,
        })
    }
}

impl BinaryEncodable for LocalizedText {
    fn encode(&self, encoder: &mut BinaryEncoder) -> UaResult<()> {
        let mut mask = 0u8;
        if !self.locale.is_null() {
            mask |= 0x01;
        }
        if !self.text.is_null() {
            mask |= 0x02;
        }
        encoder.encode_u8(mask)?;
        if mask & 0x01 != 0 {
            encoder.encode_string(&self.locale)?;
        }
        if mask & 0x02 != 0 {
            encoder.encode_string(&self.text)?;
        }
        Ok(())
    }

    fn decode(decoder: &mut BinaryDecoder<'_>) -> UaResult<Self> {
        let mask = decoder.decode_u8()?;
        let locale = if mask & 0x01 != 0 {
            decoder.decode_string()?
        } else {
            UaString::null()
        };
        let text = if mask & 0x02 != 0 {
            decoder.decode_string()?
        } else {
            UaString::null()
        };
        Ok(LocalizedText { locale, text })
    }
}

impl BinaryEncodable for DiagnosticInfo {
    fn encode(&self, encoder: &mut BinaryEncoder) -> UaResult<()> {
        let mut mask = 0u8;
        if self.symbolic_id.is_some() {
            mask |= 0x01;
        }
        if self.namespace_uri.is_some() {
            mask |= 0x02;
        }
        if self.localized_text.is_some() {
            mask |= 0x04;
        }
        if self.locale.is_some() {
            mask |= 0x08;
        }
        if self.additional_info.is_some() {
            mask |= 0x10;
        }
        if self.inner_status_code.is_some() {
            mask |= 0x20;
        }
        if self.inner_diagnostic_info.is_some() {
            mask |= 0x40;
        }
        encoder.encode_u8(mask)?;
        // wire order differs from mask bit order: locale precedes localized text
        if let Some(v) = self.symbolic_id {
            encoder.encode_i32(v)?;
        }
        if let Some(v) = self.namespace_uri {
            encoder.encode_i32(v)?;
        }
        if let Some(v) = self.locale {
            encoder.encode_i32(v)?;
        }
        if let Some(v) = self.localized_text {
            encoder.encode_i32(v)?;
        }
        if let Some(v) = &self.additional_info {
            encoder.encode_string(v)?;
        }
        if let Some(v) = self.inner_status_code {
            v.encode(encoder)?;
        }
        if let Some(v) = &self.inner_diagnostic_info {
            v.encode(encoder)?;
        }
        Ok(())
    }

    fn decode(decoder: &mut BinaryDecoder<'_>) -> UaResult<Self> {
        let mask = decoder.decode_u8()?;
        let mut info = DiagnosticInfo::default();
        if mask & 0x01 != 0 {
            info.symbolic_id = Some(decoder.decode_i32()?);
        }
        if mask & 0x02 != 0 {
            info.namespace_uri = Some(decoder.decode_i32()?);
        }
        if mask & 0x08 != 0 {
            info.locale = Some(decoder.decode_i32()?);
        }
        if mask & 0x04 != 0 {
            info.localized_text = Some(decoder.decode_i32()?);
        }
        if mask & 0x10 != 0 {
            info.additional_info = Some(decoder.decode_string()?);
        }
        if mask & 0x20 != 0 {
            info.inner_status_code = Some(StatusCode::decode(decoder)?);
        }
        if mask & 0x40 != 0 {
            let inner = decoder.nested(DiagnosticInfo::decode)?;
            info.inner_diagnostic_info = Some(Box::new(inner));
        }
        Ok(info)
    }
}

const BODY_NONE: u8 = 0x00;
const BODY_BINARY: u8 = 0x01;
const BODY_XML: u8 = 0x02;

impl BinaryEncodable for ExtensionObject {
    fn encode(&self, encoder: &mut BinaryEncoder) -> UaResult<()> {
        self.type_id.encode(encoder)?;
        match &self.body {
            ExtensionObjectBody::None => encoder.encode_u8(BODY_NONE),
            ExtensionObjectBody::Binary(body) => {
                encoder.encode_u8(BODY_BINARY)?;
                encoder.encode_byte_string(body)
            }
            ExtensionObjectBody::Xml(body) => {
                encoder.encode_u8(BODY_XML)?;
                encoder.encode_string(body)
            }
        }
    }

    fn decode(decoder: &mut BinaryDecoder<'_>) -> UaResult<Self> {
        let type_id = NodeId::decode(decoder)?;
        let body = match decoder.decode_u8()? {
            BODY_NONE => ExtensionObjectBody::None,
            BODY_BINARY => ExtensionObjectBody::Binary(decoder.decode_byte_string()?),
            BODY_XML => ExtensionObjectBody::Xml(decoder.decode_string()?),
            other => {
                return Err(UaError::Decoding(format!(
                    "Unknown extension object encoding 0x{:02X}",
                    other
                )));
            }
        };
        Ok(ExtensionObject { type_id, body })
    }
}

const VARIANT_ARRAY: u8 = 0x80;
const VARIANT_DIMENSIONS: u8 = 0x40;
const VARIANT_TYPE_MASK: u8 = 0x3F;

fn encode_scalar(value: &Variant, encoder: &mut BinaryEncoder) -> UaResult<()> {
    match value {
        Variant::Empty | Variant::Array(_) => Err(UaError::Encoding(
            "Variant element is not a scalar".to_string(),
        )),
        Variant::Boolean(v) => encoder.encode_bool(*v),
        Variant::SByte(v) => encoder.encode_i8(*v),
        Variant::Byte(v) => encoder.encode_u8(*v),
        Variant::Int16(v) => encoder.encode_i16(*v),
        Variant::UInt16(v) => encoder.encode_u16(*v),
        Variant::Int32(v) => encoder.encode_i32(*v),
        Variant::UInt32(v) => encoder.encode_u32(*v),
        Variant::Int64(v) => encoder.encode_i64(*v),
        Variant::UInt64(v) => encoder.encode_u64(*v),
        Variant::Float(v) => encoder.encode_f32(*v),
        Variant::Double(v) => encoder.encode_f64(*v),
        Variant::String(v) => encoder.encode_string(v),
        Variant::DateTime(v) => v.encode(encoder),
        Variant::Guid(v) => v.encode(encoder),
        Variant::ByteString(v) => encoder.encode_byte_string(v),
        Variant::NodeId(v) => v.encode(encoder),
        Variant::StatusCode(v) => v.encode(encoder),
        Variant::QualifiedName(v) => v.encode(encoder),
        Variant::LocalizedText(v) => v.encode(encoder),
        Variant::ExtensionObject(v) => v.encode(encoder),
    }
}

fn decode_scalar(ty: VariantType, decoder: &mut BinaryDecoder<'_>) -> UaResult<Variant> {
    let value = match ty {
        VariantType::Boolean => Variant::Boolean(decoder.decode_bool()?),
        VariantType::SByte => Variant::SByte(decoder.decode_i8()?),
        VariantType::Byte => Variant::Byte(decoder.decode_u8()?),
        VariantType::Int16 => Variant::Int16(decoder.decode_i16()?),
        VariantType::UInt16 => Variant::UInt16(decoder.decode_u16()?),
        VariantType::Int32 => Variant::Int32(decoder.decode_i32()?),
        VariantType::UInt32 => Variant::UInt32(decoder.decode_u32()?),
        VariantType::Int64 => Variant::Int64(decoder.decode_i64()?),
        VariantType::UInt64 => Variant::UInt64(decoder.decode_u64()?),
        VariantType::Float => Variant::Float(decoder.decode_f32()?),
        VariantType::Double => Variant::Double(decoder.decode_f64()?),
        VariantType::String => Variant::String(decoder.decode_string()?),
        VariantType::DateTime => Variant::DateTime(DateTime::decode(decoder)?),
        VariantType::Guid => Variant::Guid(Guid::decode(decoder)?),
        VariantType::ByteString => Variant::ByteString(decoder.decode_byte_string()?),
        VariantType::NodeId => Variant::NodeId(Box::new(NodeId::decode(decoder)?)),
        VariantType::StatusCode => Variant::StatusCode(StatusCode::decode(decoder)?),
        VariantType::QualifiedName => {
            Variant::QualifiedName(Box::new(QualifiedName::decode(decoder)?))
        }
        VariantType::LocalizedText => {
            Variant::LocalizedText(Box::new(LocalizedText::decode(decoder)?))
        }
        VariantType::ExtensionObject => {
            Variant::ExtensionObject(Box::new(ExtensionObject::decode(decoder)?))
        }
    };
    Ok(value)
}

impl BinaryEncodable for Variant {
    fn encode(&self, encoder: &mut BinaryEncoder) -> UaResult<()> {
        match self {
            Variant::Empty => encoder.encode_u8(0),
            Variant::Array(array) => {
                encoder.encode_u8(array.element_type as u8 | VARIANT_ARRAY)?;
                match &array.values {
                    None => encoder.encode_length(None),
                    Some(values) => {
                        encoder.encode_length(Some(values.len()))?;
                        for value in values {
                            if value.scalar_type() != Some(array.element_type) {
                                return Err(UaError::Encoding(format!(
                                    "Array element does not match element type {:?}",
                                    array.element_type
                                )));
                            }
                            encode_scalar(value, encoder)?;
                        }
                        Ok(())
                    }
                }
            }
            scalar => {
                // scalar_type is Some for every non-empty, non-array variant
                let ty = scalar.scalar_type().ok_or_else(|| {
                    UaError::Encoding("Variant has no scalar type".to_string())
                })?;
                encoder.encode_u8(ty as u8)?;
                encode_scalar(scalar, encoder)
            }
        }
    }

    fn decode(decoder: &mut BinaryDecoder<'_>) -> UaResult<Self> {
        let mask = decoder.decode_u8()?;
        let type_id = mask & VARIANT_TYPE_MASK;
        if type_id == 0 {
            return Ok(Variant::Empty);
        }
        let ty = VariantType::from_u8(type_id).ok_or_else(|| {
            UaError::Decoding(format!("Unsupported variant type {}", type_id))
        })?;
        if mask & VARIANT_ARRAY == 0 {
            return decode_scalar(ty, decoder);
        }
        let max = decoder.limits().max_array_length;
        let values = match decoder.decode_length(max, "Variant array")? {
            None => None,
            Some(len) => {
                if len > decoder.remaining() {
                    return Err(UaError::Decoding(format!(
                        "Variant array length {} exceeds remaining bytes",
                        len
                    )));
                }
                let mut values = Vec::with_capacity(len);
                for _ in 0..len {
                    values.push(decode_scalar(ty, decoder)?);
                }
                Some(values)
            }
        };
        if mask & VARIANT_DIMENSIONS != 0 {
            // multi-dimensional shape is flattened
            let _dimensions: Option<Vec<i32>> = decoder.decode_array()?;
        }
        Ok(Variant::Array(Box::new(VariantArray {
            element_type: ty,
            values,
        })))
    }
}

const DV_VALUE: u8 = 0x01;
const DV_STATUS: u8 = 0x02;
const DV_SOURCE_TIMESTAMP: u8 = 0x04;
const DV_SERVER_TIMESTAMP: u8 = 0x08;
const DV_SOURCE_PICOSECONDS: u8 = 0x10;
const DV_SERVER_PICOSECONDS: u8 = 0x20;

impl BinaryEncodable for DataValue {
    fn encode(&self, encoder: &mut BinaryEncoder) -> UaResult<()> {
        let mut mask = 0u8;
        if self.value.is_some() {
            mask |= DV_VALUE;
        }
        if self.status.is_some() {
            mask |= DV_STATUS;
        }
        if self.source_timestamp.is_some() {
            mask |= DV_SOURCE_TIMESTAMP;
        }
        if self.server_timestamp.is_some() {
            mask |= DV_SERVER_TIMESTAMP;
        }
        encoder.encode_u8(mask)?;
        if let Some(value) = &self.value {
            value.encode(encoder)?;
        }
        if let Some(status) = &self.status {
            status.encode(encoder)?;
        }
        if let Some(ts) = &self.source_timestamp {
            ts.encode(encoder)?;
        }
        if let Some(ts) = &self.server_timestamp {
            ts.encode(encoder)?;
        }
        Ok(())
    }

    fn decode(decoder: &mut BinaryDecoder<'_>) -> UaResult<Self> {
        let mask = decoder.decode_u8()?;
        let mut value = DataValue::default();
        if mask & DV_VALUE != 0 {
            value.value = Some(Variant::decode(decoder)?);
        }
        if mask & DV_STATUS != 0 {
            value.status = Some(StatusCode::decode(decoder)?);
        }
        if mask & DV_SOURCE_TIMESTAMP != 0 {
            value.source_timestamp = Some(DateTime::decode(decoder)?);
        }
        if mask & DV_SOURCE_PICOSECONDS != 0 {
            decoder.decode_u16()?;
        }
        if mask & DV_SERVER_TIMESTAMP != 0 {
            value.server_timestamp = Some(DateTime::decode(decoder)?);
        }
        if mask & DV_SERVER_PICOSECONDS != 0 {
            decoder.decode_u16()?;
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::DecodingLimits;

    fn round_trip<T: BinaryEncodable + PartialEq + std::fmt::Debug>(value: T) -> Vec<u8> {
        let bytes = value.encode_to_vec().unwrap();
        let decoded = T::decode_exact(&bytes, &DecodingLimits::default()).unwrap();
        assert_eq!(decoded, value);
        bytes
    }

    #[test]
    fn test_primitive_round_trips() {
        round_trip(true);
        round_trip(-7i8);
        round_trip(u16::MAX);
        round_trip(i32::MIN);
        round_trip(u64::MAX);
        round_trip(3.5f32);
        round_trip(-0.125f64);
        round_trip(DateTime::now());
        round_trip(StatusCode::BAD_TIMEOUT);
    }

    #[test]
    fn test_null_string_differs_from_empty_string() {
        let null = round_trip(UaString::null());
        let empty = round_trip(UaString::from(""));
        assert_ne!(null, empty);
        round_trip(UaString::from("Température"));
        round_trip(ByteString::null());
        round_trip(ByteString::from(Vec::new()));
    }

    #[test]
    fn test_null_array_differs_from_empty_array() {
        let null = round_trip::<Option<Vec<u32>>>(None);
        let empty = round_trip::<Option<Vec<u32>>>(Some(vec![]));
        assert_eq!(null, (-1i32).to_le_bytes().to_vec());
        assert_eq!(empty, 0i32.to_le_bytes().to_vec());
        round_trip(Some(vec![UaString::from("a"), UaString::null()]));
    }

    #[test]
    fn test_node_id_compact_forms() {
        assert_eq!(round_trip(NodeId::numeric(0, 85)).len(), 2);
        assert_eq!(round_trip(NodeId::numeric(2, 1000)).len(), 4);
        assert_eq!(round_trip(NodeId::numeric(300, 70_000)).len(), 7);
        round_trip(NodeId::string(1, "Boiler.Temperature"));
        round_trip(NodeId::byte_string(1, vec![9; 32]));
        round_trip(NodeId::guid(3, Guid::from_bytes([7; 16])));
    }

    #[test]
    fn test_expanded_node_id_flags_rejected() {
        let bytes = [0x80, 0x05];
        assert!(NodeId::decode_exact(&bytes, &DecodingLimits::default()).is_err());
    }

    #[test]
    fn test_variant_round_trips() {
        round_trip(Variant::Empty);
        round_trip(Variant::Boolean(false));
        round_trip(Variant::Double(42.25));
        round_trip(Variant::from("text"));
        round_trip(Variant::NodeId(Box::new(NodeId::numeric(1, 5))));
        round_trip(Variant::LocalizedText(Box::new(LocalizedText::new("en", "Pump"))));
        round_trip(Variant::array(VariantType::Int32, vec![Variant::Int32(1), Variant::Int32(-1)]).unwrap());
        round_trip(Variant::Array(Box::new(VariantArray {
            element_type: VariantType::String,
            values: None,
        })));
        round_trip(Variant::Array(Box::new(VariantArray {
            element_type: VariantType::String,
            values: Some(vec![]),
        })));
    }

    #[test]
    fn test_data_value_round_trip() {
        round_trip(DataValue::default());
        round_trip(DataValue::new_now(true));
        round_trip(DataValue::from_status(StatusCode::BAD_NODE_ID_UNKNOWN));
    }

    #[test]
    fn test_data_value_picoseconds_skipped() {
        let mut bytes = vec![DV_SOURCE_TIMESTAMP | DV_SOURCE_PICOSECONDS];
        bytes.extend_from_slice(&5i64.to_le_bytes());
        bytes.extend_from_slice(&10u16.to_le_bytes());
        let value = DataValue::decode_exact(&bytes, &DecodingLimits::default()).unwrap();
        assert_eq!(value.source_timestamp, Some(DateTime::from_ticks(5)));
    }

    #[test]
    fn test_unknown_extension_object_is_kept_raw() {
        let object = ExtensionObject::binary(NodeId::numeric(7, 90_001), vec![1, 2, 3, 4]);
        round_trip(object);
        round_trip(ExtensionObject::null());
        round_trip(ExtensionObject {
            type_id: NodeId::numeric(0, 12),
            body: ExtensionObjectBody::Xml(UaString::from("<a/>")),
        });
    }

    #[test]
    fn test_null_extension_object_body_differs_from_empty() {
        let type_id = NodeId::numeric(7, 90_002);
        let null = round_trip(ExtensionObject {
            type_id: type_id.clone(),
            body: ExtensionObjectBody::Binary(ByteString::null()),
        });
        let empty = round_trip(ExtensionObject::binary(type_id, Vec::new()));
        assert_ne!(null, empty);
        assert_eq!(&null[null.len() - 4..], &(-1i32).to_le_bytes());
        assert_eq!(&empty[empty.len() - 4..], &0i32.to_le_bytes());
    }

    #[test]
    fn test_diagnostic_info_recursion_limit() {
        let mut bytes = vec![0x40u8; 40];
        bytes.push(0x00);
        let limits = DecodingLimits {
            max_recursion_depth: 8,
            ..Default::default()
        };
        assert!(DiagnosticInfo::decode_exact(&bytes, &limits).is_err());

        let nested = DiagnosticInfo {
            symbolic_id: Some(3),
            locale: Some(1),
            additional_info: Some(UaString::from("detail")),
            inner_diagnostic_info: Some(Box::new(DiagnosticInfo {
                inner_status_code: Some(StatusCode::BAD_INTERNAL_ERROR),
                ..Default::default()
            })),
            ..Default::default()
        };
        round_trip(nested);
    }
}
