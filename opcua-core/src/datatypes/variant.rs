//! The Variant union of all built-in types

use crate::datatypes::date_time::DateTime;
use crate::datatypes::extension_object::ExtensionObject;
use crate::datatypes::guid::Guid;
use crate::datatypes::localized_text::{LocalizedText, QualifiedName};
use crate::datatypes::node_id::NodeId;
use crate::datatypes::string::{ByteString, UaString};
use crate::status_code::StatusCode;
use serde::{Deserialize, Serialize};

/// Built-in type identifiers as used in the variant encoding mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum VariantType {
    Boolean = 1,
    SByte = 2,
    Byte = 3,
    Int16 = 4,
    UInt16 = 5,
    Int32 = 6,
    UInt32 = 7,
    Int64 = 8,
    UInt64 = 9,
    Float = 10,
    Double = 11,
    String = 12,
    DateTime = 13,
    Guid = 14,
    ByteString = 15,
    NodeId = 17,
    StatusCode = 19,
    QualifiedName = 20,
    LocalizedText = 21,
    ExtensionObject = 22,
}

impl VariantType {
    pub fn from_u8(value: u8) -> Option<Self> {
        use VariantType::*;
        let ty = match value {
            1 => Boolean,
            2 => SByte,
            3 => Byte,
            4 => Int16,
            5 => UInt16,
            6 => Int32,
            7 => UInt32,
            8 => Int64,
            9 => UInt64,
            10 => Float,
            11 => Double,
            12 => String,
            13 => DateTime,
            14 => Guid,
            15 => ByteString,
            17 => NodeId,
            19 => StatusCode,
            20 => QualifiedName,
            21 => LocalizedText,
            22 => ExtensionObject,
            _ => return None,
        };
        Some(ty)
    }
}

/// One-dimensional array of variants sharing an element type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantArray {
    pub element_type: VariantType,
    /// `None` is the null array
    pub values: Option<Vec<Variant>>,
}

/// Any built-in value, scalar or array
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Variant {
    #[default]
    Empty,
    Boolean(bool),
    SByte(i8),
    Byte(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    String(UaString),
    DateTime(DateTime),
    Guid(Guid),
    ByteString(ByteString),
    NodeId(Box<NodeId>),
    StatusCode(StatusCode),
    QualifiedName(Box<QualifiedName>),
    LocalizedText(Box<LocalizedText>),
    ExtensionObject(Box<ExtensionObject>),
    Array(Box<VariantArray>),
}

impl Variant {
    /// Type of a scalar value, `None` for empty and arrays
    pub fn scalar_type(&self) -> Option<VariantType> {
        let ty = match self {
            Variant::Empty | Variant::Array(_) => return None,
            Variant::Boolean(_) => VariantType::Boolean,
            Variant::SByte(_) => VariantType::SByte,
            Variant::Byte(_) => VariantType::Byte,
            Variant::Int16(_) => VariantType::Int16,
            Variant::UInt16(_) => VariantType::UInt16,
            Variant::Int32(_) => VariantType::Int32,
            Variant::UInt32(_) => VariantType::UInt32,
            Variant::Int64(_) => VariantType::Int64,
            Variant::UInt64(_) => VariantType::UInt64,
            Variant::Float(_) => VariantType::Float,
            Variant::Double(_) => VariantType::Double,
            Variant::String(_) => VariantType::String,
            Variant::DateTime(_) => VariantType::DateTime,
            Variant::Guid(_) => VariantType::Guid,
            Variant::ByteString(_) => VariantType::ByteString,
            Variant::NodeId(_) => VariantType::NodeId,
            Variant::StatusCode(_) => VariantType::StatusCode,
            Variant::QualifiedName(_) => VariantType::QualifiedName,
            Variant::LocalizedText(_) => VariantType::LocalizedText,
            Variant::ExtensionObject(_) => VariantType::ExtensionObject,
        };
        Some(ty)
    }

    /// Build an array variant; every element must have `element_type`
    pub fn array(element_type: VariantType, values: Vec<Variant>) -> Option<Self> {
        if values.iter().any(|v| v.scalar_type() != Some(element_type)) {
            return None;
        }
        Some(Variant::Array(Box::new(VariantArray {
            element_type,
            values: Some(values),
        })))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Variant::Boolean(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<bool> for Variant {
    fn from(value: bool) -> Self {
        Variant::Boolean(value)
    }
}

impl From<i32> for Variant {
    fn from(value: i32) -> Self {
        Variant::Int32(value)
    }
}

impl From<u32> for Variant {
    fn from(value: u32) -> Self {
        Variant::UInt32(value)
    }
}

impl From<f64> for Variant {
    fn from(value: f64) -> Self {
        Variant::Double(value)
    }
}

impl From<&str> for Variant {
    fn from(value: &str) -> Self {
        Variant::String(UaString::from(value))
    }
}

impl From<StatusCode> for Variant {
    fn from(value: StatusCode) -> Self {
        Variant::StatusCode(value)
    }
}
