//! Typed access to extension object bodies

use crate::binary::{BinaryEncodable, DecodingLimits};
use crate::error::{UaError, UaResult};
use opcua_core::{ExtensionObject, ExtensionObjectBody, NodeId};

/// Encode a structure into, or decode it out of, an extension object
pub trait ExtensionObjectExt: Sized {
    /// Wrap `value` as a binary body tagged with `type_id`
    fn from_encodable<T: BinaryEncodable>(type_id: NodeId, value: &T) -> UaResult<Self>;

    /// Decode the binary body as `T`
    ///
    /// Fails for null, XML and malformed bodies. The caller is expected to
    /// have matched `type_id` first.
    fn decode_inner<T: BinaryEncodable>(&self, limits: &DecodingLimits) -> UaResult<T>;
}

impl ExtensionObjectExt for ExtensionObject {
    fn from_encodable<T: BinaryEncodable>(type_id: NodeId, value: &T) -> UaResult<Self> {
        Ok(ExtensionObject::binary(type_id, value.encode_to_vec()?))
    }

    fn decode_inner<T: BinaryEncodable>(&self, limits: &DecodingLimits) -> UaResult<T> {
        match &self.body {
            ExtensionObjectBody::Binary(body) => T::decode_exact(body.as_bytes(), limits),
            ExtensionObjectBody::None => Err(UaError::Decoding(format!(
                "Extension object {} has no body",
                self.type_id
            ))),
            ExtensionObjectBody::Xml(_) => Err(UaError::Decoding(format!(
                "Extension object {} has an XML body",
                self.type_id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opcua_core::UaString;

    #[test]
    fn test_typed_body_round_trip() {
        let object = ExtensionObject::from_encodable(NodeId::numeric(0, 321), &UaString::from("anon")).unwrap();
        let inner: UaString = object.decode_inner(&DecodingLimits::default()).unwrap();
        assert_eq!(inner.as_str(), "anon");
        assert!(ExtensionObject::null().decode_inner::<UaString>(&DecodingLimits::default()).is_err());
    }
}
