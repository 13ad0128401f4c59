use crate::datatypes::node_id::NodeId;
use crate::datatypes::string::{ByteString, UaString};
use serde::{Deserialize, Serialize};

/// Body of an extension object, kept in its encoded form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtensionObjectBody {
    None,
    /// A null body stays distinct from an empty one
    Binary(ByteString),
    Xml(UaString),
}

/// A structure wrapped with its type identifier
///
/// The body stays raw until a consumer that knows the type decodes it,
/// so structures of unknown type pass through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionObject {
    pub type_id: NodeId,
    pub body: ExtensionObjectBody,
}

impl ExtensionObject {
    pub fn null() -> Self {
        Self {
            type_id: NodeId::null(),
            body: ExtensionObjectBody::None,
        }
    }

    pub fn binary(type_id: NodeId, body: Vec<u8>) -> Self {
        Self {
            type_id,
            body: ExtensionObjectBody::Binary(ByteString::from(body)),
        }
    }

    pub fn is_null(&self) -> bool {
        self.type_id.is_null() && self.body == ExtensionObjectBody::None
    }
}

impl Default for ExtensionObject {
    fn default() -> Self {
        Self::null()
    }
}
