//! Node identifiers

use crate::datatypes::guid::Guid;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The identifier part of a NodeId
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Identifier {
    Numeric(u32),
    String(String),
    Guid(Guid),
    ByteString(Vec<u8>),
}

/// Identifies a node within a server's address space
///
/// Also used on the wire as the type identifier of encoded structures and
/// as the (opaque) session authentication token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    pub namespace: u16,
    pub identifier: Identifier,
}

impl NodeId {
    pub fn new(namespace: u16, identifier: Identifier) -> Self {
        Self { namespace, identifier }
    }

    pub const fn numeric(namespace: u16, value: u32) -> Self {
        Self {
            namespace,
            identifier: Identifier::Numeric(value),
        }
    }

    pub fn string(namespace: u16, value: &str) -> Self {
        Self::new(namespace, Identifier::String(value.to_string()))
    }

    pub fn byte_string(namespace: u16, value: Vec<u8>) -> Self {
        Self::new(namespace, Identifier::ByteString(value))
    }

    pub fn guid(namespace: u16, value: Guid) -> Self {
        Self::new(namespace, Identifier::Guid(value))
    }

    /// The null NodeId: numeric 0 in namespace 0
    pub const fn null() -> Self {
        Self::numeric(0, 0)
    }

    pub fn is_null(&self) -> bool {
        self.namespace == 0 && self.identifier == Identifier::Numeric(0)
    }

    /// The numeric value when this is a namespace-0 numeric id
    pub fn as_ns0_numeric(&self) -> Option<u32> {
        match self.identifier {
            Identifier::Numeric(value) if self.namespace == 0 => Some(value),
            _ => None,
        }
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::null()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace != 0 {
            write!(f, "ns={};", self.namespace)?;
        }
        match &self.identifier {
            Identifier::Numeric(v) => write!(f, "i={}", v),
            Identifier::String(v) => write!(f, "s={}", v),
            Identifier::Guid(v) => write!(f, "g={}", v),
            Identifier::ByteString(v) => {
                f.write_str("b=")?;
                for byte in v {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_node_id() {
        assert!(NodeId::null().is_null());
        assert!(!NodeId::numeric(1, 0).is_null());
        assert_eq!(NodeId::default(), NodeId::null());
    }

    #[test]
    fn test_display() {
        assert_eq!(NodeId::numeric(0, 85).to_string(), "i=85");
        assert_eq!(NodeId::string(2, "Pump").to_string(), "ns=2;s=Pump");
        assert_eq!(NodeId::byte_string(1, vec![0xAB, 0x01]).to_string(), "ns=1;b=ab01");
    }
}
