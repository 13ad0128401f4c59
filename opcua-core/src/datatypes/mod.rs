//! Built-in data types of the OPC UA binary protocol

pub mod attribute;
pub mod data_value;
pub mod date_time;
pub mod diagnostic_info;
pub mod extension_object;
pub mod guid;
pub mod localized_text;
pub mod node_id;
pub mod string;
pub mod variant;

pub use attribute::AttributeId;
pub use data_value::DataValue;
pub use date_time::DateTime;
pub use diagnostic_info::DiagnosticInfo;
pub use extension_object::{ExtensionObject, ExtensionObjectBody};
pub use guid::Guid;
pub use localized_text::{LocalizedText, QualifiedName};
pub use node_id::{Identifier, NodeId};
pub use string::{ByteString, UaString};
pub use variant::{Variant, VariantArray, VariantType};
