//! Binary codec for the OPC UA protocol
//!
//! Implements the little-endian binary encoding of the built-in types:
//! length-prefixed strings and byte strings with -1 as null, int32-counted
//! arrays with -1 as the null array, NodeIds in their compact forms,
//! variants, data values and extension objects with raw bodies.

pub mod binary;
pub mod error;

pub use binary::{
    BinaryDecoder, BinaryEncodable, BinaryEncoder, DecodingLimits, ExtensionObjectExt,
};
pub use error::{UaError, UaResult};
