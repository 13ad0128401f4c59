//! Error types for the binary codec

pub use opcua_core::error::{UaError, UaResult};
