//! Error types for the transport layer

pub use opcua_core::error::{UaError, UaResult};
