//! Error types for the security layer

pub use opcua_core::{UaError, UaResult};
