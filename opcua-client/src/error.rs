//! Error types for the client

pub use opcua_core::{UaError, UaResult};
