//! Error types for the server

pub use opcua_core::{UaError, UaResult};
