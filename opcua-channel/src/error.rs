//! Error types for the secure channel layer

pub use opcua_core::{UaError, UaResult};
