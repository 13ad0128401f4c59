//! opcua-rs - Rust implementation of the OPC UA binary protocol
//!
//! This library implements the opc.tcp mapping of OPC UA: the binary
//! encoding, message chunking, the secure channel and the session and
//! subscription services of a server, plus a client to talk to it.
//!
//! # Architecture
//!
//! This library is organized as a workspace with multiple crates:
//!
//! - `opcua-core`: Built-in data types, status codes, error handling
//! - `opcua-codec`: Binary encoding and decoding with decoding limits
//! - `opcua-transport`: TCP transport, Hello/Acknowledge/Error framing
//! - `opcua-security`: Security policies, keys, certificates, identities
//! - `opcua-channel`: Chunking and the secure channel state machine
//! - `opcua-services`: Service request and response messages
//! - `opcua-server`: Session manager, subscription engine and listener
//! - `opcua-client`: Client connection, sessions and subscriptions
//!
//! # Usage
//!
//! ```no_run
//! use opcua::client::ClientBuilder;
//! use opcua::server::{MemoryAddressSpace, Server, ServerConfig, ServerListener};
//! ```

// Re-export core types
pub use opcua_core::{StatusCode, UaError, UaResult};
pub use opcua_core::datatypes::*;

pub mod codec {
    pub use opcua_codec::*;
}

pub mod transport {
    pub use opcua_transport::*;
}

pub mod security {
    pub use opcua_security::*;
}

pub mod channel {
    pub use opcua_channel::*;
}

pub mod services {
    pub use opcua_services::*;
}

// Re-export client API
pub mod client {
    pub use opcua_client::*;
}

// Re-export server API
pub mod server {
    pub use opcua_server::*;
}
