//! Service messages for OPC UA
//!
//! This crate defines the request and response structures of the
//! secure channel, session, subscription, monitored item and attribute
//! service sets with their binary encodings, and the typed
//! `ServiceRequest`/`ServiceResponse` envelopes keyed by encoding id.

#[macro_use]
mod macros;

pub mod attribute;
pub mod header;
pub mod ids;
pub mod message;
pub mod secure_channel;
pub mod session;
pub mod subscription;

pub use attribute::*;
pub use header::{RequestHeader, ResponseHeader, ServiceFault};
pub use ids::ObjectId;
pub use message::{ServiceRequest, ServiceResponse};
pub use secure_channel::*;
pub use session::*;
pub use subscription::*;
