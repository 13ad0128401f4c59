//! OPC UA server
//!
//! Accepts opc.tcp connections, runs one secure channel per connection and
//! serves the session, subscription, monitored item and attribute service
//! sets against an `AddressSpace`.
//!
//! ```rust,no_run
//! use opcua_server::{MemoryAddressSpace, Server, ServerConfig, ServerListener};
//! use opcua_security::StaticIdentityValidator;
//! use std::sync::Arc;
//!
//! # async fn run() -> opcua_server::UaResult<()> {
//! let server = Server::new(
//!     ServerConfig::default(),
//!     None,
//!     Arc::new(StaticIdentityValidator::new().allow_anonymous()),
//!     Arc::new(MemoryAddressSpace::new()),
//! )?;
//! ServerListener::bind(server).await?.run().await
//! # }
//! ```

pub mod address_space;
pub mod config;
pub mod context;
pub mod error;
pub mod listener;
pub mod server;
pub mod session;
pub mod subscription;

pub use address_space::{AddressSpace, MemoryAddressSpace};
pub use config::{EndpointConfig, ServerConfig, SessionLimits, SubscriptionLimits};
pub use context::ChannelContext;
pub use error::{UaError, UaResult};
pub use listener::ServerListener;
pub use server::{Dispatch, Server};
pub use session::{Session, SessionManager, SessionState};
pub use subscription::{MonitoredItem, Subscription, SubscriptionEngine};
