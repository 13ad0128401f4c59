//! OPC UA client
//!
//! This crate connects to an opc.tcp endpoint, opens a secure channel and
//! drives the session, attribute and subscription service sets.
//!
//! ```rust,no_run
//! use opcua_client::{ClientBuilder, ClientIdentity};
//! use opcua_core::NodeId;
//!
//! # async fn run() -> opcua_client::UaResult<()> {
//! let mut client = ClientBuilder::new()
//!     .endpoint_url("opc.tcp://127.0.0.1:4840")
//!     .build()?;
//! client.connect().await?;
//! client.create_session().await?;
//! client.activate_session(&ClientIdentity::Anonymous).await?;
//! let value = client.read_value(&NodeId::numeric(2, 1001)).await?;
//! println!("{:?}", value);
//! client.disconnect().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod error;

pub use client::{ClientIdentity, SessionInfo, SubscriptionSettings, UaClient};
pub use config::ClientConfig;
pub use connection::{ClientBuilder, Connection, ConnectionState};
pub use error::{UaError, UaResult};
