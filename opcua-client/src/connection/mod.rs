//! Connection layer of the client

pub mod builder;
pub mod connection;

pub use builder::ClientBuilder;
pub use connection::{Connection, ConnectionState};
