//! Session management
//!
//! Sessions are kept in a registry keyed by authentication token and refer
//! to their secure channel by id only.

mod identity;
pub mod manager;
pub mod state;

pub use manager::{Activation, Session, SessionManager};
pub use state::SessionState;
