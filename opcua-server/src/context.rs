//! What service handlers know about the channel a request arrived on

use opcua_security::{Certificate, SecuritySuite};

/// Snapshot of the calling secure channel
#[derive(Debug, Clone)]
pub struct ChannelContext {
    pub channel_id: u32,
    pub suite: SecuritySuite,
    /// Client application certificate from the OpenSecureChannel request
    pub client_certificate: Option<Certificate>,
}

impl ChannelContext {
    pub fn new(channel_id: u32, suite: SecuritySuite, client_certificate: Option<Certificate>) -> Self {
        Self {
            channel_id,
            suite,
            client_certificate,
        }
    }
}
