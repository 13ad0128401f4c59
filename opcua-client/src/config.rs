//! Client configuration

use crate::error::UaResult;
use opcua_channel::ChannelLimits;
use opcua_security::{MessageSecurityMode, SecurityPolicy, SecuritySuite};
use opcua_transport::TransportLimits;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Everything a client needs to reach one endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub application_uri: String,
    pub application_name: String,
    pub endpoint_url: String,
    pub security_policy_uri: String,
    /// `None`, `Sign` or `SignAndEncrypt`
    pub security_mode: String,
    pub session_name: String,
    /// Requested session timeout, milliseconds
    pub session_timeout_ms: f64,
    /// How long a request may wait for its response, milliseconds
    pub request_timeout_ms: u32,
    pub transport: TransportLimits,
    pub channel: ChannelLimits,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            application_uri: "urn:opcua-rs:client".to_string(),
            application_name: "OPC UA Client".to_string(),
            endpoint_url: "opc.tcp://127.0.0.1:4840".to_string(),
            security_policy_uri: SecurityPolicy::None.uri().to_string(),
            security_mode: MessageSecurityMode::None.name().to_string(),
            session_name: "session".to_string(),
            session_timeout_ms: 60_000.0,
            request_timeout_ms: 30_000,
            transport: TransportLimits::default(),
            channel: ChannelLimits::default(),
        }
    }
}

impl ClientConfig {
    /// Parse policy and mode into a validated suite
    pub fn suite(&self) -> UaResult<SecuritySuite> {
        SecuritySuite::builder()
            .set_security_policy(SecurityPolicy::from_uri(&self.security_policy_uri)?)
            .set_security_mode(MessageSecurityMode::from_name(&self.security_mode)?)
            .build()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.request_timeout_ms))
    }
}
