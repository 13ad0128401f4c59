//! Server configuration
//!
//! Plain structures with defaults; loading them from files or the
//! environment is left to the embedding application.

use crate::error::UaResult;
use opcua_channel::ChannelLimits;
use opcua_security::{MessageSecurityMode, SecurityPolicy, SecuritySuite};
use opcua_transport::TransportLimits;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One offered endpoint: a policy URI and a mode name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub security_policy_uri: String,
    /// `None`, `Sign` or `SignAndEncrypt`
    pub security_mode: String,
}

impl EndpointConfig {
    pub fn new(policy: SecurityPolicy, mode: MessageSecurityMode) -> Self {
        Self {
            security_policy_uri: policy.uri().to_string(),
            security_mode: mode.name().to_string(),
        }
    }

    /// Parse into a validated suite
    pub fn suite(&self) -> UaResult<SecuritySuite> {
        let mode = MessageSecurityMode::from_name(&self.security_mode)?;
        SecuritySuite::builder()
            .set_security_policy(SecurityPolicy::from_uri(&self.security_policy_uri)?)
            .set_security_mode(mode)
            .build()
    }
}

/// Session limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionLimits {
    pub max_sessions: usize,
    pub min_session_timeout_ms: f64,
    pub max_session_timeout_ms: f64,
    /// Largest request the server accepts, 0 for no limit
    pub max_request_message_size: u32,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_sessions: 100,
            min_session_timeout_ms: 10_000.0,
            max_session_timeout_ms: 3_600_000.0,
            max_request_message_size: 0,
        }
    }
}

impl SessionLimits {
    /// Clamp a requested timeout; non-positive or NaN means the maximum
    pub fn revise_timeout(&self, requested_ms: f64) -> f64 {
        if requested_ms.is_nan() || requested_ms <= 0.0 {
            return self.max_session_timeout_ms;
        }
        requested_ms.clamp(self.min_session_timeout_ms, self.max_session_timeout_ms)
    }
}

/// Subscription and monitored item limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionLimits {
    pub max_subscriptions_per_session: usize,
    pub min_publishing_interval_ms: f64,
    pub max_publishing_interval_ms: f64,
    pub max_keep_alive_count: u32,
    pub max_lifetime_count: u32,
    /// Upper bound on notifications per publish, 0 for no limit
    pub max_notifications_per_publish: u32,
    pub max_monitored_items_per_subscription: usize,
    pub min_sampling_interval_ms: f64,
    pub max_monitored_item_queue_size: u32,
    pub max_publish_requests_per_session: usize,
    pub max_retransmission_queue_size: usize,
    pub max_queued_notifications: usize,
}

impl Default for SubscriptionLimits {
    fn default() -> Self {
        Self {
            max_subscriptions_per_session: 100,
            min_publishing_interval_ms: 50.0,
            max_publishing_interval_ms: 3_600_000.0,
            max_keep_alive_count: 30_000,
            max_lifetime_count: 90_000,
            max_notifications_per_publish: 1000,
            max_monitored_items_per_subscription: 1000,
            min_sampling_interval_ms: 50.0,
            max_monitored_item_queue_size: 1000,
            max_publish_requests_per_session: 20,
            max_retransmission_queue_size: 100,
            max_queued_notifications: 100,
        }
    }
}

impl SubscriptionLimits {
    /// Non-positive or NaN becomes the minimum
    pub fn revise_publishing_interval(&self, requested_ms: f64) -> f64 {
        if requested_ms.is_nan() || requested_ms <= 0.0 {
            return self.min_publishing_interval_ms;
        }
        requested_ms.clamp(self.min_publishing_interval_ms, self.max_publishing_interval_ms)
    }

    pub fn revise_keep_alive_count(&self, requested: u32) -> u32 {
        requested.clamp(1, self.max_keep_alive_count.max(1))
    }

    /// At least three keep-alive periods
    pub fn revise_lifetime_count(&self, requested: u32, keep_alive_count: u32) -> u32 {
        let floor = keep_alive_count.saturating_mul(3);
        requested.max(floor).min(self.max_lifetime_count.max(floor))
    }

    pub fn revise_max_notifications(&self, requested: u32) -> u32 {
        match (requested, self.max_notifications_per_publish) {
            (0, limit) => limit,
            (requested, 0) => requested,
            (requested, limit) => requested.min(limit),
        }
    }

    /// Negative means the publishing interval
    pub fn revise_sampling_interval(&self, requested_ms: f64, publishing_interval_ms: f64) -> f64 {
        if requested_ms.is_nan() || requested_ms < 0.0 {
            return publishing_interval_ms;
        }
        requested_ms.max(self.min_sampling_interval_ms)
    }

    pub fn revise_queue_size(&self, requested: u32) -> u32 {
        requested.clamp(1, self.max_monitored_item_queue_size.max(1))
    }
}

/// Everything a server needs besides its collaborators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub application_uri: String,
    pub product_uri: String,
    pub application_name: String,
    /// Address the listener binds to
    pub bind_address: String,
    pub endpoint_url: String,
    pub endpoints: Vec<EndpointConfig>,
    pub transport: TransportLimits,
    pub channel: ChannelLimits,
    pub sessions: SessionLimits,
    pub subscriptions: SubscriptionLimits,
    /// Seconds a connection may take to send its Hello
    pub hello_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            application_uri: "urn:opcua-rs:server".to_string(),
            product_uri: "urn:opcua-rs".to_string(),
            application_name: "OPC UA Server".to_string(),
            bind_address: "127.0.0.1:4840".to_string(),
            endpoint_url: "opc.tcp://127.0.0.1:4840".to_string(),
            endpoints: vec![EndpointConfig::new(SecurityPolicy::None, MessageSecurityMode::None)],
            transport: TransportLimits::default(),
            channel: ChannelLimits::default(),
            sessions: SessionLimits::default(),
            subscriptions: SubscriptionLimits::default(),
            hello_timeout_secs: 10,
        }
    }
}

impl ServerConfig {
    pub fn hello_timeout(&self) -> Duration {
        Duration::from_secs(self.hello_timeout_secs)
    }

    /// All offered suites
    ///
    /// # Errors
    /// The first endpoint that does not parse
    pub fn suites(&self) -> UaResult<Vec<SecuritySuite>> {
        self.endpoints.iter().map(EndpointConfig::suite).collect()
    }

    /// Whether `suite` matches an offered endpoint
    pub fn offers(&self, suite: &SecuritySuite) -> bool {
        self.endpoints
            .iter()
            .filter_map(|endpoint| endpoint.suite().ok())
            .any(|offered| offered == *suite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_revisions() {
        let limits = SubscriptionLimits::default();
        assert_eq!(limits.revise_publishing_interval(0.0), 50.0);
        assert_eq!(limits.revise_publishing_interval(f64::NAN), 50.0);
        assert_eq!(limits.revise_publishing_interval(1000.0), 1000.0);
        assert_eq!(limits.revise_keep_alive_count(0), 1);
        assert_eq!(limits.revise_lifetime_count(10, 3), 10);
        assert_eq!(limits.revise_lifetime_count(2, 3), 9);
        assert_eq!(limits.revise_sampling_interval(-1.0, 1000.0), 1000.0);
        assert_eq!(limits.revise_sampling_interval(1.0, 1000.0), 50.0);
        assert_eq!(limits.revise_queue_size(0), 1);
        assert_eq!(limits.revise_max_notifications(0), 1000);
        assert_eq!(limits.revise_max_notifications(5), 5);
    }

    #[test]
    fn test_session_timeout_revision() {
        let limits = SessionLimits::default();
        assert_eq!(limits.revise_timeout(60_000.0), 60_000.0);
        assert_eq!(limits.revise_timeout(1.0), 10_000.0);
        assert_eq!(limits.revise_timeout(-5.0), 3_600_000.0);
    }

    #[test]
    fn test_endpoint_suites() {
        let mut config = ServerConfig::default();
        config.endpoints.push(EndpointConfig::new(
            SecurityPolicy::Basic256Sha256,
            MessageSecurityMode::SignAndEncrypt,
        ));
        let suites = config.suites().unwrap();
        assert_eq!(suites.len(), 2);
        assert!(config.offers(&suites[1]));

        config.endpoints.push(EndpointConfig {
            security_policy_uri: SecurityPolicy::None.uri().to_string(),
            security_mode: "Loud".to_string(),
        });
        assert!(config.suites().is_err());
    }
}
