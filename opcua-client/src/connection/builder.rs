//! Client builder
//!
//! ```rust,no_run
//! use opcua_client::ClientBuilder;
//! use opcua_security::{MessageSecurityMode, SecurityPolicy};
//!
//! # fn build() -> opcua_client::UaResult<()> {
//! let client = ClientBuilder::new()
//!     .endpoint_url("opc.tcp://192.168.1.100:4840")
//!     .security(SecurityPolicy::None, MessageSecurityMode::None)
//!     .session_timeout(60_000.0)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use crate::client::UaClient;
use crate::config::ClientConfig;
use crate::error::{UaError, UaResult};
use opcua_security::{Certificate, CertificateProvider, MessageSecurityMode, SecurityPolicy};
use std::sync::Arc;
use std::time::Duration;

/// Fluent setup of a `UaClient`
///
/// Starts from `ClientConfig::default()`; `build` validates the security
/// settings before anything touches the network.
#[derive(Default)]
pub struct ClientBuilder {
    config: ClientConfig,
    provider: Option<Arc<dyn CertificateProvider>>,
    server_certificate: Option<Certificate>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration
    pub fn from_config(config: ClientConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn endpoint_url(mut self, url: &str) -> Self {
        self.config.endpoint_url = url.to_string();
        self
    }

    pub fn application(mut self, uri: &str, name: &str) -> Self {
        self.config.application_uri = uri.to_string();
        self.config.application_name = name.to_string();
        self
    }

    pub fn security(mut self, policy: SecurityPolicy, mode: MessageSecurityMode) -> Self {
        self.config.security_policy_uri = policy.uri().to_string();
        self.config.security_mode = mode.name().to_string();
        self
    }

    pub fn session_name(mut self, name: &str) -> Self {
        self.config.session_name = name.to_string();
        self
    }

    /// Requested session timeout in milliseconds
    pub fn session_timeout(mut self, timeout_ms: f64) -> Self {
        self.config.session_timeout_ms = timeout_ms;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout_ms = u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX);
        self
    }

    /// Token lifetime asked for in OpenSecureChannel, milliseconds
    pub fn token_lifetime(mut self, lifetime_ms: u32) -> Self {
        self.config.channel.requested_token_lifetime_ms = lifetime_ms;
        self
    }

    /// Own application certificate and key
    pub fn certificate_provider(mut self, provider: Arc<dyn CertificateProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Server certificate, known out of band
    pub fn server_certificate(mut self, certificate: Certificate) -> Self {
        self.server_certificate = Some(certificate);
        self
    }

    /// # Errors
    /// Invalid policy/mode pairs, secured policies without both keys, or
    /// endpoint URLs that are not opc.tcp
    pub fn build(self) -> UaResult<UaClient> {
        let suite = self.config.suite()?;
        if !suite.policy().is_none() && (self.provider.is_none() || self.server_certificate.is_none()) {
            return Err(UaError::Security(format!(
                "{} needs a client certificate and the server certificate",
                suite
            )));
        }
        UaClient::new(self.config, self.provider, self.server_certificate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_defaults() {
        let client = ClientBuilder::new()
            .endpoint_url("opc.tcp://localhost:4841/server")
            .session_name("s1")
            .request_timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        assert_eq!(client.config().endpoint_url, "opc.tcp://localhost:4841/server");
        assert_eq!(client.config().request_timeout_ms, 5000);
        assert!(client.session_id().is_none());
    }

    #[test]
    fn test_secured_build_needs_keys() {
        let result = ClientBuilder::new()
            .security(SecurityPolicy::Basic256Sha256, MessageSecurityMode::SignAndEncrypt)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_foreign_urls() {
        assert!(ClientBuilder::new().endpoint_url("http://localhost:4840").build().is_err());
    }
}
