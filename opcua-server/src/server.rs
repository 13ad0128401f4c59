//! Service dispatch
//!
//! `Server` owns the session manager and subscription engine and routes
//! every decoded service request of an open secure channel to them. Service
//! errors never escape: they become ServiceFault responses. Only channel
//! level failures are the listener's concern.

use crate::address_space::{AddressSpace, apply_timestamps};
use crate::config::ServerConfig;
use crate::context::ChannelContext;
use crate::error::{UaError, UaResult};
use crate::session::SessionManager;
use crate::subscription::SubscriptionEngine;
use futures::future::join_all;
use opcua_core::{AttributeId, ByteString, DataValue, NodeId, StatusCode, UaString};
use opcua_security::{
    CertificateProvider, IdentityValidator, MessageSecurityMode, SecuritySuite,
};
use opcua_services::{
    ApplicationDescription, ApplicationType, CloseSessionResponse, EndpointDescription,
    ReadRequest, ReadResponse, ResponseHeader, ServiceRequest, ServiceResponse, TimestampsToReturn,
    UserTokenPolicy, UserTokenType, WriteRequest, WriteResponse,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Binary transport profile of opc.tcp endpoints
pub const TRANSPORT_PROFILE_URI: &str =
    "http://opcfoundation.org/UA-Profile/Transport/uatcp-uasc-uabinary";

/// Longest the watchdog sleeps between checks
const WATCHDOG_PERIOD: Duration = Duration::from_secs(1);

/// How a request is answered
#[derive(Debug)]
pub enum Dispatch {
    /// Response ready now
    Immediate(ServiceResponse),
    /// Publish: the response arrives when a subscription has something to say
    Deferred(oneshot::Receiver<ServiceResponse>),
}

pub struct Server {
    config: ServerConfig,
    provider: Option<Arc<dyn CertificateProvider>>,
    validator: Arc<dyn IdentityValidator>,
    address_space: Arc<dyn AddressSpace>,
    sessions: SessionManager,
    subscriptions: Arc<SubscriptionEngine>,
    next_channel_id: AtomicU32,
}

impl Server {
    /// Build a server from its configuration and collaborators
    ///
    /// # Errors
    /// Unparseable endpoints, or secured endpoints without a certificate
    /// whose key size their policy allows
    pub fn new(
        config: ServerConfig,
        provider: Option<Arc<dyn CertificateProvider>>,
        validator: Arc<dyn IdentityValidator>,
        address_space: Arc<dyn AddressSpace>,
    ) -> UaResult<Arc<Self>> {
        let suites = config.suites()?;
        if suites.is_empty() {
            return Err(UaError::InvalidData("No endpoint configured".to_string()));
        }
        match &provider {
            None => {
                if let Some(secured) = suites.iter().find(|suite| !suite.policy().is_none()) {
                    return Err(UaError::Security(format!(
                        "Endpoint {} needs a server certificate",
                        secured
                    )));
                }
            }
            Some(provider) => {
                for suite in &suites {
                    suite.policy().check_key_size(provider.key_size())?;
                }
            }
        }
        let subscriptions = SubscriptionEngine::new(config.subscriptions.clone(), address_space.clone());
        let sessions = SessionManager::new(config.sessions.clone());
        log::info!(
            "Server '{}' configured with {} endpoint(s)",
            config.application_name,
            suites.len()
        );
        Ok(Arc::new(Self {
            config,
            provider,
            validator,
            address_space,
            sessions,
            subscriptions,
            next_channel_id: AtomicU32::new(1),
        }))
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn certificate_provider(&self) -> Option<Arc<dyn CertificateProvider>> {
        self.provider.clone()
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn subscriptions(&self) -> &Arc<SubscriptionEngine> {
        &self.subscriptions
    }

    /// Id for a new secure channel, never 0
    pub fn allocate_channel_id(&self) -> u32 {
        loop {
            let id = self.next_channel_id.fetch_add(1, Ordering::Relaxed);
            if id != 0 {
                return id;
            }
        }
    }

    /// Whether a channel may be opened with `suite`
    pub fn offers(&self, suite: &SecuritySuite) -> bool {
        self.config.offers(suite)
    }

    pub fn application_description(&self) -> ApplicationDescription {
        let mut description = ApplicationDescription::new(
            &self.config.application_uri,
            &self.config.application_name,
            ApplicationType::Server,
        );
        description.product_uri = UaString::from(self.config.product_uri.as_str());
        description.discovery_urls = vec![UaString::from(self.config.endpoint_url.as_str())];
        description
    }

    /// Endpoint descriptions returned by CreateSession
    pub fn endpoints(&self) -> Vec<EndpointDescription> {
        let server_certificate = self
            .provider
            .as_ref()
            .map(|provider| ByteString::from(provider.certificate().der()))
            .unwrap_or_else(ByteString::null);
        let server = self.application_description();
        self.config
            .endpoints
            .iter()
            .filter_map(|endpoint| endpoint.suite().ok())
            .map(|suite| EndpointDescription {
                endpoint_url: UaString::from(self.config.endpoint_url.as_str()),
                server: server.clone(),
                server_certificate: server_certificate.clone(),
                security_mode: suite.mode(),
                security_policy_uri: UaString::from(suite.policy().uri()),
                user_identity_tokens: vec![
                    UserTokenPolicy::new("anonymous", UserTokenType::Anonymous),
                    UserTokenPolicy::new("username", UserTokenType::UserName),
                    UserTokenPolicy::new("x509", UserTokenType::Certificate),
                ],
                transport_profile_uri: UaString::from(TRANSPORT_PROFILE_URI),
                security_level: match suite.mode() {
                    MessageSecurityMode::SignAndEncrypt => 3,
                    MessageSecurityMode::Sign => 2,
                    _ => 0,
                },
            })
            .collect()
    }

    /// Answer one service request of an open channel
    pub async fn dispatch(&self, channel: &ChannelContext, request: ServiceRequest) -> Dispatch {
        let request_handle = request.request_header().request_handle;
        match self.handle(channel, request).await {
            Ok(dispatch) => dispatch,
            Err(err) => {
                log::debug!(
                    "Request {} on channel {} failed: {}",
                    request_handle, channel.channel_id, err
                );
                Dispatch::Immediate(ServiceResponse::fault(request_handle, err.status_code()))
            }
        }
    }

    async fn handle(&self, channel: &ChannelContext, request: ServiceRequest) -> UaResult<Dispatch> {
        let response: ServiceResponse = match request {
            ServiceRequest::CreateSession(request) => self
                .sessions
                .create_session(channel, self.provider.as_deref(), self.endpoints(), &request)?
                .into(),
            ServiceRequest::ActivateSession(request) => {
                let activation = self
                    .sessions
                    .activate_session(
                        channel,
                        self.provider.as_deref(),
                        self.validator.as_ref(),
                        &request,
                        &self.config.channel.decoding,
                    )
                    .await?;
                self.subscriptions.session_bound(&activation.session_id);
                if let Some(previous) = activation.previous_channel {
                    log::info!(
                        "Session {} moved from channel {} to {}",
                        activation.session_id, previous, channel.channel_id
                    );
                    self.subscriptions
                        .cancel_publish_requests(&activation.session_id, StatusCode::BAD_SECURE_CHANNEL_CLOSED);
                }
                activation.response.into()
            }
            ServiceRequest::CloseSession(request) => {
                let session_id = self.sessions.close_session(channel, &request.request_header)?;
                self.subscriptions
                    .session_closed(&session_id, request.delete_subscriptions);
                CloseSessionResponse {
                    response_header: ResponseHeader::good(&request.request_header),
                }
                .into()
            }
            ServiceRequest::CreateSubscription(request) => {
                let session_id = self.sessions.validate_request(channel, &request.request_header)?;
                self.subscriptions.create_subscription(&session_id, &request)?.into()
            }
            ServiceRequest::ModifySubscription(request) => {
                let session_id = self.sessions.validate_request(channel, &request.request_header)?;
                self.subscriptions.modify_subscription(&session_id, &request)?.into()
            }
            ServiceRequest::SetPublishingMode(request) => {
                let session_id = self.sessions.validate_request(channel, &request.request_header)?;
                self.subscriptions.set_publishing_mode(&session_id, &request)?.into()
            }
            ServiceRequest::DeleteSubscriptions(request) => {
                let session_id = self.sessions.validate_request(channel, &request.request_header)?;
                self.subscriptions.delete_subscriptions(&session_id, &request)?.into()
            }
            ServiceRequest::TransferSubscriptions(request) => {
                let session_id = self.sessions.validate_request(channel, &request.request_header)?;
                let identity = self.sessions.identity(&session_id);
                let same_user = |owner: &NodeId| identity.is_some() && self.sessions.identity(owner) == identity;
                self.subscriptions
                    .transfer_subscriptions(&session_id, &request, &same_user)?
                    .into()
            }
            ServiceRequest::CreateMonitoredItems(request) => {
                let session_id = self.sessions.validate_request(channel, &request.request_header)?;
                self.subscriptions
                    .create_monitored_items(&session_id, &request)
                    .await?
                    .into()
            }
            ServiceRequest::DeleteMonitoredItems(request) => {
                let session_id = self.sessions.validate_request(channel, &request.request_header)?;
                self.subscriptions.delete_monitored_items(&session_id, &request)?.into()
            }
            ServiceRequest::Publish(request) => {
                let session_id = self.sessions.validate_request(channel, &request.request_header)?;
                return Ok(Dispatch::Deferred(self.subscriptions.publish(&session_id, &request)?));
            }
            ServiceRequest::Republish(request) => {
                let session_id = self.sessions.validate_request(channel, &request.request_header)?;
                self.subscriptions.republish(&session_id, &request)?.into()
            }
            ServiceRequest::Read(request) => {
                self.sessions.validate_request(channel, &request.request_header)?;
                self.read(&request).await?.into()
            }
            ServiceRequest::Write(request) => {
                self.sessions.validate_request(channel, &request.request_header)?;
                self.write(&request).await?.into()
            }
            ServiceRequest::OpenSecureChannel(_) | ServiceRequest::CloseSecureChannel(_) => {
                return Err(UaError::Status(StatusCode::BAD_SERVICE_UNSUPPORTED));
            }
            ServiceRequest::Unsupported { type_id, .. } => {
                log::debug!("Unsupported service {} on channel {}", type_id, channel.channel_id);
                return Err(UaError::Status(StatusCode::BAD_SERVICE_UNSUPPORTED));
            }
        };
        Ok(Dispatch::Immediate(response))
    }

    async fn read(&self, request: &ReadRequest) -> UaResult<ReadResponse> {
        if request.nodes_to_read.is_empty() {
            return Err(UaError::Status(StatusCode::BAD_NOTHING_TO_DO));
        }
        if request.timestamps_to_return == TimestampsToReturn::Invalid {
            return Err(UaError::Status(StatusCode::BAD_TIMESTAMPS_TO_RETURN_INVALID));
        }
        let reads = request.nodes_to_read.iter().map(|node| async move {
            match AttributeId::from_u32(node.attribute_id) {
                Some(attribute) => self.address_space.read_attribute(&node.node_id, attribute).await,
                None => DataValue::from_status(StatusCode::BAD_ATTRIBUTE_ID_INVALID),
            }
        });
        let results = join_all(reads)
            .await
            .into_iter()
            .map(|value| apply_timestamps(value, request.timestamps_to_return))
            .collect();
        Ok(ReadResponse {
            response_header: ResponseHeader::good(&request.request_header),
            results,
            diagnostic_infos: Vec::new(),
        })
    }

    async fn write(&self, request: &WriteRequest) -> UaResult<WriteResponse> {
        if request.nodes_to_write.is_empty() {
            return Err(UaError::Status(StatusCode::BAD_NOTHING_TO_DO));
        }
        let mut results = Vec::with_capacity(request.nodes_to_write.len());
        for node in &request.nodes_to_write {
            let status = match AttributeId::from_u32(node.attribute_id) {
                Some(attribute) => {
                    self.address_space
                        .write_attribute(&node.node_id, attribute, &node.value)
                        .await
                }
                None => StatusCode::BAD_ATTRIBUTE_ID_INVALID,
            };
            results.push(status);
        }
        Ok(WriteResponse {
            response_header: ResponseHeader::good(&request.request_header),
            results,
            diagnostic_infos: Vec::new(),
        })
    }

    /// Unbind the sessions of a closed channel, orphaning their subscriptions
    /// and failing their publishes
    pub fn channel_closed(&self, channel_id: u32) {
        for session_id in self.sessions.channel_closed(channel_id) {
            self.subscriptions
                .cancel_publish_requests(&session_id, StatusCode::BAD_SECURE_CHANNEL_CLOSED);
            self.subscriptions.session_unbound(&session_id);
        }
    }

    /// Close idle sessions and time out stale publish requests
    pub fn expire(&self, now: Instant) {
        for session_id in self.sessions.expire_sessions(now) {
            self.subscriptions.session_closed(&session_id, true);
        }
        let expired = self.subscriptions.expire_publish_requests(now);
        if expired > 0 {
            log::debug!("{} publish request(s) timed out", expired);
        }
    }

    fn next_deadline(&self) -> Instant {
        let fallback = Instant::now() + WATCHDOG_PERIOD;
        [self.sessions.next_expiry(), self.subscriptions.next_publish_deadline()]
            .into_iter()
            .flatten()
            .fold(fallback, Instant::min)
    }

    /// Background task enforcing session and publish timeouts
    ///
    /// Ends once the server is dropped.
    pub fn spawn_watchdog(self: &Arc<Self>) -> JoinHandle<()> {
        let server = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                let deadline = match server.upgrade() {
                    Some(server) => server.next_deadline(),
                    None => break,
                };
                tokio::time::sleep_until(deadline).await;
                match server.upgrade() {
                    Some(server) => server.expire(Instant::now()),
                    None => break,
                }
            }
        })
    }
}
