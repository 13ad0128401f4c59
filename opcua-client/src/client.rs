//! Session level client
//!
//! `UaClient` owns one `Connection` and at most one session. Every service
//! call is sequential: the request is sent and the call returns once the
//! matching response arrived.

use crate::config::ClientConfig;
use crate::connection::{Connection, ConnectionState};
use crate::error::{UaError, UaResult};
use opcua_codec::ExtensionObjectExt;
use opcua_core::{AttributeId, ByteString, DataValue, ExtensionObject, NodeId, StatusCode, UaString};
use opcua_security::identity::encrypt_password;
use opcua_security::{Certificate, CertificateProvider, SecurityPolicy, generate_nonce};
use opcua_services::{
    ActivateSessionRequest, AnonymousIdentityToken, ApplicationDescription, ApplicationType,
    CloseSessionRequest, CreateMonitoredItemsRequest, CreateSessionRequest, CreateSubscriptionRequest,
    CreateSubscriptionResponse, DeleteMonitoredItemsRequest, DeleteSubscriptionsRequest,
    ModifySubscriptionRequest, ModifySubscriptionResponse, MonitoredItemCreateRequest,
    MonitoredItemCreateResult, NotificationMessage, ObjectId, PublishRequest, PublishResponse, ReadRequest,
    ReadValueId, RepublishRequest, RequestHeader, ServiceRequest, ServiceResponse, SetPublishingModeRequest,
    SignatureData, SubscriptionAcknowledgement, TimestampsToReturn, TransferResult,
    TransferSubscriptionsRequest, UserNameIdentityToken, WriteRequest, WriteValue, X509IdentityToken,
};
use std::sync::Arc;
use std::time::Duration;

const SESSION_NONCE_LENGTH: usize = 32;

/// Unwrap the expected response variant, turning faults into errors
macro_rules! expect_response {
    ($response:expr, $variant:ident) => {
        match $response.into_result()? {
            ServiceResponse::$variant(response) => response,
            _ => {
                log::warn!("Unexpected answer to {}", stringify!($variant));
                return Err(UaError::Status(StatusCode::BAD_UNKNOWN_RESPONSE));
            }
        }
    };
}

/// Who the session runs as
#[derive(Clone)]
pub enum ClientIdentity {
    Anonymous,
    UserName { user_name: String, password: String },
    /// User certificate and key; needs a secured channel
    X509(Arc<dyn CertificateProvider>),
}

impl std::fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientIdentity::Anonymous => write!(f, "Anonymous"),
            ClientIdentity::UserName { user_name, .. } => write!(f, "UserName({})", user_name),
            ClientIdentity::X509(_) => write!(f, "X509"),
        }
    }
}

/// The session the client created
#[derive(Debug, Clone, PartialEq)]
pub struct SessionInfo {
    pub session_id: NodeId,
    pub authentication_token: NodeId,
    /// Nonce for the next activation
    pub server_nonce: Vec<u8>,
    /// Milliseconds
    pub revised_timeout: f64,
    pub activated: bool,
}

/// Requested subscription parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionSettings {
    pub publishing_interval_ms: f64,
    pub lifetime_count: u32,
    pub max_keep_alive_count: u32,
    /// 0 for no limit
    pub max_notifications_per_publish: u32,
    pub priority: u8,
    pub publishing_enabled: bool,
}

impl Default for SubscriptionSettings {
    fn default() -> Self {
        Self {
            publishing_interval_ms: 1000.0,
            lifetime_count: 30,
            max_keep_alive_count: 10,
            max_notifications_per_publish: 0,
            priority: 0,
            publishing_enabled: true,
        }
    }
}

fn signature_input(certificate: &[u8], nonce: &[u8]) -> Vec<u8> {
    let mut data = Vec::with_capacity(certificate.len() + nonce.len());
    data.extend_from_slice(certificate);
    data.extend_from_slice(nonce);
    data
}

fn sign(provider: &dyn CertificateProvider, policy: SecurityPolicy, data: &[u8]) -> UaResult<SignatureData> {
    Ok(SignatureData {
        algorithm: policy
            .asymmetric_signature()
            .map(|scheme| UaString::from(scheme.uri()))
            .unwrap_or_default(),
        signature: ByteString::from(provider.sign(policy, data)?),
    })
}

/// OPC UA client
pub struct UaClient {
    connection: Connection,
    server_certificate: Option<Certificate>,
    session: Option<SessionInfo>,
}

impl UaClient {
    /// # Errors
    /// Endpoint URLs that are not opc.tcp
    pub fn new(
        config: ClientConfig,
        provider: Option<Arc<dyn CertificateProvider>>,
        server_certificate: Option<Certificate>,
    ) -> UaResult<Self> {
        Ok(Self {
            connection: Connection::new(config, provider, server_certificate.clone())?,
            server_certificate,
            session: None,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        self.connection.config()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn session(&self) -> Option<&SessionInfo> {
        self.session.as_ref()
    }

    pub fn session_id(&self) -> Option<&NodeId> {
        self.session.as_ref().map(|session| &session.session_id)
    }

    fn policy(&self) -> SecurityPolicy {
        self.connection
            .channel()
            .and_then(|channel| channel.security_policy())
            .unwrap_or(SecurityPolicy::None)
    }

    fn request_header(&mut self) -> RequestHeader {
        let token = self
            .session
            .as_ref()
            .map(|session| session.authentication_token.clone())
            .unwrap_or_else(NodeId::null);
        let mut header = RequestHeader::new(&token, self.connection.next_request_handle());
        header.timeout_hint = self.config().request_timeout_ms;
        header
    }

    /// Open transport and secure channel
    pub async fn connect(&mut self) -> UaResult<()> {
        self.connection.open().await
    }

    /// Create a session; the server signature is checked on secured
    /// channels
    ///
    /// # Errors
    /// `BadApplicationSignatureInvalid` when the server cannot prove its
    /// key, or the service result of the server
    pub async fn create_session(&mut self) -> UaResult<&SessionInfo> {
        let policy = self.policy();
        let client_nonce = generate_nonce(SESSION_NONCE_LENGTH)?;
        let client_certificate = self
            .connection
            .certificate_provider()
            .map(|provider| ByteString::from(provider.certificate().der()))
            .unwrap_or_default();
        let config = self.config().clone();
        let request = CreateSessionRequest {
            request_header: self.request_header(),
            client_description: ApplicationDescription::new(
                &config.application_uri,
                &config.application_name,
                ApplicationType::Client,
            ),
            server_uri: UaString::null(),
            endpoint_url: UaString::from(config.endpoint_url.as_str()),
            session_name: UaString::from(config.session_name.as_str()),
            client_nonce: ByteString::from(client_nonce.clone()),
            client_certificate: client_certificate.clone(),
            requested_session_timeout: config.session_timeout_ms,
            max_response_message_size: config.transport.max_message_size,
        };
        let response = self.connection.send(request.into()).await?;
        let response = expect_response!(response, CreateSession);

        if !policy.is_none() {
            let server_certificate = match &self.server_certificate {
                Some(certificate) => certificate.clone(),
                None => Certificate::from_der(response.server_certificate.as_bytes())?,
            };
            server_certificate
                .verify(
                    policy,
                    &signature_input(client_certificate.as_bytes(), &client_nonce),
                    response.server_signature.signature.as_bytes(),
                )
                .map_err(|_| UaError::Status(StatusCode::BAD_APPLICATION_SIGNATURE_INVALID))?;
            self.server_certificate = Some(server_certificate);
        }
        log::info!(
            "Session {} created, timeout {} ms",
            response.session_id, response.revised_session_timeout
        );
        Ok(&*self.session.insert(SessionInfo {
            session_id: response.session_id,
            authentication_token: response.authentication_token,
            server_nonce: response.server_nonce.as_bytes().to_vec(),
            revised_timeout: response.revised_session_timeout,
            activated: false,
        }))
    }

    fn identity_token(
        &self,
        identity: &ClientIdentity,
        policy: SecurityPolicy,
        server_nonce: &[u8],
    ) -> UaResult<(ExtensionObject, SignatureData)> {
        match identity {
            ClientIdentity::Anonymous => {
                let token = AnonymousIdentityToken {
                    policy_id: UaString::from("anonymous"),
                };
                Ok((
                    ExtensionObject::from_encodable(ObjectId::node_id(AnonymousIdentityToken::TYPE_ID), &token)?,
                    SignatureData::null(),
                ))
            }
            ClientIdentity::UserName { user_name, password } => {
                let (password, encryption_algorithm) = match (&self.server_certificate, policy.asymmetric_padding()) {
                    (Some(certificate), Some(padding)) => (
                        encrypt_password(certificate, policy, password.as_bytes(), server_nonce)?,
                        UaString::from(padding.uri()),
                    ),
                    _ => (password.as_bytes().to_vec(), UaString::null()),
                };
                let token = UserNameIdentityToken {
                    policy_id: UaString::from("username"),
                    user_name: UaString::from(user_name.as_str()),
                    password: ByteString::from(password),
                    encryption_algorithm,
                };
                Ok((
                    ExtensionObject::from_encodable(ObjectId::node_id(UserNameIdentityToken::TYPE_ID), &token)?,
                    SignatureData::null(),
                ))
            }
            ClientIdentity::X509(user) => {
                let certificate = self
                    .server_certificate
                    .as_ref()
                    .filter(|_| !policy.is_none())
                    .ok_or(UaError::Status(StatusCode::BAD_IDENTITY_TOKEN_REJECTED))?;
                let token = X509IdentityToken {
                    policy_id: UaString::from("x509"),
                    certificate_data: ByteString::from(user.certificate().der()),
                };
                let signature = sign(user.as_ref(), policy, &signature_input(certificate.der(), server_nonce))?;
                Ok((
                    ExtensionObject::from_encodable(ObjectId::node_id(X509IdentityToken::TYPE_ID), &token)?,
                    signature,
                ))
            }
        }
    }

    /// Activate the session as `identity`
    ///
    /// Also used after reconnecting to move the session to the new channel.
    pub async fn activate_session(&mut self, identity: &ClientIdentity) -> UaResult<()> {
        let policy = self.policy();
        let server_nonce = self
            .session
            .as_ref()
            .map(|session| session.server_nonce.clone())
            .ok_or(UaError::Status(StatusCode::BAD_SESSION_ID_INVALID))?;
        let client_signature = match (self.connection.certificate_provider(), &self.server_certificate) {
            (Some(provider), Some(certificate)) if !policy.is_none() => sign(
                provider.as_ref(),
                policy,
                &signature_input(certificate.der(), &server_nonce),
            )?,
            _ => SignatureData::null(),
        };
        let (user_identity_token, user_token_signature) = self.identity_token(identity, policy, &server_nonce)?;
        let request = ActivateSessionRequest {
            request_header: self.request_header(),
            client_signature,
            client_software_certificates: Vec::new(),
            locale_ids: Vec::new(),
            user_identity_token,
            user_token_signature,
        };
        let response = self.connection.send(request.into()).await?;
        let response = expect_response!(response, ActivateSession);
        if let Some(session) = self.session.as_mut() {
            session.server_nonce = response.server_nonce.as_bytes().to_vec();
            session.activated = true;
            log::info!("Session {} activated as {:?}", session.session_id, identity);
        }
        Ok(())
    }

    /// Close the session, optionally keeping its subscriptions for transfer
    pub async fn close_session(&mut self, delete_subscriptions: bool) -> UaResult<()> {
        if self.session.is_none() {
            return Ok(());
        }
        let request = CloseSessionRequest {
            request_header: self.request_header(),
            delete_subscriptions,
        };
        let response = self.connection.send(request.into()).await;
        self.session = None;
        expect_response!(response?, CloseSession);
        Ok(())
    }

    pub async fn read(&mut self, nodes: Vec<ReadValueId>, timestamps: TimestampsToReturn) -> UaResult<Vec<DataValue>> {
        let request = ReadRequest {
            request_header: self.request_header(),
            max_age: 0.0,
            timestamps_to_return: timestamps,
            nodes_to_read: nodes,
        };
        let response = self.connection.send(request.into()).await?;
        Ok(expect_response!(response, Read).results)
    }

    /// Read the Value attribute of one node
    pub async fn read_value(&mut self, node_id: &NodeId) -> UaResult<DataValue> {
        self.read(vec![ReadValueId::value_of(node_id.clone())], TimestampsToReturn::Both)
            .await?
            .pop()
            .ok_or(UaError::Status(StatusCode::BAD_UNEXPECTED_ERROR))
    }

    pub async fn write(&mut self, values: Vec<WriteValue>) -> UaResult<Vec<StatusCode>> {
        let request = WriteRequest {
            request_header: self.request_header(),
            nodes_to_write: values,
        };
        let response = self.connection.send(request.into()).await?;
        Ok(expect_response!(response, Write).results)
    }

    /// Write the Value attribute of one node
    pub async fn write_value(&mut self, node_id: &NodeId, value: DataValue) -> UaResult<StatusCode> {
        let value = WriteValue {
            node_id: node_id.clone(),
            attribute_id: AttributeId::Value.as_u32(),
            index_range: UaString::null(),
            value,
        };
        self.write(vec![value])
            .await?
            .pop()
            .ok_or(UaError::Status(StatusCode::BAD_UNEXPECTED_ERROR))
    }

    pub async fn create_subscription(&mut self, settings: &SubscriptionSettings) -> UaResult<CreateSubscriptionResponse> {
        let request = CreateSubscriptionRequest {
            request_header: self.request_header(),
            requested_publishing_interval: settings.publishing_interval_ms,
            requested_lifetime_count: settings.lifetime_count,
            requested_max_keep_alive_count: settings.max_keep_alive_count,
            max_notifications_per_publish: settings.max_notifications_per_publish,
            publishing_enabled: settings.publishing_enabled,
            priority: settings.priority,
        };
        let response = self.connection.send(request.into()).await?;
        Ok(expect_response!(response, CreateSubscription))
    }

    pub async fn modify_subscription(
        &mut self,
        subscription_id: u32,
        settings: &SubscriptionSettings,
    ) -> UaResult<ModifySubscriptionResponse> {
        let request = ModifySubscriptionRequest {
            request_header: self.request_header(),
            subscription_id,
            requested_publishing_interval: settings.publishing_interval_ms,
            requested_lifetime_count: settings.lifetime_count,
            requested_max_keep_alive_count: settings.max_keep_alive_count,
            max_notifications_per_publish: settings.max_notifications_per_publish,
            priority: settings.priority,
        };
        let response = self.connection.send(request.into()).await?;
        Ok(expect_response!(response, ModifySubscription))
    }

    pub async fn set_publishing_mode(&mut self, enabled: bool, subscription_ids: Vec<u32>) -> UaResult<Vec<StatusCode>> {
        let request = SetPublishingModeRequest {
            request_header: self.request_header(),
            publishing_enabled: enabled,
            subscription_ids,
        };
        let response = self.connection.send(request.into()).await?;
        Ok(expect_response!(response, SetPublishingMode).results)
    }

    pub async fn delete_subscriptions(&mut self, subscription_ids: Vec<u32>) -> UaResult<Vec<StatusCode>> {
        let request = DeleteSubscriptionsRequest {
            request_header: self.request_header(),
            subscription_ids,
        };
        let response = self.connection.send(request.into()).await?;
        Ok(expect_response!(response, DeleteSubscriptions).results)
    }

    /// Move subscriptions of another session of the same user to this one
    pub async fn transfer_subscriptions(
        &mut self,
        subscription_ids: Vec<u32>,
        send_initial_values: bool,
    ) -> UaResult<Vec<TransferResult>> {
        let request = TransferSubscriptionsRequest {
            request_header: self.request_header(),
            subscription_ids,
            send_initial_values,
        };
        let response = self.connection.send(request.into()).await?;
        Ok(expect_response!(response, TransferSubscriptions).results)
    }

    pub async fn create_monitored_items(
        &mut self,
        subscription_id: u32,
        timestamps: TimestampsToReturn,
        items: Vec<MonitoredItemCreateRequest>,
    ) -> UaResult<Vec<MonitoredItemCreateResult>> {
        let request = CreateMonitoredItemsRequest {
            request_header: self.request_header(),
            subscription_id,
            timestamps_to_return: timestamps,
            items_to_create: items,
        };
        let response = self.connection.send(request.into()).await?;
        Ok(expect_response!(response, CreateMonitoredItems).results)
    }

    pub async fn delete_monitored_items(
        &mut self,
        subscription_id: u32,
        monitored_item_ids: Vec<u32>,
    ) -> UaResult<Vec<StatusCode>> {
        let request = DeleteMonitoredItemsRequest {
            request_header: self.request_header(),
            subscription_id,
            monitored_item_ids,
        };
        let response = self.connection.send(request.into()).await?;
        Ok(expect_response!(response, DeleteMonitoredItems).results)
    }

    /// Wait for the next notification or keep-alive
    ///
    /// `acknowledgements` are `(subscription_id, sequence_number)` pairs of
    /// messages already processed.
    pub async fn publish(&mut self, acknowledgements: &[(u32, u32)]) -> UaResult<PublishResponse> {
        let request = PublishRequest {
            request_header: self.request_header(),
            subscription_acknowledgements: acknowledgements
                .iter()
                .map(|&(subscription_id, sequence_number)| SubscriptionAcknowledgement {
                    subscription_id,
                    sequence_number,
                })
                .collect(),
        };
        let response = self.connection.send(request.into()).await?;
        Ok(expect_response!(response, Publish))
    }

    /// Ask again for an unacknowledged notification
    pub async fn republish(&mut self, subscription_id: u32, sequence_number: u32) -> UaResult<NotificationMessage> {
        let request = RepublishRequest {
            request_header: self.request_header(),
            subscription_id,
            retransmit_sequence_number: sequence_number,
        };
        let response = self.connection.send(request.into()).await?;
        Ok(expect_response!(response, Republish).notification_message)
    }

    /// Wait without calling services while keeping the secure channel alive
    pub async fn idle(&mut self, duration: Duration) -> UaResult<()> {
        self.connection.idle(duration).await
    }

    /// Send a request the typed methods do not cover
    pub async fn send(&mut self, request: ServiceRequest) -> UaResult<ServiceResponse> {
        self.connection.send(request).await
    }

    /// Close the session (deleting its subscriptions) and the connection
    pub async fn disconnect(&mut self) -> UaResult<()> {
        if self.connection.state().is_ready() {
            if let Err(err) = self.close_session(true).await {
                log::debug!("CloseSession failed: {}", err);
            }
        }
        self.session = None;
        self.connection.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ClientBuilder;
    use once_cell::sync::Lazy;
    use opcua_codec::DecodingLimits;
    use opcua_core::Variant;
    use opcua_security::{MessageSecurityMode, RsaCertificateProvider, StaticIdentityValidator};
    use opcua_server::{EndpointConfig, MemoryAddressSpace, Server, ServerConfig, ServerListener};
    use opcua_services::{MonitoringMode, MonitoringParameters};

    static SERVER_KEYS: Lazy<Arc<RsaCertificateProvider>> =
        Lazy::new(|| Arc::new(RsaCertificateProvider::generate(2048).unwrap().trust_all()));
    static CLIENT_KEYS: Lazy<Arc<RsaCertificateProvider>> =
        Lazy::new(|| Arc::new(RsaCertificateProvider::generate(2048).unwrap().trust_all()));

    const FLAG: NodeId = NodeId::numeric(2, 1001);

    async fn start(endpoint: EndpointConfig) -> anyhow::Result<(String, Arc<MemoryAddressSpace>)> {
        let space = Arc::new(MemoryAddressSpace::new());
        space.add_variable(FLAG, false, true);
        let mut config = ServerConfig::default();
        config.bind_address = "127.0.0.1:0".to_string();
        config.endpoints = vec![endpoint];
        let validator = StaticIdentityValidator::new()
            .allow_anonymous()
            .with_user("operator", "secret");
        let server = Server::new(config, Some(SERVER_KEYS.clone()), Arc::new(validator), space.clone())?;
        let listener = ServerListener::bind(server).await?;
        let url = format!("opc.tcp://{}", listener.local_addr()?);
        tokio::spawn(listener.run());
        Ok((url, space))
    }

    fn monitor(node_id: NodeId, client_handle: u32) -> MonitoredItemCreateRequest {
        MonitoredItemCreateRequest {
            item_to_monitor: ReadValueId::value_of(node_id),
            monitoring_mode: MonitoringMode::Reporting,
            requested_parameters: MonitoringParameters {
                client_handle,
                sampling_interval: 100.0,
                filter: ExtensionObject::null(),
                queue_size: 1,
                discard_oldest: true,
            },
        }
    }

    #[tokio::test]
    async fn test_secured_subscription_round_trip() -> anyhow::Result<()> {
        let policy = SecurityPolicy::Basic256Sha256;
        let mode = MessageSecurityMode::SignAndEncrypt;
        let (url, space) = start(EndpointConfig::new(policy, mode)).await?;

        let mut client = ClientBuilder::new()
            .endpoint_url(&url)
            .security(policy, mode)
            .session_timeout(60_000.0)
            .certificate_provider(CLIENT_KEYS.clone())
            .server_certificate(SERVER_KEYS.certificate().clone())
            .build()?;
        client.connect().await?;
        client.create_session().await?;
        client.activate_session(&ClientIdentity::Anonymous).await?;
        assert!(client.session().is_some_and(|session| session.activated));

        let settings = SubscriptionSettings {
            publishing_interval_ms: 1000.0,
            lifetime_count: 10,
            max_keep_alive_count: 3,
            ..SubscriptionSettings::default()
        };
        let subscription = client.create_subscription(&settings).await?;
        let results = client
            .create_monitored_items(
                subscription.subscription_id,
                TimestampsToReturn::Both,
                vec![monitor(FLAG, 7)],
            )
            .await?;
        assert_eq!(results[0].status_code, StatusCode::GOOD);
        space.set_value(&FLAG, true);

        let first = client.publish(&[]).await?;
        assert_eq!(first.subscription_id, subscription.subscription_id);
        assert_eq!(first.notification_message.sequence_number, 1);
        let items = first.notification_message.data_changes(&DecodingLimits::default())?;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].client_handle, 7);
        assert_eq!(items[0].value.value, Some(Variant::Boolean(true)));

        // Nothing changes afterwards, so the next answer is a keep-alive
        let second = client.publish(&[(subscription.subscription_id, 1)]).await?;
        assert_eq!(second.results, vec![StatusCode::GOOD]);
        assert!(second.notification_message.is_keep_alive());
        assert_eq!(second.notification_message.sequence_number, 2);

        assert_eq!(client.write_value(&FLAG, DataValue::new_now(false)).await?, StatusCode::GOOD);
        assert_eq!(client.read_value(&FLAG).await?.value, Some(Variant::Boolean(false)));

        let deleted = client.delete_subscriptions(vec![subscription.subscription_id]).await?;
        assert_eq!(deleted, vec![StatusCode::GOOD]);
        client.disconnect().await?;
        assert_eq!(client.connection_state(), ConnectionState::Closed);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_renewed_while_idle_and_waiting() -> anyhow::Result<()> {
        let (url, _space) = start(EndpointConfig::new(SecurityPolicy::None, MessageSecurityMode::None)).await?;
        let mut client = ClientBuilder::new()
            .endpoint_url(&url)
            .token_lifetime(10_000)
            .request_timeout(Duration::from_secs(60))
            .build()?;
        client.connect().await?;
        client.create_session().await?;
        client.activate_session(&ClientIdentity::Anonymous).await?;

        // Two and a half token lifetimes without a request
        client.idle(Duration::from_secs(25)).await?;
        assert_eq!(client.read_value(&FLAG).await?.value, Some(Variant::Boolean(false)));

        // The keep-alive takes twice the token lifetime to arrive
        let settings = SubscriptionSettings {
            publishing_interval_ms: 1000.0,
            lifetime_count: 60,
            max_keep_alive_count: 20,
            ..SubscriptionSettings::default()
        };
        let subscription = client.create_subscription(&settings).await?;
        let keep_alive = client.publish(&[]).await?;
        assert_eq!(keep_alive.subscription_id, subscription.subscription_id);
        assert!(keep_alive.notification_message.is_keep_alive());

        assert_eq!(client.read_value(&FLAG).await?.value, Some(Variant::Boolean(false)));
        assert_eq!(client.connection_state(), ConnectionState::Ready);
        client.disconnect().await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_user_name_identity_over_unsecured_channel() -> anyhow::Result<()> {
        let (url, _space) = start(EndpointConfig::new(SecurityPolicy::None, MessageSecurityMode::None)).await?;
        let mut client = ClientBuilder::new().endpoint_url(&url).build()?;
        client.connect().await?;

        let err = client.read_value(&FLAG).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_SESSION_ID_INVALID);

        client.create_session().await?;
        let wrong = ClientIdentity::UserName {
            user_name: "operator".to_string(),
            password: "guess".to_string(),
        };
        let err = client.activate_session(&wrong).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_USER_ACCESS_DENIED);

        let right = ClientIdentity::UserName {
            user_name: "operator".to_string(),
            password: "secret".to_string(),
        };
        client.activate_session(&right).await?;
        assert_eq!(client.read_value(&FLAG).await?.value, Some(Variant::Boolean(false)));

        // X.509 user tokens need a secured channel
        let err = client
            .activate_session(&ClientIdentity::X509(CLIENT_KEYS.clone()))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_IDENTITY_TOKEN_REJECTED);

        client.disconnect().await?;
        Ok(())
    }

    #[test]
    fn test_identity_debug_hides_password() {
        let identity = ClientIdentity::UserName {
            user_name: "operator".to_string(),
            password: "secret".to_string(),
        };
        assert_eq!(format!("{:?}", identity), "UserName(operator)");
    }
}
