//! Session registry: create, activate, validate, close, expire

use super::identity::{TokenProof, decode_identity_token};
use super::state::SessionState;
use crate::config::SessionLimits;
use crate::context::ChannelContext;
use crate::error::{UaError, UaResult};
use opcua_codec::DecodingLimits;
use opcua_core::{ByteString, NodeId, StatusCode, UaString};
use opcua_security::{
    Certificate, CertificateProvider, IdentityValidator, UserIdentity, generate_nonce,
};
use opcua_services::{
    ActivateSessionRequest, ActivateSessionResponse, CreateSessionRequest, CreateSessionResponse,
    EndpointDescription, RequestHeader, ResponseHeader, SignatureData,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::time::Instant;

const SESSION_NONCE_LENGTH: usize = 32;

/// One application session
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: NodeId,
    pub authentication_token: NodeId,
    pub name: String,
    /// `None` while orphaned by a closed channel
    pub channel_id: Option<u32>,
    pub state: SessionState,
    pub timeout: Duration,
    pub last_activity: Instant,
    pub server_nonce: Vec<u8>,
    pub client_certificate: Option<Certificate>,
    pub identity: Option<UserIdentity>,
}

impl Session {
    pub fn expires_at(&self) -> Instant {
        self.last_activity + self.timeout
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at()
    }
}

/// Outcome of a successful activation
#[derive(Debug)]
pub struct Activation {
    pub response: ActivateSessionResponse,
    pub session_id: NodeId,
    /// Channel the session was bound to before, when it moved
    pub previous_channel: Option<u32>,
}

/// All sessions of a server, keyed by authentication token
#[derive(Debug)]
pub struct SessionManager {
    limits: SessionLimits,
    sessions: Mutex<HashMap<NodeId, Session>>,
    next_id: AtomicU32,
}

fn random_token() -> UaResult<NodeId> {
    Ok(NodeId::byte_string(0, generate_nonce(32)?))
}

fn signature_input(certificate: &[u8], nonce: &[u8]) -> Vec<u8> {
    let mut data = Vec::with_capacity(certificate.len() + nonce.len());
    data.extend_from_slice(certificate);
    data.extend_from_slice(nonce);
    data
}

impl SessionManager {
    pub fn new(limits: SessionLimits) -> Self {
        Self {
            limits,
            sessions: Mutex::new(HashMap::new()),
            next_id: AtomicU32::new(1),
        }
    }

    pub fn limits(&self) -> &SessionLimits {
        &self.limits
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Copy of the session with `session_id`
    pub fn session(&self, session_id: &NodeId) -> Option<Session> {
        self.sessions
            .lock()
            .values()
            .find(|session| session.session_id == *session_id)
            .cloned()
    }

    /// Create a session in `Created` state
    ///
    /// # Errors
    /// `BadTooManySessions` at the configured maximum, `BadNonceInvalid`
    /// for a short client nonce on a secured channel
    pub fn create_session(
        &self,
        channel: &ChannelContext,
        provider: Option<&dyn CertificateProvider>,
        endpoints: Vec<EndpointDescription>,
        request: &CreateSessionRequest,
    ) -> UaResult<CreateSessionResponse> {
        if self.session_count() >= self.limits.max_sessions {
            return Err(UaError::Status(StatusCode::BAD_TOO_MANY_SESSIONS));
        }
        let policy = channel.suite.policy();
        let client_certificate = if request.client_certificate.is_empty() {
            channel.client_certificate.clone()
        } else {
            Some(
                Certificate::from_der(request.client_certificate.as_bytes())
                    .map_err(|_| UaError::Status(StatusCode::BAD_CERTIFICATE_INVALID))?,
            )
        };

        let mut server_signature = SignatureData::null();
        let mut server_certificate = ByteString::null();
        if !policy.is_none() {
            if request.client_nonce.len() < SESSION_NONCE_LENGTH {
                return Err(UaError::Status(StatusCode::BAD_NONCE_INVALID));
            }
            let provider = provider.ok_or(UaError::Status(StatusCode::BAD_SECURITY_POLICY_REJECTED))?;
            let certificate = client_certificate
                .as_ref()
                .ok_or(UaError::Status(StatusCode::BAD_CERTIFICATE_INVALID))?;
            let signature = provider.sign(
                policy,
                &signature_input(certificate.der(), request.client_nonce.as_bytes()),
            )?;
            server_signature = SignatureData {
                algorithm: policy
                    .asymmetric_signature()
                    .map(|scheme| UaString::from(scheme.uri()))
                    .unwrap_or_default(),
                signature: ByteString::from(signature),
            };
        }
        if let Some(provider) = provider {
            server_certificate = ByteString::from(provider.certificate().der());
        }

        let timeout_ms = self.limits.revise_timeout(request.requested_session_timeout);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let session = Session {
            session_id: NodeId::numeric(1, id),
            authentication_token: random_token()?,
            name: request.session_name.as_str().to_string(),
            channel_id: Some(channel.channel_id),
            state: SessionState::Created,
            timeout: Duration::from_millis(timeout_ms as u64),
            last_activity: Instant::now(),
            server_nonce: generate_nonce(SESSION_NONCE_LENGTH)?,
            client_certificate,
            identity: None,
        };
        log::info!(
            "Session {} '{}' created on channel {}, timeout {} ms",
            session.session_id, session.name, channel.channel_id, timeout_ms
        );

        let response = CreateSessionResponse {
            response_header: ResponseHeader::good(&request.request_header),
            session_id: session.session_id.clone(),
            authentication_token: session.authentication_token.clone(),
            revised_session_timeout: timeout_ms,
            server_nonce: ByteString::from(session.server_nonce.clone()),
            server_certificate,
            server_endpoints: endpoints,
            server_software_certificates: Vec::new(),
            server_signature,
            max_request_message_size: self.limits.max_request_message_size,
        };
        self.sessions
            .lock()
            .insert(session.authentication_token.clone(), session);
        Ok(response)
    }

    /// Bind a session to the calling channel and authenticate its user
    ///
    /// Nothing changes when any check fails.
    ///
    /// # Errors
    /// `BadSessionIdInvalid`, `BadApplicationSignatureInvalid`, or the
    /// identity errors of the token decoder and validator
    pub async fn activate_session(
        &self,
        channel: &ChannelContext,
        provider: Option<&dyn CertificateProvider>,
        validator: &dyn IdentityValidator,
        request: &ActivateSessionRequest,
        limits: &DecodingLimits,
    ) -> UaResult<Activation> {
        let token = &request.request_header.authentication_token;
        let snapshot = self
            .sessions
            .lock()
            .get(token)
            .cloned()
            .ok_or(UaError::Status(StatusCode::BAD_SESSION_ID_INVALID))?;

        // Only the creating channel may perform the first activation.
        if snapshot.state == SessionState::Created && snapshot.channel_id != Some(channel.channel_id) {
            return Err(UaError::Status(StatusCode::BAD_SECURE_CHANNEL_ID_INVALID));
        }

        let policy = channel.suite.policy();
        if !policy.is_none() {
            let provider = provider.ok_or(UaError::Status(StatusCode::BAD_SECURITY_POLICY_REJECTED))?;
            let client_certificate = snapshot
                .client_certificate
                .as_ref()
                .ok_or(UaError::Status(StatusCode::BAD_APPLICATION_SIGNATURE_INVALID))?;
            client_certificate
                .verify(
                    policy,
                    &signature_input(provider.certificate().der(), &snapshot.server_nonce),
                    request.client_signature.signature.as_bytes(),
                )
                .map_err(|_| UaError::Status(StatusCode::BAD_APPLICATION_SIGNATURE_INVALID))?;
        }

        let proof = TokenProof {
            policy,
            provider,
            server_nonce: &snapshot.server_nonce,
            user_token_signature: &request.user_token_signature,
        };
        let identity_token = decode_identity_token(&request.user_identity_token, &proof, limits)?;
        let identity = validator.validate(&identity_token).await?;

        let server_nonce = generate_nonce(SESSION_NONCE_LENGTH)?;
        let mut sessions = self.sessions.lock();
        let session = sessions
            .get_mut(token)
            .ok_or(UaError::Status(StatusCode::BAD_SESSION_ID_INVALID))?;
        // The nonce may have been consumed by a concurrent activation.
        if session.server_nonce != snapshot.server_nonce {
            return Err(UaError::Status(StatusCode::BAD_NONCE_INVALID));
        }
        session.state.validate_transition(SessionState::Active)?;

        let previous_channel = session.channel_id.filter(|id| *id != channel.channel_id);
        session.state = SessionState::Active;
        session.channel_id = Some(channel.channel_id);
        session.identity = Some(identity);
        session.last_activity = Instant::now();
        session.server_nonce = server_nonce.clone();
        log::info!(
            "Session {} activated on channel {} as {:?}",
            session.session_id, channel.channel_id, session.identity
        );

        Ok(Activation {
            response: ActivateSessionResponse {
                response_header: ResponseHeader::good(&request.request_header),
                server_nonce: ByteString::from(server_nonce),
                results: Vec::new(),
                diagnostic_infos: Vec::new(),
            },
            session_id: session.session_id.clone(),
            previous_channel,
        })
    }

    /// Resolve the session of a service request and record activity
    ///
    /// # Errors
    /// `BadSessionIdInvalid` for unknown tokens, `BadSecureChannelIdInvalid`
    /// when bound elsewhere, `BadSessionNotActivated` before activation
    pub fn validate_request(&self, channel: &ChannelContext, header: &RequestHeader) -> UaResult<NodeId> {
        let mut sessions = self.sessions.lock();
        let session = sessions
            .get_mut(&header.authentication_token)
            .ok_or(UaError::Status(StatusCode::BAD_SESSION_ID_INVALID))?;
        if session.channel_id != Some(channel.channel_id) {
            return Err(UaError::Status(StatusCode::BAD_SECURE_CHANNEL_ID_INVALID));
        }
        match session.state {
            SessionState::Active => {}
            SessionState::Created => return Err(UaError::Status(StatusCode::BAD_SESSION_NOT_ACTIVATED)),
            SessionState::Closed => return Err(UaError::Status(StatusCode::BAD_SESSION_CLOSED)),
        }
        session.last_activity = Instant::now();
        Ok(session.session_id.clone())
    }

    /// Remove the session owning the request's token
    ///
    /// Sessions that were created but never activated may be closed too.
    ///
    /// # Returns
    /// The closed session's id
    pub fn close_session(&self, channel: &ChannelContext, header: &RequestHeader) -> UaResult<NodeId> {
        let mut sessions = self.sessions.lock();
        match sessions.get(&header.authentication_token) {
            None => return Err(UaError::Status(StatusCode::BAD_SESSION_ID_INVALID)),
            Some(session) if session.channel_id != Some(channel.channel_id) => {
                return Err(UaError::Status(StatusCode::BAD_SECURE_CHANNEL_ID_INVALID));
            }
            Some(_) => {}
        }
        let mut session = sessions
            .remove(&header.authentication_token)
            .ok_or(UaError::Status(StatusCode::BAD_SESSION_ID_INVALID))?;
        session.state = SessionState::Closed;
        log::info!("Session {} closed", session.session_id);
        Ok(session.session_id)
    }

    /// Unbind every session of a closing channel
    ///
    /// # Returns
    /// Ids of the sessions left orphaned
    pub fn channel_closed(&self, channel_id: u32) -> Vec<NodeId> {
        let mut orphaned = Vec::new();
        for session in self.sessions.lock().values_mut() {
            if session.channel_id == Some(channel_id) {
                session.channel_id = None;
                orphaned.push(session.session_id.clone());
            }
        }
        if !orphaned.is_empty() {
            log::info!("Channel {} closed, {} session(s) unbound", channel_id, orphaned.len());
        }
        orphaned
    }

    /// Close every session idle past its timeout
    ///
    /// # Returns
    /// Ids of the closed sessions
    pub fn expire_sessions(&self, now: Instant) -> Vec<NodeId> {
        let mut expired = Vec::new();
        self.sessions.lock().retain(|_, session| {
            if session.is_expired(now) {
                log::info!("Session {} timed out", session.session_id);
                expired.push(session.session_id.clone());
                false
            } else {
                true
            }
        });
        expired
    }

    /// Earliest session deadline, for the watchdog
    pub fn next_expiry(&self) -> Option<Instant> {
        self.sessions.lock().values().map(Session::expires_at).min()
    }

    /// Identity a session is activated as
    pub fn identity(&self, session_id: &NodeId) -> Option<UserIdentity> {
        self.session(session_id).and_then(|session| session.identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use opcua_codec::ExtensionObjectExt;
    use opcua_core::ExtensionObject;
    use async_trait::async_trait;
    use opcua_security::{
        IdentityToken, MessageSecurityMode, RsaCertificateProvider, SecurityPolicy, SecuritySuite,
        StaticIdentityValidator,
    };
    use opcua_services::{AnonymousIdentityToken, ApplicationDescription, ApplicationType, ObjectId};

    mockall::mock! {
        Validator {}

        #[async_trait]
        impl IdentityValidator for Validator {
            async fn validate(&self, token: &IdentityToken) -> UaResult<UserIdentity>;
        }
    }

    static SERVER: Lazy<RsaCertificateProvider> =
        Lazy::new(|| RsaCertificateProvider::generate(2048).unwrap().trust_all());
    static CLIENT: Lazy<RsaCertificateProvider> =
        Lazy::new(|| RsaCertificateProvider::generate(2048).unwrap());

    fn channel(id: u32, policy: SecurityPolicy) -> ChannelContext {
        let mode = if policy.is_none() {
            MessageSecurityMode::None
        } else {
            MessageSecurityMode::SignAndEncrypt
        };
        let suite = SecuritySuite::builder()
            .set_security_policy(policy)
            .set_security_mode(mode)
            .build()
            .unwrap();
        let certificate = (!policy.is_none()).then(|| CLIENT.certificate().clone());
        ChannelContext::new(id, suite, certificate)
    }

    fn create_request(timeout: f64) -> CreateSessionRequest {
        CreateSessionRequest {
            request_header: RequestHeader::default(),
            client_description: ApplicationDescription::new("urn:test", "test", ApplicationType::Client),
            server_uri: UaString::null(),
            endpoint_url: UaString::from("opc.tcp://localhost:4840"),
            session_name: UaString::from("s1"),
            client_nonce: ByteString::from(vec![1u8; 32]),
            client_certificate: ByteString::null(),
            requested_session_timeout: timeout,
            max_response_message_size: 0,
        }
    }

    fn activate_request(token: &NodeId, client_signature: SignatureData) -> ActivateSessionRequest {
        ActivateSessionRequest {
            request_header: RequestHeader::new(token, 2),
            client_signature,
            client_software_certificates: Vec::new(),
            locale_ids: Vec::new(),
            user_identity_token: ExtensionObject::from_encodable(
                ObjectId::node_id(AnonymousIdentityToken::TYPE_ID),
                &AnonymousIdentityToken {
                    policy_id: UaString::from("anonymous"),
                },
            )
            .unwrap(),
            user_token_signature: SignatureData::null(),
        }
    }

    fn validator() -> StaticIdentityValidator {
        StaticIdentityValidator::new().allow_anonymous()
    }

    #[tokio::test]
    async fn test_create_activate_validate() {
        let manager = SessionManager::new(SessionLimits::default());
        let ctx = channel(1, SecurityPolicy::None);
        let created = manager
            .create_session(&ctx, None, Vec::new(), &create_request(60_000.0))
            .unwrap();
        assert_eq!(created.revised_session_timeout, 60_000.0);

        let header = RequestHeader::new(&created.authentication_token, 3);
        let err = manager.validate_request(&ctx, &header).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_SESSION_NOT_ACTIVATED);

        let activation = manager
            .activate_session(
                &ctx,
                None,
                &validator(),
                &activate_request(&created.authentication_token, SignatureData::null()),
                &DecodingLimits::default(),
            )
            .await
            .unwrap();
        assert_eq!(activation.previous_channel, None);
        assert_eq!(manager.validate_request(&ctx, &header).unwrap(), created.session_id);
        assert_eq!(manager.identity(&created.session_id), Some(UserIdentity::Anonymous));

        let unknown = RequestHeader::new(&NodeId::numeric(0, 42), 4);
        let err = manager.validate_request(&ctx, &unknown).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_SESSION_ID_INVALID);
    }

    #[tokio::test]
    async fn test_signatures_on_secured_channel() {
        let manager = SessionManager::new(SessionLimits::default());
        let policy = SecurityPolicy::Basic256Sha256;
        let ctx = channel(1, policy);
        let request = create_request(60_000.0);
        let created = manager
            .create_session(&ctx, Some(&*SERVER), Vec::new(), &request)
            .unwrap();

        let signed = signature_input(CLIENT.certificate().der(), request.client_nonce.as_bytes());
        SERVER
            .certificate()
            .verify(policy, &signed, created.server_signature.signature.as_bytes())
            .unwrap();

        // Forged client signature
        let err = manager
            .activate_session(
                &ctx,
                Some(&*SERVER),
                &validator(),
                &activate_request(&created.authentication_token, SignatureData::null()),
                &DecodingLimits::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_APPLICATION_SIGNATURE_INVALID);

        let proof = signature_input(SERVER.certificate().der(), created.server_nonce.as_bytes());
        let client_signature = SignatureData {
            algorithm: UaString::from(policy.asymmetric_signature().unwrap().uri()),
            signature: ByteString::from(CLIENT.sign(policy, &proof).unwrap()),
        };
        let activation = manager
            .activate_session(
                &ctx,
                Some(&*SERVER),
                &validator(),
                &activate_request(&created.authentication_token, client_signature),
                &DecodingLimits::default(),
            )
            .await
            .unwrap();
        assert_ne!(activation.response.server_nonce, created.server_nonce);
    }

    #[tokio::test]
    async fn test_rejected_identity_leaves_session_unchanged() {
        let manager = SessionManager::new(SessionLimits::default());
        let ctx = channel(1, SecurityPolicy::None);
        let created = manager
            .create_session(&ctx, None, Vec::new(), &create_request(60_000.0))
            .unwrap();

        let mut rejecting = MockValidator::new();
        rejecting
            .expect_validate()
            .times(1)
            .returning(|_| Err(UaError::Status(StatusCode::BAD_USER_ACCESS_DENIED)));
        let err = manager
            .activate_session(
                &ctx,
                None,
                &rejecting,
                &activate_request(&created.authentication_token, SignatureData::null()),
                &DecodingLimits::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_USER_ACCESS_DENIED);
        assert_eq!(manager.session(&created.session_id).unwrap().state, SessionState::Created);
    }

    #[tokio::test]
    async fn test_rebind_to_new_channel() {
        let manager = SessionManager::new(SessionLimits::default());
        let first = channel(1, SecurityPolicy::None);
        let second = channel(2, SecurityPolicy::None);
        let created = manager
            .create_session(&first, None, Vec::new(), &create_request(60_000.0))
            .unwrap();
        let request = activate_request(&created.authentication_token, SignatureData::null());

        // First activation must happen on the creating channel.
        let err = manager
            .activate_session(&second, None, &validator(), &request, &DecodingLimits::default())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_SECURE_CHANNEL_ID_INVALID);

        manager
            .activate_session(&first, None, &validator(), &request, &DecodingLimits::default())
            .await
            .unwrap();
        assert_eq!(manager.channel_closed(1), vec![created.session_id.clone()]);

        let header = RequestHeader::new(&created.authentication_token, 5);
        let err = manager.validate_request(&second, &header).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_SECURE_CHANNEL_ID_INVALID);

        let activation = manager
            .activate_session(&second, None, &validator(), &request, &DecodingLimits::default())
            .await
            .unwrap();
        assert_eq!(activation.previous_channel, None);
        manager.validate_request(&second, &header).unwrap();
    }

    #[tokio::test]
    async fn test_too_many_sessions() {
        let limits = SessionLimits {
            max_sessions: 1,
            ..Default::default()
        };
        let manager = SessionManager::new(limits);
        let ctx = channel(1, SecurityPolicy::None);
        manager
            .create_session(&ctx, None, Vec::new(), &create_request(60_000.0))
            .unwrap();
        let err = manager
            .create_session(&ctx, None, Vec::new(), &create_request(60_000.0))
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_TOO_MANY_SESSIONS);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inactivity_expiry() {
        let manager = SessionManager::new(SessionLimits::default());
        let ctx = channel(1, SecurityPolicy::None);
        let created = manager
            .create_session(&ctx, None, Vec::new(), &create_request(10_000.0))
            .unwrap();
        manager
            .activate_session(
                &ctx,
                None,
                &validator(),
                &activate_request(&created.authentication_token, SignatureData::null()),
                &DecodingLimits::default(),
            )
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(6)).await;
        let header = RequestHeader::new(&created.authentication_token, 3);
        manager.validate_request(&ctx, &header).unwrap();
        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(manager.expire_sessions(Instant::now()).is_empty());

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(manager.expire_sessions(Instant::now()), vec![created.session_id]);
        assert_eq!(manager.session_count(), 0);
    }

    #[tokio::test]
    async fn test_close_session() {
        let manager = SessionManager::new(SessionLimits::default());
        let ctx = channel(1, SecurityPolicy::None);
        let created = manager
            .create_session(&ctx, None, Vec::new(), &create_request(60_000.0))
            .unwrap();
        let header = RequestHeader::new(&created.authentication_token, 9);
        let err = manager.close_session(&channel(2, SecurityPolicy::None), &header).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_SECURE_CHANNEL_ID_INVALID);
        assert_eq!(manager.close_session(&ctx, &header).unwrap(), created.session_id);
        let err = manager.close_session(&ctx, &header).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_SESSION_ID_INVALID);
    }
}
