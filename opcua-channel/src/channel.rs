//! The secure channel: token lifecycle, chunk security and sequencing
//!
//! `SecureChannel` performs no I/O. The owner feeds it received chunks and
//! writes out the chunks it produces, which keeps key material and
//! sequence counters owned by a single task.

use crate::assembler::{Assembled, MessageAssembler};
use crate::chunker::{
    ChunkParams, ChunkPrefix, ChunkSecurity, encode_abort_chunk, encode_chunks, open_chunk,
};
use crate::config::ChannelLimits;
use crate::error::{UaError, UaResult};
use crate::header::{AsymmetricSecurityHeader, SecurityHeader, SymmetricSecurityHeader};
use crate::sequence::{SequenceCounter, SequenceValidator};
use crate::state::ChannelState;
use crate::statistics::ChannelStatistics;
use crate::token::{ActiveToken, SecurityToken, TokenSet};
use opcua_core::{ByteString, StatusCode, UaString};
use opcua_security::{
    Certificate, CertificateProvider, SecurityPolicy, SecuritySuite, SymmetricKeys, derive_keys,
    generate_nonce,
};
use opcua_security::utils::check_nonce;
use opcua_services::{
    ChannelSecurityToken, CloseSecureChannelRequest, OpenSecureChannelRequest,
    OpenSecureChannelResponse, RequestHeader, ResponseHeader, SecurityTokenRequestType,
    ServiceRequest, ServiceResponse,
};
use opcua_transport::{MessageType, NegotiatedLimits, PROTOCOL_VERSION};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Which end of the channel this is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelRole {
    Client,
    Server,
}

/// One secure channel, client or server side
pub struct SecureChannel {
    role: ChannelRole,
    state: ChannelState,
    channel_id: u32,
    /// Fixed by the first OpenSecureChannel
    policy: Option<SecurityPolicy>,
    suite: SecuritySuite,
    provider: Option<Arc<dyn CertificateProvider>>,
    remote_certificate: Option<Certificate>,
    local_nonce: Vec<u8>,
    remote_nonce: Vec<u8>,
    tokens: TokenSet,
    next_token_id: u32,
    send_sequence: SequenceCounter,
    receive_sequence: SequenceValidator,
    next_request_id: u32,
    assembler: MessageAssembler,
    transport_limits: NegotiatedLimits,
    limits: ChannelLimits,
    statistics: ChannelStatistics,
}

impl std::fmt::Debug for SecureChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureChannel")
            .field("role", &self.role)
            .field("state", &self.state)
            .field("channel_id", &self.channel_id)
            .field("suite", &self.suite)
            .finish()
    }
}

impl SecureChannel {
    fn new(
        role: ChannelRole,
        channel_id: u32,
        provider: Option<Arc<dyn CertificateProvider>>,
        transport_limits: NegotiatedLimits,
        limits: ChannelLimits,
    ) -> Self {
        let mut assembler = MessageAssembler::new(
            transport_limits.receive_max_message_size as usize,
            transport_limits.receive_max_chunk_count as usize,
        );
        assembler.set_max_pending(limits.max_pending_messages);
        Self {
            role,
            state: ChannelState::Closed,
            channel_id,
            policy: None,
            suite: SecuritySuite::none(),
            provider,
            remote_certificate: None,
            local_nonce: Vec::new(),
            remote_nonce: Vec::new(),
            tokens: TokenSet::new(),
            next_token_id: 1,
            send_sequence: SequenceCounter::new(),
            receive_sequence: SequenceValidator::new(),
            next_request_id: 1,
            assembler,
            transport_limits,
            limits,
            statistics: ChannelStatistics::new(),
        }
    }

    /// Server end of a fresh connection
    ///
    /// # Arguments
    /// * `channel_id` - Id this server assigns to the channel
    /// * `provider` - Own certificate and key, required for any policy but None
    /// * `transport_limits` - Limits agreed in the Hello/Acknowledge exchange
    pub fn server(
        channel_id: u32,
        provider: Option<Arc<dyn CertificateProvider>>,
        transport_limits: NegotiatedLimits,
        limits: ChannelLimits,
    ) -> Self {
        Self::new(ChannelRole::Server, channel_id, provider, transport_limits, limits)
    }

    /// Client end, before the channel is opened
    ///
    /// # Errors
    /// Policies other than None need both an own key and the server
    /// certificate, each with a key size the policy allows
    pub fn client(
        suite: SecuritySuite,
        provider: Option<Arc<dyn CertificateProvider>>,
        server_certificate: Option<Certificate>,
        transport_limits: NegotiatedLimits,
        limits: ChannelLimits,
    ) -> UaResult<Self> {
        if !suite.policy().is_none() && (provider.is_none() || server_certificate.is_none()) {
            return Err(UaError::Security(format!(
                "{} needs a client key and the server certificate",
                suite.policy()
            )));
        }
        if let (Some(provider), Some(server)) = (&provider, &server_certificate) {
            suite.policy().check_key_size(provider.key_size())?;
            suite.policy().check_key_size(server.key_size())?;
        }
        let mut channel = Self::new(ChannelRole::Client, 0, provider, transport_limits, limits);
        channel.suite = suite;
        channel.policy = Some(suite.policy());
        channel.remote_certificate = server_certificate;
        Ok(channel)
    }

    pub fn role(&self) -> ChannelRole {
        self.role
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn channel_id(&self) -> u32 {
        self.channel_id
    }

    pub fn suite(&self) -> SecuritySuite {
        self.suite
    }

    /// Policy fixed by the first OpenSecureChannel, `None` before it
    pub fn security_policy(&self) -> Option<SecurityPolicy> {
        self.policy
    }

    pub fn statistics(&self) -> &ChannelStatistics {
        &self.statistics
    }

    pub fn remote_certificate(&self) -> Option<&Certificate> {
        self.remote_certificate.as_ref()
    }

    pub fn certificate_provider(&self) -> Option<&Arc<dyn CertificateProvider>> {
        self.provider.as_ref()
    }

    pub fn limits(&self) -> &ChannelLimits {
        &self.limits
    }

    pub fn transport_limits(&self) -> &NegotiatedLimits {
        &self.transport_limits
    }

    pub fn current_token(&self) -> Option<&SecurityToken> {
        self.tokens.current().map(|active| &active.token)
    }

    /// Whether service messages may flow
    pub fn is_open(&self) -> bool {
        self.state.can_exchange_messages()
    }

    fn transition(&mut self, new_state: ChannelState) -> UaResult<()> {
        self.state.validate_transition(new_state)?;
        self.state = new_state;
        Ok(())
    }

    /// Enter `Faulted`; the owner must tear down the transport
    pub fn fault(&mut self) {
        if self.state != ChannelState::Faulted && self.state != ChannelState::Closed {
            log::warn!("Secure channel {} faulted in state {}", self.channel_id, self.state.as_str());
        }
        self.state = ChannelState::Faulted;
    }

    /// Drop all tokens and move to `Closed`
    pub fn close(&mut self) {
        if self.state != ChannelState::Closed {
            log::info!("Secure channel {} closed", self.channel_id);
        }
        self.tokens.clear();
        self.state = ChannelState::Closed;
    }

    /// Run `f`, faulting the channel if it fails
    fn guarded<T>(&mut self, f: impl FnOnce(&mut Self) -> UaResult<T>) -> UaResult<T> {
        let result = f(self);
        if result.is_err() {
            self.fault();
        }
        result
    }

    /// Next request id for a client message
    pub fn next_request_id(&mut self) -> u32 {
        let id = self.next_request_id;
        self.next_request_id = self.next_request_id.checked_add(1).unwrap_or(1);
        id
    }

    /// When the current token expires, for the owner's timer
    pub fn token_expiry(&self) -> Option<Instant> {
        self.tokens.current().map(|active| active.token.expires_at())
    }

    /// Client: when 75% of the token lifetime will have passed, unless a
    /// renewal is already under way
    pub fn renewal_deadline(&self) -> Option<Instant> {
        if !self.state.can_renew() {
            return None;
        }
        self.tokens.current().map(|active| active.token.renew_at())
    }

    /// Client: whether 75% of the token lifetime has passed
    pub fn renewal_due(&self, now: Instant) -> bool {
        self.renewal_deadline().is_some_and(|at| now >= at)
    }

    /// Close the channel if no valid token remains
    ///
    /// # Errors
    /// `BadSecureChannelClosed` once the last token expired
    pub fn check_expiry(&mut self, now: Instant) -> UaResult<()> {
        self.tokens.retire_expired(now);
        if self.is_open() && self.tokens.is_expired(now) {
            log::info!("Secure channel {} token expired", self.channel_id);
            self.close();
            return Err(UaError::Status(StatusCode::BAD_SECURE_CHANNEL_CLOSED));
        }
        Ok(())
    }

    // ---- receiving ----

    /// Open and sequence-check one received chunk, then reassemble
    ///
    /// Any failure faults the channel.
    pub fn receive_chunk(&mut self, chunk: &[u8]) -> UaResult<Assembled> {
        self.guarded(|channel| channel.receive_chunk_inner(chunk))
    }

    fn receive_chunk_inner(&mut self, chunk: &[u8]) -> UaResult<Assembled> {
        if self.state == ChannelState::Faulted {
            return Err(UaError::Status(StatusCode::BAD_SECURE_CHANNEL_CLOSED));
        }
        let prefix = ChunkPrefix::parse(chunk, &self.limits.decoding)?;
        let message_type = prefix.header.message_type;

        let opened = match &prefix.security_header {
            SecurityHeader::Asymmetric(header) => {
                if message_type != MessageType::OpenSecureChannel {
                    return Err(UaError::Status(StatusCode::BAD_TCP_MESSAGE_TYPE_INVALID));
                }
                let (policy, sender) = self.accept_asymmetric_header(header)?;
                self.check_channel_id(prefix.secure_channel_id, true)?;
                if self.state == ChannelState::Closed {
                    self.transition(ChannelState::OpeningAsymmetric)?;
                }
                let security = match (&sender, self.provider.as_deref()) {
                    (Some(remote), Some(local)) if !policy.is_none() => {
                        ChunkSecurity::Asymmetric { policy, local, remote }
                    }
                    _ => ChunkSecurity::None,
                };
                open_chunk(chunk, prefix.header_len, &security)
            }
            SecurityHeader::Symmetric(header) => {
                if !self.is_open() {
                    return Err(UaError::Status(StatusCode::BAD_SECURE_CHANNEL_CLOSED));
                }
                self.check_channel_id(prefix.secure_channel_id, false)?;
                let mode = self.suite.mode();
                let active = self.tokens.receiving_token(header.token_id, Instant::now())?;
                let security = ChunkSecurity::Symmetric {
                    mode,
                    keys: &active.receiving,
                };
                open_chunk(chunk, prefix.header_len, &security)
            }
        };
        let (sequence, segment) = opened.inspect_err(|_| self.statistics.increment_security_failures())?;

        self.receive_sequence
            .check(sequence.sequence_number)
            .inspect_err(|_| self.statistics.increment_sequence_errors())?;
        self.statistics.record_received(chunk.len());

        let assembled = self.assembler.push(
            message_type,
            prefix.header.chunk_type,
            sequence.request_id,
            segment,
            &self.limits.decoding,
        )?;
        if matches!(assembled, Assembled::Aborted { .. }) {
            self.statistics.increment_aborted_messages();
        }
        Ok(assembled)
    }

    fn check_channel_id(&self, received: u32, asymmetric: bool) -> UaResult<()> {
        let accepted = match (self.role, asymmetric, self.state) {
            // The client learns its id from the first response.
            (ChannelRole::Client, true, ChannelState::OpeningAsymmetric) => true,
            // Issue requests carry no id yet.
            (ChannelRole::Server, true, ChannelState::Closed) => true,
            _ => received == self.channel_id,
        };
        if accepted {
            Ok(())
        } else {
            Err(UaError::Status(StatusCode::BAD_SECURE_CHANNEL_ID_INVALID))
        }
    }

    /// Check an asymmetric header against the channel's policy and peer
    ///
    /// # Returns
    /// The policy and, unless it is None, the sender certificate
    fn accept_asymmetric_header(
        &mut self,
        header: &AsymmetricSecurityHeader,
    ) -> UaResult<(SecurityPolicy, Option<Certificate>)> {
        let policy = SecurityPolicy::from_uri(header.security_policy_uri.as_str())?;
        match self.policy {
            Some(existing) if existing != policy => {
                return Err(UaError::Status(StatusCode::BAD_SECURITY_POLICY_REJECTED));
            }
            Some(_) => {}
            None => self.policy = Some(policy),
        }
        if policy.is_none() {
            return Ok((policy, None));
        }

        let provider = self
            .provider
            .as_ref()
            .ok_or(UaError::Status(StatusCode::BAD_SECURITY_POLICY_REJECTED))?;
        if header.receiver_certificate_thumbprint.as_bytes() != provider.certificate().thumbprint() {
            return Err(UaError::Status(StatusCode::BAD_CERTIFICATE_INVALID));
        }
        policy.check_key_size(provider.key_size())?;
        let sender = Certificate::from_der(header.sender_certificate.as_bytes())?;
        policy.check_key_size(sender.key_size())?;
        match &self.remote_certificate {
            Some(known) if *known != sender => {
                return Err(UaError::Status(StatusCode::BAD_CERTIFICATE_INVALID));
            }
            Some(_) => {}
            None => {
                provider.validate(&sender)?;
                self.remote_certificate = Some(sender.clone());
            }
        }
        Ok((policy, Some(sender)))
    }

    // ---- sending ----

    /// Chunks for one message
    ///
    /// OpenSecureChannel messages are secured asymmetrically, everything
    /// else with the current token.
    pub fn encode_message(
        &mut self,
        message_type: MessageType,
        request_id: u32,
        body: &[u8],
    ) -> UaResult<Vec<Vec<u8>>> {
        let chunks = self.with_send_security(message_type, request_id, |params, sequence, security| {
            encode_chunks(&params, body, sequence, security)
        })?;
        for chunk in &chunks {
            self.statistics.record_sent(chunk.len());
        }
        Ok(chunks)
    }

    /// Encode and chunk a service response
    pub fn encode_response(&mut self, request_id: u32, response: &ServiceResponse) -> UaResult<Vec<Vec<u8>>> {
        let message_type = match response {
            ServiceResponse::OpenSecureChannel(_) => MessageType::OpenSecureChannel,
            _ => MessageType::Message,
        };
        self.encode_message(message_type, request_id, &response.encode_message()?)
    }

    /// One Abort chunk for `request_id`
    pub fn encode_abort(&mut self, request_id: u32, status: StatusCode, reason: &str) -> UaResult<Vec<u8>> {
        let chunk = self.with_send_security(MessageType::Message, request_id, |params, sequence, security| {
            encode_abort_chunk(&params, status, reason, sequence, security)
        })?;
        self.statistics.record_sent(chunk.len());
        Ok(chunk)
    }

    fn with_send_security<T>(
        &mut self,
        message_type: MessageType,
        request_id: u32,
        f: impl FnOnce(ChunkParams<'_>, &mut SequenceCounter, &ChunkSecurity<'_>) -> UaResult<T>,
    ) -> UaResult<T> {
        let policy = self.policy.unwrap_or(SecurityPolicy::None);
        let max_chunk_size = self.transport_limits.send_buffer_size as usize;
        let max_chunk_count = self.transport_limits.send_max_chunk_count as usize;
        let max_message_size = self.transport_limits.send_max_message_size as usize;

        if message_type == MessageType::OpenSecureChannel {
            let (header, security) = match (self.provider.as_deref(), self.remote_certificate.as_ref()) {
                (Some(local), Some(remote)) if !policy.is_none() => (
                    AsymmetricSecurityHeader {
                        security_policy_uri: UaString::from(policy.uri()),
                        sender_certificate: ByteString::from(local.certificate().der()),
                        receiver_certificate_thumbprint: ByteString::from(
                            remote.thumbprint().to_vec(),
                        ),
                    },
                    ChunkSecurity::Asymmetric { policy, local, remote },
                ),
                _ if policy.is_none() => (AsymmetricSecurityHeader::none(policy.uri()), ChunkSecurity::None),
                _ => {
                    return Err(UaError::Security(format!(
                        "Missing certificates for {}",
                        policy
                    )));
                }
            };
            let header = SecurityHeader::Asymmetric(header);
            let params = ChunkParams {
                message_type,
                secure_channel_id: self.channel_id,
                request_id,
                security_header: &header,
                max_chunk_size,
                max_chunk_count,
                max_message_size,
            };
            return f(params, &mut self.send_sequence, &security);
        }

        if !self.is_open() {
            return Err(UaError::Status(StatusCode::BAD_SECURE_CHANNEL_CLOSED));
        }
        let active = self
            .tokens
            .current()
            .ok_or(UaError::Status(StatusCode::BAD_SECURE_CHANNEL_CLOSED))?;
        let header = SecurityHeader::Symmetric(SymmetricSecurityHeader {
            token_id: active.token.token_id,
        });
        let security = ChunkSecurity::Symmetric {
            mode: self.suite.mode(),
            keys: &active.sending,
        };
        let params = ChunkParams {
            message_type,
            secure_channel_id: self.channel_id,
            request_id,
            security_header: &header,
            max_chunk_size,
            max_chunk_count,
            max_message_size,
        };
        f(params, &mut self.send_sequence, &security)
    }

    fn token_keys(&self, sending_secret: &[u8], sending_seed: &[u8]) -> UaResult<(SymmetricKeys, SymmetricKeys)> {
        let policy = self.suite.policy();
        let sending = derive_keys(policy, sending_secret, sending_seed)?;
        let receiving = derive_keys(policy, sending_seed, sending_secret)?;
        Ok((
            SymmetricKeys::new(policy, &sending)?,
            SymmetricKeys::new(policy, &receiving)?,
        ))
    }

    // ---- server side ----

    /// Answer an OpenSecureChannel request (Issue or Renew)
    ///
    /// # Returns
    /// The response chunks
    pub fn handle_open_request(
        &mut self,
        request_id: u32,
        request: &OpenSecureChannelRequest,
    ) -> UaResult<Vec<Vec<u8>>> {
        let response = self.guarded(|channel| channel.issue_token(request))?;
        self.encode_response(request_id, &ServiceResponse::OpenSecureChannel(response))
    }

    fn issue_token(&mut self, request: &OpenSecureChannelRequest) -> UaResult<OpenSecureChannelResponse> {
        if self.role != ChannelRole::Server {
            return Err(UaError::Protocol("Only servers issue tokens".to_string()));
        }
        let policy = self.policy.unwrap_or(SecurityPolicy::None);
        let renewing = match request.request_type {
            SecurityTokenRequestType::Issue => {
                if self.state != ChannelState::OpeningAsymmetric {
                    return Err(UaError::Protocol(format!(
                        "Issue request in state {}",
                        self.state.as_str()
                    )));
                }
                self.suite = SecuritySuite::builder()
                    .set_security_policy(policy)
                    .set_security_mode(request.security_mode)
                    .build()
                    .map_err(|_| UaError::Status(StatusCode::BAD_SECURITY_MODE_REJECTED))?;
                false
            }
            SecurityTokenRequestType::Renew => {
                if !self.state.can_renew() {
                    return Err(UaError::Protocol(format!(
                        "Renew request in state {}",
                        self.state.as_str()
                    )));
                }
                if request.security_mode != self.suite.mode() {
                    return Err(UaError::Status(StatusCode::BAD_SECURITY_MODE_REJECTED));
                }
                self.transition(ChannelState::Renewing)?;
                true
            }
        };

        if !policy.is_none() {
            check_nonce(request.client_nonce.as_bytes(), policy.nonce_length())?;
        }
        self.remote_nonce = request.client_nonce.as_bytes().to_vec();
        self.local_nonce = generate_nonce(policy.nonce_length())?;

        let lifetime_ms = self.limits.revise_token_lifetime(request.requested_lifetime);
        let token = SecurityToken::new(
            self.channel_id,
            self.next_token_id,
            Duration::from_millis(lifetime_ms as u64),
        );
        self.next_token_id = self.next_token_id.checked_add(1).unwrap_or(1);

        // Server keys: P(client nonce, server nonce); client keys the reverse.
        let (sending, receiving) = self.token_keys(&self.remote_nonce, &self.local_nonce)?;
        let security_token = ChannelSecurityToken {
            channel_id: token.channel_id,
            token_id: token.token_id,
            created_at: token.created_at,
            revised_lifetime: lifetime_ms,
        };
        self.tokens.install(
            ActiveToken {
                token,
                sending,
                receiving,
            },
            Instant::now(),
        );
        self.transition(ChannelState::Open)?;
        if renewing {
            self.statistics.increment_renewals();
            log::info!(
                "Secure channel {} renewed, token {}",
                self.channel_id, security_token.token_id
            );
        } else {
            log::info!(
                "Secure channel {} opened with {}, token lifetime {} ms",
                self.channel_id, self.suite, lifetime_ms
            );
        }

        Ok(OpenSecureChannelResponse {
            response_header: ResponseHeader::good(&request.request_header),
            server_protocol_version: PROTOCOL_VERSION,
            security_token,
            server_nonce: ByteString::from(self.local_nonce.clone()),
        })
    }

    // ---- client side ----

    /// Start an Issue or Renew exchange
    ///
    /// # Returns
    /// The request id and the request chunks
    pub fn open_request(
        &mut self,
        request_type: SecurityTokenRequestType,
        request_handle: u32,
    ) -> UaResult<(u32, Vec<Vec<u8>>)> {
        if self.role != ChannelRole::Client {
            return Err(UaError::Protocol("Only clients request tokens".to_string()));
        }
        match request_type {
            SecurityTokenRequestType::Issue => self.transition(ChannelState::OpeningAsymmetric)?,
            SecurityTokenRequestType::Renew => {
                if !self.state.can_renew() {
                    return Err(UaError::Protocol(format!(
                        "Cannot renew in state {}",
                        self.state.as_str()
                    )));
                }
                self.transition(ChannelState::Renewing)?;
            }
        }
        self.local_nonce = generate_nonce(self.suite.policy().nonce_length())?;
        let request = OpenSecureChannelRequest {
            request_header: RequestHeader::new(&opcua_core::NodeId::null(), request_handle),
            client_protocol_version: PROTOCOL_VERSION,
            request_type,
            security_mode: self.suite.mode(),
            client_nonce: ByteString::from(self.local_nonce.clone()),
            requested_lifetime: self.limits.requested_token_lifetime_ms,
        };
        let request_id = self.next_request_id();
        let body = ServiceRequest::OpenSecureChannel(request).encode_message()?;
        let chunks = self.encode_message(MessageType::OpenSecureChannel, request_id, &body)?;
        Ok((request_id, chunks))
    }

    /// Install the token from an OpenSecureChannel response
    pub fn handle_open_response(&mut self, response: &OpenSecureChannelResponse) -> UaResult<()> {
        self.guarded(|channel| channel.accept_token(response))
    }

    fn accept_token(&mut self, response: &OpenSecureChannelResponse) -> UaResult<()> {
        let status = response.response_header.service_result;
        if status.is_bad() {
            return Err(UaError::Status(status));
        }
        let issued = &response.security_token;
        match self.state {
            ChannelState::OpeningAsymmetric => self.channel_id = issued.channel_id,
            ChannelState::Renewing if issued.channel_id == self.channel_id => {}
            ChannelState::Renewing => {
                return Err(UaError::Status(StatusCode::BAD_SECURE_CHANNEL_ID_INVALID));
            }
            other => {
                return Err(UaError::Protocol(format!(
                    "Unexpected OpenSecureChannel response in state {}",
                    other.as_str()
                )));
            }
        }
        let renewing = self.state == ChannelState::Renewing;
        if !self.suite.policy().is_none() {
            check_nonce(response.server_nonce.as_bytes(), self.suite.policy().nonce_length())?;
        }
        self.remote_nonce = response.server_nonce.as_bytes().to_vec();

        // Client keys: P(server nonce, client nonce).
        let (sending, receiving) = self.token_keys(&self.remote_nonce, &self.local_nonce)?;
        let token = SecurityToken::new(
            issued.channel_id,
            issued.token_id,
            Duration::from_millis(issued.revised_lifetime as u64),
        );
        self.tokens.install(
            ActiveToken {
                token,
                sending,
                receiving,
            },
            Instant::now(),
        );
        self.transition(ChannelState::Open)?;
        if renewing {
            self.statistics.increment_renewals();
        }
        log::debug!(
            "Secure channel {} token {} installed, lifetime {} ms",
            self.channel_id, issued.token_id, issued.revised_lifetime
        );
        Ok(())
    }

    /// CloseSecureChannel request chunks; the channel is closed afterwards
    pub fn close_request(&mut self, request_handle: u32) -> UaResult<Vec<Vec<u8>>> {
        let request = CloseSecureChannelRequest {
            request_header: RequestHeader::new(&opcua_core::NodeId::null(), request_handle),
        };
        let request_id = self.next_request_id();
        let body = ServiceRequest::CloseSecureChannel(request).encode_message()?;
        let chunks = self.encode_message(MessageType::CloseSecureChannel, request_id, &body);
        self.close();
        chunks
    }
}
