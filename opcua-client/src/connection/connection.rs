//! Client connection: transport, Hello/Acknowledge and one secure channel
//!
//! Requests are sequential. Each `send` writes one request and reads until
//! the response with the matching request id arrives. The security token is
//! renewed once 75% of its lifetime has passed: before a send, in the middle
//! of a long wait for a response, or from `idle`.

use crate::config::ClientConfig;
use crate::error::{UaError, UaResult};
use opcua_channel::{Assembled, SecureChannel};
use opcua_core::StatusCode;
use opcua_security::{Certificate, CertificateProvider};
use opcua_services::{SecurityTokenRequestType, ServiceRequest, ServiceResponse};
use opcua_transport::{
    AcknowledgeMessage, ByteStream, Connectable, ErrorMessage, HandshakeMessage, MessageBuffer, MessageType,
    TcpSettings, TcpTransport, read_message,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep_until};

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Nothing open (initial state)
    Closed,
    /// Hello/Acknowledge done, no secure channel yet
    TransportOpen,
    /// Secure channel open, services may be called
    Ready,
}

impl ConnectionState {
    pub fn is_ready(&self) -> bool {
        matches!(self, ConnectionState::Ready)
    }
}

/// Fault the channel over a reply that is not an OpenSecureChannel response
fn unexpected_open_reply(channel: &mut SecureChannel, reply: &ServiceResponse) -> UaError {
    channel.fault();
    UaError::Status(match reply.service_result() {
        status if status.is_bad() => status,
        _ => StatusCode::BAD_UNKNOWN_RESPONSE,
    })
}

pub struct Connection {
    config: ClientConfig,
    provider: Option<Arc<dyn CertificateProvider>>,
    server_certificate: Option<Certificate>,
    transport: TcpTransport,
    buffer: MessageBuffer,
    channel: Option<SecureChannel>,
    state: ConnectionState,
    next_handle: u32,
    /// Request id of a renewal sent while waiting for another response
    renewing: Option<u32>,
}

impl Connection {
    /// Prepare a connection; nothing is opened yet
    ///
    /// # Errors
    /// Endpoint URLs that are not opc.tcp
    pub fn new(
        config: ClientConfig,
        provider: Option<Arc<dyn CertificateProvider>>,
        server_certificate: Option<Certificate>,
    ) -> UaResult<Self> {
        let mut settings = TcpSettings::from_endpoint_url(&config.endpoint_url)?;
        settings.timeout = Some(config.request_timeout());
        let buffer = MessageBuffer::new(config.transport.receive_buffer_size as usize);
        Ok(Self {
            config,
            provider,
            server_certificate,
            transport: TcpTransport::new(settings),
            buffer,
            channel: None,
            state: ConnectionState::Closed,
            next_handle: 1,
            renewing: None,
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn certificate_provider(&self) -> Option<&Arc<dyn CertificateProvider>> {
        self.provider.as_ref()
    }

    pub fn channel(&self) -> Option<&SecureChannel> {
        self.channel.as_ref()
    }

    fn channel_mut(&mut self) -> UaResult<&mut SecureChannel> {
        self.channel
            .as_mut()
            .ok_or(UaError::Status(StatusCode::BAD_SECURE_CHANNEL_CLOSED))
    }

    /// Handle for the next request, never 0
    pub fn next_request_handle(&mut self) -> u32 {
        let handle = self.next_handle;
        self.next_handle = self.next_handle.checked_add(1).unwrap_or(1);
        handle
    }

    /// Connect, exchange Hello/Acknowledge and issue a security token
    pub async fn open(&mut self) -> UaResult<()> {
        if self.state != ConnectionState::Closed {
            return Err(UaError::Protocol("Connection already open".to_string()));
        }
        let suite = self.config.suite()?;
        self.transport.open().await?;

        let hello = self.config.transport.hello(&self.config.endpoint_url);
        self.transport.write_all(&hello.to_message()?).await?;
        self.transport.flush().await?;
        let message = read_message(&mut self.transport, &mut self.buffer).await?;
        let decoding = &self.config.channel.decoding;
        let negotiated = match message.header.message_type {
            MessageType::Acknowledge => {
                let ack = AcknowledgeMessage::from_message(&message.data, decoding)?;
                self.config.transport.apply_acknowledge(&ack)?
            }
            MessageType::Error => {
                let error = ErrorMessage::from_message(&message.data, decoding)?;
                log::warn!("Server refused Hello: {} {}", error.error, error.reason);
                return Err(UaError::Status(error.error));
            }
            _ => return Err(UaError::Status(StatusCode::BAD_TCP_MESSAGE_TYPE_INVALID)),
        };
        self.buffer.set_max_message_size(negotiated.receive_buffer_size as usize);
        self.state = ConnectionState::TransportOpen;
        self.renewing = None;

        self.channel = Some(SecureChannel::client(
            suite,
            self.provider.clone(),
            self.server_certificate.clone(),
            negotiated,
            self.config.channel.clone(),
        )?);
        self.open_channel(SecurityTokenRequestType::Issue).await?;
        self.state = ConnectionState::Ready;
        log::info!("Connected to {} with {}", self.config.endpoint_url, suite);
        Ok(())
    }

    /// Renew the security token now
    pub async fn renew(&mut self) -> UaResult<()> {
        self.open_channel(SecurityTokenRequestType::Renew).await
    }

    async fn open_channel(&mut self, request_type: SecurityTokenRequestType) -> UaResult<()> {
        let handle = self.next_request_handle();
        let (request_id, chunks) = self.channel_mut()?.open_request(request_type, handle)?;
        self.write_chunks(&chunks).await?;
        match self.receive_within(request_id).await? {
            ServiceResponse::OpenSecureChannel(response) => self.channel_mut()?.handle_open_response(&response),
            other => Err(unexpected_open_reply(self.channel_mut()?, &other)),
        }
    }

    /// Wait without sending requests, renewing the security token when due
    pub async fn idle(&mut self, duration: Duration) -> UaResult<()> {
        let until = Instant::now() + duration;
        while self.state.is_ready() {
            let deadline = self.channel.as_ref().and_then(SecureChannel::renewal_deadline);
            match deadline {
                Some(at) if at < until => {
                    sleep_until(at).await;
                    log::debug!("Renewing security token while idle");
                    self.renew().await?;
                }
                _ => break,
            }
        }
        sleep_until(until).await;
        Ok(())
    }

    /// Send a Renew request without waiting for its response
    async fn start_renewal(&mut self) -> UaResult<()> {
        log::debug!("Renewing security token during a pending request");
        let handle = self.next_request_handle();
        let (request_id, chunks) = self
            .channel_mut()?
            .open_request(SecurityTokenRequestType::Renew, handle)?;
        self.write_chunks(&chunks).await?;
        self.renewing = Some(request_id);
        Ok(())
    }

    /// Send one request and wait for its response
    ///
    /// Faults are returned as responses; see `ServiceResponse::into_result`.
    pub async fn send(&mut self, request: ServiceRequest) -> UaResult<ServiceResponse> {
        if !self.state.is_ready() {
            return Err(UaError::Status(StatusCode::BAD_SECURE_CHANNEL_CLOSED));
        }
        if self.channel.as_ref().is_some_and(|channel| channel.renewal_due(Instant::now())) {
            log::debug!("Renewing security token");
            self.renew().await?;
        }
        let body = request.encode_message()?;
        let channel = self.channel_mut()?;
        let request_id = channel.next_request_id();
        let chunks = channel.encode_message(MessageType::Message, request_id, &body)?;
        self.write_chunks(&chunks).await?;
        self.receive_within(request_id).await
    }

    async fn receive_within(&mut self, request_id: u32) -> UaResult<ServiceResponse> {
        let timeout = self.config.request_timeout();
        tokio::time::timeout(timeout, self.receive(request_id))
            .await
            .map_err(|_| UaError::Status(StatusCode::BAD_TIMEOUT))?
    }

    async fn receive(&mut self, request_id: u32) -> UaResult<ServiceResponse> {
        loop {
            let deadline = self.channel.as_ref().and_then(SecureChannel::renewal_deadline);
            let message = tokio::select! {
                message = read_message(&mut self.transport, &mut self.buffer) => message?,
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.start_renewal().await?;
                    continue;
                }
            };
            match message.header.message_type {
                MessageType::OpenSecureChannel | MessageType::Message | MessageType::CloseSecureChannel => {}
                MessageType::Error => {
                    let error = ErrorMessage::from_message(&message.data, &self.config.channel.decoding)?;
                    log::warn!("Server closed the connection: {} {}", error.error, error.reason);
                    self.state = ConnectionState::Closed;
                    if let Some(channel) = self.channel.as_mut() {
                        channel.fault();
                    }
                    return Err(UaError::Status(error.error));
                }
                _ => return Err(UaError::Status(StatusCode::BAD_TCP_MESSAGE_TYPE_INVALID)),
            }
            let channel = self
                .channel
                .as_mut()
                .ok_or(UaError::Status(StatusCode::BAD_SECURE_CHANNEL_CLOSED))?;
            match channel.receive_chunk(&message.data)? {
                Assembled::Partial => {}
                Assembled::Aborted { request_id: aborted, status, reason } => {
                    if aborted == request_id {
                        log::debug!("Response {} aborted: {}", aborted, reason);
                        return Err(UaError::Status(status));
                    }
                }
                Assembled::Complete { request_id: answered, body, .. } => {
                    if answered == request_id {
                        return ServiceResponse::decode_message(&body, &channel.limits().decoding);
                    }
                    if self.renewing == Some(answered) {
                        self.renewing = None;
                        match ServiceResponse::decode_message(&body, &channel.limits().decoding)? {
                            ServiceResponse::OpenSecureChannel(response) => channel.handle_open_response(&response)?,
                            other => return Err(unexpected_open_reply(channel, &other)),
                        }
                        continue;
                    }
                    log::warn!("Dropping response to request {}", answered);
                }
            }
        }
    }

    async fn write_chunks(&mut self, chunks: &[Vec<u8>]) -> UaResult<()> {
        for chunk in chunks {
            self.transport.write_all(chunk).await?;
        }
        self.transport.flush().await
    }

    /// Close the secure channel and the transport
    pub async fn close(&mut self) -> UaResult<()> {
        if self.state == ConnectionState::Ready {
            let handle = self.next_request_handle();
            let chunks = self.channel_mut()?.close_request(handle)?;
            // The server answers CloseSecureChannel by closing the socket.
            if let Err(err) = self.write_chunks(&chunks).await {
                log::debug!("CloseSecureChannel not delivered: {}", err);
            }
        }
        self.state = ConnectionState::Closed;
        self.transport.close().await
    }
}
