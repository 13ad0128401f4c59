//! TCP listener and per-connection secure channel loop
//!
//! Every accepted connection runs in its own task: Hello/Acknowledge
//! handshake, then one secure channel whose requests are dispatched to the
//! shared `Server`. Publish responses arrive asynchronously and are merged
//! into the connection's write path through a queue.

use crate::context::ChannelContext;
use crate::error::{UaError, UaResult};
use crate::server::{Dispatch, Server};
use opcua_channel::{Assembled, SecureChannel};
use opcua_core::StatusCode;
use opcua_security::{SecurityPolicy, SecuritySuite};
use opcua_services::{OpenSecureChannelRequest, SecurityTokenRequestType, ServiceRequest, ServiceResponse};
use opcua_transport::{
    ErrorMessage, HandshakeMessage, HelloMessage, MessageBuffer, MessageType, RawMessage,
    ByteStream, TcpTransport, read_message,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Accepts connections for one server
pub struct ServerListener {
    server: Arc<Server>,
    listener: TcpListener,
}

impl ServerListener {
    /// Bind the configured address
    pub async fn bind(server: Arc<Server>) -> UaResult<Self> {
        let listener = TcpListener::bind(&server.config().bind_address).await?;
        log::info!("Listening on {}", listener.local_addr()?);
        Ok(Self { server, listener })
    }

    pub fn local_addr(&self) -> UaResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the listener fails
    ///
    /// The server watchdog runs alongside and stops with the loop.
    pub async fn run(self) -> UaResult<()> {
        let watchdog = self.server.spawn_watchdog();
        let result = loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(err) => break Err(UaError::from(err)),
            };
            log::debug!("Accepted connection from {}", peer);
            let server = self.server.clone();
            tokio::spawn(async move {
                Connection::new(server, stream, peer).serve().await;
            });
        };
        watchdog.abort();
        result
    }
}

/// What the connection loop does after a message
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Close,
}

struct Connection {
    server: Arc<Server>,
    transport: TcpTransport,
    buffer: MessageBuffer,
    channel: Option<SecureChannel>,
    peer: SocketAddr,
}

impl Connection {
    fn new(server: Arc<Server>, stream: TcpStream, peer: SocketAddr) -> Self {
        let max_message_size = server.config().transport.receive_buffer_size as usize;
        Self {
            server,
            transport: TcpTransport::from_connected_stream(stream, None),
            buffer: MessageBuffer::new(max_message_size),
            channel: None,
            peer,
        }
    }

    async fn serve(mut self) {
        if let Err(err) = self.run().await {
            match &err {
                UaError::Connection(io) => log::debug!("Connection from {} lost: {}", self.peer, io),
                _ => {
                    log::warn!("Closing connection from {}: {}", self.peer, err);
                    self.send_error(err.status_code(), &err.to_string()).await;
                }
            }
        }
        if let Some(channel) = self.channel.as_mut() {
            channel.close();
            self.server.channel_closed(channel.channel_id());
        }
        let _ = self.transport.close().await;
        log::debug!("Connection from {} closed", self.peer);
    }

    async fn run(&mut self) -> UaResult<()> {
        self.handshake().await?;
        let (deferred_tx, mut deferred_rx) = mpsc::unbounded_channel::<(u32, ServiceResponse)>();
        loop {
            let expiry = self.channel.as_ref().and_then(SecureChannel::token_expiry);
            let flow = tokio::select! {
                message = read_message(&mut self.transport, &mut self.buffer) => {
                    self.handle_message(message?, &deferred_tx).await?
                }
                Some((request_id, response)) = deferred_rx.recv() => {
                    self.send_response(request_id, &response).await?;
                    Flow::Continue
                }
                _ = sleep_until(expiry) => {
                    if let Some(channel) = self.channel.as_mut() {
                        channel.check_expiry(Instant::now())?;
                    }
                    Flow::Continue
                }
            };
            if flow == Flow::Close {
                return Ok(());
            }
        }
    }

    /// Hello within the configured time, answered by Acknowledge
    async fn handshake(&mut self) -> UaResult<()> {
        let config = self.server.config();
        let message = tokio::time::timeout(
            config.hello_timeout(),
            read_message(&mut self.transport, &mut self.buffer),
        )
        .await
        .map_err(|_| UaError::Status(StatusCode::BAD_TIMEOUT))??;
        if message.header.message_type != MessageType::Hello {
            return Err(UaError::Status(StatusCode::BAD_TCP_MESSAGE_TYPE_INVALID));
        }
        let hello = HelloMessage::from_message(&message.data, &config.channel.decoding)?;
        let (negotiated, ack) = config.transport.negotiate_hello(&hello)?;
        log::debug!(
            "Hello from {} for {}, buffers {}/{}",
            self.peer, hello.endpoint_url, negotiated.receive_buffer_size, negotiated.send_buffer_size
        );
        self.transport.write_all(&ack.to_message()?).await?;
        self.transport.flush().await?;
        self.buffer.set_max_message_size(negotiated.receive_buffer_size as usize);
        self.channel = Some(SecureChannel::server(
            self.server.allocate_channel_id(),
            self.server.certificate_provider(),
            negotiated,
            config.channel.clone(),
        ));
        Ok(())
    }

    fn channel(&mut self) -> UaResult<&mut SecureChannel> {
        self.channel
            .as_mut()
            .ok_or_else(|| UaError::Protocol("No secure channel".to_string()))
    }

    async fn handle_message(
        &mut self,
        message: RawMessage,
        deferred: &mpsc::UnboundedSender<(u32, ServiceResponse)>,
    ) -> UaResult<Flow> {
        match message.header.message_type {
            MessageType::OpenSecureChannel | MessageType::Message | MessageType::CloseSecureChannel => {}
            MessageType::Error => {
                let error = ErrorMessage::from_message(&message.data, &self.server.config().channel.decoding)?;
                log::info!("Peer {} sent error {}: {}", self.peer, error.error, error.reason);
                return Ok(Flow::Close);
            }
            other => {
                log::debug!("Unexpected {:?} from {}", other, self.peer);
                return Err(UaError::Status(StatusCode::BAD_TCP_MESSAGE_TYPE_INVALID));
            }
        }

        let (message_type, request_id, body) = match self.channel()?.receive_chunk(&message.data)? {
            Assembled::Partial => return Ok(Flow::Continue),
            Assembled::Aborted { request_id, status, reason } => {
                log::debug!("Request {} aborted by peer: {} {}", request_id, status, reason);
                return Ok(Flow::Continue);
            }
            Assembled::Complete { message_type, request_id, body } => (message_type, request_id, body),
        };
        let limits = self.channel()?.limits().decoding.clone();
        let request = ServiceRequest::decode_message(&body, &limits)?;

        match (message_type, request) {
            (MessageType::OpenSecureChannel, ServiceRequest::OpenSecureChannel(request)) => {
                self.open_channel(request_id, &request).await?;
                Ok(Flow::Continue)
            }
            (MessageType::CloseSecureChannel, ServiceRequest::CloseSecureChannel(_)) => {
                self.channel()?.close();
                Ok(Flow::Close)
            }
            (MessageType::Message, request) => {
                let channel = self.channel()?;
                if !channel.is_open() {
                    return Err(UaError::Status(StatusCode::BAD_SECURE_CHANNEL_ID_INVALID));
                }
                let context = ChannelContext::new(
                    channel.channel_id(),
                    channel.suite(),
                    channel.remote_certificate().cloned(),
                );
                match self.server.dispatch(&context, request).await {
                    Dispatch::Immediate(response) => self.send_response(request_id, &response).await?,
                    Dispatch::Deferred(receiver) => {
                        let deferred = deferred.clone();
                        tokio::spawn(async move {
                            if let Ok(response) = receiver.await {
                                let _ = deferred.send((request_id, response));
                            }
                        });
                    }
                }
                Ok(Flow::Continue)
            }
            (message_type, request) => Err(UaError::Protocol(format!(
                "{:?} message carries {}",
                message_type,
                request.type_id()
            ))),
        }
    }

    async fn open_channel(&mut self, request_id: u32, request: &OpenSecureChannelRequest) -> UaResult<()> {
        let channel = self.channel()?;
        if request.request_type == SecurityTokenRequestType::Issue {
            let policy = channel.security_policy().unwrap_or(SecurityPolicy::None);
            let suite = SecuritySuite::builder()
                .set_security_policy(policy)
                .set_security_mode(request.security_mode)
                .build()?;
            if !self.server.offers(&suite) {
                log::info!("Rejecting channel from {} with unoffered {}", self.peer, suite);
                return Err(UaError::Status(StatusCode::BAD_SECURITY_POLICY_REJECTED));
            }
        }
        let chunks = self.channel()?.handle_open_request(request_id, request)?;
        self.write_chunks(&chunks).await
    }

    async fn send_response(&mut self, request_id: u32, response: &ServiceResponse) -> UaResult<()> {
        let channel = self.channel()?;
        let chunks = match channel.encode_response(request_id, response) {
            Ok(chunks) => chunks,
            // Too large for the peer: a fault instead, the channel stays up.
            Err(err) if err.status_code() == StatusCode::BAD_ENCODING_LIMITS_EXCEEDED => {
                log::debug!("Response {} too large: {}", request_id, err);
                let handle = response.response_header().request_handle;
                channel.encode_response(
                    request_id,
                    &ServiceResponse::fault(handle, StatusCode::BAD_RESPONSE_TOO_LARGE),
                )?
            }
            Err(err) => return Err(err),
        };
        self.write_chunks(&chunks).await
    }

    async fn write_chunks(&mut self, chunks: &[Vec<u8>]) -> UaResult<()> {
        for chunk in chunks {
            self.transport.write_all(chunk).await?;
        }
        self.transport.flush().await
    }

    async fn send_error(&mut self, status: StatusCode, reason: &str) {
        let Ok(message) = ErrorMessage::new(status, reason).to_message() else {
            return;
        };
        if self.transport.write_all(&message).await.is_ok() {
            let _ = self.transport.flush().await;
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address_space::MemoryAddressSpace;
    use crate::config::ServerConfig;
    use opcua_channel::ChannelLimits;
    use opcua_core::NodeId;
    use opcua_security::StaticIdentityValidator;
    use opcua_services::{ReadRequest, ReadValueId, RequestHeader, TimestampsToReturn};
    use opcua_transport::{AcknowledgeMessage, Connectable, TcpSettings, TransportLimits};

    async fn start() -> SocketAddr {
        let mut config = ServerConfig::default();
        config.bind_address = "127.0.0.1:0".to_string();
        let server = Server::new(
            config,
            None,
            Arc::new(StaticIdentityValidator::new().allow_anonymous()),
            Arc::new(MemoryAddressSpace::new()),
        )
        .unwrap();
        let listener = ServerListener::bind(server).await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(listener.run());
        address
    }

    async fn connect(address: SocketAddr) -> TcpTransport {
        let mut transport = TcpTransport::new(TcpSettings::new(address.to_string()));
        transport.open().await.unwrap();
        transport
    }

    async fn receive(transport: &mut TcpTransport, buffer: &mut MessageBuffer) -> RawMessage {
        read_message(transport, buffer).await.unwrap()
    }

    #[tokio::test]
    async fn test_hello_acknowledge() {
        let address = start().await;
        let mut transport = connect(address).await;
        let limits = TransportLimits::default();
        let hello = limits.hello(&format!("opc.tcp://{}", address));
        transport.write_all(&hello.to_message().unwrap()).await.unwrap();

        let mut buffer = MessageBuffer::new(65_535);
        let message = receive(&mut transport, &mut buffer).await;
        assert_eq!(message.header.message_type, MessageType::Acknowledge);
        let ack = AcknowledgeMessage::from_message(&message.data, &Default::default()).unwrap();
        assert_eq!(ack.receive_buffer_size, limits.send_buffer_size);
    }

    #[tokio::test]
    async fn test_message_before_hello_is_rejected() {
        let address = start().await;
        let mut transport = connect(address).await;
        let ack = AcknowledgeMessage {
            protocol_version: 0,
            receive_buffer_size: 65_535,
            send_buffer_size: 65_535,
            max_message_size: 0,
            max_chunk_count: 0,
        };
        transport.write_all(&ack.to_message().unwrap()).await.unwrap();

        let mut buffer = MessageBuffer::new(65_535);
        let message = receive(&mut transport, &mut buffer).await;
        assert_eq!(message.header.message_type, MessageType::Error);
        let error = ErrorMessage::from_message(&message.data, &Default::default()).unwrap();
        assert_eq!(error.error, StatusCode::BAD_TCP_MESSAGE_TYPE_INVALID);
        assert!(read_message(&mut transport, &mut buffer).await.is_err());
    }

    #[tokio::test]
    async fn test_request_over_unsecured_channel() {
        let address = start().await;
        let mut transport = connect(address).await;
        let limits = TransportLimits::default();
        let hello = limits.hello(&format!("opc.tcp://{}", address));
        transport.write_all(&hello.to_message().unwrap()).await.unwrap();
        let mut buffer = MessageBuffer::new(65_535);
        let message = receive(&mut transport, &mut buffer).await;
        let ack = AcknowledgeMessage::from_message(&message.data, &Default::default()).unwrap();
        let negotiated = limits.apply_acknowledge(&ack).unwrap();

        let mut channel =
            SecureChannel::client(SecuritySuite::default(), None, None, negotiated, ChannelLimits::default())
                .unwrap();
        let (_, chunks) = channel.open_request(SecurityTokenRequestType::Issue, 1).unwrap();
        for chunk in chunks {
            transport.write_all(&chunk).await.unwrap();
        }
        let message = receive(&mut transport, &mut buffer).await;
        let Assembled::Complete { body, .. } = channel.receive_chunk(&message.data).unwrap() else {
            panic!("expected a complete response");
        };
        let ServiceResponse::OpenSecureChannel(opened) =
            ServiceResponse::decode_message(&body, &Default::default()).unwrap()
        else {
            panic!("expected an OpenSecureChannel response");
        };
        channel.handle_open_response(&opened).unwrap();
        assert!(channel.is_open());

        // No session: a fault, and the channel stays up
        let request = ServiceRequest::Read(ReadRequest {
            request_header: RequestHeader::new(&NodeId::numeric(0, 5), 7),
            max_age: 0.0,
            timestamps_to_return: TimestampsToReturn::Both,
            nodes_to_read: vec![ReadValueId::value_of(NodeId::numeric(1, 1))],
        });
        for _ in 0..2 {
            let request_id = channel.next_request_id();
            let chunks = channel
                .encode_message(MessageType::Message, request_id, &request.encode_message().unwrap())
                .unwrap();
            for chunk in chunks {
                transport.write_all(&chunk).await.unwrap();
            }
            let message = receive(&mut transport, &mut buffer).await;
            let Assembled::Complete { request_id: answered, body, .. } =
                channel.receive_chunk(&message.data).unwrap()
            else {
                panic!("expected a complete response");
            };
            assert_eq!(answered, request_id);
            let response = ServiceResponse::decode_message(&body, &Default::default()).unwrap();
            assert_eq!(response.service_result(), StatusCode::BAD_SESSION_ID_INVALID);
            assert_eq!(response.response_header().request_handle, 7);
        }

        for chunk in channel.close_request(8).unwrap() {
            transport.write_all(&chunk).await.unwrap();
        }
        assert!(read_message(&mut transport, &mut buffer).await.is_err());
    }
}
