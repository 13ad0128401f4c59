//! TCP transport implementation

use crate::error::{UaError, UaResult};
use crate::stream::{ByteStream, Connectable};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// URL scheme of the binary TCP mapping
pub const OPC_TCP_SCHEME: &str = "opc.tcp://";

/// TCP transport layer settings
#[derive(Debug, Clone)]
pub struct TcpSettings {
    /// `host:port` to connect to
    pub address: String,
    pub timeout: Option<Duration>,
}

impl TcpSettings {
    /// Create new TCP settings
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            timeout: Some(Duration::from_secs(30)),
        }
    }

    /// Create TCP settings with timeout
    pub fn with_timeout(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout: Some(timeout),
        }
    }

    /// Derive settings from an `opc.tcp://host:port/path` endpoint URL
    pub fn from_endpoint_url(url: &str) -> UaResult<Self> {
        Ok(Self::new(host_port(url)?))
    }
}

/// Extract `host:port` from an endpoint URL
///
/// The port defaults to 4840 when absent.
pub fn host_port(url: &str) -> UaResult<String> {
    let rest = url
        .get(..OPC_TCP_SCHEME.len())
        .filter(|scheme| scheme.eq_ignore_ascii_case(OPC_TCP_SCHEME))
        .map(|_| &url[OPC_TCP_SCHEME.len()..])
        .ok_or_else(|| UaError::InvalidData(format!("Not an opc.tcp endpoint URL: {}", url)))?;
    let authority = rest.split('/').next().unwrap_or_default();
    if authority.is_empty() {
        return Err(UaError::InvalidData(format!("Endpoint URL has no host: {}", url)));
    }
    // a bare IPv6 literal ends with ']', anything else with a port contains ':' after the host
    let has_port = match authority.rfind(']') {
        Some(bracket) => authority[bracket..].contains(':'),
        None => authority.contains(':'),
    };
    if has_port {
        Ok(authority.to_string())
    } else {
        Ok(format!("{}:4840", authority))
    }
}

/// TCP transport layer implementation
#[derive(Debug)]
pub struct TcpTransport {
    stream: Option<TcpStream>,
    settings: TcpSettings,
    peer: Option<SocketAddr>,
}

impl TcpTransport {
    /// Create a new, not yet connected TCP transport
    pub fn new(settings: TcpSettings) -> Self {
        Self {
            stream: None,
            settings,
            peer: None,
        }
    }

    /// Create TCP transport from an already-connected TcpStream (for server use)
    ///
    /// # Arguments
    /// * `stream` - The accepted TCP stream
    /// * `timeout` - Optional read/write timeout
    pub fn from_connected_stream(stream: TcpStream, timeout: Option<Duration>) -> Self {
        let peer = stream.peer_addr().ok();
        let _ = stream.set_nodelay(true);
        Self {
            stream: Some(stream),
            settings: TcpSettings {
                address: peer.map(|p| p.to_string()).unwrap_or_default(),
                timeout,
            },
            peer,
        }
    }

    /// Address of the remote peer, once connected
    pub fn peer_address(&self) -> Option<SocketAddr> {
        self.peer
    }

    fn stream_mut(&mut self) -> UaResult<&mut TcpStream> {
        self.stream.as_mut().ok_or_else(|| {
            UaError::Connection(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "TCP stream not connected",
            ))
        })
    }
}

#[async_trait]
impl Connectable for TcpTransport {
    async fn open(&mut self) -> UaResult<()> {
        if self.stream.is_some() {
            return Err(UaError::Connection(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Connection has already been opened",
            )));
        }

        let connect = TcpStream::connect(self.settings.address.as_str());
        let stream = match self.settings.timeout {
            Some(timeout) => tokio::time::timeout(timeout, connect)
                .await
                .map_err(|_| UaError::Timeout)??,
            None => connect.await?,
        };
        stream.set_nodelay(true)?;
        self.peer = stream.peer_addr().ok();
        log::debug!("Connected to {}", self.settings.address);

        self.stream = Some(stream);
        Ok(())
    }
}

#[async_trait]
impl ByteStream for TcpTransport {
    async fn read(&mut self, buf: &mut [u8]) -> UaResult<usize> {
        let timeout = self.settings.timeout;
        let stream = self.stream_mut()?;
        match timeout {
            Some(timeout) => tokio::time::timeout(timeout, stream.read(buf))
                .await
                .map_err(|_| UaError::Timeout)?
                .map_err(UaError::Connection),
            None => stream.read(buf).await.map_err(UaError::Connection),
        }
    }

    async fn write(&mut self, buf: &[u8]) -> UaResult<usize> {
        let timeout = self.settings.timeout;
        let stream = self.stream_mut()?;

        match timeout {
            Some(timeout) => tokio::time::timeout(timeout, stream.write(buf))
                .await
                .map_err(|_| UaError::Timeout)?
                .map_err(UaError::Connection),
            None => stream.write(buf).await.map_err(UaError::Connection),
        }
    }

    async fn flush(&mut self) -> UaResult<()> {
        self.stream_mut()?.flush().await.map_err(UaError::Connection)
    }

    async fn close(&mut self) -> UaResult<()> {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{MessageBuffer, read_message};
    use crate::message::{ErrorMessage, HandshakeMessage, MessageType};
    use opcua_core::StatusCode;

    #[test]
    fn test_host_port_from_url() {
        assert_eq!(host_port("opc.tcp://localhost:4855/UA/Server").unwrap(), "localhost:4855");
        assert_eq!(host_port("OPC.TCP://plc01").unwrap(), "plc01:4840");
        assert_eq!(host_port("opc.tcp://[::1]/x").unwrap(), "[::1]:4840");
        assert_eq!(host_port("opc.tcp://[::1]:4841").unwrap(), "[::1]:4841");
        assert!(host_port("http://localhost:4840").is_err());
        assert!(host_port("opc.tcp:///path").is_err());
    }

    #[tokio::test]
    async fn test_loopback_message_echo() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut transport = TcpTransport::from_connected_stream(stream, None);
            let mut buffer = MessageBuffer::new(8192);
            let message = read_message(&mut transport, &mut buffer).await.unwrap();
            transport.write_all(&message.data).await.unwrap();
            transport.flush().await.unwrap();
        });

        let mut client = TcpTransport::new(TcpSettings::new(address.to_string()));
        client.open().await.unwrap();
        assert!(client.open().await.is_err());
        let error = ErrorMessage::new(StatusCode::BAD_TIMEOUT, "ping").to_message().unwrap();
        client.write_all(&error).await.unwrap();
        client.flush().await.unwrap();

        let mut buffer = MessageBuffer::new(8192);
        let echo = read_message(&mut client, &mut buffer).await.unwrap();
        assert_eq!(echo.header.message_type, MessageType::Error);
        assert_eq!(echo.data, error);
        server.await.unwrap();

        client.close().await.unwrap();
        assert!(client.write_all(b"late").await.is_err());
    }
}
