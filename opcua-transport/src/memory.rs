//! In-process transport over a tokio duplex pipe

use crate::error::{UaError, UaResult};
use crate::stream::{ByteStream, Connectable};
use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

/// One end of an in-memory byte pipe
///
/// Behaves like a connected TCP stream. Used to run a client and a server
/// channel inside one process without sockets.
#[derive(Debug)]
pub struct MemoryTransport {
    stream: Option<DuplexStream>,
}

impl MemoryTransport {
    /// Create two connected ends, each buffering up to `capacity` bytes
    pub fn pair(capacity: usize) -> (MemoryTransport, MemoryTransport) {
        let (a, b) = tokio::io::duplex(capacity);
        (Self::wrap(a), Self::wrap(b))
    }

    fn wrap(stream: DuplexStream) -> Self {
        Self { stream: Some(stream) }
    }

    fn stream_mut(&mut self) -> UaResult<&mut DuplexStream> {
        self.stream.as_mut().ok_or_else(|| {
            UaError::Connection(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "Memory pipe closed",
            ))
        })
    }
}

#[async_trait]
impl Connectable for MemoryTransport {
    async fn open(&mut self) -> UaResult<()> {
        if self.stream.is_none() {
            return Err(UaError::Connection(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "Memory pipe cannot be reopened",
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ByteStream for MemoryTransport {
    async fn read(&mut self, buf: &mut [u8]) -> UaResult<usize> {
        Ok(self.stream_mut()?.read(buf).await?)
    }

    async fn write(&mut self, buf: &[u8]) -> UaResult<usize> {
        Ok(self.stream_mut()?.write(buf).await?)
    }

    async fn flush(&mut self) -> UaResult<()> {
        Ok(self.stream_mut()?.flush().await?)
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

    #[tokio::test]
    async fn test_pair_carries_bytes_both_ways() {
        let (mut a, mut b) = MemoryTransport::pair(64);
        a.write_all(b"hello").await.unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(b.read(&mut buf).await.unwrap(), 5);
        assert_eq!(&buf[..5], b"hello");

        b.close().await.unwrap();
        assert_eq!(a.read(&mut buf).await.unwrap(), 0);
        assert!(b.read(&mut buf).await.is_err());
        assert!(b.open().await.is_err());
    }
}
