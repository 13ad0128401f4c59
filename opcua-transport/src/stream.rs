//! Byte streams carrying UA messages

use crate::error::{UaError, UaResult};
use async_trait::async_trait;

/// A connected, ordered byte stream to one peer
///
/// `read` must be cancel safe: a read dropped before it completes consumes
/// nothing. Connection tasks race reads against timers in `tokio::select!`.
#[async_trait]
pub trait ByteStream: Send + Sync {
    /// Read what is available into `buf`; 0 means the peer closed
    async fn read(&mut self, buf: &mut [u8]) -> UaResult<usize>;

    async fn write(&mut self, buf: &[u8]) -> UaResult<usize>;

    /// Write the whole of `buf`
    ///
    /// # Errors
    /// `WriteZero` when the stream stops accepting bytes
    async fn write_all(&mut self, mut buf: &[u8]) -> UaResult<()> {
        while !buf.is_empty() {
            match self.write(buf).await? {
                0 => {
                    return Err(UaError::Connection(std::io::Error::new(
                        std::io::ErrorKind::WriteZero,
                        "Stream accepted no bytes",
                    )));
                }
                n => buf = &buf[n..],
            }
        }
        Ok(())
    }

    async fn flush(&mut self) -> UaResult<()>;

    /// Shut the stream down; later reads and writes fail
    async fn close(&mut self) -> UaResult<()>;
}

/// A stream the client side establishes itself
#[async_trait]
pub trait Connectable: ByteStream {
    /// Connect to the configured peer
    ///
    /// # Errors
    /// Already connected streams, refused connections and timeouts
    async fn open(&mut self) -> UaResult<()>;
}
