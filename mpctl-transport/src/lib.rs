//! Transport layer for serial controllers
//!
//! Provides byte-oriented duplex channels to a controller: a local serial
//! port, a serial-over-TCP bridge, and an in-memory pair for testing.

pub mod error;
pub mod memory;
pub mod serial;
pub mod tcp;

pub use error::{Error, Result};
pub use memory::{MemoryPeer, MemoryTransport};
pub use serial::SerialTransport;
pub use tcp::TcpTransport;

use async_trait::async_trait;
use bytes::BytesMut;

/// Byte-oriented duplex channel to a controller
///
/// Implementations never block for long: `bytes_available` and `read` only
/// return what has already arrived, and `write` gives up after the
/// transport's write timeout with [`Error::WriteTimeout`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the channel
    async fn open(&mut self) -> Result<()>;

    /// Close the channel
    async fn close(&mut self) -> Result<()>;

    /// Check if open
    fn is_open(&self) -> bool;

    /// Write raw bytes, returning the number written
    async fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Number of bytes ready to be read without waiting
    async fn bytes_available(&mut self) -> Result<usize>;

    /// Read up to `count` already-received bytes
    async fn read(&mut self, count: usize) -> Result<BytesMut>;

    /// Port name or remote address, for logging
    fn port_name(&self) -> String;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn open(&mut self) -> Result<()> {
        (**self).open().await
    }

    async fn close(&mut self) -> Result<()> {
        (**self).close().await
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    async fn write(&mut self, data: &[u8]) -> Result<usize> {
        (**self).write(data).await
    }

    async fn bytes_available(&mut self) -> Result<usize> {
        (**self).bytes_available().await
    }

    async fn read(&mut self, count: usize) -> Result<BytesMut> {
        (**self).read(count).await
    }

    fn port_name(&self) -> String {
        (**self).port_name()
    }
}
