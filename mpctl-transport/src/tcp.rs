//! Serial-over-TCP transport
//!
//! Talks to a controller behind a raw TCP serial bridge (ser2net, ESP-link
//! and the like). The byte stream is passed through unchanged.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::{error::*, Transport};

const READ_CHUNK: usize = 1024;

/// TCP serial bridge transport
pub struct TcpTransport {
    addr: String,
    port: u16,
    socket_addr: Option<SocketAddr>,
    stream: Option<TcpStream>,
    pending: BytesMut,
    connect_timeout: Duration,
    write_timeout: Duration,
}

impl TcpTransport {
    /// Create new TCP transport
    pub fn new(addr: impl Into<String>, port: u16) -> Self {
        Self {
            addr: addr.into(),
            port,
            socket_addr: None,
            stream: None,
            pending: BytesMut::new(),
            connect_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_millis(500),
        }
    }

    /// Set connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set write timeout
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Resolve address to SocketAddr
    async fn resolve_addr(&mut self) -> Result<SocketAddr> {
        if let Some(addr) = self.socket_addr {
            return Ok(addr);
        }

        let addr_str = format!("{}:{}", self.addr, self.port);

        let addr = tokio::net::lookup_host(&addr_str)
            .await
            .map_err(|e| Error::InvalidPort(format!("{}: {}", addr_str, e)))?
            .next()
            .ok_or_else(|| Error::InvalidPort(format!("No addresses found for {}", addr_str)))?;

        self.socket_addr = Some(addr);
        Ok(addr)
    }

    /// Move everything the socket already holds into the pending buffer
    fn drain_socket(&mut self) -> Result<()> {
        let stream = self.stream.as_ref().ok_or(Error::NotOpen)?;

        loop {
            self.pending.reserve(READ_CHUNK);
            match stream.try_read_buf(&mut self.pending) {
                Ok(0) => {
                    debug!("Bridge {} closed the connection", self.port_name());
                    self.stream = None;
                    return Err(Error::ConnectionClosed);
                }
                Ok(n) => trace!("Received {} bytes", n),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) => return Err(Error::Io(e)),
            }
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn open(&mut self) -> Result<()> {
        if self.is_open() {
            return Err(Error::AlreadyOpen);
        }

        let addr = self.resolve_addr().await?;

        debug!("Connecting to {}...", addr);

        let stream = timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::ConnectionTimeout)?
            .map_err(Error::Io)?;

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        debug!("Connected to {}", addr);

        self.pending.clear();
        self.stream = Some(stream);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            debug!("Disconnecting from {}...", self.port_name());

            // Graceful shutdown
            let _ = stream.shutdown().await;
        }

        self.pending.clear();
        self.socket_addr = None;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    async fn write(&mut self, data: &[u8]) -> Result<usize> {
        let stream = self.stream.as_mut().ok_or(Error::NotOpen)?;

        trace!("Sending {} bytes: {:02X?}", data.len(), &data[..data.len().min(16)]);

        let result = timeout(self.write_timeout, async {
            stream.write_all(data).await?;
            stream.flush().await
        })
        .await
        .map_err(|_| Error::WriteTimeout)?;

        match result {
            Ok(()) => Ok(data.len()),
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                self.stream = None;
                Err(Error::ConnectionClosed)
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    async fn bytes_available(&mut self) -> Result<usize> {
        self.drain_socket()?;
        Ok(self.pending.len())
    }

    async fn read(&mut self, count: usize) -> Result<BytesMut> {
        if !self.is_open() {
            return Err(Error::NotOpen);
        }

        let n = count.min(self.pending.len());
        Ok(self.pending.split_to(n))
    }

    fn port_name(&self) -> String {
        self.socket_addr
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| format!("{}:{}", self.addr, self.port))
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        if self.is_open() {
            warn!("TCP transport dropped while still connected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_tcp_transport_create() {
        let transport = TcpTransport::new("192.168.1.50", 2000);
        assert!(!transport.is_open());
        assert_eq!(transport.port_name(), "192.168.1.50:2000");
    }

    #[tokio::test]
    async fn test_tcp_transport_invalid_address() {
        let mut transport = TcpTransport::new("invalid..address", 2000)
            .with_connect_timeout(Duration::from_millis(100));

        let result = transport.open().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_tcp_transport_duplex() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let mut transport = TcpTransport::new("127.0.0.1", addr.port());
        transport.open().await.unwrap();
        let (mut bridge, _) = listener.accept().await.unwrap();

        transport.write(&[0x16, 0x16, 0x16, 0x16]).await.unwrap();
        let mut received = [0u8; 4];
        bridge.read_exact(&mut received).await.unwrap();
        assert_eq!(received, [0x16; 4]);

        bridge.write_all(&[1, 2, 3, 4, 5]).await.unwrap();
        let mut available = 0;
        for _ in 0..100 {
            available = transport.bytes_available().await.unwrap();
            if available == 5 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(available, 5);

        assert_eq!(transport.read(2).await.unwrap().as_ref(), &[1, 2]);
        assert_eq!(transport.read(10).await.unwrap().as_ref(), &[3, 4, 5]);

        transport.close().await.unwrap();
        assert!(!transport.is_open());
    }

    #[tokio::test]
    async fn test_tcp_transport_remote_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let mut transport = TcpTransport::new("127.0.0.1", addr.port());
        transport.open().await.unwrap();
        let (bridge, _) = listener.accept().await.unwrap();
        drop(bridge);

        let mut result = Ok(0);
        for _ in 0..100 {
            result = transport.bytes_available().await;
            if result.is_err() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert!(matches!(result, Err(Error::ConnectionClosed)));
        assert!(!transport.is_open());
    }
}
