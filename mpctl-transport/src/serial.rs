//! Serial port transport

use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use parking_lot::Mutex;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{debug, trace, warn};

use crate::{error::*, Transport};

/// Default baud rate of the controller's UART
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

type SharedPort = Arc<Mutex<Box<dyn SerialPort>>>;

/// Local serial port (8N1, no flow control)
///
/// Every port call runs on tokio's blocking pool, so a write stuck in the
/// driver never parks a runtime worker. Writes are bounded by the port's own
/// write timeout.
pub struct SerialTransport {
    port_name: String,
    baud_rate: u32,
    read_timeout: Duration,
    write_timeout: Duration,
    port: Option<SharedPort>,
}

impl SerialTransport {
    /// Create new serial transport
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: Duration::from_millis(10),
            write_timeout: Duration::from_millis(500),
            port: None,
        }
    }

    /// Set baud rate
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set read timeout
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set write timeout
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    fn port(&self) -> Result<SharedPort> {
        self.port.clone().ok_or(Error::NotOpen)
    }
}

fn join_error(e: tokio::task::JoinError) -> Error {
    Error::Io(io::Error::other(e))
}

#[async_trait]
impl Transport for SerialTransport {
    async fn open(&mut self) -> Result<()> {
        if self.is_open() {
            return Err(Error::AlreadyOpen);
        }

        if self.port_name.trim().is_empty() {
            return Err(Error::InvalidPort("empty port name".to_string()));
        }

        debug!("Opening {} at {} baud...", self.port_name, self.baud_rate);

        let builder = serialport::new(&self.port_name, self.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(self.read_timeout);

        let port = tokio::task::spawn_blocking(move || builder.open())
            .await
            .map_err(join_error)??;

        debug!("Opened {}", self.port_name);

        self.port = Some(Arc::new(Mutex::new(port)));
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.port.take().is_some() {
            debug!("Closed {}", self.port_name);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    async fn write(&mut self, data: &[u8]) -> Result<usize> {
        let port = self.port()?;
        let data = data.to_vec();
        let write_timeout = self.write_timeout;

        trace!("Writing {} bytes: {:02X?}", data.len(), &data[..data.len().min(16)]);

        let written = tokio::task::spawn_blocking(move || -> io::Result<usize> {
            let mut port = port.lock();
            port.set_timeout(write_timeout)?;
            port.write_all(&data)?;
            port.flush()?;
            Ok(data.len())
        })
        .await
        .map_err(join_error)?;

        match written {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Err(Error::WriteTimeout),
            Err(e) => Err(Error::Io(e)),
        }
    }

    async fn bytes_available(&mut self) -> Result<usize> {
        let port = self.port()?;
        let available = tokio::task::spawn_blocking(move || port.lock().bytes_to_read())
            .await
            .map_err(join_error)??;
        Ok(available as usize)
    }

    async fn read(&mut self, count: usize) -> Result<BytesMut> {
        let port = self.port()?;
        let read_timeout = self.read_timeout;

        let data = tokio::task::spawn_blocking(move || -> io::Result<Vec<u8>> {
            let mut port = port.lock();
            port.set_timeout(read_timeout)?;

            let mut buf = vec![0u8; count];
            let n = match port.read(&mut buf) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::TimedOut => 0,
                Err(e) => return Err(e),
            };
            buf.truncate(n);
            Ok(buf)
        })
        .await
        .map_err(join_error)??;

        trace!("Read {} bytes: {:02X?}", data.len(), &data[..data.len().min(16)]);

        Ok(BytesMut::from(&data[..]))
    }

    fn port_name(&self) -> String {
        self.port_name.clone()
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        if self.is_open() {
            warn!("Serial transport dropped while still open");
        }
    }
}
