//! In-memory transport
//!
//! [`MemoryTransport::pair`] returns the transport half handed to the
//! protocol engine and a [`MemoryPeer`] that plays the controller: it injects
//! inbound bytes, records every write, and can simulate write timeouts or an
//! unplugged cable.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use tracing::trace;

use crate::{error::*, Transport};

#[derive(Debug, Default)]
struct Shared {
    inbound: BytesMut,
    written: Vec<Bytes>,
    open: bool,
    disconnected: bool,
    failing_writes: usize,
    attempted_writes: usize,
}

/// Transport half of an in-memory duplex
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    name: String,
    shared: Arc<Mutex<Shared>>,
}

/// Controller half of an in-memory duplex
#[derive(Debug, Clone)]
pub struct MemoryPeer {
    shared: Arc<Mutex<Shared>>,
}

impl MemoryTransport {
    /// Create a connected transport/peer pair
    pub fn pair() -> (Self, MemoryPeer) {
        let shared = Arc::new(Mutex::new(Shared::default()));
        let transport = Self {
            name: "memory".to_string(),
            shared: shared.clone(),
        };
        (transport, MemoryPeer { shared })
    }

    /// Set the name reported by [`Transport::port_name`]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl MemoryPeer {
    /// Queue bytes for the transport to read
    pub fn inject(&self, data: &[u8]) {
        self.shared.lock().inbound.extend_from_slice(data);
    }

    /// Successful writes so far, one entry per call
    pub fn written(&self) -> Vec<Bytes> {
        self.shared.lock().written.clone()
    }

    /// Take and clear the recorded writes
    pub fn take_written(&self) -> Vec<Bytes> {
        std::mem::take(&mut self.shared.lock().written)
    }

    /// Write calls so far, failed ones included
    pub fn attempted_writes(&self) -> usize {
        self.shared.lock().attempted_writes
    }

    /// Make the next `count` writes time out
    pub fn fail_next_writes(&self, count: usize) {
        self.shared.lock().failing_writes = count;
    }

    /// Simulate the cable being pulled
    pub fn disconnect(&self) {
        let mut shared = self.shared.lock();
        shared.disconnected = true;
        shared.open = false;
    }

    /// Check if the transport half is open
    pub fn is_open(&self) -> bool {
        self.shared.lock().open
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn open(&mut self) -> Result<()> {
        let mut shared = self.shared.lock();

        if shared.disconnected {
            return Err(Error::ConnectionClosed);
        }
        if shared.open {
            return Err(Error::AlreadyOpen);
        }

        shared.open = true;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.shared.lock().open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.shared.lock().open
    }

    async fn write(&mut self, data: &[u8]) -> Result<usize> {
        let mut shared = self.shared.lock();

        if shared.disconnected {
            return Err(Error::ConnectionClosed);
        }
        if !shared.open {
            return Err(Error::NotOpen);
        }

        shared.attempted_writes += 1;

        if shared.failing_writes > 0 {
            shared.failing_writes -= 1;
            trace!("Simulated write timeout");
            return Err(Error::WriteTimeout);
        }

        shared.written.push(Bytes::copy_from_slice(data));
        Ok(data.len())
    }

    async fn bytes_available(&mut self) -> Result<usize> {
        let shared = self.shared.lock();

        if shared.disconnected {
            return Err(Error::ConnectionClosed);
        }
        if !shared.open {
            return Err(Error::NotOpen);
        }

        Ok(shared.inbound.len())
    }

    async fn read(&mut self, count: usize) -> Result<BytesMut> {
        let mut shared = self.shared.lock();

        if !shared.open {
            return Err(Error::NotOpen);
        }

        let n = count.min(shared.inbound.len());
        Ok(shared.inbound.split_to(n))
    }

    fn port_name(&self) -> String {
        self.name.clone()
    }
}
