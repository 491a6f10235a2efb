//! Stream encoder and decoder
//!
//! [`FrameEncoder`] owns the outbound sequence counter. [`FrameDecoder`] owns
//! the receive buffer and the inbound [`SequenceTracker`], and turns an
//! arbitrary, possibly corrupted byte stream into validated frames.
//!
//! The decoder never fails: garbage is skipped one byte at a time, short
//! input waits for more data, and malformed or corrupted frames are dropped.

use bytes::{Buf, BytesMut};
use tracing::{debug, trace};

use crate::{
    auth,
    command::Command,
    constants::*,
    error::Result,
    frame::{self, Frame},
    sequence::SequenceTracker,
};

/// Builds outbound frames and numbers them
#[derive(Debug, Default)]
pub struct FrameEncoder {
    sequence: u16,
}

impl FrameEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence number the next frame will carry
    pub fn next_sequence(&self) -> u16 {
        self.sequence
    }

    /// Build a frame with the current outbound sequence number
    ///
    /// The counter advances on every successful build, whether or not the
    /// bytes ever reach the wire.
    ///
    /// # Examples
    ///
    /// ```
    /// use mpctl_core::{Command, FrameEncoder};
    ///
    /// let mut encoder = FrameEncoder::new();
    /// let bytes = encoder.build_frame(1, 0, Command::Ping.into(), &[]).unwrap();
    ///
    /// assert_eq!(bytes.len(), 16);
    /// assert_eq!(encoder.next_sequence(), 1);
    /// ```
    pub fn build_frame(
        &mut self,
        receiver_id: u16,
        sender_id: u16,
        cmd: u16,
        payload: &[u8],
    ) -> Result<BytesMut> {
        let frame = Frame::with_payload(
            receiver_id,
            sender_id,
            cmd,
            self.sequence,
            payload.to_vec(),
        );
        let encoded = frame.encode()?;

        self.sequence = self.sequence.wrapping_add(1);

        trace!(frame = %frame, bytes = %hex::encode(&encoded), "Built frame");

        Ok(encoded)
    }
}

/// What happens to buffered bytes once a complete frame is extracted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DrainPolicy {
    /// Discard everything buffered, including bytes of any following frame
    ///
    /// This is the behavior deployed controllers are paired with.
    #[default]
    DiscardBuffered,

    /// Consume only the extracted frame
    ConsumeFrame,
}

/// Framing statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Frames that passed every check
    pub frames_decoded: u64,

    /// Bytes dropped while searching for a start marker
    pub bytes_skipped: u64,

    /// Frames dropped for a CRC mismatch
    pub crc_failures: u64,

    /// Frames dropped for an impossible length field
    pub malformed: u64,

    /// Frames dropped for a stale sequence number
    pub stale: u64,

    /// Buffered bytes thrown away by [`DrainPolicy::DiscardBuffered`]
    pub bytes_discarded: u64,
}

/// Reassembles frames from a byte stream
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
    tracker: SequenceTracker,
    drain: DrainPolicy,
    stats: DecoderStats,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set drain policy
    pub fn with_drain_policy(mut self, drain: DrainPolicy) -> Self {
        self.drain = drain;
        self
    }

    pub fn drain_policy(&self) -> DrainPolicy {
        self.drain
    }

    pub fn tracker(&self) -> &SequenceTracker {
        &self.tracker
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Number of bytes waiting in the receive buffer
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Restart inbound sequence expectations at 0
    pub fn reset_sequence(&mut self) {
        self.tracker.reset();
    }

    /// Append received bytes
    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Extract every complete, valid frame currently buffered
    pub fn poll(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();

        while self.buffer.len() >= PREAMBLE_LEN {
            if !frame::has_start_marker(&self.buffer) {
                self.buffer.advance(1);
                self.stats.bytes_skipped += 1;
                continue;
            }

            let length = u16::from_be_bytes([
                self.buffer[START_MARKER_LEN],
                self.buffer[START_MARKER_LEN + 1],
            ]);
            let total = frame::frame_len(length);
            if self.buffer.len() < total {
                break;
            }

            let candidate = self.buffer.split_to(total).freeze();
            if self.drain == DrainPolicy::DiscardBuffered && !self.buffer.is_empty() {
                trace!(bytes = self.buffer.len(), "Discarding bytes buffered after frame");
                self.stats.bytes_discarded += self.buffer.len() as u64;
                self.buffer.clear();
            }

            if (length as usize) < LENGTH_OVERHEAD {
                debug!(length, "Dropping frame with invalid length field");
                self.stats.malformed += 1;
                continue;
            }

            let (frame, received_crc) = Frame::split(candidate);

            if frame.cmd == u16::from(Command::SessionSync) && auth::is_authorized_sync(&frame.payload) {
                debug!(seq = frame.sequence, "Session sync request, resetting sequence tracking");
                self.tracker.reset();
            } else if !self.tracker.observe(frame.sequence).is_accepted() {
                self.stats.stale += 1;
                continue;
            }

            let calculated = frame.checksum();
            if calculated != received_crc {
                debug!(
                    cmd = frame.cmd,
                    seq = frame.sequence,
                    calculated = %format!("0x{:04X}", calculated),
                    received = %format!("0x{:04X}", received_crc),
                    "Dropping frame with CRC mismatch"
                );
                self.stats.crc_failures += 1;
                continue;
            }

            trace!(frame = %frame, "Decoded frame");
            self.stats.frames_decoded += 1;
            frames.push(frame);
        }

        frames
    }
}
