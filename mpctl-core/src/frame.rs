//! Wire frame structure and encoding/decoding

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;

use crate::{
    checksum,
    command::Command,
    constants::*,
    error::{Error, Result},
};

/// Protocol frame
///
/// # Frame Structure
///
/// ```text
/// ┌──────────────┬────────┬──────────┬──────────┬────────┬──────────┬─────────┬────────┐
/// │ 0x16 × 4     │ Length │ Receiver │ Sender   │ Cmd    │ Sequence │ Payload │ CRC16  │
/// │ 4 bytes      │ 2 bytes│ 2 bytes  │ 2 bytes  │ 2 bytes│ 2 bytes  │ N bytes │ 2 bytes│
/// └──────────────┴────────┴──────────┴──────────┴────────┴──────────┴─────────┴────────┘
/// ```
///
/// All multi-byte values are big-endian. `Length` counts header, payload and
/// CRC (`10 + N`). The CRC covers receiver through payload.
///
/// # Examples
///
/// ```
/// use mpctl_core::{Command, Frame};
///
/// let frame = Frame::with_payload(1, 0, Command::MainPowerControl, 7, vec![1]);
/// let encoded = frame.encode().unwrap();
///
/// let decoded = Frame::decode(&encoded).unwrap();
/// assert_eq!(frame, decoded);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    /// Destination node
    pub receiver_id: u16,

    /// Originating node
    pub sender_id: u16,

    /// Raw command code (may be unknown to this side)
    pub cmd: u16,

    /// Sender-local sequence number
    pub sequence: u16,

    /// Command-specific data
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame with empty payload
    pub fn new(receiver_id: u16, sender_id: u16, cmd: impl Into<u16>, sequence: u16) -> Self {
        Self::with_payload(receiver_id, sender_id, cmd, sequence, Bytes::new())
    }

    /// Create a frame with payload
    pub fn with_payload(
        receiver_id: u16,
        sender_id: u16,
        cmd: impl Into<u16>,
        sequence: u16,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            receiver_id,
            sender_id,
            cmd: cmd.into(),
            sequence,
            payload: payload.into(),
        }
    }

    /// Decoded command, `None` for codes outside the command table
    pub fn command(&self) -> Option<Command> {
        Command::try_from(self.cmd).ok()
    }

    /// Check if this is an acknowledgment frame
    pub fn is_ack(&self) -> bool {
        Command::is_ack_code(self.cmd)
    }

    /// Value of the length field
    pub fn length_field(&self) -> usize {
        LENGTH_OVERHEAD + self.payload.len()
    }

    /// Get total encoded size
    pub fn size(&self) -> usize {
        START_MARKER_LEN + LENGTH_FIELD_LEN + self.length_field()
    }

    fn header(&self) -> [u8; HEADER_LEN] {
        let mut header = [0u8; HEADER_LEN];
        header[0..2].copy_from_slice(&self.receiver_id.to_be_bytes());
        header[2..4].copy_from_slice(&self.sender_id.to_be_bytes());
        header[4..6].copy_from_slice(&self.cmd.to_be_bytes());
        header[6..8].copy_from_slice(&self.sequence.to_be_bytes());
        header
    }

    /// CRC16 over header and payload
    pub fn checksum(&self) -> u16 {
        checksum::update(checksum::crc16(&self.header()), &self.payload)
    }

    /// Encode frame to bytes
    ///
    /// # Errors
    ///
    /// Returns [`Error::PayloadTooLarge`] when the payload does not fit the
    /// 16-bit length field.
    pub fn encode(&self) -> Result<BytesMut> {
        if self.payload.len() > MAX_PAYLOAD_LEN {
            return Err(Error::PayloadTooLarge {
                size: self.payload.len(),
                max: MAX_PAYLOAD_LEN,
            });
        }

        let mut buf = BytesMut::with_capacity(self.size());

        buf.put_bytes(START_MARKER, START_MARKER_LEN);
        buf.put_u16(self.length_field() as u16);
        buf.put_slice(&self.header());
        buf.put_slice(&self.payload);
        buf.put_u16(self.checksum());

        Ok(buf)
    }

    /// Decode one complete frame
    ///
    /// `data` must hold exactly one frame, start marker included. This is the
    /// strict counterpart of the stream decoder in [`crate::codec`], which
    /// never reports errors.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Buffer is shorter than an empty frame
    /// - Start marker is missing
    /// - Length field is invalid or disagrees with the buffer size
    /// - CRC verification fails
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < MIN_FRAME_LEN {
            return Err(Error::FrameTooShort {
                expected: MIN_FRAME_LEN,
                actual: data.len(),
            });
        }

        if !has_start_marker(data) {
            return Err(Error::BadStartMarker);
        }

        let length = u16::from_be_bytes([data[START_MARKER_LEN], data[START_MARKER_LEN + 1]]);
        if (length as usize) < LENGTH_OVERHEAD {
            return Err(Error::InvalidLength(length));
        }

        let declared = frame_len(length);
        if declared != data.len() {
            return Err(Error::LengthMismatch {
                declared,
                actual: data.len(),
            });
        }

        let (frame, received) = Self::split(Bytes::copy_from_slice(data));

        let calculated = frame.checksum();
        if calculated != received {
            return Err(Error::ChecksumMismatch {
                expected: calculated,
                received,
            });
        }

        Ok(frame)
    }

    /// Split a candidate into its fields and the received CRC
    ///
    /// The candidate must be exactly [`frame_len`] bytes for a length field of
    /// at least [`LENGTH_OVERHEAD`].
    pub(crate) fn split(mut candidate: Bytes) -> (Self, u16) {
        candidate.advance(START_MARKER_LEN);
        let length = candidate.get_u16() as usize;

        let receiver_id = candidate.get_u16();
        let sender_id = candidate.get_u16();
        let cmd = candidate.get_u16();
        let sequence = candidate.get_u16();

        let payload = candidate.split_to(length - LENGTH_OVERHEAD);
        let crc = candidate.get_u16();

        let frame = Self {
            receiver_id,
            sender_id,
            cmd,
            sequence,
            payload,
        };

        (frame, crc)
    }
}

/// Check the four start-marker bytes at the head of `data`
pub fn has_start_marker(data: &[u8]) -> bool {
    data.len() >= START_MARKER_LEN && data[..START_MARKER_LEN].iter().all(|&b| b == START_MARKER)
}

/// Total frame size described by a length field
pub fn frame_len(length: u16) -> usize {
    START_MARKER_LEN + length as usize + CRC_LEN
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("receiver_id", &format!("0x{:04X}", self.receiver_id))
            .field("sender_id", &format!("0x{:04X}", self.sender_id))
            .field("cmd", &format!("0x{:04X}", self.cmd))
            .field("sequence", &self.sequence)
            .field("payload", &hex::encode(&self.payload))
            .finish()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.command() {
            Some(command) => write!(f, "Frame[{}]", command)?,
            None => write!(f, "Frame[0x{:04X}]", self.cmd)?,
        }
        write!(
            f,
            "({}->{}, seq={}, len={})",
            self.sender_id,
            self.receiver_id,
            self.sequence,
            self.payload.len()
        )
    }
}
