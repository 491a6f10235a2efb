//! Protocol constants

/// Start-of-frame sentinel byte
pub const START_MARKER: u8 = 0x16;

/// Number of sentinel bytes opening every frame
pub const START_MARKER_LEN: usize = 4;

/// Size of the big-endian length field
pub const LENGTH_FIELD_LEN: usize = 2;

/// Start marker plus length field
pub const PREAMBLE_LEN: usize = START_MARKER_LEN + LENGTH_FIELD_LEN;

/// receiverId, senderId, cmd, sequence (2 bytes each)
pub const HEADER_LEN: usize = 8;

/// Size of the trailing CRC16
pub const CRC_LEN: usize = 2;

/// Bytes counted by the length field in addition to the payload
pub const LENGTH_OVERHEAD: usize = HEADER_LEN + CRC_LEN;

/// Size of a frame with an empty payload
pub const MIN_FRAME_LEN: usize = PREAMBLE_LEN + HEADER_LEN + CRC_LEN;

/// Largest payload the 16-bit length field can describe
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize - LENGTH_OVERHEAD;

/// High bit marking the acknowledgment variant of a command
pub const ACK_BIT: u16 = 0x8000;

/// Token carried by a valid session-sync request
pub const SESSION_AUTH_TOKEN: u16 = 0xABCD;

/// timestamp (u32) + auth token (u16)
pub const SESSION_SYNC_PAYLOAD_LEN: usize = 6;

/// Minimum `STATUS_SYNC_ACK` payload size
pub const STATUS_SYNC_ACK_LEN: usize = 15;

/// Sequence gaps above this are reported as jumps
pub const SEQUENCE_JUMP_THRESHOLD: u16 = 3;

/// Default node ids
pub const HOST_ID: u16 = 0x0000;
pub const DEVICE_ID: u16 = 0x0001;

/// Session sync retry interval (milliseconds)
pub const SYNC_INTERVAL_MS: u32 = 500;

/// Session sync attempts before giving up
pub const MAX_SYNC_RETRIES: u8 = 3;

/// Reader poll interval (milliseconds)
pub const READ_POLL_INTERVAL_MS: u64 = 10;

/// Consecutive failed transport polls before the connection counts as lost
pub const MAX_READ_FAILURES: u32 = 5;

/// Write timeout (milliseconds)
pub const WRITE_TIMEOUT_MS: u64 = 500;

/// Extra write attempts for high priority frames
pub const MAX_WRITE_RETRIES: usize = 3;

/// Pause between write attempts (milliseconds)
pub const WRITE_RETRY_BACKOFF_MS: u64 = 20;

