//! Error types for mpctl-core

/// Result type alias for mpctl-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core protocol errors
///
/// Only the strict decoding APIs produce these. The streaming decoder
/// resynchronizes or drops instead of failing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Frame is too short to be valid
    #[error("Frame too short: expected at least {expected} bytes, got {actual} bytes")]
    FrameTooShort {
        expected: usize,
        actual: usize,
    },

    /// Frame does not open with the start marker
    #[error("Missing start marker")]
    BadStartMarker,

    /// Length field disagrees with the number of bytes supplied
    #[error("Length mismatch: length field describes {declared} bytes, got {actual} bytes")]
    LengthMismatch {
        declared: usize,
        actual: usize,
    },

    /// Length field smaller than header + CRC
    #[error("Invalid length field: {0}")]
    InvalidLength(u16),

    /// CRC verification failed
    #[error("Checksum mismatch: expected 0x{expected:04X}, received 0x{received:04X}")]
    ChecksumMismatch {
        expected: u16,
        received: u16,
    },

    /// Unknown command code
    #[error("Unknown command code: 0x{0:04X}")]
    UnknownCommand(u16),

    /// Payload too large
    #[error("Payload too large: {size} bytes (max: {max} bytes)")]
    PayloadTooLarge {
        size: usize,
        max: usize,
    },

    /// Payload shorter than the command's decoder requires
    #[error("Payload underflow for {command}: need {expected} bytes, got {actual} bytes")]
    PayloadUnderflow {
        command: crate::command::Command,
        expected: usize,
        actual: usize,
    },

    /// Invalid value inside a payload
    #[error("Invalid payload value: {0}")]
    InvalidValue(#[from] mpctl_types::Error),
}
