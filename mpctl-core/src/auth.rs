//! Session-sync request payload
//!
//! A session-sync request carries a 32-bit timestamp followed by a 16-bit
//! auth token. Only requests with the expected token may reset the
//! receiver's sequence tracking.

use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, Bytes, BytesMut};

use crate::command::Command;
use crate::constants::{SESSION_AUTH_TOKEN, SESSION_SYNC_PAYLOAD_LEN};
use crate::error::{Error, Result};

/// Decoded `SESSION_SYNC` payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSyncRequest {
    /// Seconds since the Unix epoch, truncated to 32 bits
    pub timestamp: u32,

    /// Auth token
    pub token: u16,
}

impl SessionSyncRequest {
    /// Create a request carrying the valid auth token
    ///
    /// # Examples
    ///
    /// ```
    /// use mpctl_core::auth::SessionSyncRequest;
    ///
    /// let request = SessionSyncRequest::new(1_700_000_000);
    /// assert!(request.is_authorized());
    /// assert_eq!(request.encode().len(), 6);
    /// ```
    pub fn new(timestamp: u32) -> Self {
        Self {
            timestamp,
            token: SESSION_AUTH_TOKEN,
        }
    }

    /// Check the auth token
    pub fn is_authorized(&self) -> bool {
        self.token == SESSION_AUTH_TOKEN
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(SESSION_SYNC_PAYLOAD_LEN);
        buf.put_u32(self.timestamp);
        buf.put_u16(self.token);
        buf.freeze()
    }

    /// Decode from a payload; trailing bytes are ignored
    pub fn decode(payload: &[u8]) -> Result<Self> {
        if payload.len() < SESSION_SYNC_PAYLOAD_LEN {
            return Err(Error::PayloadUnderflow {
                command: Command::SessionSync,
                expected: SESSION_SYNC_PAYLOAD_LEN,
                actual: payload.len(),
            });
        }

        Ok(Self {
            timestamp: BigEndian::read_u32(&payload[0..4]),
            token: BigEndian::read_u16(&payload[4..6]),
        })
    }
}

/// Check whether a payload is an authorized session-sync request
pub fn is_authorized_sync(payload: &[u8]) -> bool {
    SessionSyncRequest::decode(payload).is_ok_and(|request| request.is_authorized())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_encode_layout() {
        let payload = SessionSyncRequest::new(0x0102_0304).encode();
        assert_eq!(payload.as_ref(), &[0x01, 0x02, 0x03, 0x04, 0xAB, 0xCD]);
    }

    #[test]
    fn test_decode() {
        let request = SessionSyncRequest::decode(&[0, 0, 0, 9, 0xAB, 0xCD]).unwrap();
        assert_eq!(request.timestamp, 9);
        assert!(request.is_authorized());
    }

    #[test]
    fn test_wrong_token() {
        let request = SessionSyncRequest::decode(&[0, 0, 0, 9, 0x12, 0x34]).unwrap();
        assert!(!request.is_authorized());
        assert!(!is_authorized_sync(&[0, 0, 0, 9, 0x12, 0x34]));
    }

    #[test]
    fn test_short_payload() {
        assert!(matches!(
            SessionSyncRequest::decode(&[0xAB, 0xCD]),
            Err(Error::PayloadUnderflow { expected: 6, actual: 2, .. })
        ));
        assert!(!is_authorized_sync(&[0xAB, 0xCD]));
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        assert!(is_authorized_sync(&[0, 0, 0, 0, 0xAB, 0xCD, 0xFF]));
    }
}
