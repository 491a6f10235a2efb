//! Typed payload decoders for acknowledgment commands

use byteorder::{BigEndian, ByteOrder};

use mpctl_types::{MotionTime, PowerReading, RoundCount, RunTime, StatusSnapshot};

use crate::command::Command;
use crate::constants::STATUS_SYNC_ACK_LEN;
use crate::error::{Error, Result};

fn require(command: Command, payload: &[u8], expected: usize) -> Result<()> {
    if payload.len() < expected {
        return Err(Error::PayloadUnderflow {
            command,
            expected,
            actual: payload.len(),
        });
    }
    Ok(())
}

/// Decode a `STATUS_SYNC_ACK` payload
///
/// # Layout
///
/// ```text
/// offset  size  field
///      0     1  hours
///      1     1  minutes
///      2     1  seconds
///      3     2  current round
///      5     2  total rounds
///      7     2  voltage × 100
///      9     2  current × 100
///     11     2  motion position (ms)
///     13     2  motion end (ms)
/// ```
pub fn decode_status_snapshot(payload: &[u8]) -> Result<StatusSnapshot> {
    require(Command::StatusSyncAck, payload, STATUS_SYNC_ACK_LEN)?;

    Ok(StatusSnapshot {
        run_time: RunTime::new(payload[0], payload[1], payload[2]),
        rounds: RoundCount {
            current: BigEndian::read_u16(&payload[3..5]),
            total: BigEndian::read_u16(&payload[5..7]),
        },
        power: PowerReading {
            voltage_centi: BigEndian::read_u16(&payload[7..9]),
            current_centi: BigEndian::read_u16(&payload[9..11]),
        },
        motion: MotionTime {
            current_ms: BigEndian::read_u16(&payload[11..13]),
            end_ms: BigEndian::read_u16(&payload[13..15]),
        },
    })
}

/// Decode a `MAIN_POWER_CONTROL_ACK` payload (any non-zero byte is "on")
pub fn decode_power_status(payload: &[u8]) -> Result<bool> {
    require(Command::MainPowerControlAck, payload, 1)?;
    Ok(payload[0] != 0)
}

/// Decode a `PLAY_CONTROL_ACK` payload
pub fn decode_play_status(payload: &[u8]) -> Result<u8> {
    require(Command::PlayControlAck, payload, 1)?;
    Ok(payload[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_status_snapshot() {
        let payload = [
            1, 30, 45, // 01:30:45
            0x00, 0x03, 0x00, 0x0A, // round 3/10
            0x09, 0x60, 0x00, 0x96, // 24.00V 1.50A
            0x01, 0xF4, 0x03, 0xE8, // 500/1000ms
        ];

        let snapshot = decode_status_snapshot(&payload).unwrap();

        assert_eq!(snapshot.run_time, RunTime::new(1, 30, 45));
        assert_eq!(snapshot.rounds, RoundCount { current: 3, total: 10 });
        assert_eq!(snapshot.power.voltage_centi, 2400);
        assert_eq!(snapshot.power.current_centi, 150);
        assert_eq!(snapshot.motion, MotionTime { current_ms: 500, end_ms: 1000 });
    }

    #[test]
    fn test_status_snapshot_underflow() {
        let result = decode_status_snapshot(&[0u8; 14]);
        assert!(matches!(
            result,
            Err(Error::PayloadUnderflow { expected: 15, actual: 14, .. })
        ));
    }

    #[test]
    fn test_decode_power_status() {
        assert!(decode_power_status(&[1]).unwrap());
        assert!(decode_power_status(&[0xFF]).unwrap());
        assert!(!decode_power_status(&[0]).unwrap());
        assert!(decode_power_status(&[]).is_err());
    }

    #[test]
    fn test_decode_play_status() {
        assert_eq!(decode_play_status(&[3, 9]).unwrap(), 3);
        assert!(decode_play_status(&[]).is_err());
    }
}
