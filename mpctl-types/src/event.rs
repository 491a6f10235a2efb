//! Events delivered to the presentation layer

use std::fmt;

use crate::status::StatusSnapshot;

/// Notification raised by the protocol engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Main power state reported by `MAIN_POWER_CONTROL_ACK`
    PowerStatus(bool),

    /// Metrics reported by `STATUS_SYNC_ACK`
    StatusSnapshot(StatusSnapshot),

    /// Raw play state reported by `PLAY_CONTROL_ACK`
    PlayControlStatus(u8),

    /// Frame with a command that has no handler
    UnknownCommand(u16),

    /// Session sync was acknowledged
    SyncSucceeded,

    /// Session sync ran out of retries
    SyncFailed,

    /// Transport closed unexpectedly
    ConnectionLost,

    /// A frame was written to the transport
    FrameSent { cmd: u16, sequence: u16 },
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PowerStatus(on) => write!(f, "PowerStatus({})", if *on { "on" } else { "off" }),
            Self::StatusSnapshot(snapshot) => write!(f, "{}", snapshot),
            Self::PlayControlStatus(state) => write!(f, "PlayControlStatus({})", state),
            Self::UnknownCommand(cmd) => write!(f, "UnknownCommand(0x{:04X})", cmd),
            Self::SyncSucceeded => write!(f, "SyncSucceeded"),
            Self::SyncFailed => write!(f, "SyncFailed"),
            Self::ConnectionLost => write!(f, "ConnectionLost"),
            Self::FrameSent { cmd, sequence } => {
                write!(f, "FrameSent(cmd=0x{:04X}, seq={})", cmd, sequence)
            }
        }
    }
}
