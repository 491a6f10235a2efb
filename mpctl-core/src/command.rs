//! Controller protocol command definitions
//!
//! Base commands occupy the low 15 bits. The acknowledgment variant of a
//! command is the base code with [`ACK_BIT`] set.

use std::fmt;

use crate::constants::ACK_BIT;
use crate::error::{Error, Result};

/// Protocol command codes
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Command {
    // Network 0x0000 - 0x00FF
    Ping = 0x0001,
    Pong = 0x0001 | ACK_BIT,
    FileReceive = 0x0002,
    FileReceiveAck = 0x0002 | ACK_BIT,
    Config = 0x0003,

    // Status sync
    StatusSync = 0x0010,
    StatusSyncAck = 0x0010 | ACK_BIT,

    // Session sync
    SessionSync = 0x0020,
    SessionSyncAck = 0x0020 | ACK_BIT,

    // Control 0x0100 - 0x01FF
    MainPowerControl = 0x0100,
    MainPowerControlAck = 0x0100 | ACK_BIT,
    PlayControl = 0x0110,
    PlayControlAck = 0x0110 | ACK_BIT,
}

impl Command {
    /// Check if the code has the acknowledgment bit set
    pub fn is_ack_code(code: u16) -> bool {
        code & ACK_BIT != 0
    }

    /// Check if this is an acknowledgment
    pub fn is_ack(self) -> bool {
        Self::is_ack_code(self as u16)
    }

    /// Check if this is a request
    pub fn is_request(self) -> bool {
        !self.is_ack()
    }

    /// Acknowledgment variant of this command, if the protocol defines one
    pub fn ack(self) -> Option<Self> {
        Self::try_from(self as u16 | ACK_BIT).ok()
    }

    /// Request variant of this command
    pub fn base(self) -> Self {
        match self {
            Self::Pong => Self::Ping,
            Self::FileReceiveAck => Self::FileReceive,
            Self::StatusSyncAck => Self::StatusSync,
            Self::SessionSyncAck => Self::SessionSync,
            Self::MainPowerControlAck => Self::MainPowerControl,
            Self::PlayControlAck => Self::PlayControl,
            other => other,
        }
    }

    /// Get command name
    pub fn name(self) -> &'static str {
        match self {
            Self::Ping => "CMD_PING",
            Self::Pong => "CMD_PONG",
            Self::FileReceive => "CMD_FILE_RECEIVE",
            Self::FileReceiveAck => "CMD_FILE_RECEIVE_ACK",
            Self::Config => "CMD_CONFIG",
            Self::StatusSync => "CMD_STATUS_SYNC",
            Self::StatusSyncAck => "CMD_STATUS_SYNC_ACK",
            Self::SessionSync => "CMD_SESSION_SYNC",
            Self::SessionSyncAck => "CMD_SESSION_SYNC_ACK",
            Self::MainPowerControl => "CMD_MAIN_POWER_CONTROL",
            Self::MainPowerControlAck => "CMD_MAIN_POWER_CONTROL_ACK",
            Self::PlayControl => "CMD_PLAY_CONTROL",
            Self::PlayControlAck => "CMD_PLAY_CONTROL_ACK",
        }
    }
}

impl From<Command> for u16 {
    fn from(cmd: Command) -> u16 {
        cmd as u16
    }
}

impl TryFrom<u16> for Command {
    type Error = Error;

    fn try_from(value: u16) -> Result<Self> {
        match value {
            0x0001 => Ok(Self::Ping),
            0x8001 => Ok(Self::Pong),
            0x0002 => Ok(Self::FileReceive),
            0x8002 => Ok(Self::FileReceiveAck),
            0x0003 => Ok(Self::Config),
            0x0010 => Ok(Self::StatusSync),
            0x8010 => Ok(Self::StatusSyncAck),
            0x0020 => Ok(Self::SessionSync),
            0x8020 => Ok(Self::SessionSyncAck),
            0x0100 => Ok(Self::MainPowerControl),
            0x8100 => Ok(Self::MainPowerControlAck),
            0x0110 => Ok(Self::PlayControl),
            0x8110 => Ok(Self::PlayControlAck),
            _ => Err(Error::UnknownCommand(value)),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:04X})", self.name(), *self as u16)
    }
}
