//! Transport errors

use std::io;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Port not open")]
    NotOpen,

    #[error("Port already open")]
    AlreadyOpen,

    #[error("Write timeout")]
    WriteTimeout,

    #[error("Connection timeout")]
    ConnectionTimeout,

    #[error("Connection closed by remote")]
    ConnectionClosed,

    #[error("Invalid port: {0}")]
    InvalidPort(String),

    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Check if the operation may succeed when retried
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::WriteTimeout | Self::ConnectionTimeout)
    }

    /// Check if the link is gone and must be reopened
    pub fn is_disconnect(&self) -> bool {
        match self {
            Self::ConnectionClosed | Self::NotOpen => true,
            Self::Io(e) => is_disconnect_kind(e.kind()),
            Self::Serial(e) => match e.kind() {
                serialport::ErrorKind::NoDevice => true,
                serialport::ErrorKind::Io(kind) => is_disconnect_kind(kind),
                _ => false,
            },
            _ => false,
        }
    }
}

fn is_disconnect_kind(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof
    )
}
