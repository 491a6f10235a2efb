//! High-level error types

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Core protocol error: {0}")]
    Core(#[from] mpctl_core::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] mpctl_transport::Error),

    #[error("Type error: {0}")]
    Types(#[from] mpctl_types::Error),

    #[error("Link not running")]
    NotRunning,

    #[error("Link already running")]
    AlreadyRunning,

    #[error("Send failed after {attempts} attempt(s)")]
    SendFailed { attempts: usize },

    #[error("Connection lost")]
    ConnectionLost,
}
