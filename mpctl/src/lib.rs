//! # mpctl
//!
//! Host side of the serial protocol spoken by motion/power controller boards.
//!
//! ## Features
//!
//! - Framing with start-marker resynchronization and CRC16 checks
//! - Sequence tracking with loss counting
//! - Session sync with bounded retries
//! - Async API using Tokio; events delivered through a sink
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use mpctl::{ChannelSink, Link, PlayState, SerialTransport};
//!
//! #[tokio::main]
//! async fn main() -> mpctl::Result<()> {
//!     let (sink, mut events) = ChannelSink::new();
//!     let mut link = Link::new(SerialTransport::new("/dev/ttyUSB0"), Arc::new(sink));
//!
//!     link.start().await?;
//!     link.start_session_sync().await?;
//!     link.send_play_control(PlayState::PlayOne).await?;
//!
//!     if let Some(event) = events.recv().await {
//!         println!("{}", event);
//!     }
//!
//!     link.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod link;
pub mod sink;

// Re-exports
pub use config::LinkConfig;
pub use error::{Error, Result};
pub use link::{Link, LinkStats, Priority};
pub use sink::{ChannelSink, EventSink};

// Re-export protocol and transport types
pub use mpctl_core::{Command, DecoderStats, DrainPolicy, Frame, SyncState};
pub use mpctl_transport::{MemoryPeer, MemoryTransport, SerialTransport, TcpTransport, Transport};
pub use mpctl_types::{Event, PlayState, StatusSnapshot};
