//! # mpctl-core
//!
//! Core protocol implementation for serial motion/power controllers.
//!
//! This crate provides the I/O-free protocol primitives:
//! - Frame structure and encoding/decoding
//! - CRC16/XMODEM checksum
//! - Stream decoder with start-marker resynchronization
//! - Sequence tracking
//! - Command definitions and dispatch table
//! - Session sync state machine
//! - Protocol constants

pub mod auth;
pub mod checksum;
pub mod codec;
pub mod command;
pub mod constants;
pub mod dispatch;
pub mod error;
pub mod frame;
pub mod payload;
pub mod sequence;
pub mod session;

pub use codec::{DecoderStats, DrainPolicy, FrameDecoder, FrameEncoder};
pub use command::Command;
pub use dispatch::Outcome;
pub use error::{Error, Result};
pub use frame::Frame;
pub use sequence::{Observation, SequenceTracker};
pub use session::{SyncSession, SyncState, SyncStep};
