//! Type definitions for mpctl

pub mod error;
pub mod event;
pub mod play;
pub mod status;

pub use error::{Error, Result};
pub use event::Event;
pub use play::PlayState;
pub use status::{MotionTime, PowerReading, RoundCount, RunTime, StatusSnapshot};
