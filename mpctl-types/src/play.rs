//! Playback control states

use std::fmt;

use crate::error::{Error, Result};

/// Playback control state sent with `PLAY_CONTROL`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PlayState {
    /// Play the motion sequence once
    PlayOne = 1,

    /// Play the motion sequence in a loop
    PlayRepeat = 2,

    Pause = 3,
    Stop = 4,
}

impl PlayState {
    pub fn name(self) -> &'static str {
        match self {
            Self::PlayOne => "PLAY_ONE",
            Self::PlayRepeat => "PLAY_REPEAT",
            Self::Pause => "PAUSE",
            Self::Stop => "STOP",
        }
    }
}

impl From<PlayState> for u8 {
    fn from(state: PlayState) -> u8 {
        state as u8
    }
}

impl TryFrom<u8> for PlayState {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Self::PlayOne),
            2 => Ok(Self::PlayRepeat),
            3 => Ok(Self::Pause),
            4 => Ok(Self::Stop),
            _ => Err(Error::Validation(format!("Invalid play state: {}", value))),
        }
    }
}

impl fmt::Display for PlayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), *self as u8)
    }
}
