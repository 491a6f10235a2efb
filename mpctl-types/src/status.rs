//! Controller status structures

use std::fmt;

use chrono::TimeDelta;

/// Elapsed run time reported by the controller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RunTime {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
}

impl RunTime {
    pub fn new(hours: u8, minutes: u8, seconds: u8) -> Self {
        Self { hours, minutes, seconds }
    }

    /// Total run time in seconds
    pub fn total_seconds(&self) -> u32 {
        self.hours as u32 * 3600 + self.minutes as u32 * 60 + self.seconds as u32
    }

    /// Run time as a `chrono` duration
    pub fn as_duration(&self) -> TimeDelta {
        TimeDelta::seconds(self.total_seconds() as i64)
    }
}

impl fmt::Display for RunTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hours, self.minutes, self.seconds)
    }
}

/// Round counter (current round out of total rounds)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RoundCount {
    pub current: u16,
    pub total: u16,
}

/// Power metrics
///
/// The controller transmits both values as integers scaled by 100.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PowerReading {
    /// Voltage in hundredths of a volt
    pub voltage_centi: u16,

    /// Current in hundredths of an ampere
    pub current_centi: u16,
}

impl PowerReading {
    /// Scale factor applied by the controller
    pub const SCALE: f64 = 100.0;

    pub fn volts(&self) -> f64 {
        self.voltage_centi as f64 / Self::SCALE
    }

    pub fn amps(&self) -> f64 {
        self.current_centi as f64 / Self::SCALE
    }
}

/// Motion timeline position, in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MotionTime {
    pub current_ms: u16,
    pub end_ms: u16,
}

impl MotionTime {
    /// Fraction of the motion completed, `None` when the end time is zero
    pub fn progress(&self) -> Option<f64> {
        if self.end_ms == 0 {
            return None;
        }
        Some(self.current_ms as f64 / self.end_ms as f64)
    }
}

/// Status snapshot decoded from a status-sync acknowledgment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct StatusSnapshot {
    /// Controller run time
    pub run_time: RunTime,

    /// Round counters
    pub rounds: RoundCount,

    /// Supply voltage and current
    pub power: PowerReading,

    /// Motion timeline
    pub motion: MotionTime,
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Status[run: {}, round: {}/{}, {:.2}V {:.2}A, motion: {}/{}ms]",
            self.run_time,
            self.rounds.current,
            self.rounds.total,
            self.power.volts(),
            self.power.amps(),
            self.motion.current_ms,
            self.motion.end_ms
        )
    }
}
