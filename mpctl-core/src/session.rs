//! Session sync state machine
//!
//! A sync session re-establishes sequence numbering with the controller:
//! - `start()` sends the first request right away
//! - every tick resends until the retry budget is spent
//! - an acknowledgment ends the session successfully
//!
//! The machine performs no I/O and owns no timer. The caller drives it and
//! acts on the returned [`SyncStep`].

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::constants::{MAX_SYNC_RETRIES, SYNC_INTERVAL_MS};

/// Session sync state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    /// No sync in progress
    #[default]
    Idle,

    /// Request sent, waiting for `SESSION_SYNC_ACK`
    Waiting,

    /// Acknowledged (terminal)
    Succeeded,

    /// Retries exhausted (terminal)
    Failed,
}

impl SyncState {
    /// Check if the session reached a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// Action requested from the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStep {
    /// Send a session-sync request
    Send,

    /// Retries exhausted: stop the timer and report failure
    Fail,

    /// Not waiting: stop the timer
    Stop,
}

/// Session sync controller
///
/// Thread-safe and can be cloned cheaply (Arc internally), so the timer task
/// and the receive path can share one instance.
#[derive(Debug, Clone)]
pub struct SyncSession {
    inner: Arc<SyncInner>,
}

#[derive(Debug)]
struct SyncInner {
    interval_ms: u32,
    max_retries: u8,
    state: Mutex<SyncProgress>,
}

#[derive(Debug, Default)]
struct SyncProgress {
    state: SyncState,
    retry_count: u8,
}

impl SyncSession {
    pub fn new() -> Self {
        Self::with_limits(SYNC_INTERVAL_MS, MAX_SYNC_RETRIES)
    }

    pub fn with_limits(interval_ms: u32, max_retries: u8) -> Self {
        Self {
            inner: Arc::new(SyncInner {
                interval_ms,
                max_retries,
                state: Mutex::new(SyncProgress::default()),
            }),
        }
    }

    /// Tick period in milliseconds
    pub fn interval_ms(&self) -> u32 {
        self.inner.interval_ms
    }

    pub fn max_retries(&self) -> u8 {
        self.inner.max_retries
    }

    pub fn state(&self) -> SyncState {
        self.inner.state.lock().state
    }

    /// Check if an acknowledgment is pending
    pub fn is_waiting(&self) -> bool {
        self.state() == SyncState::Waiting
    }

    /// Requests sent so far in the current session
    pub fn retry_count(&self) -> u8 {
        self.inner.state.lock().retry_count
    }

    /// Begin a new session
    ///
    /// Always returns [`SyncStep::Send`]: the first request goes out
    /// immediately and counts against the retry budget. Restarting a session
    /// that is already waiting starts over from zero.
    pub fn start(&self) -> SyncStep {
        let mut progress = self.inner.state.lock();

        if progress.state == SyncState::Waiting {
            debug!(retry_count = progress.retry_count, "Restarting session sync");
        }

        progress.state = SyncState::Waiting;
        progress.retry_count = 1;

        SyncStep::Send
    }

    /// Advance on a timer tick
    pub fn on_tick(&self) -> SyncStep {
        let mut progress = self.inner.state.lock();

        if progress.state != SyncState::Waiting {
            return SyncStep::Stop;
        }

        if progress.retry_count >= self.inner.max_retries {
            warn!(retries = progress.retry_count, "Session sync failed, no acknowledgment");
            progress.state = SyncState::Failed;
            return SyncStep::Fail;
        }

        progress.retry_count += 1;
        debug!(attempt = progress.retry_count, "Resending session sync");

        SyncStep::Send
    }

    /// Record a `SESSION_SYNC_ACK`
    ///
    /// Returns `true` if this completed a waiting session. Acknowledgments
    /// outside a session are ignored.
    pub fn on_ack(&self) -> bool {
        let mut progress = self.inner.state.lock();

        if progress.state != SyncState::Waiting {
            debug!(state = ?progress.state, "Unsolicited session sync acknowledgment");
            return false;
        }

        progress.state = SyncState::Succeeded;
        true
    }

    /// Return to idle, whatever the current state
    pub fn cleanup(&self) {
        *self.inner.state.lock() = SyncProgress::default();
    }
}

impl Default for SyncSession {
    fn default() -> Self {
        Self::new()
    }
}
