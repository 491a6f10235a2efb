//! Link configuration

use std::time::Duration;

use mpctl_core::constants::*;
use mpctl_core::DrainPolicy;

/// Tunables for a [`Link`](crate::Link)
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use mpctl::LinkConfig;
///
/// let config = LinkConfig::default()
///     .with_device_id(2)
///     .with_status_poll_interval(Duration::from_secs(1));
///
/// assert_eq!(config.host_id, 0);
/// assert_eq!(config.device_id, 2);
/// ```
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Node id this side sends as
    pub host_id: u16,

    /// Node id of the controller
    pub device_id: u16,

    /// Pause between transport polls when nothing has arrived
    pub read_poll_interval: Duration,

    /// Consecutive read errors tolerated before the link is torn down
    pub read_failure_limit: u32,

    /// Upper bound for a single write
    pub write_timeout: Duration,

    /// Extra attempts for high priority frames
    pub write_retries: usize,

    /// Pause between write attempts
    pub retry_backoff: Duration,

    /// Session sync resend period
    pub sync_interval: Duration,

    /// Session sync requests before giving up
    pub sync_max_retries: u8,

    /// Period of the automatic `STATUS_SYNC` request, if any
    pub status_poll_interval: Option<Duration>,

    /// What the decoder does with bytes buffered after a frame
    pub drain_policy: DrainPolicy,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            host_id: HOST_ID,
            device_id: DEVICE_ID,
            read_poll_interval: Duration::from_millis(READ_POLL_INTERVAL_MS),
            read_failure_limit: MAX_READ_FAILURES,
            write_timeout: Duration::from_millis(WRITE_TIMEOUT_MS),
            write_retries: MAX_WRITE_RETRIES,
            retry_backoff: Duration::from_millis(WRITE_RETRY_BACKOFF_MS),
            sync_interval: Duration::from_millis(SYNC_INTERVAL_MS as u64),
            sync_max_retries: MAX_SYNC_RETRIES,
            status_poll_interval: None,
            drain_policy: DrainPolicy::default(),
        }
    }
}

impl LinkConfig {
    pub fn with_host_id(mut self, host_id: u16) -> Self {
        self.host_id = host_id;
        self
    }

    pub fn with_device_id(mut self, device_id: u16) -> Self {
        self.device_id = device_id;
        self
    }

    /// Set reader poll interval
    pub fn with_read_poll_interval(mut self, interval: Duration) -> Self {
        self.read_poll_interval = interval;
        self
    }

    /// Set how many read errors in a row end the connection
    pub fn with_read_failure_limit(mut self, limit: u32) -> Self {
        self.read_failure_limit = limit.max(1);
        self
    }

    /// Set write timeout
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set retry budget and backoff for high priority writes
    pub fn with_write_retries(mut self, retries: usize, backoff: Duration) -> Self {
        self.write_retries = retries;
        self.retry_backoff = backoff;
        self
    }

    /// Set session sync period and retry budget
    pub fn with_sync(mut self, interval: Duration, max_retries: u8) -> Self {
        self.sync_interval = interval;
        self.sync_max_retries = max_retries;
        self
    }

    /// Send `STATUS_SYNC` periodically while the link runs
    pub fn with_status_poll_interval(mut self, interval: Duration) -> Self {
        self.status_poll_interval = Some(interval);
        self
    }

    pub fn with_drain_policy(mut self, drain_policy: DrainPolicy) -> Self {
        self.drain_policy = drain_policy;
        self
    }
}
