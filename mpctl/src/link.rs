//! Controller link
//!
//! A [`Link`] owns one transport and runs the protocol over it:
//! - a reader task polls the transport, decodes frames and dispatches them
//! - the send path builds and writes one frame at a time under a lock
//! - a session-sync timer and an optional status-sync pacer send on their own
//!
//! Results reach the consumer through its [`EventSink`]; no call blocks on
//! the controller answering.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, timeout, Instant};
use tracing::{debug, info, trace, warn};

use mpctl_core::auth::SessionSyncRequest;
use mpctl_core::dispatch::{self, Outcome};
use mpctl_core::{
    Command, DecoderStats, Frame, FrameDecoder, FrameEncoder, SyncSession, SyncState, SyncStep,
};
use mpctl_transport::Transport;
use mpctl_types::PlayState;

use crate::config::LinkConfig;
use crate::error::{Error, Result};
use crate::sink::{self, EventSink};

/// Write priority
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    /// Control commands: full retry budget
    High,

    /// Periodic traffic: single attempt, failures only logged
    Low,
}

/// Counters collected by a running link
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Framing counters of the inbound decoder
    pub decoder: DecoderStats,

    /// Next inbound sequence number expected
    pub expected_sequence: u16,

    /// Inbound frames detected as lost
    pub missing_frames: u32,

    /// Frames written successfully
    pub frames_sent: u64,

    /// Sends that gave up
    pub send_failures: u64,
}

/// Connection to one controller
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use mpctl::{ChannelSink, Link, SerialTransport};
///
/// #[tokio::main]
/// async fn main() -> mpctl::Result<()> {
///     let (sink, mut events) = ChannelSink::new();
///     let mut link = Link::new(SerialTransport::new("/dev/ttyUSB0"), Arc::new(sink));
///
///     link.start().await?;
///     link.start_session_sync().await?;
///     link.send_main_power(true).await?;
///
///     while let Some(event) = events.recv().await {
///         println!("{}", event);
///     }
///
///     link.shutdown().await
/// }
/// ```
pub struct Link {
    shared: Arc<Shared>,
    reader: Option<JoinHandle<()>>,
}

struct Shared {
    config: LinkConfig,
    transport: tokio::sync::Mutex<Box<dyn Transport>>,
    // Send lock: held across build and write
    encoder: tokio::sync::Mutex<FrameEncoder>,
    sink: Arc<dyn EventSink>,
    sync: SyncSession,
    sync_task: Mutex<Option<JoinHandle<()>>>,
    status_task: Mutex<Option<JoinHandle<()>>>,
    running: AtomicBool,
    connection_lost: AtomicBool,
    stats: Mutex<LinkStats>,
}

impl Link {
    /// Create a link with default configuration
    pub fn new(transport: impl Transport + 'static, sink: Arc<dyn EventSink>) -> Self {
        Self::with_config(transport, sink, LinkConfig::default())
    }

    pub fn with_config(
        transport: impl Transport + 'static,
        sink: Arc<dyn EventSink>,
        config: LinkConfig,
    ) -> Self {
        let sync = SyncSession::with_limits(
            config.sync_interval.as_millis() as u32,
            config.sync_max_retries,
        );

        let transport: Box<dyn Transport> = Box::new(transport);

        Self {
            shared: Arc::new(Shared {
                config,
                transport: tokio::sync::Mutex::new(transport),
                encoder: tokio::sync::Mutex::new(FrameEncoder::new()),
                sink,
                sync,
                sync_task: Mutex::new(None),
                status_task: Mutex::new(None),
                running: AtomicBool::new(false),
                connection_lost: AtomicBool::new(false),
                stats: Mutex::new(LinkStats::default()),
            }),
            reader: None,
        }
    }

    pub fn config(&self) -> &LinkConfig {
        &self.shared.config
    }

    /// Check if the reader is running and the connection was not lost
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    pub fn sync_state(&self) -> SyncState {
        self.shared.sync.state()
    }

    pub fn stats(&self) -> LinkStats {
        *self.shared.stats.lock()
    }

    /// Open the transport and start the background tasks
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyRunning`] if the link was started and not shut
    /// down, or the transport's error if it cannot be opened.
    pub async fn start(&mut self) -> Result<()> {
        if self.reader.is_some() {
            return Err(Error::AlreadyRunning);
        }

        {
            let mut transport = self.shared.transport.lock().await;
            info!("Opening {}...", transport.port_name());
            if !transport.is_open() {
                transport.open().await?;
            }
        }

        let decoder = FrameDecoder::new().with_drain_policy(self.shared.config.drain_policy);

        self.shared.connection_lost.store(false, Ordering::Release);
        self.shared.running.store(true, Ordering::Release);
        self.reader = Some(tokio::spawn(read_loop(self.shared.clone(), decoder)));

        if let Some(period) = self.shared.config.status_poll_interval {
            let task = tokio::spawn(status_loop(self.shared.clone(), period));
            *self.shared.status_task.lock() = Some(task);
        }

        info!("Link started");
        Ok(())
    }

    /// Stop the background tasks and close the transport
    ///
    /// The reader is joined before the transport is closed.
    pub async fn shutdown(&mut self) -> Result<()> {
        let reader = self.reader.take().ok_or(Error::NotRunning)?;

        info!("Shutting down link...");

        self.shared.running.store(false, Ordering::Release);
        self.shared.stop_sync();
        self.shared.stop_status();

        if let Err(e) = reader.await {
            warn!("Reader task ended abnormally: {}", e);
        }

        self.shared.transport.lock().await.close().await?;

        info!("Link stopped");
        Ok(())
    }

    /// Send a frame
    ///
    /// Returns the sequence number the frame carried.
    pub async fn send(
        &self,
        receiver_id: u16,
        command: Command,
        payload: &[u8],
        priority: Priority,
    ) -> Result<u16> {
        self.shared
            .send_frame(receiver_id, self.shared.config.host_id, command.into(), payload, priority)
            .await
    }

    /// Switch main power
    pub async fn send_main_power(&self, on: bool) -> Result<u16> {
        let device_id = self.shared.config.device_id;
        self.send(device_id, Command::MainPowerControl, &[on as u8], Priority::High)
            .await
    }

    /// Change playback state
    pub async fn send_play_control(&self, state: PlayState) -> Result<u16> {
        let device_id = self.shared.config.device_id;
        self.send(device_id, Command::PlayControl, &[u8::from(state)], Priority::High)
            .await
    }

    pub async fn send_ping(&self, receiver_id: u16) -> Result<u16> {
        self.send(receiver_id, Command::Ping, &[], Priority::High).await
    }

    /// Request a status snapshot (low priority)
    pub async fn send_status_sync(&self) -> Result<u16> {
        let device_id = self.shared.config.device_id;
        self.send(device_id, Command::StatusSync, &[], Priority::Low).await
    }

    /// Start a session sync
    ///
    /// The first request is sent before this returns. The outcome is reported
    /// through [`EventSink::on_sync_success`] or [`EventSink::on_sync_failed`].
    pub async fn start_session_sync(&self) -> Result<()> {
        if !self.is_running() {
            return Err(Error::NotRunning);
        }

        self.shared.stop_sync_timer();

        if self.shared.sync.start() == SyncStep::Send {
            info!("Starting session sync");
            if let Err(e) = self.shared.send_sync_request().await {
                warn!("Session sync request failed: {}", e);
            }
        }

        let period = self.shared.config.sync_interval;
        let task = tokio::spawn(sync_loop(self.shared.clone(), period));
        *self.shared.sync_task.lock() = Some(task);

        Ok(())
    }

    /// Abandon any session sync in progress
    pub fn cancel_session_sync(&self) {
        self.shared.stop_sync();
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            warn!("Link dropped while running");
            self.shared.running.store(false, Ordering::Release);
            self.shared.stop_sync();
            self.shared.stop_status();
            reader.abort();
        }
    }
}

impl Shared {
    async fn send_frame(
        &self,
        receiver_id: u16,
        sender_id: u16,
        cmd: u16,
        payload: &[u8],
        priority: Priority,
    ) -> Result<u16> {
        if self.connection_lost.load(Ordering::Acquire) {
            return Err(Error::ConnectionLost);
        }
        if !self.running.load(Ordering::Acquire) {
            return Err(Error::NotRunning);
        }

        let mut encoder = self.encoder.lock().await;
        let sequence = encoder.next_sequence();
        let bytes = encoder.build_frame(receiver_id, sender_id, cmd, payload)?;

        let attempts = match priority {
            Priority::High => 1 + self.config.write_retries,
            Priority::Low => 1,
        };

        for attempt in 1..=attempts {
            let result = {
                let mut transport = self.transport.lock().await;
                match timeout(self.config.write_timeout, transport.write(&bytes)).await {
                    Ok(result) => result,
                    Err(_) => Err(mpctl_transport::Error::WriteTimeout),
                }
            };

            match result {
                Ok(_) => {
                    drop(encoder);
                    trace!(cmd, seq = sequence, "Frame sent");
                    self.stats.lock().frames_sent += 1;
                    self.sink.on_frame_sent(cmd, sequence);
                    return Ok(sequence);
                }
                Err(e) if e.is_disconnect() => {
                    drop(encoder);
                    self.lose_connection(&e);
                    return Err(Error::ConnectionLost);
                }
                Err(e) if e.is_recoverable() && attempt < attempts => {
                    debug!(cmd, seq = sequence, attempt, "Write failed, retrying: {}", e);
                    sleep(self.config.retry_backoff).await;
                }
                Err(e) => {
                    self.stats.lock().send_failures += 1;
                    match priority {
                        Priority::High => warn!(cmd, seq = sequence, attempt, "Send failed: {}", e),
                        Priority::Low => debug!(cmd, seq = sequence, "Send failed: {}", e),
                    }
                    return Err(Error::SendFailed { attempts: attempt });
                }
            }
        }

        Err(Error::SendFailed { attempts })
    }

    async fn send_sync_request(&self) -> Result<u16> {
        let timestamp = chrono::Utc::now().timestamp() as u32;
        let payload = SessionSyncRequest::new(timestamp).encode();

        self.send_frame(
            0,
            0,
            Command::SessionSync.into(),
            &payload,
            Priority::High,
        )
        .await
    }

    async fn handle_frame(&self, frame: &Frame, decoder: &mut FrameDecoder) {
        trace!("Received: {}", frame);

        match dispatch::dispatch(frame) {
            Outcome::Event(event) => sink::deliver(self.sink.as_ref(), event),
            Outcome::Reply { receiver_id, cmd, payload } => {
                let sender_id = self.config.host_id;
                if let Err(e) = self
                    .send_frame(receiver_id, sender_id, cmd.into(), &payload, Priority::Low)
                    .await
                {
                    debug!("Reply {} not sent: {}", cmd, e);
                }
            }
            Outcome::SessionSyncAcked => {
                if self.sync.on_ack() {
                    self.stop_sync_timer();
                    decoder.reset_sequence();
                    info!("Session sync acknowledged");
                    self.sink.on_sync_success();
                }
            }
            Outcome::SequenceReset => debug!(seq = frame.sequence, "Peer restarted its sequence"),
            Outcome::Ignored => {}
        }
    }

    fn publish_stats(&self, decoder: &FrameDecoder) {
        let mut stats = self.stats.lock();
        stats.decoder = decoder.stats();
        stats.expected_sequence = decoder.tracker().expected_next();
        stats.missing_frames = decoder.tracker().missing_count();
    }

    /// Tear down after an unexpected disconnect; reported once
    fn lose_connection(&self, cause: &mpctl_transport::Error) {
        if self.connection_lost.swap(true, Ordering::AcqRel) {
            return;
        }

        warn!("Connection lost: {}", cause);

        self.running.store(false, Ordering::Release);
        self.stop_sync();
        self.stop_status();
        self.sink.on_connection_lost();
    }

    fn stop_sync_timer(&self) {
        if let Some(task) = self.sync_task.lock().take() {
            task.abort();
        }
    }

    fn stop_sync(&self) {
        self.stop_sync_timer();
        self.sync.cleanup();
    }

    fn stop_status(&self) {
        if let Some(task) = self.status_task.lock().take() {
            task.abort();
        }
    }
}

async fn read_loop(shared: Arc<Shared>, mut decoder: FrameDecoder) {
    debug!("Reader started");

    let mut failures = 0u32;

    while shared.running.load(Ordering::Acquire) {
        let chunk = {
            let mut transport = shared.transport.lock().await;
            if !transport.is_open() {
                Err(mpctl_transport::Error::ConnectionClosed)
            } else {
                match transport.bytes_available().await {
                    Ok(0) => Ok(None),
                    Ok(available) => transport.read(available).await.map(Some),
                    Err(e) => Err(e),
                }
            }
        };

        if chunk.is_ok() {
            failures = 0;
        }

        match chunk {
            Ok(Some(bytes)) if !bytes.is_empty() => {
                decoder.feed(&bytes);
                for frame in decoder.poll() {
                    shared.handle_frame(&frame, &mut decoder).await;
                }
                shared.publish_stats(&decoder);
            }
            Ok(_) => sleep(shared.config.read_poll_interval).await,
            Err(e) if e.is_disconnect() => {
                shared.lose_connection(&e);
                break;
            }
            Err(e) => {
                failures += 1;
                if failures >= shared.config.read_failure_limit {
                    warn!(failures, "Giving up on transport after repeated read errors");
                    shared.lose_connection(&e);
                    break;
                }
                warn!(failures, "Read failed: {}", e);
                sleep(shared.config.read_poll_interval).await;
            }
        }
    }

    debug!("Reader stopped");
}

async fn sync_loop(shared: Arc<Shared>, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);

    loop {
        ticker.tick().await;

        match shared.sync.on_tick() {
            SyncStep::Send => {
                if let Err(e) = shared.send_sync_request().await {
                    warn!("Session sync request failed: {}", e);
                }
            }
            SyncStep::Fail => {
                shared.sink.on_sync_failed();
                break;
            }
            SyncStep::Stop => break,
        }
    }
}

async fn status_loop(shared: Arc<Shared>, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    let device_id = shared.config.device_id;
    let host_id = shared.config.host_id;

    while shared.running.load(Ordering::Acquire) {
        ticker.tick().await;
        let _ = shared
            .send_frame(device_id, host_id, Command::StatusSync.into(), &[], Priority::Low)
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{ChannelSink, MockEventSink};
    use async_trait::async_trait;
    use bytes::{Bytes, BytesMut};
    use mockall::mock;
    use mockall::predicate::eq;
    use mpctl_transport::MemoryTransport;
    use mpctl_types::Event;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::mpsc::UnboundedReceiver;

    mock! {
        pub Line {}

        #[async_trait]
        impl Transport for Line {
            async fn open(&mut self) -> mpctl_transport::Result<()>;
            async fn close(&mut self) -> mpctl_transport::Result<()>;
            fn is_open(&self) -> bool;
            async fn write(&mut self, data: &[u8]) -> mpctl_transport::Result<usize>;
            async fn bytes_available(&mut self) -> mpctl_transport::Result<usize>;
            async fn read(&mut self, count: usize) -> mpctl_transport::Result<BytesMut>;
            fn port_name(&self) -> String;
        }
    }

    fn controller_frame(cmd: impl Into<u16>, sequence: u16, payload: &[u8]) -> Vec<u8> {
        Frame::with_payload(0, 1, cmd, sequence, payload.to_vec())
            .encode()
            .unwrap()
            .to_vec()
    }

    fn drain(events: &mut UnboundedReceiver<Event>) -> Vec<Event> {
        let mut drained = Vec::new();
        while let Ok(event) = events.try_recv() {
            drained.push(event);
        }
        drained
    }

    fn sent_commands(written: &[Bytes]) -> Vec<u16> {
        written
            .iter()
            .map(|bytes| Frame::decode(bytes).unwrap().cmd)
            .collect()
    }

    async fn started() -> (Link, mpctl_transport::MemoryPeer, UnboundedReceiver<Event>) {
        let (transport, peer) = MemoryTransport::pair();
        let (sink, events) = ChannelSink::new();
        let mut link = Link::new(transport, Arc::new(sink));
        link.start().await.unwrap();
        (link, peer, events)
    }

    #[tokio::test(start_paused = true)]
    async fn test_main_power_frame() {
        let (mut link, peer, mut events) = started().await;

        let sequence = link.send_main_power(true).await.unwrap();

        let written = peer.written();
        assert_eq!(written.len(), 1);
        let frame = Frame::decode(&written[0]).unwrap();
        assert_eq!(frame.receiver_id, 1);
        assert_eq!(frame.sender_id, 0);
        assert_eq!(frame.command(), Some(Command::MainPowerControl));
        assert_eq!(frame.sequence, sequence);
        assert_eq!(frame.payload.as_ref(), &[1]);

        assert_eq!(
            drain(&mut events),
            vec![Event::FrameSent { cmd: 0x0100, sequence: 0 }]
        );

        link.shutdown().await.unwrap();
        assert!(!peer.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequence_advances_across_commands() {
        let (mut link, peer, _events) = started().await;

        link.send_play_control(PlayState::Pause).await.unwrap();
        link.send_status_sync().await.unwrap();
        link.send_ping(1).await.unwrap();

        let sequences: Vec<u16> = peer
            .written()
            .iter()
            .map(|bytes| Frame::decode(bytes).unwrap().sequence)
            .collect();
        assert_eq!(sequences, vec![0, 1, 2]);

        link.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_inbound_ack_reaches_sink() {
        let (mut link, peer, mut events) = started().await;

        peer.inject(&controller_frame(0x8100u16, 0, &[1]));
        sleep(Duration::from_millis(50)).await;

        assert_eq!(drain(&mut events), vec![Event::PowerStatus(true)]);
        assert_eq!(link.stats().decoder.frames_decoded, 1);
        assert_eq!(link.stats().expected_sequence, 1);

        link.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_inbound_request_is_unknown_command() {
        let (mut link, peer, mut events) = started().await;

        peer.inject(&controller_frame(0x0100u16, 0, &[1]));
        sleep(Duration::from_millis(50)).await;

        assert_eq!(drain(&mut events), vec![Event::UnknownCommand(0x0100)]);

        link.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_ping_is_answered_with_pong() {
        let (mut link, peer, _events) = started().await;

        peer.inject(&controller_frame(Command::Ping, 0, &[7, 8]));
        sleep(Duration::from_millis(50)).await;

        let written = peer.written();
        assert_eq!(written.len(), 1);
        let pong = Frame::decode(&written[0]).unwrap();
        assert_eq!(pong.command(), Some(Command::Pong));
        assert_eq!(pong.receiver_id, 1);
        assert_eq!(pong.sender_id, 0);
        assert_eq!(pong.payload.as_ref(), &[7, 8]);

        link.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_sync_fails_after_retries() {
        let (mut link, peer, mut events) = started().await;

        link.start_session_sync().await.unwrap();
        assert_eq!(link.sync_state(), SyncState::Waiting);

        sleep(Duration::from_millis(1600)).await;

        let failures = drain(&mut events)
            .into_iter()
            .filter(|event| *event == Event::SyncFailed)
            .count();
        assert_eq!(failures, 1);
        assert_eq!(link.sync_state(), SyncState::Failed);

        let sync_requests = |written: &[Bytes]| {
            sent_commands(written)
                .into_iter()
                .filter(|cmd| *cmd == u16::from(Command::SessionSync))
                .count()
        };
        assert_eq!(sync_requests(&peer.written()), 3);

        // Timer is stopped
        sleep(Duration::from_millis(2000)).await;
        assert_eq!(sync_requests(&peer.written()), 3);
        assert!(drain(&mut events).is_empty());

        link.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_sync_request_layout() {
        let (mut link, peer, _events) = started().await;

        link.start_session_sync().await.unwrap();

        let written = peer.written();
        let frame = Frame::decode(&written[0]).unwrap();
        assert_eq!(frame.command(), Some(Command::SessionSync));
        assert_eq!(frame.receiver_id, 0);
        assert_eq!(frame.sender_id, 0);

        let request = SessionSyncRequest::decode(&frame.payload).unwrap();
        assert!(request.is_authorized());

        link.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_sync_ack_succeeds() {
        let (mut link, peer, mut events) = started().await;

        // Advance the inbound sequence so the reset is observable
        for seq in 0..4 {
            peer.inject(&controller_frame(Command::PlayControlAck, seq, &[1]));
            sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(link.stats().expected_sequence, 4);

        link.start_session_sync().await.unwrap();
        sleep(Duration::from_millis(100)).await;
        peer.inject(&controller_frame(Command::SessionSyncAck, 4, &[]));
        sleep(Duration::from_millis(50)).await;

        let drained = drain(&mut events);
        assert!(drained.contains(&Event::SyncSucceeded));
        assert!(!drained.contains(&Event::SyncFailed));
        assert_eq!(link.sync_state(), SyncState::Succeeded);

        // No resend after the ack
        sleep(Duration::from_millis(2000)).await;
        let sync_requests = sent_commands(&peer.written())
            .into_iter()
            .filter(|cmd| *cmd == u16::from(Command::SessionSync))
            .count();
        assert_eq!(sync_requests, 1);

        // Peer restarts numbering after the handshake
        peer.inject(&controller_frame(Command::PlayControlAck, 0, &[2]));
        sleep(Duration::from_millis(50)).await;
        assert!(drain(&mut events).contains(&Event::PlayControlStatus(2)));

        link.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_session_sync() {
        let (mut link, peer, mut events) = started().await;

        link.start_session_sync().await.unwrap();
        link.cancel_session_sync();
        sleep(Duration::from_millis(2000)).await;

        assert_eq!(link.sync_state(), SyncState::Idle);
        assert_eq!(peer.written().len(), 1);
        assert!(!drain(&mut events).contains(&Event::SyncFailed));

        link.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_high_priority_retries_write_timeouts() {
        let (mut link, peer, _events) = started().await;
        peer.fail_next_writes(2);

        let sequence = link.send_main_power(false).await.unwrap();

        assert_eq!(sequence, 0);
        assert_eq!(peer.attempted_writes(), 3);
        assert_eq!(peer.written().len(), 1);

        link.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_low_priority_single_attempt() {
        let (mut link, peer, mut events) = started().await;
        peer.fail_next_writes(1);

        let result = link.send_status_sync().await;

        assert!(matches!(result, Err(Error::SendFailed { attempts: 1 })));
        assert_eq!(peer.attempted_writes(), 1);
        assert_eq!(link.stats().send_failures, 1);
        assert!(drain(&mut events).is_empty());

        // The failed frame still consumed its sequence number
        assert_eq!(link.send_status_sync().await.unwrap(), 1);

        link.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_lost_reported_once() {
        let (mut link, peer, mut events) = started().await;
        link.start_session_sync().await.unwrap();

        peer.disconnect();
        sleep(Duration::from_millis(50)).await;

        assert!(!link.is_running());
        assert_eq!(link.sync_state(), SyncState::Idle);
        assert!(matches!(link.send_main_power(true).await, Err(Error::ConnectionLost)));

        sleep(Duration::from_millis(2000)).await;
        let lost = drain(&mut events)
            .into_iter()
            .filter(|event| *event == Event::ConnectionLost)
            .count();
        assert_eq!(lost, 1);

        link.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_poll_interval() {
        let (transport, peer) = MemoryTransport::pair();
        let (sink, _events) = ChannelSink::new();
        let config = LinkConfig::default().with_status_poll_interval(Duration::from_millis(100));
        let mut link = Link::with_config(transport, Arc::new(sink), config);
        link.start().await.unwrap();

        sleep(Duration::from_millis(350)).await;

        let commands = sent_commands(&peer.written());
        assert_eq!(commands, vec![0x0010, 0x0010, 0x0010]);

        link.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice() {
        let (mut link, _peer, _events) = started().await;

        assert!(matches!(link.start().await, Err(Error::AlreadyRunning)));

        link.shutdown().await.unwrap();
        assert!(matches!(link.shutdown().await, Err(Error::NotRunning)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_before_start() {
        let (transport, _peer) = MemoryTransport::pair();
        let (sink, _events) = ChannelSink::new();
        let link = Link::new(transport, Arc::new(sink));

        assert!(matches!(link.send_main_power(true).await, Err(Error::NotRunning)));
        assert!(matches!(link.start_session_sync().await, Err(Error::NotRunning)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_budget_exhausted() {
        let mut line = MockLine::new();
        line.expect_port_name().return_const("mock".to_string());
        line.expect_is_open().return_const(true);
        line.expect_bytes_available().returning(|| Ok(0));
        line.expect_write()
            .times(4)
            .returning(|_| Err(mpctl_transport::Error::WriteTimeout));
        line.expect_close().times(1).returning(|| Ok(()));

        let mut sink = MockEventSink::new();
        sink.expect_on_frame_sent().never();
        sink.expect_on_connection_lost().never();

        let mut link = Link::new(line, Arc::new(sink));
        link.start().await.unwrap();

        let result = link.send_main_power(true).await;
        assert!(matches!(result, Err(Error::SendFailed { attempts: 4 })));

        link.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_disconnect_loses_connection() {
        let mut line = MockLine::new();
        line.expect_port_name().return_const("mock".to_string());
        line.expect_is_open().return_const(true);
        line.expect_bytes_available().returning(|| Ok(0));
        line.expect_write()
            .times(1)
            .returning(|_| Err(mpctl_transport::Error::ConnectionClosed));
        line.expect_close().returning(|| Ok(()));

        let mut sink = MockEventSink::new();
        sink.expect_on_connection_lost().times(1).return_const(());

        let mut link = Link::new(line, Arc::new(sink));
        link.start().await.unwrap();

        assert!(matches!(
            link.send_play_control(PlayState::Stop).await,
            Err(Error::ConnectionLost)
        ));
        assert!(matches!(
            link.send_play_control(PlayState::Stop).await,
            Err(Error::ConnectionLost)
        ));

        link.shutdown().await.unwrap();
    }

    fn unplugged() -> mpctl_transport::Error {
        // EIO, as reported for a removed USB adapter
        mpctl_transport::Error::Io(std::io::Error::from_raw_os_error(5))
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_read_errors_lose_connection() {
        let mut line = MockLine::new();
        line.expect_port_name().return_const("mock".to_string());
        line.expect_is_open().return_const(true);
        line.expect_bytes_available().times(5).returning(|| Err(unplugged()));
        line.expect_close().times(1).returning(|| Ok(()));

        let (sink, mut events) = ChannelSink::new();
        let mut link = Link::new(line, Arc::new(sink));
        link.start().await.unwrap();

        sleep(Duration::from_secs(5)).await;

        assert!(!link.is_running());
        let lost = drain(&mut events)
            .into_iter()
            .filter(|event| *event == Event::ConnectionLost)
            .count();
        assert_eq!(lost, 1);
        assert!(matches!(link.send_main_power(true).await, Err(Error::ConnectionLost)));

        link.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_read_errors_are_tolerated() {
        let polls = Arc::new(AtomicUsize::new(0));
        let counter = polls.clone();

        let mut line = MockLine::new();
        line.expect_port_name().return_const("mock".to_string());
        line.expect_is_open().return_const(true);
        line.expect_bytes_available().returning(move || {
            // Every fourth poll succeeds, so the error streak never reaches the limit
            if counter.fetch_add(1, Ordering::SeqCst) % 4 == 3 {
                Ok(0)
            } else {
                Err(unplugged())
            }
        });
        line.expect_close().times(1).returning(|| Ok(()));

        let mut sink = MockEventSink::new();
        sink.expect_on_connection_lost().never();

        let mut link = Link::new(line, Arc::new(sink));
        link.start().await.unwrap();

        sleep(Duration::from_secs(1)).await;

        assert!(link.is_running());
        assert!(polls.load(Ordering::SeqCst) > 20);

        link.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_power_event_through_mock_sink() {
        let (transport, peer) = MemoryTransport::pair();

        let mut sink = MockEventSink::new();
        sink.expect_on_power_status().with(eq(false)).times(1).return_const(());

        let mut link = Link::new(transport, Arc::new(sink));
        link.start().await.unwrap();

        peer.inject(&controller_frame(Command::MainPowerControlAck, 0, &[0]));
        sleep(Duration::from_millis(50)).await;

        link.shutdown().await.unwrap();
    }
}
