//! Event delivery
//!
//! The link reports everything through an [`EventSink`]. Calls are made from
//! the link's background tasks and must not block.

use tokio::sync::mpsc;

use mpctl_types::{Event, StatusSnapshot};

/// Consumer of link events
///
/// Every method has a no-op default, so consumers only implement what they
/// display.
#[cfg_attr(test, mockall::automock)]
pub trait EventSink: Send + Sync {
    fn on_power_status(&self, _on: bool) {}

    fn on_status_snapshot(&self, _snapshot: StatusSnapshot) {}

    fn on_play_control_status(&self, _state: u8) {}

    fn on_unknown_command(&self, _cmd: u16) {}

    fn on_sync_success(&self) {}

    fn on_sync_failed(&self) {}

    /// Reported at most once per link
    fn on_connection_lost(&self) {}

    /// A frame reached the transport
    fn on_frame_sent(&self, _cmd: u16, _sequence: u16) {}
}

/// Route an [`Event`] to the matching sink method
pub fn deliver(sink: &dyn EventSink, event: Event) {
    match event {
        Event::PowerStatus(on) => sink.on_power_status(on),
        Event::StatusSnapshot(snapshot) => sink.on_status_snapshot(snapshot),
        Event::PlayControlStatus(state) => sink.on_play_control_status(state),
        Event::UnknownCommand(cmd) => sink.on_unknown_command(cmd),
        Event::SyncSucceeded => sink.on_sync_success(),
        Event::SyncFailed => sink.on_sync_failed(),
        Event::ConnectionLost => sink.on_connection_lost(),
        Event::FrameSent { cmd, sequence } => sink.on_frame_sent(cmd, sequence),
    }
}

/// Sink that forwards every event into an unbounded channel
///
/// Sending never blocks; events are dropped once the receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Event>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn push(&self, event: Event) {
        let _ = self.tx.send(event);
    }
}

impl EventSink for ChannelSink {
    fn on_power_status(&self, on: bool) {
        self.push(Event::PowerStatus(on));
    }

    fn on_status_snapshot(&self, snapshot: StatusSnapshot) {
        self.push(Event::StatusSnapshot(snapshot));
    }

    fn on_play_control_status(&self, state: u8) {
        self.push(Event::PlayControlStatus(state));
    }

    fn on_unknown_command(&self, cmd: u16) {
        self.push(Event::UnknownCommand(cmd));
    }

    fn on_sync_success(&self) {
        self.push(Event::SyncSucceeded);
    }

    fn on_sync_failed(&self) {
        self.push(Event::SyncFailed);
    }

    fn on_connection_lost(&self) {
        self.push(Event::ConnectionLost);
    }

    fn on_frame_sent(&self, cmd: u16, sequence: u16) {
        self.push(Event::FrameSent { cmd, sequence });
    }
}
