//! Command dispatch table
//!
//! Maps exact command codes (request and acknowledgment variants are separate
//! entries) to handlers. Handlers are pure: they decode the payload and return
//! an [`Outcome`] describing what the caller should do. Side effects such as
//! sending a reply or stopping the sync timer belong to the caller.

use bytes::Bytes;
use tracing::{debug, trace};

use mpctl_types::Event;

use crate::{auth, command::Command, frame::Frame, payload};

/// Result of handling one inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Hand an event to the sink
    Event(Event),

    /// Send a reply frame
    Reply {
        receiver_id: u16,
        cmd: Command,
        payload: Bytes,
    },

    /// Authorized session-sync request; sequence tracking was restarted
    SequenceReset,

    /// Session-sync acknowledgment received
    SessionSyncAcked,

    /// Nothing to do
    Ignored,
}

/// Handler signature
pub type Handler = fn(&Frame) -> Outcome;

static COMMAND_TABLE: &[(Command, Handler)] = &[
    (Command::Ping, handle_ping),
    (Command::FileReceive, handle_unimplemented),
    (Command::Config, handle_unimplemented),
    (Command::StatusSyncAck, handle_status_sync_ack),
    (Command::MainPowerControlAck, handle_main_power_ack),
    (Command::PlayControlAck, handle_play_control_ack),
    (Command::SessionSync, handle_session_sync),
    (Command::SessionSyncAck, handle_session_sync_ack),
];

/// Find the handler registered for an exact command code
pub fn lookup(cmd: u16) -> Option<Handler> {
    COMMAND_TABLE
        .iter()
        .find(|(command, _)| u16::from(*command) == cmd)
        .map(|(_, handler)| *handler)
}

/// Route a validated frame to its handler
///
/// Codes without a table entry produce [`Event::UnknownCommand`].
pub fn dispatch(frame: &Frame) -> Outcome {
    match lookup(frame.cmd) {
        Some(handler) => handler(frame),
        None => {
            debug!(cmd = format_args!("0x{:04X}", frame.cmd), "Unknown command");
            Outcome::Event(Event::UnknownCommand(frame.cmd))
        }
    }
}

fn handle_ping(frame: &Frame) -> Outcome {
    Outcome::Reply {
        receiver_id: frame.sender_id,
        cmd: Command::Pong,
        payload: frame.payload.clone(),
    }
}

fn handle_unimplemented(frame: &Frame) -> Outcome {
    trace!(cmd = format_args!("0x{:04X}", frame.cmd), "Command not implemented, ignoring");
    Outcome::Ignored
}

fn handle_status_sync_ack(frame: &Frame) -> Outcome {
    match payload::decode_status_snapshot(&frame.payload) {
        Ok(snapshot) => Outcome::Event(Event::StatusSnapshot(snapshot)),
        Err(e) => ignore_underflow(e),
    }
}

fn handle_main_power_ack(frame: &Frame) -> Outcome {
    match payload::decode_power_status(&frame.payload) {
        Ok(on) => Outcome::Event(Event::PowerStatus(on)),
        Err(e) => ignore_underflow(e),
    }
}

fn handle_play_control_ack(frame: &Frame) -> Outcome {
    match payload::decode_play_status(&frame.payload) {
        Ok(state) => Outcome::Event(Event::PlayControlStatus(state)),
        Err(e) => ignore_underflow(e),
    }
}

fn handle_session_sync(frame: &Frame) -> Outcome {
    if auth::is_authorized_sync(&frame.payload) {
        Outcome::SequenceReset
    } else {
        debug!(seq = frame.sequence, "Session sync request rejected");
        Outcome::Ignored
    }
}

fn handle_session_sync_ack(_frame: &Frame) -> Outcome {
    Outcome::SessionSyncAcked
}

fn ignore_underflow(e: crate::Error) -> Outcome {
    debug!(error = %e, "Dropping short payload");
    Outcome::Ignored
}
