//! Drive a link against a simulated controller
//!
//! The controller side runs in-process over a memory transport and answers
//! session sync, power, play and status requests.

use std::sync::Arc;
use std::time::Duration;

use mpctl::{ChannelSink, Command, Frame, Link, LinkConfig, MemoryPeer, MemoryTransport, PlayState};
use mpctl_core::FrameEncoder;
use tokio::time::sleep;
use tracing::info;
use tracing_subscriber::EnvFilter;

const STATUS_PAYLOAD: [u8; 15] = [
    0, 12, 30, // 00:12:30
    0x00, 0x02, 0x00, 0x05, // round 2/5
    0x09, 0x60, 0x00, 0x96, // 24.00V 1.50A
    0x01, 0xF4, 0x03, 0xE8, // 500/1000ms
];

/// Answer every request the host has written so far
fn answer(peer: &MemoryPeer, encoder: &mut FrameEncoder) -> anyhow::Result<()> {
    for bytes in peer.take_written() {
        let request = Frame::decode(&bytes)?;

        let (ack, payload): (Command, &[u8]) = match request.command() {
            Some(Command::SessionSync) => (Command::SessionSyncAck, &[]),
            Some(Command::MainPowerControl) => (Command::MainPowerControlAck, request.payload.as_ref()),
            Some(Command::PlayControl) => (Command::PlayControlAck, request.payload.as_ref()),
            Some(Command::StatusSync) => (Command::StatusSyncAck, &STATUS_PAYLOAD[..]),
            _ => continue,
        };

        let reply = encoder.build_frame(request.sender_id, request.receiver_id, ack.into(), payload)?;
        peer.inject(&reply);

        // Numbering restarts once the session is re-established
        if ack == Command::SessionSyncAck {
            *encoder = FrameEncoder::new();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let (transport, peer) = MemoryTransport::pair();
    let (sink, mut events) = ChannelSink::new();

    let config = LinkConfig::default().with_status_poll_interval(Duration::from_millis(250));
    let mut link = Link::with_config(transport.with_name("simulated"), Arc::new(sink), config);
    link.start().await?;

    let controller = tokio::spawn(async move {
        let mut encoder = FrameEncoder::new();
        loop {
            if let Err(e) = answer(&peer, &mut encoder) {
                info!("Controller stopped: {}", e);
                break;
            }
            sleep(Duration::from_millis(5)).await;
        }
    });

    link.start_session_sync().await?;
    sleep(Duration::from_millis(50)).await;

    link.send_main_power(true).await?;
    link.send_play_control(PlayState::PlayRepeat).await?;
    sleep(Duration::from_millis(600)).await;

    while let Ok(event) = events.try_recv() {
        println!("{}", event);
    }

    println!("Session sync: {:?}", link.sync_state());
    println!("{:?}", link.stats());

    link.shutdown().await?;
    controller.abort();

    Ok(())
}
