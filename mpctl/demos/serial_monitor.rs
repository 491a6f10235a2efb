//! Connect to a controller and print everything it reports
//!
//! Set `MPCTL_PORT` to a serial device (`/dev/ttyUSB0`, `COM3`) or to a
//! `host:port` serial bridge.

use std::sync::Arc;
use std::time::Duration;

use mpctl::{ChannelSink, Link, LinkConfig, SerialTransport, TcpTransport, Transport};
use tracing_subscriber::EnvFilter;

fn transport_for(port: &str) -> Box<dyn Transport> {
    if let Some((host, tcp_port)) = port.rsplit_once(':') {
        if let Ok(tcp_port) = tcp_port.parse::<u16>() {
            return Box::new(TcpTransport::new(host, tcp_port));
        }
    }
    Box::new(SerialTransport::new(port))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let port = std::env::var("MPCTL_PORT").unwrap_or_else(|_| "/dev/ttyUSB0".to_string());

    let config = LinkConfig::default().with_status_poll_interval(Duration::from_secs(1));
    let (sink, mut events) = ChannelSink::new();
    let mut link = Link::with_config(transport_for(&port), Arc::new(sink), config);

    link.start().await?;
    link.start_session_sync().await?;

    println!("Listening on {} for 30 seconds...", port);

    let deadline = tokio::time::sleep(Duration::from_secs(30));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            event = events.recv() => match event {
                Some(event) => println!("{}", event),
                None => break,
            },
        }
    }

    let stats = link.stats();
    println!(
        "Decoded {} frames, {} CRC failures, {} lost",
        stats.decoder.frames_decoded, stats.decoder.crc_failures, stats.missing_frames
    );

    link.shutdown().await?;

    Ok(())
}
