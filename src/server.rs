//! Connection Manager – accepts controller sockets and runs one handler
//! task per connection.
//!
//! Each handler streams the current snapshot (on version change or after
//! the keepalive interval) and feeds inbound command lines into the
//! [`CommandChannel`]. A handler failure is logged and terminates that
//! handler alone; the acceptor and every other connection keep running. A
//! bind failure surfaces to the caller so the bridge simply does not start.

use crate::channel::CommandChannel;
use crate::protocol::Command;
use crate::snapshot::SnapshotPublisher;
use crate::types::BridgeConfig;
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{interval, Instant, MissedTickBehavior};

pub struct ConnectionManager {
    listener: TcpListener,
    publisher: Arc<SnapshotPublisher>,
    channel: Arc<CommandChannel>,
    keepalive: Duration,
    poll: Duration,
}

impl ConnectionManager {
    /// Bind the accepting socket. A failure here (port already bound…) is
    /// returned, not paniced on — the host process continues without the
    /// bridge.
    pub async fn bind(
        addr: SocketAddr,
        publisher: Arc<SnapshotPublisher>,
        channel: Arc<CommandChannel>,
        config: &BridgeConfig,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind bridge socket on {addr}"))?;
        info!("bridge listening on {addr}");
        Ok(Self {
            listener,
            publisher,
            channel,
            keepalive: Duration::from_millis(config.keepalive_ms),
            poll: Duration::from_millis(config.poll_interval_ms.max(1)),
        })
    }

    /// Address the acceptor actually bound (port 0 resolves here).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("bridge listener has no local address")
    }

    /// Accept loop. Runs until the task is cancelled.
    pub async fn run(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    info!("controller connected from {peer}");
                    let publisher = Arc::clone(&self.publisher);
                    let channel = Arc::clone(&self.channel);
                    let keepalive = self.keepalive;
                    let poll = self.poll;
                    tokio::spawn(async move {
                        match connection_loop(stream, publisher, channel, keepalive, poll).await {
                            Ok(()) => info!("controller {peer} disconnected"),
                            Err(e) => info!("controller {peer} dropped: {e}"),
                        }
                    });
                }
                Err(e) => {
                    warn!("accept failed: {e}");
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            }
        }
    }
}

/// One connection: snapshot fan-out plus command ingestion, until EOF or
/// the first I/O error.
async fn connection_loop(
    stream: TcpStream,
    publisher: Arc<SnapshotPublisher>,
    channel: Arc<CommandChannel>,
    keepalive: Duration,
    poll: Duration,
) -> std::io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    // New controllers get the current state immediately.
    let (mut last_version, json) = publisher.latest();
    write_snapshot(&mut writer, &json).await?;
    let mut last_send = Instant::now();

    let mut ticker = interval(poll);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) => match Command::parse(&line) {
                        Some(command) => channel.push(command),
                        // Malformed lines are dropped, never fatal.
                        None => debug!("dropping malformed line: {line:?}"),
                    },
                    None => return Ok(()),
                }
            }
            _ = ticker.tick() => {
                let (version, json) = publisher.latest();
                if version != last_version || last_send.elapsed() >= keepalive {
                    write_snapshot(&mut writer, &json).await?;
                    last_version = version;
                    last_send = Instant::now();
                }
            }
        }
    }
}

async fn write_snapshot(writer: &mut OwnedWriteHalf, json: &str) -> std::io::Result<()> {
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}
