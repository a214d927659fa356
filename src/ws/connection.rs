//! WebSocket connection pumps.
//!
//! Each connection runs a read pump (subscription commands, liveness
//! deadline) and a write pump (outbound buffer, pings) as two tasks joined
//! by a cancellation token: whichever side stops first stops the other.

use std::sync::{Arc, PoisonError};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::broadcaster::{Broadcaster, SharedSubscriptions};
use super::subscription::handle_client_text;

/// Per-connection timing.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionSettings {
    /// Interval between server pings; shorter than `read_timeout`.
    pub ping_interval: Duration,
    /// Longest allowed silence from the client (pongs count).
    pub read_timeout: Duration,
    /// Deadline for writing one frame.
    pub write_timeout: Duration,
    /// Largest accepted inbound frame in bytes.
    pub max_message_bytes: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(54),
            read_timeout: Duration::from_secs(60),
            write_timeout: Duration::from_secs(10),
            max_message_bytes: 512,
        }
    }
}

/// Serves one upgraded socket until either side closes it.
pub async fn run_connection(
    socket: WebSocket,
    broadcaster: Broadcaster,
    settings: ConnectionSettings,
) {
    let handle = match broadcaster.register().await {
        Ok(handle) => handle,
        Err(e) => {
            tracing::warn!(error = %e, "rejecting ws connection");
            return;
        }
    };
    let client = handle.id;
    tracing::debug!(%client, "ws client connected");

    let (ws_tx, ws_rx) = socket.split();
    let closed = broadcaster.shutdown_token().child_token();
    let writer = tokio::spawn(write_pump(ws_tx, handle.outbound, settings, closed.clone()));

    read_pump(ws_rx, &handle.subscriptions, settings, &closed).await;
    closed.cancel();
    broadcaster.unregister(client).await;
    if let Err(e) = writer.await {
        tracing::warn!(%client, error = %e, "ws write pump panicked");
    }
    tracing::debug!(%client, "ws client disconnected");
}

async fn read_pump(
    mut rx: SplitStream<WebSocket>,
    subscriptions: &SharedSubscriptions,
    settings: ConnectionSettings,
    closed: &CancellationToken,
) {
    loop {
        let next = tokio::select! {
            () = closed.cancelled() => break,
            next = tokio::time::timeout(settings.read_timeout, rx.next()) => next,
        };
        match next {
            Err(_) => {
                tracing::debug!("ws read deadline elapsed");
                break;
            }
            Ok(None | Some(Err(_)) | Some(Ok(Message::Close(_)))) => break,
            Ok(Some(Ok(Message::Text(text)))) => {
                if text.as_str().len() > settings.max_message_bytes {
                    tracing::warn!(len = text.as_str().len(), "ws frame over size limit");
                    break;
                }
                let mut subs = subscriptions
                    .write()
                    .unwrap_or_else(PoisonError::into_inner);
                handle_client_text(text.as_str(), &mut subs);
            }
            // Pongs, pings and binary frames only refresh the deadline.
            Ok(Some(Ok(_))) => {}
        }
    }
}

async fn write_pump(
    mut tx: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<Arc<str>>,
    settings: ConnectionSettings,
    closed: CancellationToken,
) {
    let mut ping = tokio::time::interval_at(
        Instant::now() + settings.ping_interval,
        settings.ping_interval,
    );
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let frame = tokio::select! {
            () = closed.cancelled() => {
                let _ = write(&mut tx, Message::Close(None), settings.write_timeout).await;
                break;
            }
            next = outbound.recv() => match next {
                Some(payload) => Message::text(payload.to_string()),
                None => {
                    // Dropped by the broadcaster (slow consumer or shutdown).
                    let _ = write(&mut tx, Message::Close(None), settings.write_timeout).await;
                    break;
                }
            },
            _ = ping.tick() => Message::Ping(Bytes::new()),
        };
        if !write(&mut tx, frame, settings.write_timeout).await {
            break;
        }
    }
    closed.cancel();
}

async fn write(
    tx: &mut SplitSink<WebSocket, Message>,
    frame: Message,
    deadline: Duration,
) -> bool {
    match tokio::time::timeout(deadline, tx.send(frame)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::debug!(error = %e, "ws write failed");
            false
        }
        Err(_) => {
            tracing::debug!("ws write deadline elapsed");
            false
        }
    }
}
