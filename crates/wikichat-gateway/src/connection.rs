use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use wikichat_types::DEFAULT_ANONYMOUS_NAME;
use wikichat_types::events::ChatFrame;

use crate::dispatcher::{BroadcastDispatcher, PublishReport};
use crate::registry::{ConnectionId, Payload};

/// Per-connection limits for the real-time gateway.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Frames that may wait for one client before it counts as failed.
    pub outbound_capacity: usize,
    /// Upper bound on a single socket send.
    pub send_timeout: Duration,
    /// Ping cadence; two missed Pongs drop the connection.
    pub heartbeat_interval: Duration,
    pub anonymous_name: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: 64,
            send_timeout: Duration::from_secs(5),
            heartbeat_interval: Duration::from_secs(15),
            anonymous_name: DEFAULT_ANONYMOUS_NAME.to_string(),
        }
    }
}

/// Drive one upgraded WebSocket until it closes or fails.
///
/// The connection becomes active when it is registered and closes when its
/// registration is dropped, whichever side ends first.
pub async fn handle_connection(
    socket: WebSocket,
    dispatcher: BroadcastDispatcher,
    config: Arc<ConnectionConfig>,
) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Payload>(config.outbound_capacity.max(1));

    let registration = dispatcher.registry().register_scoped(outbound_tx);
    let conn_id = registration.id();
    info!(
        "Connection {} joined the chat ({} live)",
        conn_id,
        dispatcher.registry().len()
    );

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received;

    let send_timeout = config.send_timeout;
    let heartbeat_interval = config.heartbeat_interval;

    // Queue -> socket, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(heartbeat_interval);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                payload = outbound_rx.recv() => {
                    let Some(payload) = payload else {
                        debug!("Connection {} outbound queue closed", conn_id);
                        break;
                    };
                    let msg = Message::Text(payload.to_string().into());
                    if !send_bounded(&mut sender, msg, send_timeout, conn_id).await {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Connection {} missed {} pongs, dropping it", conn_id, missed_heartbeats);
                            break;
                        }
                    }
                    if !send_bounded(&mut sender, Message::Ping(Bytes::new()), send_timeout, conn_id).await {
                        break;
                    }
                }
            }
        }

        let _ = tokio::time::timeout(send_timeout, sender.close()).await;
    });

    // Socket -> dispatcher
    let recv_dispatcher = dispatcher.clone();
    let recv_config = config.clone();
    let mut recv_task = tokio::spawn(async move {
        let sender_id = conn_id.to_string();
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    handle_text(&recv_dispatcher, &sender_id, &recv_config.anonymous_name, &text);
                }
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    drop(registration);
    info!(
        "Connection {} left the chat ({} live)",
        conn_id,
        dispatcher.registry().len()
    );
}

/// Parse one inbound text frame and publish it.
///
/// Returns `None` when the frame was ignored.
pub fn handle_text(
    dispatcher: &BroadcastDispatcher,
    sender_id: &str,
    anonymous_name: &str,
    text: &str,
) -> Option<PublishReport> {
    let frame = match serde_json::from_str::<ChatFrame>(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(
                "{} sent a bad frame: {} -- raw: {}",
                sender_id,
                e,
                truncate(text, 200)
            );
            return None;
        }
    };

    if frame.body.trim().is_empty() {
        debug!("{} sent an empty message, ignoring", sender_id);
        return None;
    }

    let frame = frame.with_defaults(sender_id, anonymous_name);
    Some(dispatcher.publish(&frame))
}

async fn send_bounded(
    sender: &mut SplitSink<WebSocket, Message>,
    msg: Message,
    limit: Duration,
    conn_id: ConnectionId,
) -> bool {
    match tokio::time::timeout(limit, sender.send(msg)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            debug!("Connection {} send failed: {}", conn_id, e);
            false
        }
        Err(_) => {
            warn!("Connection {} send timed out after {:?}", conn_id, limit);
            false
        }
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
