use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{Sink, SinkExt, StreamExt};
use office_shared::protocol::{ClientMsg, ContentKind, ServerMsg};
use tokio::sync::{mpsc, oneshot};

use crate::config::ServerConfig;
use crate::registry::Admission;
use crate::relay::RelayCommand;

/// Per-connection limits, copied out of [`ServerConfig`].
#[derive(Debug, Clone, Copy)]
pub struct ConnectionLimits {
    pub outbound_queue_capacity: usize,
    pub max_message_bytes: usize,
    pub max_moves_per_sec: u32,
    pub max_parse_errors: u32,
    pub ping_interval: Duration,
    pub idle_timeout: Duration,
    pub write_timeout: Duration,
}

impl From<&ServerConfig> for ConnectionLimits {
    fn from(config: &ServerConfig) -> Self {
        Self {
            outbound_queue_capacity: config.outbound_queue_capacity,
            max_message_bytes: config.max_message_bytes,
            max_moves_per_sec: config.max_moves_per_sec,
            max_parse_errors: config.max_parse_errors,
            ping_interval: Duration::from_secs(config.ping_interval_secs),
            idle_timeout: Duration::from_secs(config.idle_timeout_secs),
            write_timeout: Duration::from_secs(config.write_timeout_secs),
        }
    }
}

/// Shared app state passed to each WebSocket handler
#[derive(Clone)]
pub struct AppState {
    pub relay_tx: mpsc::Sender<RelayCommand>,
    pub limits: ConnectionLimits,
}

/// HTTP handler for WebSocket upgrade
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<AppState>,
) -> impl IntoResponse {
    let max = app_state.limits.max_message_bytes;
    ws.max_message_size(max)
        .max_frame_size(max)
        .on_upgrade(|socket| handle_socket(socket, app_state))
}

/// Fixed one-second window counter for inbound `move`s.
struct MoveRate {
    limit: u32,
    window_start: Instant,
    count: u32,
}

impl MoveRate {
    fn new(limit: u32, now: Instant) -> Self {
        Self {
            limit,
            window_start: now,
            count: 0,
        }
    }

    fn allow(&mut self, now: Instant) -> bool {
        if now.duration_since(self.window_start) >= Duration::from_secs(1) {
            self.window_start = now;
            self.count = 0;
        }
        if self.count < self.limit {
            self.count += 1;
            true
        } else {
            false
        }
    }
}

/// Write one frame, giving up if the peer stops draining its socket.
async fn send_within<S>(sink: &mut S, msg: Message, limit: Duration) -> bool
where
    S: Sink<Message> + Unpin,
{
    matches!(tokio::time::timeout(limit, sink.send(msg)).await, Ok(Ok(())))
}

async fn send_server_msg<S>(sink: &mut S, msg: &ServerMsg, limit: Duration) -> bool
where
    S: Sink<Message> + Unpin,
{
    match msg.encode() {
        Ok(json) => send_within(sink, Message::Text(json.into()), limit).await,
        Err(e) => {
            tracing::error!("Failed to encode outbound message: {}", e);
            true
        }
    }
}

async fn send_greeting<S>(sink: &mut S, greeting: &[ServerMsg], limit: Duration) -> bool
where
    S: Sink<Message> + Unpin,
{
    for msg in greeting {
        if !send_server_msg(sink, msg, limit).await {
            return false;
        }
    }
    true
}

async fn handle_socket(socket: WebSocket, app_state: AppState) {
    let limits = app_state.limits;
    let (mut sink, mut stream) = socket.split();

    // Register with the relay. The greeting comes back with the identity;
    // everything after it arrives through the outbound queue.
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<ServerMsg>(limits.outbound_queue_capacity);
    let (resp_tx, resp_rx) = oneshot::channel();
    if app_state
        .relay_tx
        .send(RelayCommand::Join {
            outbound: outbound_tx,
            response: resp_tx,
        })
        .await
        .is_err()
    {
        tracing::error!("Failed to send Join command");
        return;
    }

    let Ok(Admission { id: my_id, greeting }) = resp_rx.await else {
        tracing::error!("Failed to receive identity");
        return;
    };

    tracing::info!("Participant {} connected", my_id.short());

    let greeted = send_greeting(&mut sink, &greeting, limits.write_timeout).await;

    let mut move_rate = MoveRate::new(limits.max_moves_per_sec, Instant::now());
    let mut parse_errors = 0u32;
    let mut last_seen = Instant::now();
    let mut ping = tokio::time::interval_at(
        tokio::time::Instant::now() + limits.ping_interval,
        limits.ping_interval,
    );
    ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        if !greeted {
            break;
        }
        tokio::select! {
            // Client -> Server
            msg = stream.next() => {
                let frame = match msg {
                    Some(Ok(frame)) => frame,
                    Some(Err(e)) => {
                        tracing::debug!("Participant {} read error: {}", my_id.short(), e);
                        break;
                    }
                    None => break,
                };
                last_seen = Instant::now();

                let text = match frame {
                    Message::Text(text) => text,
                    Message::Close(_) => break,
                    _ => continue, // Ignore ping/pong/binary
                };

                let cmd = match ClientMsg::decode(text.as_str()) {
                    Ok(ClientMsg::Move(msg)) => {
                        if !move_rate.allow(Instant::now()) {
                            tracing::debug!("Participant {} over move rate", my_id.short());
                            continue;
                        }
                        RelayCommand::Move { id: my_id.clone(), msg }
                    }
                    Ok(ClientMsg::Whiteboard(upload)) => RelayCommand::Content {
                        id: my_id.clone(),
                        kind: ContentKind::Whiteboard,
                        data: upload.data,
                    },
                    Ok(ClientMsg::Laptop(upload)) => RelayCommand::Content {
                        id: my_id.clone(),
                        kind: ContentKind::Laptop,
                        data: upload.data,
                    },
                    Err(e) => {
                        parse_errors += 1;
                        tracing::warn!(
                            "Participant {} sent undecodable frame ({}/{}): {}",
                            my_id.short(),
                            parse_errors,
                            limits.max_parse_errors,
                            e
                        );
                        if parse_errors >= limits.max_parse_errors {
                            break;
                        }
                        continue;
                    }
                };
                if app_state.relay_tx.send(cmd).await.is_err() {
                    break;
                }
            }

            // Relay -> Client
            out = outbound_rx.recv() => {
                let Some(msg) = out else {
                    // The relay dropped our queue: we were evicted.
                    tracing::warn!("Participant {} evicted by relay", my_id.short());
                    break;
                };
                if !send_server_msg(&mut sink, &msg, limits.write_timeout).await {
                    break;
                }
            }

            _ = ping.tick() => {
                if last_seen.elapsed() >= limits.idle_timeout {
                    tracing::info!("Participant {} timed out", my_id.short());
                    break;
                }
                if !send_within(&mut sink, Message::Ping(Vec::<u8>::new().into()), limits.write_timeout).await {
                    break;
                }
            }
        }
    }

    // Peers hear `left` even if the close handshake stalls.
    let _ = app_state
        .relay_tx
        .send(RelayCommand::Leave { id: my_id.clone() })
        .await;
    let _ = tokio::time::timeout(limits.write_timeout, sink.close()).await;
    tracing::info!("Participant {} disconnected", my_id.short());
}
