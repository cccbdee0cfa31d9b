use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use office_shared::protocol::{ClientMsg, ContentKind, ServerMsg};

use crate::config::ClientConfig;

#[derive(Debug, Clone)]
pub enum NetEvent {
    Connected,
    Disconnected,
    Message(ServerMsg),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

/// Outbound half of a connection, as seen by the publisher.
pub trait Transport {
    fn is_open(&self) -> bool;
    /// Fire and forget.
    fn send(&self, msg: ClientMsg);
}

type CmdSender = tokio::sync::mpsc::UnboundedSender<ClientMsg>;

/// Client side of the relay connection.
///
/// The socket lives on a dedicated network thread. The cooperative tick
/// drains what it observed with [`ServerConnection::poll_events`] and queues
/// outbound messages with [`Transport::send`].
pub struct ServerConnection {
    pub state: ConnectionState,
    open: Arc<AtomicBool>,
    event_rx: Receiver<NetEvent>,
    cmd_tx: CmdSender,
}

impl ServerConnection {
    pub fn connect(config: &ClientConfig) -> Self {
        let (event_tx, event_rx) = mpsc::channel::<NetEvent>();
        let open = Arc::new(AtomicBool::new(false));
        let cmd_tx = spawn_native_network_thread(config, event_tx, Arc::clone(&open));

        Self {
            state: ConnectionState::Connecting,
            open,
            event_rx,
            cmd_tx,
        }
    }

    pub fn poll_events(&mut self) -> Vec<NetEvent> {
        let mut out = Vec::new();
        while let Ok(evt) = self.event_rx.try_recv() {
            match evt {
                NetEvent::Connected => self.state = ConnectionState::Connected,
                NetEvent::Disconnected => self.state = ConnectionState::Disconnected,
                NetEvent::Message(_) => {}
            }
            out.push(evt);
        }
        out
    }

    pub fn send_content(&self, kind: ContentKind, data: String) {
        self.send(ClientMsg::content(kind, data));
    }

    /// A connection with no network thread behind it. The returned handles
    /// stand in for the socket.
    #[cfg(test)]
    pub(crate) fn test_stub() -> (Self, TestStub) {
        let (event_tx, event_rx) = mpsc::channel();
        let (cmd_tx, sent) = tokio::sync::mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(false));
        let conn = Self {
            state: ConnectionState::Connecting,
            open: Arc::clone(&open),
            event_rx,
            cmd_tx,
        };
        (
            conn,
            TestStub {
                events: event_tx,
                sent,
                open,
            },
        )
    }
}

#[cfg(test)]
pub(crate) struct TestStub {
    pub(crate) events: Sender<NetEvent>,
    pub(crate) sent: tokio::sync::mpsc::UnboundedReceiver<ClientMsg>,
    pub(crate) open: Arc<AtomicBool>,
}

impl Transport for ServerConnection {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn send(&self, msg: ClientMsg) {
        let _ = self.cmd_tx.send(msg);
    }
}

fn spawn_native_network_thread(
    config: &ClientConfig,
    event_tx: Sender<NetEvent>,
    open: Arc<AtomicBool>,
) -> CmdSender {
    use futures_util::{SinkExt, StreamExt};
    use tokio_tungstenite::tungstenite::Message;

    let (cmd_tx, mut cmd_rx) = tokio::sync::mpsc::unbounded_channel::<ClientMsg>();
    let url = config.url.to_string();
    let initial_delay = config.reconnect_initial;
    let max_delay = config.reconnect_max;

    std::thread::spawn(move || {
        let rt = match tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_io()
            .enable_time()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                tracing::error!("Failed to build network runtime: {}", e);
                return;
            }
        };

        rt.block_on(async move {
            let mut reconnect_delay = initial_delay;

            loop {
                let (ws_stream, _) = match tokio_tungstenite::connect_async(url.as_str()).await {
                    Ok(x) => x,
                    Err(e) => {
                        tracing::debug!("Connect to {} failed: {}", url, e);
                        if cmd_rx.is_closed() {
                            return;
                        }
                        tokio::time::sleep(reconnect_delay).await;
                        reconnect_delay = reconnect_delay.mul_f32(1.5).min(max_delay);
                        continue;
                    }
                };

                reconnect_delay = initial_delay;
                // Anything queued while we were down is stale.
                while cmd_rx.try_recv().is_ok() {}
                open.store(true, Ordering::Release);
                if event_tx.send(NetEvent::Connected).is_err() {
                    return;
                }
                tracing::info!("Connected to {}", url);

                let (mut write, mut read) = ws_stream.split();

                loop {
                    tokio::select! {
                        biased;

                        cmd = cmd_rx.recv() => {
                            let Some(cmd) = cmd else {
                                // Connection handle dropped: hang up.
                                open.store(false, Ordering::Release);
                                let _ = write.close().await;
                                return;
                            };
                            match cmd.encode() {
                                Ok(text) => {
                                    if write.send(Message::Text(text.into())).await.is_err() {
                                        break;
                                    }
                                }
                                Err(e) => tracing::error!("Failed to encode outbound message: {}", e),
                            }
                        }

                        msg = read.next() => {
                            match msg {
                                Some(Ok(Message::Text(txt))) => match ServerMsg::decode(txt.as_str()) {
                                    Ok(server_msg) => {
                                        if event_tx.send(NetEvent::Message(server_msg)).is_err() {
                                            return;
                                        }
                                    }
                                    Err(e) => tracing::warn!("Dropping inbound message: {}", e),
                                },
                                Some(Ok(Message::Close(_))) => break,
                                Some(Ok(_)) => {}
                                Some(Err(e)) => {
                                    tracing::debug!("Read error: {}", e);
                                    break;
                                }
                                None => break,
                            }
                        }
                    }
                }

                open.store(false, Ordering::Release);
                tracing::warn!("Disconnected from {}", url);
                if event_tx.send(NetEvent::Disconnected).is_err() {
                    return;
                }
                tokio::time::sleep(reconnect_delay).await;
                reconnect_delay = reconnect_delay.mul_f32(1.5).min(max_delay);
            }
        });
    });

    cmd_tx
}
