//! WebSocket connection with a tokio mpsc command/event pattern.
//!
//! The socket task runs in a dedicated tokio task. External code drives it
//! through a typed command channel and observes it through a typed event
//! channel, keeping the transport fully asynchronous and decoupled from
//! conversation state.
//!
//! There is no automatic reconnect: a dropped connection surfaces as a
//! [`SocketEvent::Disconnected`] and a state change, and a new connection
//! is only established by an explicit [`connect`] call.

use std::sync::{Arc, Mutex};

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

use tally_shared::constants::CHANNEL_CAPACITY;
use tally_shared::protocol::{SendFrame, ServerFrame};
use tally_shared::types::ConnectionState;

/// Commands sent *into* the socket task.
#[derive(Debug)]
pub enum SocketCommand {
    /// Transmit a send frame to the server.
    Send(SendFrame),
    /// Tear the connection down.
    Close,
}

/// Events sent *from* the socket task to the engine.
#[derive(Debug, Clone)]
pub enum SocketEvent {
    /// The connection handshake completed.
    Connected,
    /// A well-formed server frame arrived.
    Frame(ServerFrame),
    /// The connection dropped or was closed.
    Disconnected,
}

/// Handle to a socket task.
///
/// Cloneable; all clones drive the same underlying connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    cmd_tx: mpsc::Sender<SocketCommand>,
    state: Arc<Mutex<ConnectionState>>,
}

impl ConnectionHandle {
    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.lock().expect("connection state lock poisoned")
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Request transmission of a frame.
    ///
    /// Dropped (not queued) unless the connection is live; there is no
    /// offline buffering.
    pub async fn send(&self, frame: SendFrame) {
        if !self.is_connected() {
            debug!(receiver = %frame.receiver_id, "Transport not connected, dropping send frame");
            return;
        }
        if self.cmd_tx.send(SocketCommand::Send(frame)).await.is_err() {
            debug!("Socket task gone, dropping send frame");
        }
    }

    /// Request teardown. Idempotent; a second call is a no-op.
    pub async fn close(&self) {
        let _ = self.cmd_tx.send(SocketCommand::Close).await;
    }
}

/// Open a WebSocket to `ws_url` and spawn its socket task.
///
/// Returns the command handle and the event receiver. The handshake is
/// awaited here, so a returned handle starts in the `Connected` state and
/// the first event on the receiver is [`SocketEvent::Connected`].
pub async fn connect(
    ws_url: &str,
) -> anyhow::Result<(ConnectionHandle, mpsc::Receiver<SocketEvent>)> {
    let state = Arc::new(Mutex::new(ConnectionState::Connecting));

    let (ws_stream, _) = connect_async(ws_url)
        .await
        .map_err(|e| anyhow::anyhow!("WebSocket connect failed: {e}"))?;

    *state.lock().expect("connection state lock poisoned") = ConnectionState::Connected;
    info!(url = %ws_url, "WebSocket connected");

    let (mut write, mut read) = ws_stream.split();
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<SocketCommand>(CHANNEL_CAPACITY);
    let (event_tx, event_rx) = mpsc::channel::<SocketEvent>(CHANNEL_CAPACITY);

    let task_state = state.clone();
    tokio::spawn(async move {
        let _ = event_tx.send(SocketEvent::Connected).await;

        loop {
            tokio::select! {
                // --- Outbound commands ---
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(SocketCommand::Send(frame)) => {
                            let raw = match frame.encode() {
                                Ok(raw) => raw,
                                Err(e) => {
                                    error!(error = %e, "Failed to encode send frame");
                                    continue;
                                }
                            };
                            if let Err(e) = write.send(WsMessage::Text(raw)).await {
                                error!(error = %e, "WebSocket send failed");
                                break;
                            }
                        }
                        Some(SocketCommand::Close) => {
                            info!("Connection close requested");
                            let _ = write.send(WsMessage::Close(None)).await;
                            break;
                        }
                        None => {
                            // All handles dropped.
                            debug!("Command channel closed, shutting down socket task");
                            break;
                        }
                    }
                }

                // --- Inbound frames ---
                incoming = read.next() => {
                    match incoming {
                        Some(Ok(WsMessage::Text(raw))) => {
                            match ServerFrame::decode(&raw) {
                                Ok(frame) => {
                                    let _ = event_tx.send(SocketEvent::Frame(frame)).await;
                                }
                                Err(e) => {
                                    // Malformed frames are dropped; the
                                    // connection stays alive.
                                    warn!(error = %e, len = raw.len(), "Dropping malformed frame");
                                }
                            }
                        }
                        Some(Ok(WsMessage::Close(_))) => {
                            info!("Server closed the connection");
                            break;
                        }
                        Some(Ok(_)) => {
                            // Binary/ping/pong frames carry no chat payload.
                        }
                        Some(Err(e)) => {
                            warn!(error = %e, "WebSocket read error");
                            break;
                        }
                        None => {
                            info!("WebSocket stream ended");
                            break;
                        }
                    }
                }
            }
        }

        *task_state.lock().expect("connection state lock poisoned") =
            ConnectionState::Disconnected;
        let _ = event_tx.send(SocketEvent::Disconnected).await;
        info!("Socket task terminated");
    });

    Ok((ConnectionHandle { cmd_tx, state }, event_rx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_shared::types::UserId;

    fn test_handle(state: ConnectionState) -> (ConnectionHandle, mpsc::Receiver<SocketCommand>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(1);
        let handle = ConnectionHandle {
            cmd_tx,
            state: Arc::new(Mutex::new(state)),
        };
        (handle, cmd_rx)
    }

    #[tokio::test]
    async fn test_send_is_dropped_when_not_connected() {
        let (handle, mut cmd_rx) = test_handle(ConnectionState::Disconnected);

        handle
            .send(SendFrame {
                receiver_id: UserId(2),
                content: "hi".to_string(),
            })
            .await;

        // No command was issued to the socket task.
        assert!(cmd_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_send_is_forwarded_when_connected() {
        let (handle, mut cmd_rx) = test_handle(ConnectionState::Connected);

        handle
            .send(SendFrame {
                receiver_id: UserId(2),
                content: "hi".to_string(),
            })
            .await;

        match cmd_rx.try_recv() {
            Ok(SocketCommand::Send(frame)) => assert_eq!(frame.receiver_id, UserId(2)),
            other => panic!("expected a send command, got {other:?}"),
        }
    }
}
