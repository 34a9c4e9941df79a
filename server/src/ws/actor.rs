use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};

use crate::auth::Identity;
use crate::state::AppState;
use crate::ws::broadcast;
use crate::ws::connection::{Connection, DeliveryError};
use crate::ws::lifecycle;

/// Ping interval: server sends WebSocket ping every 30 seconds.
/// Detects peers that vanished without a close frame.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Pong timeout: if pong not received within 10 seconds after ping, close.
const PONG_TIMEOUT: Duration = Duration::from_secs(10);

/// How long the writer gets to flush a server-initiated close frame.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Why the reader loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    ClientClosed,
    StreamEnded,
    ReceiveError,
    CloseRequested,
}

/// Run the actor-per-connection pattern for an authenticated WebSocket.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, drains the connection's bounded outbound queue
/// - Reader loop: relays incoming text messages to every registered connection
///
/// The connection is registered before the first read and unregistered on
/// every exit path.
pub async fn run_connection(socket: WebSocket, state: AppState, identity: Identity) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (conn, rx) = Connection::open(identity.username, state.outbound_queue_capacity);

    if lifecycle::opened(&state.connections, &conn).is_err() {
        // Handle collision: the connection never joined the audience.
        return;
    }

    // Spawn writer task: forwards queued messages to WebSocket sink
    let mut writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    // Track pong reception
    let (pong_tx, mut pong_rx) = mpsc::unbounded_channel::<()>();

    // Spawn ping task: sends periodic pings and monitors pong responses
    let ping_conn = conn.clone();
    let ping_handle = tokio::spawn(async move {
        let mut ping_timer = interval(PING_INTERVAL);
        // Skip the first immediate tick
        ping_timer.tick().await;

        loop {
            ping_timer.tick().await;

            match ping_conn.try_deliver(Message::Ping(vec![1, 2, 3, 4].into())) {
                Ok(()) => {}
                // Queue is busy with traffic; the peer is evidently reachable
                // or will be caught by the relay's backpressure policy.
                Err(DeliveryError::Backpressure) => continue,
                Err(DeliveryError::Closed) => break,
            }

            // Wait for pong within timeout
            match timeout(PONG_TIMEOUT, pong_rx.recv()).await {
                Ok(Some(())) => {}
                _ => {
                    tracing::warn!(
                        connection_id = %ping_conn.id,
                        "Pong timeout, closing connection"
                    );
                    ping_conn.request_close();
                    break;
                }
            }
        }
    });

    // Reader loop: process incoming WebSocket messages
    let exit = loop {
        let next = tokio::select! {
            _ = conn.close_requested() => break Exit::CloseRequested,
            next = ws_receiver.next() => next,
        };

        match next {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    broadcast::on_message(
                        &state.connections,
                        &conn,
                        text.as_str(),
                        state.max_message_bytes,
                    );
                }
                Message::Binary(data) => {
                    tracing::debug!(
                        connection_id = %conn.id,
                        len = data.len(),
                        "Ignoring binary message"
                    );
                }
                Message::Pong(_) => {
                    // Pong received — notify the ping task
                    let _ = pong_tx.send(());
                }
                Message::Ping(data) => {
                    // Respond to client pings with pong
                    let _ = conn.try_deliver(Message::Pong(data));
                }
                Message::Close(frame) => {
                    tracing::debug!(
                        connection_id = %conn.id,
                        reason = ?frame,
                        "Client initiated close"
                    );
                    break Exit::ClientClosed;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(
                    connection_id = %conn.id,
                    error = %e,
                    "WebSocket receive error"
                );
                break Exit::ReceiveError;
            }
            None => break Exit::StreamEnded,
        }
    };

    ping_handle.abort();

    if exit == Exit::CloseRequested {
        // Stay registered until the close frame is flushed so a shutdown
        // drain waits for it; frames queued behind the close are discarded.
        let _ = conn.try_deliver(Message::Close(Some(CloseFrame {
            code: 1001,
            reason: "Connection closed by server".into(),
        })));
        if timeout(CLOSE_GRACE, &mut writer_handle).await.is_err() {
            writer_handle.abort();
        }
    } else {
        writer_handle.abort();
    }

    lifecycle::closed(&state.connections, &conn.id);

    tracing::debug!(
        connection_id = %conn.id,
        username = %conn.username,
        exit = ?exit,
        "WebSocket actor stopped"
    );
}

/// Writer task: receives messages from the outbound queue and forwards them
/// to the WebSocket sink. Stops after forwarding a close frame.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        let is_close = matches!(msg, Message::Close(_));
        if ws_sender.send(msg).await.is_err() {
            // WebSocket send failed — connection is broken
            break;
        }
        if is_close {
            break;
        }
    }
}
