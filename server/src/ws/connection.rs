use std::sync::Arc;

use axum::extract::ws::Message;
use tokio::sync::{mpsc, Notify};
use uuid::Uuid;

/// Internal handle for one open duplex channel.
pub type ConnectionId = Uuid;

/// Why a frame could not be queued for a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("outbound queue is full")]
    Backpressure,
    #[error("peer connection is closed")]
    Closed,
}

/// One authenticated client as seen by the registry and the relay.
///
/// Cloning is cheap: clones share the outbound queue and the close signal.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub username: String,
    outbound: mpsc::Sender<Message>,
    close: Arc<Notify>,
}

impl Connection {
    /// Create a connection with a fresh handle and a bounded outbound queue.
    /// The returned receiver is drained by the connection's writer task.
    pub fn open(username: impl Into<String>, capacity: usize) -> (Self, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let conn = Self::with_id(Uuid::now_v7(), username, tx);
        (conn, rx)
    }

    pub fn with_id(
        id: ConnectionId,
        username: impl Into<String>,
        outbound: mpsc::Sender<Message>,
    ) -> Self {
        Self {
            id,
            username: username.into(),
            outbound,
            close: Arc::new(Notify::new()),
        }
    }

    /// Queue a message without waiting.
    pub fn try_deliver(&self, msg: Message) -> Result<(), DeliveryError> {
        self.outbound.try_send(msg).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Backpressure,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    /// Ask the connection's task to shut down. The request is remembered if
    /// the task is not currently waiting for it.
    pub fn request_close(&self) {
        self.close.notify_one();
    }

    /// Resolves once [`Connection::request_close`] has been called.
    pub async fn close_requested(&self) {
        self.close.notified().await;
    }

    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_try_deliver_reports_backpressure() {
        let (conn, _rx) = Connection::open("alice", 1);
        conn.try_deliver(Message::Text("one".into())).unwrap();
        assert_eq!(
            conn.try_deliver(Message::Text("two".into())),
            Err(DeliveryError::Backpressure)
        );
    }

    #[tokio::test]
    async fn test_try_deliver_reports_closed() {
        let (conn, rx) = Connection::open("alice", 4);
        drop(rx);
        assert!(conn.is_closed());
        assert_eq!(
            conn.try_deliver(Message::Text("one".into())),
            Err(DeliveryError::Closed)
        );
    }

    #[tokio::test]
    async fn test_close_request_is_remembered() {
        let (conn, _rx) = Connection::open("alice", 4);
        let clone = conn.clone();
        clone.request_close();
        tokio::time::timeout(Duration::from_millis(200), conn.close_requested())
            .await
            .expect("close request should already be pending");
    }

    #[test]
    fn test_handles_are_unique() {
        let (a, _rx_a) = Connection::open("alice", 1);
        let (b, _rx_b) = Connection::open("alice", 1);
        assert_ne!(a.id, b.id);
    }
}
