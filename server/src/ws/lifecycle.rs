//! Open/close bookkeeping for authenticated connections.
//!
//! Joins are announced to the peers already connected. Departures are not
//! announced: a closed connection simply stops appearing in the registry.

use super::broadcast::{broadcast, send_to, DeliveryReport};
use super::connection::{Connection, ConnectionId};
use super::protocol::ServerFrame;
use super::registry::{ConnectionRegistry, RegistryError};

/// Admit a verified connection.
///
/// Queues the admission on the connection's own channel, registers it, then
/// announces the newcomer to every other registered connection. The admission
/// is queued before registration so it is always the first frame the client
/// sees, ahead of any broadcast that reaches it once it is registered.
/// Returns the delivery report of the announcement.
pub fn opened(
    registry: &ConnectionRegistry,
    conn: &Connection,
) -> Result<DeliveryReport, RegistryError> {
    if registry.contains(&conn.id) {
        return Err(refuse(conn, RegistryError::DuplicateHandle(conn.id)));
    }

    let frame = ServerFrame::auth(conn.username.as_str());
    if let Err(err) = send_to(conn, &frame) {
        tracing::warn!(
            connection_id = %conn.id,
            error = %err,
            "Failed to queue admission frame"
        );
    }

    if let Err(err) = registry.register(conn.clone()) {
        return Err(refuse(conn, err));
    }

    tracing::info!(
        connection_id = %conn.id,
        username = %conn.username,
        connections = registry.len(),
        "Client connected"
    );

    Ok(broadcast(registry, &frame, Some(conn.id)))
}

fn refuse(conn: &Connection, err: RegistryError) -> RegistryError {
    tracing::error!(
        connection_id = %conn.id,
        username = %conn.username,
        error = %err,
        "Registry invariant violated, refusing connection"
    );
    err
}

/// Forget a connection, whatever the cause of the close.
///
/// Safe to call more than once for the same handle; returns whether this call
/// removed the entry.
pub fn closed(registry: &ConnectionRegistry, id: &ConnectionId) -> bool {
    match registry.unregister(id) {
        Some(conn) => {
            tracing::info!(
                connection_id = %conn.id,
                username = %conn.username,
                connections = registry.len(),
                "Client disconnected"
            );
            true
        }
        None => {
            tracing::debug!(connection_id = %id, "Connection already unregistered");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::ws::Message;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    fn next_json(rx: &mut mpsc::Receiver<Message>) -> serde_json::Value {
        match rx.try_recv().expect("expected a queued frame") {
            Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
            other => panic!("Expected text frame, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_open_acknowledges_and_announces() {
        let registry = ConnectionRegistry::new();
        let (alice, mut alice_rx) = Connection::open("alice", 8);
        let report = opened(&registry, &alice).unwrap();
        assert_eq!(report.delivered, 0);
        assert_eq!(next_json(&mut alice_rx), json!({"type": "auth", "username": "alice"}));

        let (bob, mut bob_rx) = Connection::open("bob", 8);
        let report = opened(&registry, &bob).unwrap();
        assert_eq!(report.delivered, 1);

        // Bob sees only his own admission, alice sees the announcement once
        assert_eq!(next_json(&mut bob_rx), json!({"type": "auth", "username": "bob"}));
        assert!(bob_rx.try_recv().is_err());
        assert_eq!(next_json(&mut alice_rx), json!({"type": "auth", "username": "bob"}));
        assert!(alice_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_duplicate_handle_aborts_open() {
        let registry = ConnectionRegistry::new();
        let id = Uuid::now_v7();
        let (tx, mut rx) = mpsc::channel(8);
        let first = Connection::with_id(id, "alice", tx.clone());
        let second = Connection::with_id(id, "mallory", tx);

        opened(&registry, &first).unwrap();
        let _ = rx.try_recv();

        assert_eq!(
            opened(&registry, &second).unwrap_err(),
            RegistryError::DuplicateHandle(id)
        );
        assert!(rx.try_recv().is_err(), "no frame for a refused connection");
        assert_eq!(registry.identities(), vec!["alice".to_string()]);
    }

    #[test]
    fn test_admission_precedes_concurrent_traffic() {
        let registry = ConnectionRegistry::new();
        let stop = Arc::new(AtomicBool::new(false));

        let flooder = {
            let registry = registry.clone();
            let stop = stop.clone();
            std::thread::spawn(move || {
                let chat = ServerFrame::chat("alice", "busy");
                while !stop.load(Ordering::Relaxed) {
                    broadcast(&registry, &chat, None);
                }
            })
        };

        for i in 0..200 {
            let name = format!("user{i}");
            let (conn, mut rx) = Connection::open(name.as_str(), 4096);
            opened(&registry, &conn).unwrap();
            assert_eq!(next_json(&mut rx), json!({"type": "auth", "username": name}));
            closed(&registry, &conn.id);
        }

        stop.store(true, Ordering::Relaxed);
        flooder.join().unwrap();
    }

    #[tokio::test]
    async fn test_close_twice_matches_close_once() {
        let registry = ConnectionRegistry::new();
        let (alice, _alice_rx) = Connection::open("alice", 8);
        let (bob, _bob_rx) = Connection::open("bob", 8);
        opened(&registry, &alice).unwrap();
        opened(&registry, &bob).unwrap();

        assert!(closed(&registry, &alice.id));
        let after_once = registry.identities();
        assert!(!closed(&registry, &alice.id));
        assert_eq!(registry.identities(), after_once);
        assert_eq!(after_once, vec!["bob".to_string()]);
    }

    #[tokio::test]
    async fn test_close_sends_no_departure_frame() {
        let registry = ConnectionRegistry::new();
        let (alice, mut alice_rx) = Connection::open("alice", 8);
        let (bob, _bob_rx) = Connection::open("bob", 8);
        opened(&registry, &alice).unwrap();
        opened(&registry, &bob).unwrap();
        // admission + bob's join
        let _ = alice_rx.try_recv();
        let _ = alice_rx.try_recv();

        closed(&registry, &bob.id);
        assert!(alice_rx.try_recv().is_err());
    }
}
