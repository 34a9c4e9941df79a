//! Fan-out of chat frames to every registered connection.
//!
//! Delivery never waits on a peer: frames go into each connection's bounded
//! outbound queue with `try_send`. A peer whose queue is full or closed is
//! dropped from the registry and asked to close; the remaining peers and the
//! sender are unaffected.

use super::connection::{Connection, ConnectionId, DeliveryError};
use super::protocol::{normalize_body, ServerFrame};
use super::registry::ConnectionRegistry;

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub dropped: usize,
}

/// Relay an inbound text message from `source` to every registered
/// connection, the sender included.
///
/// Returns `None` when the body is empty after trimming (or over
/// `max_bytes`) and nothing was sent.
pub fn on_message(
    registry: &ConnectionRegistry,
    source: &Connection,
    raw: &str,
    max_bytes: usize,
) -> Option<DeliveryReport> {
    let Some(body) = normalize_body(raw, max_bytes) else {
        tracing::debug!(
            connection_id = %source.id,
            username = %source.username,
            len = raw.len(),
            "Dropping empty or oversized message"
        );
        return None;
    };

    let frame = ServerFrame::chat(source.username.as_str(), body);
    Some(broadcast(registry, &frame, None))
}

/// Offer `frame` to every registered connection except `exclude`.
pub fn broadcast(
    registry: &ConnectionRegistry,
    frame: &ServerFrame,
    exclude: Option<ConnectionId>,
) -> DeliveryReport {
    let msg = match frame.to_message() {
        Ok(msg) => msg,
        Err(e) => {
            tracing::warn!(frame = frame.type_name(), error = %e, "Failed to encode frame");
            return DeliveryReport::default();
        }
    };

    let mut report = DeliveryReport::default();
    let mut failed = Vec::new();

    registry.for_each_open(|conn| {
        if Some(conn.id) == exclude {
            return;
        }
        match conn.try_deliver(msg.clone()) {
            Ok(()) => report.delivered += 1,
            Err(err) => {
                report.dropped += 1;
                failed.push((conn.clone(), err));
            }
        }
    });

    for (conn, err) in failed {
        disconnect_peer(registry, &conn, err);
    }

    tracing::debug!(
        frame = frame.type_name(),
        delivered = report.delivered,
        dropped = report.dropped,
        "Broadcast frame"
    );
    report
}

/// Queue `frame` for a single connection.
pub fn send_to(conn: &Connection, frame: &ServerFrame) -> Result<(), DeliveryError> {
    let msg = frame.to_message().map_err(|e| {
        tracing::warn!(frame = frame.type_name(), error = %e, "Failed to encode frame");
        DeliveryError::Closed
    })?;
    conn.try_deliver(msg)
}

/// Drop-and-disconnect: a peer that cannot take a frame right now is removed
/// so it stops being offered further traffic.
fn disconnect_peer(registry: &ConnectionRegistry, conn: &Connection, err: DeliveryError) {
    tracing::warn!(
        connection_id = %conn.id,
        username = %conn.username,
        error = %err,
        "Disconnecting peer after failed delivery"
    );
    conn.request_close();
    registry.unregister(&conn.id);
}
