pub mod actor;
pub mod broadcast;
pub mod connection;
pub mod handler;
pub mod lifecycle;
pub mod protocol;
pub mod registry;

pub use connection::{Connection, ConnectionId, DeliveryError};
pub use registry::{ConnectionRegistry, RegistryError};

/// Create a new empty connection registry.
pub fn new_connection_registry() -> ConnectionRegistry {
    ConnectionRegistry::new()
}

/// Ask every open connection to close, e.g. on server shutdown.
pub fn close_all(registry: &ConnectionRegistry) {
    registry.for_each_open(|conn| conn.request_close());
}

/// Wait until every connection has unregistered, or `deadline` passes.
///
/// Returns the number of connections still registered when it gave up.
pub async fn drain(registry: &ConnectionRegistry, deadline: std::time::Duration) -> usize {
    let settled = tokio::time::timeout(deadline, async {
        while !registry.is_empty() {
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }
    })
    .await;
    match settled {
        Ok(()) => 0,
        Err(_) => registry.len(),
    }
}

const DRAIN_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(10);
