use std::sync::Arc;

use crate::auth::CredentialVerifier;
use crate::ws::ConnectionRegistry;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// Checks the bearer credential presented at upgrade time
    pub verifier: Arc<dyn CredentialVerifier>,
    /// Active WebSocket connections keyed by connection handle
    pub connections: ConnectionRegistry,
    /// Bound on each connection's outbound queue
    pub outbound_queue_capacity: usize,
    /// Longest accepted chat body in bytes (after trimming)
    pub max_message_bytes: usize,
}

impl AppState {
    pub fn new(verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self {
            verifier,
            connections: crate::ws::new_connection_registry(),
            outbound_queue_capacity: crate::config::DEFAULT_OUTBOUND_QUEUE_CAPACITY,
            max_message_bytes: crate::config::DEFAULT_MAX_MESSAGE_BYTES,
        }
    }
}
