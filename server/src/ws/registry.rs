use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

use super::connection::{Connection, ConnectionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("connection handle {0} is already registered")]
    DuplicateHandle(ConnectionId),
}

/// The set of open, authenticated connections keyed by handle.
///
/// Usernames need not be unique: one user may hold several connections.
/// Clones share the same underlying map.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    connections: Arc<DashMap<ConnectionId, Connection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection. A handle collision means handle generation is broken.
    pub fn register(&self, conn: Connection) -> Result<(), RegistryError> {
        match self.connections.entry(conn.id) {
            Entry::Occupied(_) => Err(RegistryError::DuplicateHandle(conn.id)),
            Entry::Vacant(slot) => {
                slot.insert(conn);
                Ok(())
            }
        }
    }

    /// Remove a connection if present. Returns the removed entry, or `None`
    /// when another close path already removed it.
    pub fn unregister(&self, id: &ConnectionId) -> Option<Connection> {
        self.connections.remove(id).map(|(_, conn)| conn)
    }

    /// Apply `f` to a snapshot of the registered connections.
    ///
    /// The snapshot is taken up front so no shard lock is held while `f`
    /// runs; entries added or removed meanwhile may or may not be visited.
    pub fn for_each_open(&self, mut f: impl FnMut(&Connection)) {
        for conn in self.snapshot() {
            f(&conn);
        }
    }

    pub fn snapshot(&self) -> Vec<Connection> {
        self.connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn get(&self, id: &ConnectionId) -> Option<Connection> {
        self.connections.get(id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Usernames of every registered connection, sorted, duplicates kept.
    pub fn identities(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .connections
            .iter()
            .map(|entry| entry.value().username.clone())
            .collect();
        names.sort();
        names
    }
}
