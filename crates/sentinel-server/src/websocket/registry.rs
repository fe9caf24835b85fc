//! The set of currently open connections.

use std::sync::Arc;

use dashmap::DashMap;
use sentinel_core::ids::ConnectionId;

use super::connection::ClientConnection;

/// Concurrent map of open connections keyed by id.
///
/// Iteration always works over a momentary snapshot, so callers may remove
/// members (or new ones may arrive) while they walk it.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Arc<ClientConnection>>,
}

impl ConnectionRegistry {
    /// Create an empty instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an open connection. Returns `false` if the id was already present.
    pub fn add(&self, connection: Arc<ClientConnection>) -> bool {
        self.connections
            .insert(connection.id.clone(), connection)
            .is_none()
    }

    /// Remove a connection. Removing an absent id is a no-op.
    pub fn remove(&self, id: &ConnectionId) -> Option<Arc<ClientConnection>> {
        self.connections.remove(id).map(|(_, conn)| conn)
    }

    /// Look up a connection by id.
    pub fn get(&self, id: &ConnectionId) -> Option<Arc<ClientConnection>> {
        self.connections.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.contains_key(id)
    }

    /// Point-in-time copy of the members. No map lock is held once this returns.
    pub fn snapshot(&self) -> Vec<Arc<ClientConnection>> {
        self.connections
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Visit every member of a snapshot.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&Arc<ClientConnection>),
    {
        for conn in self.snapshot() {
            f(&conn);
        }
    }

    /// Registered connections.
    pub fn count(&self) -> usize {
        self.connections.len()
    }

    /// Whether nothing is held.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Close and drop every member (server shutdown).
    pub fn close_all(&self) -> usize {
        let members = self.snapshot();
        for conn in &members {
            let _ = self.remove(&conn.id);
            conn.close();
        }
        members.len()
    }
}
