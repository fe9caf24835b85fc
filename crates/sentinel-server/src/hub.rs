//! The relay's shared state, owned in one place and injected into handlers.

use std::sync::Arc;

use sentinel_core::ids::{ConnectionId, SessionId};
use sentinel_store::SessionStore;

use crate::tracker::SessionTracker;
use crate::websocket::broadcast::BroadcastManager;
use crate::websocket::dispatcher::{DispatchOutcome, MessageDispatcher};
use crate::websocket::registry::ConnectionRegistry;

/// Connection registry, active-session pointer, dispatcher and fan-out.
pub struct Hub {
    registry: Arc<ConnectionRegistry>,
    tracker: Arc<SessionTracker>,
    broadcast: Arc<BroadcastManager>,
    dispatcher: MessageDispatcher,
}

impl Hub {
    /// Wire registry, tracker, broadcast and dispatcher around `store`.
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let tracker = Arc::new(SessionTracker::new(store));
        let broadcast = Arc::new(BroadcastManager::new(Arc::clone(&registry)));
        let dispatcher = MessageDispatcher::new(Arc::clone(&tracker), Arc::clone(&broadcast));
        Self {
            registry,
            tracker,
            broadcast,
            dispatcher,
        }
    }

    /// Decode one inbound text frame and act on it.
    pub fn dispatch(&self, raw: &str, from: &ConnectionId) -> DispatchOutcome {
        self.dispatcher.dispatch(raw, from)
    }

    /// Connection registry.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Active-session tracker.
    pub fn tracker(&self) -> &Arc<SessionTracker> {
        &self.tracker
    }

    /// Broadcast fan-out.
    pub fn broadcast(&self) -> &Arc<BroadcastManager> {
        &self.broadcast
    }

    /// Open connections right now.
    pub fn connection_count(&self) -> usize {
        self.registry.count()
    }

    /// Session currently recording, if any.
    pub fn active_session(&self) -> Option<SessionId> {
        self.tracker.active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_store::MemorySessionStore;

    #[test]
    fn new_hub_is_empty() {
        let hub = Hub::new(Arc::new(MemorySessionStore::new()));
        assert_eq!(hub.connection_count(), 0);
        assert!(hub.active_session().is_none());
    }

    #[test]
    fn dispatch_updates_active_session() {
        let hub = Hub::new(Arc::new(MemorySessionStore::new()));
        let from = ConnectionId::new();
        let _ = hub.dispatch(r#"{"type":"start_session","sessionId":"s9"}"#, &from);
        assert_eq!(hub.active_session(), Some(SessionId::from_raw("s9")));
        let _ = hub.dispatch(r#"{"type":"end_session"}"#, &from);
        assert!(hub.active_session().is_none());
    }
}
