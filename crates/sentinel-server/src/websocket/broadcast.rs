//! Fan-out of outbound frames to every open connection.

use std::sync::Arc;

use sentinel_core::frames::OutboundFrame;
use sentinel_core::ids::ConnectionId;
use tracing::{debug, warn};

use super::connection::SendError;
use super::registry::ConnectionRegistry;
use crate::metrics::{WS_BROADCAST_DELIVERIES_TOTAL, WS_BROADCAST_EVICTIONS_TOTAL};

/// What one broadcast call did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Members of the snapshot the frame was offered to.
    pub recipients: usize,
    /// Connections that accepted the frame.
    pub delivered: usize,
    /// Connections removed because they could not take the frame.
    pub evicted: Vec<ConnectionId>,
}

/// Pushes frames to every member of a [`ConnectionRegistry`].
///
/// Delivery is best-effort and at most once per connection per call. A
/// connection that is not open, whose queue is full, or whose writer has
/// gone away is evicted; the rest of the set still receives the frame.
pub struct BroadcastManager {
    registry: Arc<ConnectionRegistry>,
}

impl BroadcastManager {
    /// Create an empty instance.
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Encode once and offer the frame to every open connection.
    pub fn broadcast(&self, frame: &OutboundFrame) -> BroadcastReport {
        let json = match frame.encode() {
            Ok(j) => j,
            Err(e) => {
                warn!(frame_type = frame.frame_type(), error = %e, "failed to serialize frame");
                return BroadcastReport::default();
            }
        };
        let report = self.broadcast_raw(Arc::from(json));
        debug!(
            frame_type = frame.frame_type(),
            recipients = report.recipients,
            delivered = report.delivered,
            evicted = report.evicted.len(),
            "broadcast frame to all"
        );
        report
    }

    /// Offer an already-encoded frame to every open connection.
    pub fn broadcast_raw(&self, json: Arc<str>) -> BroadcastReport {
        let snapshot = self.registry.snapshot();
        let mut report = BroadcastReport {
            recipients: snapshot.len(),
            ..BroadcastReport::default()
        };

        for conn in snapshot {
            match conn.send(Arc::clone(&json)) {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    let reason = match err {
                        SendError::NotOpen => "not_open",
                        SendError::QueueFull => "queue_full",
                        SendError::Closed => "closed",
                    };
                    warn!(conn_id = %conn.id, reason, "evicting connection from broadcast");
                    let _ = self.registry.remove(&conn.id);
                    conn.close();
                    metrics::counter!(WS_BROADCAST_EVICTIONS_TOTAL, "reason" => reason)
                        .increment(1);
                    report.evicted.push(conn.id.clone());
                }
            }
        }

        metrics::counter!(WS_BROADCAST_DELIVERIES_TOTAL).increment(report.delivered as u64);
        report
    }

    /// Open connections right now.
    pub fn connection_count(&self) -> usize {
        self.registry.count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::connection::ClientConnection;
    use sentinel_core::ids::SessionId;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    fn add_connection(
        registry: &ConnectionRegistry,
        cap: usize,
    ) -> (Arc<ClientConnection>, mpsc::Receiver<Arc<str>>) {
        let (tx, rx) = mpsc::channel(cap);
        let conn = Arc::new(ClientConnection::new(
            ConnectionId::new(),
            tx,
            CancellationToken::new(),
        ));
        let _ = registry.add(conn.clone());
        (conn, rx)
    }

    fn started(id: &str) -> OutboundFrame {
        OutboundFrame::SessionStarted {
            session_id: SessionId::from_raw(id),
        }
    }

    #[tokio::test]
    async fn k_connections_get_exactly_one_delivery_each() {
        let registry = Arc::new(ConnectionRegistry::new());
        let manager = BroadcastManager::new(registry.clone());
        let mut receivers: Vec<_> = (0..7).map(|_| add_connection(&registry, 8).1).collect();

        let report = manager.broadcast(&started("s1"));
        assert_eq!(report.recipients, 7);
        assert_eq!(report.delivered, 7);
        assert!(report.evicted.is_empty());

        for rx in &mut receivers {
            let msg = rx.recv().await.unwrap();
            assert!(msg.contains("session_started"));
            assert!(rx.try_recv().is_err(), "duplicate delivery");
        }
    }

    #[test]
    fn empty_registry_is_fine() {
        let manager = BroadcastManager::new(Arc::new(ConnectionRegistry::new()));
        assert_eq!(manager.broadcast(&OutboundFrame::SessionEnded), BroadcastReport::default());
    }

    #[tokio::test]
    async fn slow_consumer_is_evicted_without_stalling_others() {
        let registry = Arc::new(ConnectionRegistry::new());
        let manager = BroadcastManager::new(registry.clone());
        let (slow, _slow_rx) = add_connection(&registry, 1);
        let (_fast, mut fast_rx) = add_connection(&registry, 8);

        let first = manager.broadcast(&started("a"));
        assert_eq!(first.delivered, 2);

        // The slow queue is still full from the first frame.
        let second = manager.broadcast(&started("b"));
        assert_eq!(second.delivered, 1);
        assert_eq!(second.evicted, vec![slow.id.clone()]);
        assert!(!registry.contains(&slow.id));
        assert!(!slow.is_open());
        assert!(slow.cancel_token().is_cancelled());

        assert!(fast_rx.recv().await.unwrap().contains("\"a\""));
        assert!(fast_rx.recv().await.unwrap().contains("\"b\""));
    }

    #[test]
    fn closing_and_dead_connections_are_evicted() {
        let registry = Arc::new(ConnectionRegistry::new());
        let manager = BroadcastManager::new(registry.clone());
        let (closing, _rx1) = add_connection(&registry, 4);
        let (dead, rx2) = add_connection(&registry, 4);
        let (_ok, _rx3) = add_connection(&registry, 4);
        closing.close();
        drop(rx2);

        let report = manager.broadcast(&OutboundFrame::SessionEnded);
        assert_eq!(report.recipients, 3);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.evicted.len(), 2);
        assert!(report.evicted.contains(&closing.id));
        assert!(report.evicted.contains(&dead.id));
        assert_eq!(registry.count(), 1);
    }
}
