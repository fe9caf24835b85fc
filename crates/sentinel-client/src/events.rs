//! Typed publish/subscribe surface for client events.
//!
//! Handlers are keyed by [`EventKind`] and removed through the
//! [`SubscriptionId`] returned from [`EventBus::on`]. A panicking handler is
//! isolated: the remaining handlers for the same event still run.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use sentinel_core::{SensorPayload, SessionId};
use tracing::warn;

/// Closed set of event names a handler can subscribe to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connected,
    Disconnected,
    Reconnecting,
    ReconnectExhausted,
    LiveSensorData,
    SessionStarted,
    SessionEnded,
    Error,
}

/// An event emitted by the client.
#[derive(Clone, Debug, PartialEq)]
pub enum ClientEvent {
    Connected,
    /// The socket closed without a call to `disconnect`.
    Disconnected { reason: String },
    /// A reconnect is scheduled after `delay`.
    Reconnecting { attempt: u32, delay: Duration },
    /// Terminal: no further reconnects will be attempted.
    ReconnectExhausted { attempts: u32 },
    LiveSensorData(SensorPayload),
    SessionStarted(SessionId),
    SessionEnded,
    Error(String),
}

impl ClientEvent {
    /// The kind used to route this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Connected => EventKind::Connected,
            Self::Disconnected { .. } => EventKind::Disconnected,
            Self::Reconnecting { .. } => EventKind::Reconnecting,
            Self::ReconnectExhausted { .. } => EventKind::ReconnectExhausted,
            Self::LiveSensorData(_) => EventKind::LiveSensorData,
            Self::SessionStarted(_) => EventKind::SessionStarted,
            Self::SessionEnded => EventKind::SessionEnded,
            Self::Error(_) => EventKind::Error,
        }
    }
}

/// Handle returned by [`EventBus::on`], used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&ClientEvent) + Send + Sync>;

struct Subscription {
    id: SubscriptionId,
    kind: EventKind,
    handler: Handler,
}

/// Handler registry keyed by [`EventKind`].
#[derive(Default)]
pub struct EventBus {
    subscriptions: Mutex<Vec<Subscription>>,
    next_id: AtomicU64,
}

impl EventBus {
    /// Create an empty instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `kind`. Handlers run in registration order.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscriptions.lock().push(Subscription {
            id,
            kind,
            handler: Arc::new(handler),
        });
        id
    }

    /// Remove one handler. Returns `false` if it was already gone.
    pub fn off(&self, id: SubscriptionId) -> bool {
        let mut subs = self.subscriptions.lock();
        let before = subs.len();
        subs.retain(|s| s.id != id);
        subs.len() != before
    }

    /// Invoke every handler registered for the event's kind and return how
    /// many completed without panicking.
    ///
    /// Handlers are snapshotted first, so a handler may call `on`/`off`
    /// without deadlocking; changes apply from the next emit.
    pub fn emit(&self, event: &ClientEvent) -> usize {
        let kind = event.kind();
        let handlers: Vec<Handler> = self
            .subscriptions
            .lock()
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| Arc::clone(&s.handler))
            .collect();

        let mut completed = 0;
        for handler in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(()) => completed += 1,
                Err(_) => warn!(event = ?kind, "event handler panicked"),
            }
        }
        completed
    }

    /// Handlers currently registered for `kind`.
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.subscriptions
            .lock()
            .iter()
            .filter(|s| s.kind == kind)
            .count()
    }

    /// Drop every handler.
    pub fn clear(&self) {
        self.subscriptions.lock().clear();
    }
}
