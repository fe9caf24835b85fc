//! The single process-wide active-session pointer.

use std::sync::Arc;

use parking_lot::Mutex;
use sentinel_core::ids::SessionId;
use sentinel_core::telemetry::SensorPayload;
use sentinel_store::{SessionStore, StoreError};
use tracing::{debug, info, warn};

use crate::metrics::{TELEMETRY_SAMPLES_DISCARDED_TOTAL, TELEMETRY_SAMPLES_RECORDED_TOTAL};

/// What happened to one telemetry sample on the recording path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordOutcome {
    Appended { session_id: SessionId, sample_count: u64 },
    NoActiveSession,
    /// The active id does not resolve in the store; the sample is dropped.
    UnknownSession(SessionId),
    /// The store refused the write; the sample is dropped.
    StoreFailed(SessionId),
}

/// `NoActiveSession -> ActiveSession(id) -> NoActiveSession`.
///
/// Starting while active replaces the pointer. Ending while idle is a no-op.
/// Recording resolves the active id against the store on every sample.
pub struct SessionTracker {
    active: Mutex<Option<SessionId>>,
    store: Arc<dyn SessionStore>,
}

impl SessionTracker {
    /// Create an empty instance.
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            active: Mutex::new(None),
            store,
        }
    }

    /// Point at `id`. Returns the id it replaced, if any.
    pub fn start(&self, id: SessionId) -> Option<SessionId> {
        let mut active = self.active.lock();
        let previous = active.replace(id.clone());
        match &previous {
            Some(prev) if *prev != id => {
                info!(session_id = %id, replaced = %prev, "session started, replacing active session");
            }
            _ => info!(session_id = %id, "session started"),
        }
        previous
    }

    /// Clear the pointer. Returns the id that was active, if any.
    pub fn end(&self) -> Option<SessionId> {
        let previous = self.active.lock().take();
        match &previous {
            Some(id) => info!(session_id = %id, "session ended"),
            None => debug!("end_session with no active session"),
        }
        previous
    }

    /// Session currently recording, if any.
    pub fn active(&self) -> Option<SessionId> {
        self.active.lock().clone()
    }

    /// Backing store.
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Append `payload` to the active session's record.
    ///
    /// The pointer lock is held across lookup and append, so no sample lands
    /// in a session after `end()` has returned.
    pub fn record(&self, payload: &SensorPayload) -> RecordOutcome {
        let active = self.active.lock();
        let Some(id) = active.as_ref() else {
            metrics::counter!(TELEMETRY_SAMPLES_DISCARDED_TOTAL, "reason" => "no_active_session")
                .increment(1);
            return RecordOutcome::NoActiveSession;
        };

        let outcome = match self.store.find_by_id(id) {
            Ok(Some(_)) => match self.store.append_sample(id, payload) {
                Ok(sample_count) => RecordOutcome::Appended {
                    session_id: id.clone(),
                    sample_count,
                },
                Err(StoreError::NotFound(_)) => RecordOutcome::UnknownSession(id.clone()),
                Err(e) => {
                    warn!(session_id = %id, error = %e, "failed to append sample");
                    RecordOutcome::StoreFailed(id.clone())
                }
            },
            Ok(None) => RecordOutcome::UnknownSession(id.clone()),
            Err(e) => {
                warn!(session_id = %id, error = %e, "session lookup failed");
                RecordOutcome::StoreFailed(id.clone())
            }
        };
        drop(active);

        match &outcome {
            RecordOutcome::Appended { .. } => {
                metrics::counter!(TELEMETRY_SAMPLES_RECORDED_TOTAL).increment(1);
            }
            RecordOutcome::UnknownSession(id) => {
                debug!(session_id = %id, "active session not in store, sample discarded");
                metrics::counter!(TELEMETRY_SAMPLES_DISCARDED_TOTAL, "reason" => "unknown_session")
                    .increment(1);
            }
            RecordOutcome::StoreFailed(_) => {
                metrics::counter!(TELEMETRY_SAMPLES_DISCARDED_TOTAL, "reason" => "store_error")
                    .increment(1);
            }
            RecordOutcome::NoActiveSession => {}
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::telemetry::ImuReading;
    use sentinel_store::{MemorySessionStore, NewSession};

    fn payload(v: f64) -> SensorPayload {
        SensorPayload::new(ImuReading::default(), [v; 5])
    }

    fn tracker_with(ids: &[&str]) -> (SessionTracker, Arc<MemorySessionStore>) {
        let store = Arc::new(MemorySessionStore::new());
        for id in ids {
            let _ = store.create(NewSession::with_id(*id)).unwrap();
        }
        (SessionTracker::new(store.clone()), store)
    }

    #[test]
    fn starts_idle() {
        let (tracker, _) = tracker_with(&[]);
        assert!(tracker.active().is_none());
        assert_eq!(tracker.record(&payload(0.0)), RecordOutcome::NoActiveSession);
    }

    #[test]
    fn start_then_record_then_end() {
        let (tracker, store) = tracker_with(&["s1"]);
        assert!(tracker.start(SessionId::from_raw("s1")).is_none());

        for i in 0..3 {
            let outcome = tracker.record(&payload(i as f64));
            assert_eq!(
                outcome,
                RecordOutcome::Appended {
                    session_id: SessionId::from_raw("s1"),
                    sample_count: i + 1
                }
            );
        }
        assert_eq!(tracker.end(), Some(SessionId::from_raw("s1")));
        assert_eq!(tracker.record(&payload(9.0)), RecordOutcome::NoActiveSession);
        assert_eq!(store.samples(&SessionId::from_raw("s1")).unwrap().len(), 3);
    }

    #[test]
    fn start_while_active_replaces_pointer() {
        let (tracker, store) = tracker_with(&["a", "b"]);
        let _ = tracker.start(SessionId::from_raw("a"));
        let replaced = tracker.start(SessionId::from_raw("b"));
        assert_eq!(replaced, Some(SessionId::from_raw("a")));
        assert_eq!(tracker.active(), Some(SessionId::from_raw("b")));

        let _ = tracker.record(&payload(1.0));
        assert!(store.samples(&SessionId::from_raw("a")).unwrap().is_empty());
        assert_eq!(store.samples(&SessionId::from_raw("b")).unwrap().len(), 1);
    }

    #[test]
    fn end_without_active_is_noop() {
        let (tracker, _) = tracker_with(&[]);
        assert!(tracker.end().is_none());
        assert!(tracker.end().is_none());
        assert!(tracker.active().is_none());
    }

    #[test]
    fn unknown_session_drops_sample() {
        let (tracker, store) = tracker_with(&["real"]);
        let _ = tracker.start(SessionId::from_raw("ghost"));
        assert_eq!(
            tracker.record(&payload(1.0)),
            RecordOutcome::UnknownSession(SessionId::from_raw("ghost"))
        );
        assert!(store.samples(&SessionId::from_raw("real")).unwrap().is_empty());
        assert!(store.find_by_id(&SessionId::from_raw("ghost")).unwrap().is_none());
    }

    #[test]
    fn store_failure_is_contained() {
        struct BrokenStore;
        impl SessionStore for BrokenStore {
            fn find_by_id(
                &self,
                _id: &SessionId,
            ) -> Result<Option<sentinel_store::SessionRecord>, StoreError> {
                Err(StoreError::Database("disk gone".into()))
            }
            fn append_sample(&self, _: &SessionId, _: &SensorPayload) -> Result<u64, StoreError> {
                unreachable!()
            }
            fn create(&self, _: NewSession) -> Result<sentinel_store::SessionRecord, StoreError> {
                unreachable!()
            }
            fn end(&self, _: &SessionId) -> Result<sentinel_store::SessionRecord, StoreError> {
                unreachable!()
            }
            fn samples(&self, _: &SessionId) -> Result<Vec<SensorPayload>, StoreError> {
                unreachable!()
            }
            fn active(&self) -> Result<Option<sentinel_store::SessionRecord>, StoreError> {
                Ok(None)
            }
        }

        let tracker = SessionTracker::new(Arc::new(BrokenStore));
        let _ = tracker.start(SessionId::from_raw("s1"));
        assert_eq!(
            tracker.record(&payload(0.0)),
            RecordOutcome::StoreFailed(SessionId::from_raw("s1"))
        );
        assert_eq!(tracker.active(), Some(SessionId::from_raw("s1")));
    }
}
