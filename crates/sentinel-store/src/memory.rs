//! In-memory [`SessionStore`](crate::SessionStore).

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::instrument;

use sentinel_core::ids::SessionId;
use sentinel_core::telemetry::SensorPayload;

use crate::error::StoreError;
use crate::sessions::{elapsed_secs, NewSession, SessionRecord, SessionStore};

struct Entry {
    record: SessionRecord,
    samples: Vec<SensorPayload>,
}

/// Process-local store. Contents are lost on exit.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, Entry>>,
}

impl MemorySessionStore {
    /// Create an empty instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions held.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Whether nothing is held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for MemorySessionStore {
    fn find_by_id(&self, id: &SessionId) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self.sessions.read().get(id).map(|e| e.record.clone()))
    }

    fn append_sample(&self, id: &SessionId, sample: &SensorPayload) -> Result<u64, StoreError> {
        let mut sessions = self.sessions.write();
        let entry = sessions
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("session {id}")))?;
        entry.samples.push(sample.clone());
        entry.record.sample_count += 1;
        Ok(entry.record.sample_count)
    }

    #[instrument(skip(self, new), fields(session_id = tracing::field::Empty))]
    fn create(&self, new: NewSession) -> Result<SessionRecord, StoreError> {
        let id = new.id.unwrap_or_default();
        let _ = tracing::Span::current().record("session_id", id.as_str());

        let mut sessions = self.sessions.write();
        if sessions.contains_key(&id) {
            return Err(StoreError::Conflict(format!("session {id} already exists")));
        }
        for entry in sessions.values_mut() {
            entry.record.is_active = false;
        }

        let record = SessionRecord {
            id: id.clone(),
            name: new.name,
            scenario: new.scenario,
            started_at: Utc::now(),
            ended_at: None,
            duration_secs: None,
            is_active: true,
            sample_count: 0,
        };
        let _ = sessions.insert(
            id,
            Entry {
                record: record.clone(),
                samples: Vec::new(),
            },
        );
        Ok(record)
    }

    #[instrument(skip(self), fields(session_id = %id))]
    fn end(&self, id: &SessionId) -> Result<SessionRecord, StoreError> {
        let mut sessions = self.sessions.write();
        let entry = sessions
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("session {id}")))?;
        if entry.record.ended_at.is_none() {
            let now = Utc::now();
            entry.record.ended_at = Some(now);
            entry.record.duration_secs = Some(elapsed_secs(entry.record.started_at, now));
            entry.record.is_active = false;
        }
        Ok(entry.record.clone())
    }

    fn samples(&self, id: &SessionId) -> Result<Vec<SensorPayload>, StoreError> {
        self.sessions
            .read()
            .get(id)
            .map(|e| e.samples.clone())
            .ok_or_else(|| StoreError::NotFound(format!("session {id}")))
    }

    fn active(&self) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self
            .sessions
            .read()
            .values()
            .find(|e| e.record.is_active)
            .map(|e| e.record.clone()))
    }
}
