//! The session store contract the relay records into.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sentinel_core::ids::SessionId;
use sentinel_core::telemetry::SensorPayload;

use crate::error::StoreError;

/// A training session as persisted by the store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// Session id.
    pub id: SessionId,
    /// Display name.
    pub name: Option<String>,
    /// Free-form scenario label.
    pub scenario: Option<String>,
    /// Creation time.
    pub started_at: DateTime<Utc>,
    /// Set once the session is ended.
    pub ended_at: Option<DateTime<Utc>>,
    /// Whole seconds between start and end.
    pub duration_secs: Option<i64>,
    /// Cleared when the session ends.
    pub is_active: bool,
    /// Samples appended so far.
    pub sample_count: u64,
}

/// Parameters for [`SessionStore::create`].
#[derive(Clone, Debug, Default)]
pub struct NewSession {
    /// Caller-chosen id; a fresh one is generated when absent.
    pub id: Option<SessionId>,
    /// Display name.
    pub name: Option<String>,
    /// Free-form scenario label.
    pub scenario: Option<String>,
}

impl NewSession {
    /// A session with a caller-chosen id.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(SessionId::from_raw(id)),
            ..Self::default()
        }
    }
}

/// Persistence for sessions and their ordered telemetry samples.
///
/// At most one session is active at a time: `create` deactivates any other
/// active session before inserting the new one.
pub trait SessionStore: Send + Sync {
    /// `Ok(None)` when the id is unknown.
    fn find_by_id(&self, id: &SessionId) -> Result<Option<SessionRecord>, StoreError>;

    /// Append to the tail of the session's sample sequence. Returns the new
    /// sample count. Unknown ids yield [`StoreError::NotFound`].
    fn append_sample(&self, id: &SessionId, sample: &SensorPayload) -> Result<u64, StoreError>;

    fn create(&self, new: NewSession) -> Result<SessionRecord, StoreError>;

    /// Mark the session ended and record its duration. Ending an already
    /// ended session returns it unchanged.
    fn end(&self, id: &SessionId) -> Result<SessionRecord, StoreError>;

    /// Samples in append order.
    fn samples(&self, id: &SessionId) -> Result<Vec<SensorPayload>, StoreError>;

    /// The session currently flagged active, if any.
    fn active(&self) -> Result<Option<SessionRecord>, StoreError>;
}

pub(crate) fn elapsed_secs(started_at: DateTime<Utc>, ended_at: DateTime<Utc>) -> i64 {
    (ended_at - started_at).num_seconds().max(0)
}
