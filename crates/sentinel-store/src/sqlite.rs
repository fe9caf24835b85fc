//! SQLite-backed [`SessionStore`](crate::SessionStore).

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use tracing::instrument;

use sentinel_core::ids::SessionId;
use sentinel_core::telemetry::SensorPayload;

use crate::database::Database;
use crate::error::StoreError;
use crate::sessions::{elapsed_secs, NewSession, SessionRecord, SessionStore};

const SESSION_COLUMNS: &str =
    "id, name, scenario, started_at, ended_at, duration_secs, is_active, sample_count";

/// SQLite-backed session store.
pub struct SqliteSessionStore {
    db: Database,
}

impl SqliteSessionStore {
    /// Create an empty instance.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn get(&self, id: &SessionId) -> Result<Option<SessionRecord>, StoreError> {
        self.db.with_conn(|conn| {
            let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1");
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query([id.as_str()])?;
            match rows.next()? {
                Some(row) => row_to_session(row).map(Some),
                None => Ok(None),
            }
        })
    }
}

impl SessionStore for SqliteSessionStore {
    fn find_by_id(&self, id: &SessionId) -> Result<Option<SessionRecord>, StoreError> {
        self.get(id)
    }

    fn append_sample(&self, id: &SessionId, sample: &SensorPayload) -> Result<u64, StoreError> {
        let payload = serde_json::to_string(sample)?;
        let now = Utc::now().to_rfc3339();

        self.db.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let count: Option<i64> = tx
                .query_row(
                    "SELECT sample_count FROM sessions WHERE id = ?1",
                    [id.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(count) = count else {
                return Err(StoreError::NotFound(format!("session {id}")));
            };

            let _ = tx.execute(
                "INSERT INTO samples (session_id, sequence, recorded_at, payload)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id.as_str(), count, now, payload],
            )?;
            let _ = tx.execute(
                "UPDATE sessions SET sample_count = ?1 WHERE id = ?2",
                params![count + 1, id.as_str()],
            )?;
            tx.commit()?;
            Ok(count as u64 + 1)
        })
    }

    #[instrument(skip(self, new), fields(session_id = tracing::field::Empty))]
    fn create(&self, new: NewSession) -> Result<SessionRecord, StoreError> {
        let id = new.id.unwrap_or_default();
        let _ = tracing::Span::current().record("session_id", id.as_str());
        let started_at = Utc::now();

        self.db.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let exists: bool = tx
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM sessions WHERE id = ?1)",
                    [id.as_str()],
                    |row| row.get(0),
                )?;
            if exists {
                return Err(StoreError::Conflict(format!("session {id} already exists")));
            }

            let _ = tx.execute("UPDATE sessions SET is_active = 0 WHERE is_active = 1", [])?;
            let _ = tx.execute(
                "INSERT INTO sessions (id, name, scenario, started_at, is_active, sample_count)
                 VALUES (?1, ?2, ?3, ?4, 1, 0)",
                params![
                    id.as_str(),
                    new.name,
                    new.scenario,
                    started_at.to_rfc3339()
                ],
            )?;
            tx.commit()?;

            Ok(SessionRecord {
                id: id.clone(),
                name: new.name.clone(),
                scenario: new.scenario.clone(),
                started_at,
                ended_at: None,
                duration_secs: None,
                is_active: true,
                sample_count: 0,
            })
        })
    }

    #[instrument(skip(self), fields(session_id = %id))]
    fn end(&self, id: &SessionId) -> Result<SessionRecord, StoreError> {
        let record = self
            .get(id)?
            .ok_or_else(|| StoreError::NotFound(format!("session {id}")))?;
        if record.ended_at.is_some() {
            return Ok(record);
        }

        let ended_at = Utc::now();
        let duration = elapsed_secs(record.started_at, ended_at);
        self.db.with_conn(|conn| {
            let _ = conn.execute(
                "UPDATE sessions SET ended_at = ?1, duration_secs = ?2, is_active = 0 WHERE id = ?3",
                params![ended_at.to_rfc3339(), duration, id.as_str()],
            )?;
            Ok(())
        })?;

        Ok(SessionRecord {
            ended_at: Some(ended_at),
            duration_secs: Some(duration),
            is_active: false,
            ..record
        })
    }

    fn samples(&self, id: &SessionId) -> Result<Vec<SensorPayload>, StoreError> {
        if self.get(id)?.is_none() {
            return Err(StoreError::NotFound(format!("session {id}")));
        }
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT payload FROM samples WHERE session_id = ?1 ORDER BY sequence ASC",
            )?;
            let raw: Vec<String> = stmt
                .query_map([id.as_str()], |row| row.get(0))?
                .collect::<Result<_, _>>()?;
            raw.iter()
                .map(|p| {
                    serde_json::from_str(p).map_err(|e| StoreError::CorruptRow {
                        table: "samples",
                        column: "payload",
                        detail: e.to_string(),
                    })
                })
                .collect()
        })
    }

    fn active(&self) -> Result<Option<SessionRecord>, StoreError> {
        self.db.with_conn(|conn| {
            let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE is_active = 1 LIMIT 1");
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query([])?;
            match rows.next()? {
                Some(row) => row_to_session(row).map(Some),
                None => Ok(None),
            }
        })
    }
}

fn row_to_session(row: &rusqlite::Row<'_>) -> Result<SessionRecord, StoreError> {
    let id: String = get(row, 0, "id")?;
    let started_at: String = get(row, 3, "started_at")?;
    let ended_at: Option<String> = get(row, 4, "ended_at")?;
    let sample_count: i64 = get(row, 7, "sample_count")?;

    Ok(SessionRecord {
        id: SessionId::from_raw(id),
        name: get(row, 1, "name")?,
        scenario: get(row, 2, "scenario")?,
        started_at: parse_timestamp(&started_at, "started_at")?,
        ended_at: ended_at
            .as_deref()
            .map(|t| parse_timestamp(t, "ended_at"))
            .transpose()?,
        duration_secs: get(row, 5, "duration_secs")?,
        is_active: get(row, 6, "is_active")?,
        sample_count: u64::try_from(sample_count).unwrap_or(0),
    })
}

fn get<T: rusqlite::types::FromSql>(
    row: &rusqlite::Row<'_>,
    idx: usize,
    column: &'static str,
) -> Result<T, StoreError> {
    row.get(idx).map_err(|e| StoreError::CorruptRow {
        table: "sessions",
        column,
        detail: e.to_string(),
    })
}

fn parse_timestamp(raw: &str, column: &'static str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::CorruptRow {
            table: "sessions",
            column,
            detail: format!("invalid timestamp: {e}"),
        })
}
