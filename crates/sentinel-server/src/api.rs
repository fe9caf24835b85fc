//! REST routes for session records.
//!
//! A session must exist in the store before `start_session` frames can
//! record into it; these routes are how operators create and close one.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use sentinel_core::ids::SessionId;
use sentinel_core::telemetry::SensorPayload;
use sentinel_store::{NewSession, SessionRecord, StoreError};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::server::AppState;

/// Body of `POST /api/sessions`. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateSessionRequest {
    /// Caller-chosen id; generated when absent.
    pub id: Option<String>,
    /// Display name.
    pub session_name: Option<String>,
    /// Free-form scenario label.
    pub scenario: Option<String>,
}

/// Envelope for a single session record.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    /// The session record.
    pub session: SessionRecord,
}

/// A session with its recorded samples in append order.
#[derive(Debug, Serialize)]
pub struct SessionDetailResponse {
    /// The session record.
    pub session: SessionRecord,
    /// Recorded samples in append order.
    pub samples: Vec<SensorPayload>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Store failures mapped onto HTTP status codes. Internal failures are
/// logged and answered with a generic message.
#[derive(Debug)]
pub struct ApiError(StoreError);

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match &self.0 {
            StoreError::NotFound(_) => (StatusCode::NOT_FOUND, self.0.to_string()),
            StoreError::Conflict(_) => (StatusCode::CONFLICT, self.0.to_string()),
            other => {
                warn!(error = %other, "session store request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "session store unavailable".to_string(),
                )
            }
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}

/// POST /api/sessions
pub async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let new = NewSession {
        id: req.id.map(SessionId::from_raw),
        name: req.session_name,
        scenario: req.scenario,
    };
    let session = state.hub.tracker().store().create(new)?;
    info!(session_id = %session.id, "session created");
    Ok((StatusCode::CREATED, Json(SessionResponse { session })))
}

/// GET /api/sessions/{id}
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionDetailResponse>, ApiError> {
    let id = SessionId::from_raw(id);
    let store = state.hub.tracker().store();
    let session = store
        .find_by_id(&id)?
        .ok_or_else(|| StoreError::NotFound(format!("session {id}")))?;
    let samples = store.samples(&id)?;
    Ok(Json(SessionDetailResponse { session, samples }))
}

/// PUT /api/sessions/{id}/end
///
/// Closes the stored record. The relay's active pointer is left alone; that
/// moves only on `start_session` / `end_session` frames.
pub async fn end_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state
        .hub
        .tracker()
        .store()
        .end(&SessionId::from_raw(id))?;
    info!(
        session_id = %session.id,
        duration_secs = session.duration_secs.unwrap_or_default(),
        samples = session.sample_count,
        "session ended"
    );
    Ok(Json(SessionResponse { session }))
}
