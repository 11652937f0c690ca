//! Session lifecycle handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Counts for one session.
#[derive(Debug, Serialize)]
pub struct SessionSummaryResponse {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub records: usize,
    pub red: usize,
    pub failed: usize,
}

/// POST /sessions - Open an analysis session with an empty history
pub async fn create_session_handler(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), ApiError> {
    let (session_id, created_at) = state.create_session()?;
    tracing::info!(session_id = %session_id, "Session created");

    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id,
            created_at,
        }),
    ))
}

/// GET /sessions/{id}
pub async fn get_session_handler(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionSummaryResponse>, ApiError> {
    let session = state.session(session_id)?;
    let session = session.lock().await;

    Ok(Json(SessionSummaryResponse {
        session_id,
        created_at: session.created_at,
        records: session.engine.len(),
        red: session.engine.results().iter().filter(|r| r.is_red()).count(),
        failed: session.failures.len(),
    }))
}

/// DELETE /sessions/{id} - Discard a session and its history
pub async fn delete_session_handler(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.remove_session(session_id)?;
    tracing::info!(session_id = %session_id, "Session deleted");
    Ok(StatusCode::NO_CONTENT)
}
