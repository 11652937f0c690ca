//! Session report handlers

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    Json,
};
use sentinel_core::{SessionReport, CSV_FILE_NAME};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// GET /sessions/{id}/report - Rows, grouped red flags and failed uploads
pub async fn report_handler(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionReport>, ApiError> {
    let session = state.session(session_id)?;
    let session = session.lock().await;
    Ok(Json(SessionReport::build(&session.engine, &session.failures)))
}

/// GET /sessions/{id}/report.csv - One row per record, as a download
pub async fn report_csv_handler(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.session(session_id)?;
    let csv = {
        let session = session.lock().await;
        SessionReport::build(&session.engine, &session.failures).to_csv_string()?
    };

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{CSV_FILE_NAME}\""),
            ),
        ],
        csv,
    ))
}
