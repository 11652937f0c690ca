//! Invoice ingestion handlers
//!
//! Handles POST /sessions/{id}/invoices (document upload, extracted then
//! ingested) and POST /sessions/{id}/records (pre-extracted fields).

use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use sentinel_core::extract::sanitize_name;
use sentinel_core::{Document, ExtractionFailure, FlagResult, InvoiceFields, InvoiceRecord};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::multipart::MultipartFields;
use crate::state::{AppState, Session};

/// The stored record and its flags.
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub record: InvoiceRecord,
    pub result: FlagResult,
}

fn ingest(session: &mut Session, fields: InvoiceFields) -> Result<IngestResponse, ApiError> {
    let result = session.engine.ingest(fields);
    let record = session
        .engine
        .history()
        .get(result.record_id)
        .cloned()
        .ok_or_else(|| ApiError::internal(format!("{} missing from history", result.record_id)))?;
    Ok(IngestResponse { record, result })
}

/// POST /sessions/{id}/invoices - Extract and ingest an invoice document
///
/// Accepts multipart/form-data with:
/// - **file** (required): PDF, PNG, JPEG or plain-text invoice
/// - **source_name** (optional): name to report instead of the upload's file name
///
/// Uploads to one session are extracted and ingested one at a time, in the
/// order their bodies finished arriving: the session lock (FIFO) is taken
/// before extraction and held until the record is ingested. Other sessions
/// extract concurrently, bounded by the extraction permits. Failed documents
/// are recorded in the session report and answered with 422 (unreadable
/// document) or 503 (OCR or model unavailable).
pub async fn upload_invoice_handler(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<IngestResponse>, ApiError> {
    let session = state.session(session_id)?;

    let mut form = MultipartFields::parse(&mut multipart, state.max_file_size).await?;
    let file = form.take_file()?;
    let name = form
        .get_text("source_name")
        .or(file.file_name.as_deref())
        .unwrap_or("upload")
        .to_string();

    let mut session = session.lock().await;
    let extracted = match Document::new(&name, file.data) {
        Ok(document) => {
            let _permit = state
                .extraction_permits
                .acquire()
                .await
                .map_err(|_| ApiError::service_unavailable("Extraction is shutting down"))?;
            state.extractor.extract(&document).await
        }
        Err(e) => Err(e),
    };

    match extracted {
        Ok(fields) => {
            let response = ingest(&mut session, fields)?;
            info!(
                session_id = %session_id,
                record_id = %response.record.id,
                source = %response.record.source_name,
                status = %response.result.status,
                "Invoice ingested"
            );
            Ok(Json(response))
        }
        Err(e) => {
            session.failures.push(ExtractionFailure {
                source: sanitize_name(&name),
                error: e.to_string(),
            });
            Err(e.into())
        }
    }
}

/// POST /sessions/{id}/records - Ingest already-extracted invoice fields
pub async fn submit_record_handler(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(fields): Json<InvoiceFields>,
) -> Result<Json<IngestResponse>, ApiError> {
    let session = state.session(session_id)?;
    let mut session = session.lock().await;
    let response = ingest(&mut session, fields)?;
    info!(
        session_id = %session_id,
        record_id = %response.record.id,
        status = %response.result.status,
        "Record ingested"
    );
    Ok(Json(response))
}
