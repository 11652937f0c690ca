//! HTTP request handlers
//!
//! This module contains all the request handlers for the API endpoints.

pub mod health;
pub mod invoices;
pub mod report;
pub mod sessions;

pub use crate::state::AppState;
pub use health::{health, ready, HealthResponse, ReadyResponse};
pub use invoices::{submit_record_handler, upload_invoice_handler, IngestResponse};
pub use report::{report_csv_handler, report_handler};
pub use sessions::{
    create_session_handler, delete_session_handler, get_session_handler, CreateSessionResponse,
    SessionSummaryResponse,
};
