//! Health check handlers
//!
//! Provides health and readiness endpoints for monitoring and orchestration.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::state::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: &'static str,
    /// Server version from Cargo.toml
    pub version: &'static str,
    /// Service name
    pub service: &'static str,
    /// Active field extractor, e.g. `tesseract+openai`
    pub extractor: String,
    /// Number of live sessions
    pub sessions: usize,
}

/// GET /health - Health check endpoint
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        service: "sentinel-server",
        extractor: state.extractor.name(),
        sessions: state.sessions.len(),
    })
}

/// Readiness response for Kubernetes
#[derive(Serialize)]
pub struct ReadyResponse {
    /// Whether the service is ready to accept traffic
    pub ready: bool,
    /// Optional message explaining status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

/// GET /ready - Kubernetes readiness probe
///
/// Not ready while the session cap is reached: new sessions would be refused.
pub async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    let full = state.sessions.len() >= state.max_sessions;
    Json(ReadyResponse {
        ready: !full,
        message: full.then_some("session limit reached"),
    })
}
