//! API error handling module
//!
//! Provides a unified error type for all API endpoints with structured error variants.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sentinel_core::SentinelError;
use thiserror::Error;

/// API error type with structured variants for different error categories
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request - client provided invalid input
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Not found - requested session does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal server error - unexpected server-side failure
    #[error("Internal error: {0}")]
    Internal(String),

    /// Service unavailable - session cap reached or a required service is down
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Error from the engine or the extraction pipeline
    #[error("Sentinel error: {0}")]
    Sentinel(#[from] SentinelError),
}

impl ApiError {
    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create an internal server error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a service unavailable error
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable(message.into())
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Sentinel(ref e) => match e {
                // OCR engine or LLM unreachable → 503
                SentinelError::OcrError(_)
                | SentinelError::LlmError(_)
                | SentinelError::HttpError(_) => StatusCode::SERVICE_UNAVAILABLE,

                // The document itself could not be turned into fields → 422
                SentinelError::UnsupportedDocument(_)
                | SentinelError::UnstructuredResponse { .. } => StatusCode::UNPROCESSABLE_ENTITY,

                SentinelError::InvalidConfig(_)
                | SentinelError::ReportError(_)
                | SentinelError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Get the error code for programmatic error handling
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "INVALID_INPUT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::Sentinel(ref e) => match e {
                SentinelError::OcrError(_) => "OCR_UNAVAILABLE",
                SentinelError::LlmError(_) => "LLM_UNAVAILABLE",
                SentinelError::HttpError(_) => "UPSTREAM_ERROR",
                SentinelError::UnsupportedDocument(_) => "UNSUPPORTED_DOCUMENT",
                SentinelError::UnstructuredResponse { .. } => "UNSTRUCTURED_RESPONSE",
                SentinelError::InvalidConfig(_) => "INVALID_CONFIG",
                SentinelError::ReportError(_) => "REPORT_ERROR",
                SentinelError::Io(_) => "IO_ERROR",
            },
        }
    }

    /// Get sanitized error message for client response
    fn client_message(&self) -> String {
        match self {
            Self::Sentinel(ref e) => match e {
                SentinelError::OcrError(_) => "OCR service unavailable".to_string(),
                SentinelError::LlmError(_) => "Extraction model unavailable".to_string(),
                SentinelError::HttpError(_) => "Upstream service error".to_string(),
                // Names the document and the accepted formats, nothing internal
                SentinelError::UnsupportedDocument(_) => e.to_string(),
                SentinelError::UnstructuredResponse { .. } => {
                    "Extraction model did not return structured fields".to_string()
                }
                SentinelError::InvalidConfig(_)
                | SentinelError::ReportError(_)
                | SentinelError::Io(_) => "Internal server error".to_string(),
            },
            _ => self.to_string(),
        }
    }

    /// Get the error category for logging
    fn error_category(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::NotFound(_) => "not_found",
            Self::Internal(_) => "internal",
            Self::ServiceUnavailable(_) => "service_unavailable",
            Self::Sentinel(_) => "sentinel",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let category = self.error_category();
        let code = self.error_code();
        let internal_message = self.to_string();
        let client_message = self.client_message();

        if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            tracing::error!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                "Server error"
            );
        } else {
            tracing::warn!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                "Request failed"
            );
        }

        // All error responses include a `code` field for programmatic error handling
        let body = serde_json::json!({
            "error": client_message,
            "code": code,
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_failures_map_to_422_or_503() {
        let err = ApiError::from(SentinelError::OcrError("tesseract missing".into()));
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.error_code(), "OCR_UNAVAILABLE");

        let err = ApiError::from(SentinelError::UnstructuredResponse {
            raw_output: "no".into(),
        });
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        let err = ApiError::from(SentinelError::UnsupportedDocument("a.gif".into()));
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_internal_details_not_exposed() {
        let err = ApiError::from(SentinelError::LlmError("401 Unauthorized: key sk-...".into()));
        assert_eq!(err.client_message(), "Extraction model unavailable");
    }
}
