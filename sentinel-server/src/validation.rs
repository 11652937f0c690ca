//! Upload validation module
//!
//! Provides validation utilities for multipart invoice uploads.

use crate::error::ApiError;

/// Content types accepted for invoice uploads. The document kind itself is
/// detected from the bytes afterwards.
const ALLOWED_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "image/png",
    "image/jpeg",
    "image/jpg",
    "text/plain",
    "application/octet-stream",
];

/// Validates the Content-Type of an uploaded invoice
///
/// Parameters such as `; charset=utf-8` are ignored. A missing Content-Type
/// is accepted and treated as binary.
pub fn validate_content_type(content_type: Option<&str>) -> Result<(), ApiError> {
    let Some(ct) = content_type else {
        return Ok(());
    };

    let essence = ct.split(';').next().unwrap_or("").trim().to_lowercase();
    if ALLOWED_MIME_TYPES.contains(&essence.as_str()) {
        Ok(())
    } else {
        Err(ApiError::bad_request(format!(
            "Unsupported Content-Type: '{}'. Allowed types: application/pdf, image/png, image/jpeg, text/plain, application/octet-stream",
            ct
        )))
    }
}

/// Validates the size of an uploaded file
///
/// Returns an error if the file exceeds the maximum size.
pub fn validate_file_size(size: usize, max_size: usize) -> Result<(), ApiError> {
    if size > max_size {
        let max_mb = max_size / (1024 * 1024);
        let actual_mb = size / (1024 * 1024);
        Err(ApiError::bad_request(format!(
            "File too large: {} MB exceeds maximum of {} MB",
            actual_mb, max_mb
        )))
    } else {
        Ok(())
    }
}
