//! API integration tests for sentinel-server.
//!
//! These tests drive the router with realistic JSON and multipart requests,
//! covering the session lifecycle, ingestion and report downloads. A mock
//! extractor stands in for OCR and the extraction model.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use sentinel_core::extract::MockExtractor;
use sentinel_core::InvoiceFields;
use sentinel_server::{create_router, create_router_with_config, Config};
use serde_json::{json, Value};
use tower::ServiceExt;

const BOUNDARY: &str = "----TestBoundary7MA4YWxkTrZu0gW";

/// Helper to create a multipart body with a `file` part
fn create_invoice_multipart(
    file_name: &str,
    content_type: &str,
    content: &[u8],
) -> (String, Vec<u8>) {
    let mut body = Vec::new();

    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
            file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(content);
    body.extend_from_slice(b"\r\n");

    // End boundary
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    (format!("multipart/form-data; boundary={}", BOUNDARY), body)
}

fn fields(vendor: &str, email: &str, layout: &str) -> InvoiceFields {
    InvoiceFields {
        vendor_name: vendor.into(),
        contact_email: email.into(),
        layout_signature: layout.into(),
        ..Default::default()
    }
}

fn mock_extractor() -> MockExtractor {
    MockExtractor::new()
        .with_fields("acme.pdf", fields("Acme", "billing@acme.com", "L1"))
        .with_fields("globex.pdf", fields("Globex", "billing@acme.com", "L2"))
        .with_failure("offline.pdf", "tesseract is not installed")
}

/// Build the test router using the library's create_router function
fn create_test_app() -> Router {
    create_router(Arc::new(mock_extractor()))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

async fn create_session(app: &Router) -> String {
    let (status, json) = send(
        app,
        Request::builder()
            .method("POST")
            .uri("/sessions")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    json["session_id"].as_str().unwrap().to_string()
}

async fn post_record(app: &Router, session: &str, record: Value) -> (StatusCode, Value) {
    send(
        app,
        Request::builder()
            .method("POST")
            .uri(format!("/sessions/{session}/records"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(record.to_string()))
            .unwrap(),
    )
    .await
}

async fn upload(
    app: &Router,
    session: &str,
    file_name: &str,
    content_type: &str,
    content: &[u8],
) -> (StatusCode, Value) {
    let (multipart_type, body) = create_invoice_multipart(file_name, content_type, content);
    send(
        app,
        Request::builder()
            .method("POST")
            .uri(format!("/sessions/{session}/invoices"))
            .header(header::CONTENT_TYPE, multipart_type)
            .body(Body::from(body))
            .unwrap(),
    )
    .await
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

// ============================================================================
// Health & Readiness Tests
// ============================================================================

#[tokio::test]
async fn test_health_endpoint_returns_ok() {
    let app = create_test_app();
    let (status, json) = get_json(&app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "sentinel-server");
    assert_eq!(json["extractor"], "mock");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_ready_endpoint_returns_ok() {
    let app = create_test_app();
    let (status, json) = get_json(&app, "/ready").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ready"], true);
}

// ============================================================================
// Session Lifecycle Tests
// ============================================================================

#[tokio::test]
async fn test_session_lifecycle() {
    let app = create_test_app();
    let session = create_session(&app).await;

    let (status, json) = get_json(&app, &format!("/sessions/{session}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["records"], 0);

    let delete = Request::builder()
        .method("DELETE")
        .uri(format!("/sessions/{session}"))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, delete).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, json) = get_json(&app, &format!("/sessions/{session}/report")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_unknown_session_returns_404() {
    let app = create_test_app();
    let (status, json) = post_record(
        &app,
        "6f1c2d4e-0000-4000-8000-000000000000",
        json!({"vendor_name": "Acme"}),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_malformed_session_id_rejected() {
    let app = create_test_app();
    let (status, _) = get_json(&app, "/sessions/not-a-uuid/report").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_session_cap_returns_503() {
    let config = Config {
        max_sessions: 1,
        ..Config::default()
    };
    let app = create_router_with_config(&config, Arc::new(mock_extractor()));
    create_session(&app).await;

    let (status, json) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/sessions")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["code"], "SERVICE_UNAVAILABLE");

    let (_, ready) = get_json(&app, "/ready").await;
    assert_eq!(ready["ready"], false);
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let app = create_test_app();
    let first = create_session(&app).await;
    let second = create_session(&app).await;

    post_record(&app, &first, json!({"vendor_name": "Acme", "contact_email": "a@acme.com"})).await;
    let (_, json) = post_record(
        &app,
        &second,
        json!({"vendor_name": "Globex", "contact_email": "a@acme.com"}),
    )
    .await;

    assert_eq!(json["result"]["status"], "green");
    assert_eq!(json["result"]["record_id"], 1);
}

// ============================================================================
// Record Ingestion Tests
// ============================================================================

#[tokio::test]
async fn test_records_reference_scenarios() {
    let app = create_test_app();
    let session = create_session(&app).await;

    let (status, r1) = post_record(
        &app,
        &session,
        json!({"vendor_name": "Acme", "contact_email": "billing@acme.com", "contact_phone": "555-1111", "layout_signature": "L1"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(r1["result"]["status"], "green");
    assert_eq!(r1["record"]["id"], 1);

    let (_, r2) = post_record(
        &app,
        &session,
        json!({"vendor_name": "Globex", "contact_email": "billing@acme.com", "contact_phone": "555-2222", "layout_signature": "L2"}),
    )
    .await;
    assert_eq!(r2["result"]["status"], "red");
    assert_eq!(r2["result"]["flags"][0]["kind"], "shared_contact");
    assert_eq!(r2["result"]["flags"][0]["conflicts"][0]["record_id"], 1);

    let (_, r3) = post_record(
        &app,
        &session,
        json!({"vendor_name": "Acme", "contact_email": "accounts@acme.com", "contact_phone": "555-3333", "layout_signature": "L9"}),
    )
    .await;
    assert_eq!(r3["result"]["flags"][0]["kind"], "different_layout_same_vendor");

    let (_, r4) = post_record(
        &app,
        &session,
        json!({"vendor_name": "Initech", "contact_email": "ap@initech.com", "contact_phone": "555-4444", "layout_signature": "L1"}),
    )
    .await;
    assert_eq!(r4["result"]["flags"][0]["kind"], "same_layout_different_vendor");
    assert_eq!(r4["result"]["flags"][0]["conflicts"][0]["detail"]["similarity"], 1.0);

    let (status, report) = get_json(&app, &format!("/sessions/{session}/report")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["summary"]["records"], 4);
    assert_eq!(report["summary"]["red"], 3);
    assert_eq!(report["groups"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_invalid_record_json_rejected() {
    let app = create_test_app();
    let session = create_session(&app).await;

    let (status, _) = post_record(&app, &session, json!(["not", "a", "record"])).await;
    assert!(status.is_client_error());
}

// ============================================================================
// Invoice Upload Tests
// ============================================================================

#[tokio::test]
async fn test_upload_extracts_and_flags() {
    let app = create_test_app();
    let session = create_session(&app).await;

    let (status, acme) =
        upload(&app, &session, "acme.pdf", "application/pdf", b"%PDF-1.4 acme").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(acme["record"]["vendor_name"], "Acme");
    assert_eq!(acme["record"]["source_name"], "acme.pdf");
    assert_eq!(acme["result"]["status"], "green");

    let (status, globex) =
        upload(&app, &session, "globex.pdf", "application/pdf", b"%PDF-1.4 globex").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(globex["result"]["status"], "red");
    assert_eq!(globex["result"]["flags"][0]["kind"], "shared_contact");
}

#[tokio::test]
async fn test_uploads_ingested_in_arrival_order() {
    let extractor = mock_extractor()
        .with_fields("slow.pdf", fields("Acme", "billing@acme.com", "L1"))
        .with_latency("slow.pdf", Duration::from_millis(300));
    let app = create_router(Arc::new(extractor));
    let session = create_session(&app).await;

    let slow = tokio::spawn({
        let app = app.clone();
        let session = session.clone();
        async move {
            upload(&app, &session, "slow.pdf", "application/pdf", b"%PDF-1.4 slow").await
        }
    });
    // Let the first upload reach extraction before the second arrives
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (status, globex) =
        upload(&app, &session, "globex.pdf", "application/pdf", b"%PDF-1.4 globex").await;
    assert_eq!(status, StatusCode::OK);
    let (status, acme) = slow.await.unwrap();
    assert_eq!(status, StatusCode::OK);

    assert_eq!(acme["record"]["id"], 1);
    assert_eq!(acme["result"]["status"], "green");
    assert_eq!(globex["record"]["id"], 2);
    assert_eq!(globex["result"]["flags"][0]["kind"], "shared_contact");
    assert_eq!(globex["result"]["flags"][0]["conflicts"][0]["record_id"], 1);
}

#[tokio::test]
async fn test_upload_text_invoice() {
    let app = create_test_app();
    let session = create_session(&app).await;

    let content = br#"{"vendor_name": "Initech", "contact_phone": "+1 555 0100"}"#;
    let (status, json) = upload(&app, &session, "initech.txt", "text/plain", content).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["record"]["vendor_name"], "Initech");
    assert_eq!(json["record"]["source_name"], "initech.txt");
}

#[tokio::test]
async fn test_upload_service_failure_returns_503_and_is_reported() {
    let app = create_test_app();
    let session = create_session(&app).await;

    let (status, json) =
        upload(&app, &session, "offline.pdf", "application/pdf", b"%PDF-1.4 offline").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["code"], "OCR_UNAVAILABLE");
    // Internal details stay in the logs
    assert!(!json["error"].as_str().unwrap().contains("tesseract"));

    let (_, report) = get_json(&app, &format!("/sessions/{session}/report")).await;
    assert_eq!(report["summary"]["records"], 0);
    assert_eq!(report["summary"]["failed"], 1);
    assert_eq!(report["failures"][0]["source"], "offline.pdf");
}

#[tokio::test]
async fn test_upload_unsupported_document_returns_422() {
    let app = create_test_app();
    let session = create_session(&app).await;

    let (status, json) = upload(
        &app,
        &session,
        "invoice.pdf",
        "application/octet-stream",
        &[0x00, 0x01, 0x02, 0x03],
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["code"], "UNSUPPORTED_DOCUMENT");
}

#[tokio::test]
async fn test_upload_unstructured_text_returns_422() {
    let app = create_test_app();
    let session = create_session(&app).await;

    let (status, json) =
        upload(&app, &session, "notes.txt", "text/plain", b"just some notes").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["code"], "UNSTRUCTURED_RESPONSE");
}

#[tokio::test]
async fn test_upload_without_file_returns_400() {
    let app = create_test_app();
    let session = create_session(&app).await;

    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"source_name\"\r\n\r\nx.pdf\r\n--{b}--\r\n",
        b = BOUNDARY
    );
    let (status, json) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri(format!("/sessions/{session}/invoices"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_upload_rejects_content_type() {
    let app = create_test_app();
    let session = create_session(&app).await;

    let (status, json) =
        upload(&app, &session, "page.html", "text/html", b"<html></html>").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("Unsupported Content-Type"));
}

#[tokio::test]
async fn test_upload_rejects_oversized_file() {
    let config = Config {
        max_file_size_mb: 1,
        ..Config::default()
    };
    let app = create_router_with_config(&config, Arc::new(mock_extractor()));
    let session = create_session(&app).await;

    let mut content = b"%PDF-1.4 ".to_vec();
    content.resize(1024 * 1024 + 1, b'x');
    let (status, json) = upload(&app, &session, "acme.pdf", "application/pdf", &content).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("File too large"));
}

// ============================================================================
// Report Tests
// ============================================================================

#[tokio::test]
async fn test_report_csv_download() {
    let app = create_test_app();
    let session = create_session(&app).await;
    upload(&app, &session, "acme.pdf", "application/pdf", b"%PDF-1.4 acme").await;
    upload(&app, &session, "globex.pdf", "application/pdf", b"%PDF-1.4 globex").await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/sessions/{session}/report.csv"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/csv"));
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"red_flags_report.csv\""
    );

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let csv = String::from_utf8(body.to_vec()).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(
        lines[0],
        "record_id,source,vendor_name,contact_email,contact_phone,tax_id,status,flags"
    );
    assert_eq!(lines.len(), 3);
    assert!(lines[1].starts_with("INV-0001,acme.pdf,Acme,"));
    assert!(lines[2].contains(",red,"));
}

#[tokio::test]
async fn test_empty_session_csv_has_header_only() {
    let app = create_test_app();
    let session = create_session(&app).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/sessions/{session}/report.csv"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(
        String::from_utf8(body.to_vec()).unwrap().trim_end(),
        "record_id,source,vendor_name,contact_email,contact_phone,tax_id,status,flags"
    );
}
