//! Extraction against a local stand-in for the chat-completions API, and the
//! offline pipeline feeding the flag engine.

#![cfg(feature = "network")]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};

use sentinel_core::extract::{
    Document, ExtractorFactory, FieldStructurer, HttpConfig, OcrLlmExtractor, OcrText,
    OpenAiConfig, OpenAiStructurer, PlainTextOcr,
};
use sentinel_core::{FieldExtractor, FlagEngine, FlagKind, SentinelError};

#[derive(Clone)]
struct Stub {
    /// Statuses returned before the first success.
    failures: Vec<StatusCode>,
    content: String,
    calls: Arc<AtomicUsize>,
    last_body: Arc<std::sync::Mutex<Option<Value>>>,
}

async fn chat_completions(
    State(stub): State<Stub>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let call = stub.calls.fetch_add(1, Ordering::SeqCst);
    *stub.last_body.lock().unwrap() = Some(body);

    if let Some(status) = stub.failures.get(call) {
        return (*status, Json(json!({"error": {"message": "stub failure"}})));
    }
    (
        StatusCode::OK,
        Json(json!({
            "choices": [{"message": {"role": "assistant", "content": stub.content}}]
        })),
    )
}

async fn spawn_stub(stub: Stub) -> String {
    let app = Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .with_state(stub);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/v1")
}

fn stub(content: &str, failures: Vec<StatusCode>) -> Stub {
    Stub {
        failures,
        content: content.to_string(),
        calls: Arc::new(AtomicUsize::new(0)),
        last_body: Arc::new(std::sync::Mutex::new(None)),
    }
}

fn config(base_url: String) -> OpenAiConfig {
    let mut config = OpenAiConfig::new("test-key");
    config.base_url = base_url;
    config.http = HttpConfig {
        timeout: Duration::from_secs(5),
        max_retries: 3,
        initial_interval: Duration::from_millis(10),
        max_interval: Duration::from_millis(50),
        require_https: false,
    };
    config
}

fn text_document(name: &str, text: &str) -> Document {
    Document::new(name, text.as_bytes().to_vec()).unwrap()
}

const MODEL_OUTPUT: &str = r#"{
    "vendor_name": "XYZ Pvt Ltd",
    "phone_numbers": ["9876543210"],
    "email_addresses": ["accounts@xyz.example"],
    "gst_or_pan": "ABCDE1234F",
    "table_headers": ["Description", "Qty", "Rate", "Amount"],
    "table_row_data": [["Item 1", "1", "100", "100"]],
    "table_size": {"rows": 1, "columns": 4},
    "scanned_or_typed": "typed",
    "handwritten_or_typed": "typed"
}"#;

#[tokio::test]
async fn openai_structurer_parses_model_json() {
    let stub = stub(MODEL_OUTPUT, vec![]);
    let last_body = stub.last_body.clone();
    let base_url = spawn_stub(stub).await;

    let structurer = OpenAiStructurer::new(config(base_url)).unwrap();
    let doc = text_document("xyz.txt", "XYZ Pvt Ltd ...");
    let invoice = structurer
        .structure(&OcrText::plain("XYZ Pvt Ltd ..."), &doc)
        .await
        .unwrap();

    assert_eq!(invoice.vendor_name, "XYZ Pvt Ltd");
    assert_eq!(invoice.table_headers.len(), 4);

    let body = last_body.lock().unwrap().clone().unwrap();
    assert_eq!(body["model"], "gpt-4o");
    assert_eq!(body["response_format"]["type"], "json_object");
    assert_eq!(body["messages"][0]["role"], "system");
}

#[tokio::test]
async fn openai_structurer_retries_transient_status() {
    let stub = stub(
        MODEL_OUTPUT,
        vec![StatusCode::SERVICE_UNAVAILABLE, StatusCode::TOO_MANY_REQUESTS],
    );
    let calls = stub.calls.clone();
    let base_url = spawn_stub(stub).await;

    let structurer = OpenAiStructurer::new(config(base_url)).unwrap();
    let doc = text_document("xyz.txt", "XYZ");
    let invoice = structurer.structure(&OcrText::plain("XYZ"), &doc).await.unwrap();

    assert_eq!(invoice.vendor_name, "XYZ Pvt Ltd");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn openai_structurer_does_not_retry_auth_failure() {
    let stub = stub(MODEL_OUTPUT, vec![StatusCode::UNAUTHORIZED]);
    let calls = stub.calls.clone();
    let base_url = spawn_stub(stub).await;

    let structurer = OpenAiStructurer::new(config(base_url)).unwrap();
    let doc = text_document("xyz.txt", "XYZ");
    let err = structurer
        .structure(&OcrText::plain("XYZ"), &doc)
        .await
        .unwrap_err();

    assert!(matches!(err, SentinelError::LlmError(_)), "{err}");
    assert!(err.is_service_failure());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn openai_structurer_reports_unstructured_output() {
    let base_url = spawn_stub(stub("I could not find an invoice here.", vec![])).await;

    let structurer = OpenAiStructurer::new(config(base_url)).unwrap();
    let doc = text_document("xyz.txt", "XYZ");
    let err = structurer
        .structure(&OcrText::plain("XYZ"), &doc)
        .await
        .unwrap_err();

    match err {
        SentinelError::UnstructuredResponse { raw_output } => {
            assert_eq!(raw_output, "I could not find an invoice here.")
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn plain_http_refused_when_https_required() {
    let base_url = spawn_stub(stub(MODEL_OUTPUT, vec![])).await;
    let mut config = config(base_url);
    config.http.require_https = true;

    let structurer = OpenAiStructurer::new(config).unwrap();
    let doc = text_document("xyz.txt", "XYZ");
    assert!(structurer.structure(&OcrText::plain("XYZ"), &doc).await.is_err());
}

#[tokio::test]
async fn llm_pipeline_feeds_engine() {
    let base_url = spawn_stub(stub(MODEL_OUTPUT, vec![])).await;
    let extractor = OcrLlmExtractor::new(
        Arc::new(PlainTextOcr),
        Arc::new(OpenAiStructurer::new(config(base_url)).unwrap()),
    );

    let fields = extractor
        .extract(&text_document("xyz invoice.txt", "XYZ Pvt Ltd"))
        .await
        .unwrap();
    assert_eq!(fields.source_name, "xyz_invoice.txt");
    assert_eq!(fields.contact_email, "accounts@xyz.example");
    assert_eq!(
        fields.layout_signature.fingerprint,
        "typed::description | qty | rate | amount::1x4::typed"
    );

    let mut engine = FlagEngine::default();
    assert!(!engine.ingest(fields).is_red());
}

#[tokio::test]
async fn offline_pipeline_flags_shared_contact() {
    let extractor = ExtractorFactory::create_offline().unwrap();

    let acme = text_document(
        "acme.txt",
        "Acme Corp\nEmail: billing@acme.com\nPhone: 98765 43210\n\nItem  Qty  Amount\nBolt  2  10\n",
    );
    let globex = text_document(
        "globex.txt",
        "Globex Ltd\nEmail: Billing@Acme.com\n\nDescription | Rate | Total\nConsulting | 100 | 100\n",
    );

    let mut engine = FlagEngine::default();
    let first = engine.ingest(extractor.extract(&acme).await.unwrap());
    let second = engine.ingest(extractor.extract(&globex).await.unwrap());

    assert!(!first.is_red());
    let flag = second.flag(FlagKind::SharedContact).expect("shared contact");
    assert_eq!(flag.conflicting_ids().collect::<Vec<_>>(), vec![first.record_id]);
}
