//! OpenAI chat-completions structurer.

use std::time::Instant;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};
use zeroize::Zeroizing;

use super::document::Document;
use super::http_client::{HttpConfig, RetryingClient};
use super::ocr::OcrText;
use super::structured::StructuredInvoice;
use super::FieldStructurer;
use crate::error::{Result, SentinelError};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
pub const DEFAULT_TEMPERATURE: f32 = 0.1;

const SYSTEM_PROMPT: &str =
    "You are an intelligent OCR cleanup and data extraction assistant.";

#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: Zeroizing<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    /// Page images attached per request; later pages are dropped.
    pub max_images: usize,
    pub http: HttpConfig,
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_images", &self.max_images)
            .finish()
    }
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Zeroizing::new(api_key.into()),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model: DEFAULT_OPENAI_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_images: 4,
            http: HttpConfig::default(),
        }
    }

    /// Required: `OPENAI_API_KEY`.
    /// Optional: `OPENAI_BASE_URL`, `OPENAI_MODEL`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                SentinelError::InvalidConfig("OPENAI_API_KEY environment variable not set".into())
            })?;

        let mut config = Self::new(api_key);
        if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
            config.base_url = url;
        }
        if let Ok(model) = std::env::var("OPENAI_MODEL") {
            config.model = model;
        }
        Ok(config)
    }
}

/// The instruction sent alongside the OCR text.
pub fn extraction_prompt(ocr_text: &str) -> String {
    format!(
        r#"Extract structured fields from the noisy OCR text of an invoice below.

Return a single JSON object with exactly these keys:
  "vendor_name": string,
  "phone_numbers": array of strings (all phone numbers found),
  "email_addresses": array of strings,
  "gst_or_pan": string (GSTIN, PAN or other tax id),
  "table_headers": array of the line-item table's column names,
  "table_row_data": array of rows, each an array of cell strings,
  "table_size": {{"rows": integer, "columns": integer}} or null when there is no table,
  "scanned_or_typed": "scanned" or "typed",
  "handwritten_or_typed": "handwritten", "typed" or "mixed"

Use empty strings, empty arrays or null for anything not present.

OCR text:
{ocr_text}"#
    )
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    response_format: Value,
    messages: Vec<Value>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Structures OCR text with an OpenAI-compatible chat-completions endpoint,
/// attaching page images for vision-capable models.
pub struct OpenAiStructurer {
    client: RetryingClient,
    config: OpenAiConfig,
}

impl OpenAiStructurer {
    #[instrument(level = "debug", skip_all, fields(base_url = %config.base_url, model = %config.model))]
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = RetryingClient::new(config.http.clone(), SentinelError::LlmError)?;
        info!("OpenAI structurer created");
        Ok(Self { client, config })
    }

    fn request_body(&self, ocr: &OcrText) -> ChatRequest<'_> {
        let mut content = vec![json!({"type": "text", "text": extraction_prompt(&ocr.text)})];
        for page in ocr.pages.iter().take(self.config.max_images) {
            let encoded = base64::engine::general_purpose::STANDARD.encode(&page.bytes);
            content.push(json!({
                "type": "image_url",
                "image_url": {"url": format!("data:{};base64,{encoded}", page.mime_type)}
            }));
        }

        ChatRequest {
            model: &self.config.model,
            temperature: self.config.temperature,
            response_format: json!({"type": "json_object"}),
            messages: vec![
                json!({"role": "system", "content": SYSTEM_PROMPT}),
                json!({"role": "user", "content": content}),
            ],
        }
    }
}

#[async_trait]
impl FieldStructurer for OpenAiStructurer {
    #[instrument(level = "info", skip_all, fields(document = %document.name, model = %self.config.model))]
    async fn structure(&self, ocr: &OcrText, document: &Document) -> Result<StructuredInvoice> {
        let start = Instant::now();
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let body = self.request_body(ocr);
        debug!(images = ocr.pages.len().min(self.config.max_images), "Sending chat completion");

        let response: ChatResponse = self
            .client
            .send("OpenAI", SentinelError::LlmError, |client| {
                client
                    .post(&url)
                    .bearer_auth(self.config.api_key.as_str())
                    .json(&body)
            })
            .await?
            .json()
            .await
            .map_err(|e| SentinelError::LlmError(format!("Failed to parse OpenAI response: {e}")))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        let latency_ms = start.elapsed().as_millis() as u64;
        let parsed = parse_structured(&content);
        match &parsed {
            Ok(_) => debug!(latency_ms, "Structured invoice fields"),
            Err(e) => warn!(latency_ms, error = %e, "Model output was not a JSON object"),
        }
        parsed
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Parse model output into a [`StructuredInvoice`]. Markdown code fences are
/// tolerated; anything that is not a JSON object is an
/// [`SentinelError::UnstructuredResponse`] carrying the raw output.
pub fn parse_structured(raw: &str) -> Result<StructuredInvoice> {
    let trimmed = raw.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    match serde_json::from_str::<Value>(unfenced) {
        Ok(value @ Value::Object(_)) => serde_json::from_value(value).map_err(|_| {
            SentinelError::UnstructuredResponse {
                raw_output: raw.to_string(),
            }
        }),
        _ => Err(SentinelError::UnstructuredResponse {
            raw_output: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::PageImage;

    #[test]
    fn test_parse_structured_plain() {
        let inv = parse_structured(r#"{"vendor_name": "Acme"}"#).unwrap();
        assert_eq!(inv.vendor_name, "Acme");
    }

    #[test]
    fn test_parse_structured_fenced() {
        let inv = parse_structured("```json\n{\"vendor_name\": \"Acme\"}\n```").unwrap();
        assert_eq!(inv.vendor_name, "Acme");
    }

    #[test]
    fn test_parse_structured_rejects_prose() {
        let err = parse_structured("Sorry, I can't read this invoice.").unwrap_err();
        match err {
            SentinelError::UnstructuredResponse { raw_output } => {
                assert!(raw_output.starts_with("Sorry"))
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(parse_structured("[1, 2]").is_err());
    }

    #[test]
    fn test_config_debug_redacts_key() {
        let config = OpenAiConfig::new("sk-very-secret");
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-very-secret"));
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.temperature, 0.1);
    }

    #[test]
    fn test_request_body_attaches_images() {
        let mut config = OpenAiConfig::new("k");
        config.max_images = 1;
        let structurer = OpenAiStructurer::new(config).unwrap();
        let ocr = OcrText {
            text: "Acme".into(),
            pages: vec![
                PageImage {
                    mime_type: "image/png",
                    bytes: vec![1, 2, 3],
                },
                PageImage {
                    mime_type: "image/png",
                    bytes: vec![4, 5, 6],
                },
            ],
        };
        let body = serde_json::to_value(structurer.request_body(&ocr)).unwrap();
        let content = body["messages"][1]["content"].as_array().unwrap();
        assert_eq!(content.len(), 2);
        assert_eq!(
            content[1]["image_url"]["url"],
            "data:image/png;base64,AQID"
        );
        assert_eq!(body["response_format"]["type"], "json_object");
        assert!(content[0]["text"].as_str().unwrap().ends_with("Acme"));
    }
}
