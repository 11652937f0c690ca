//! Azure AI Document Intelligence `prebuilt-read` OCR.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, instrument};
use zeroize::Zeroizing;

use super::document::Document;
use super::http_client::{HttpConfig, RetryingClient};
use super::ocr::{OcrEngine, OcrText, PageImage};
use crate::error::{Result, SentinelError};

pub const DEFAULT_AZURE_API_VERSION: &str = "2024-11-30";

#[derive(Clone)]
pub struct AzureReadConfig {
    /// Resource endpoint, e.g. `https://<name>.cognitiveservices.azure.com`.
    pub endpoint: String,
    pub api_key: Zeroizing<String>,
    pub api_version: String,
    pub poll_interval: Duration,
    pub max_polls: u32,
    pub http: HttpConfig,
}

impl std::fmt::Debug for AzureReadConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureReadConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"[REDACTED]")
            .field("api_version", &self.api_version)
            .field("poll_interval", &self.poll_interval)
            .field("max_polls", &self.max_polls)
            .finish()
    }
}

impl AzureReadConfig {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: Zeroizing::new(api_key.into()),
            api_version: DEFAULT_AZURE_API_VERSION.to_string(),
            poll_interval: Duration::from_secs(2),
            max_polls: 60,
            http: HttpConfig::default(),
        }
    }

    /// Required: `AZURE_OCR_ENDPOINT`, `AZURE_OCR_KEY`.
    /// Optional: `AZURE_OCR_API_VERSION`.
    pub fn from_env() -> Result<Self> {
        let endpoint = std::env::var("AZURE_OCR_ENDPOINT").map_err(|_| {
            SentinelError::InvalidConfig("AZURE_OCR_ENDPOINT environment variable not set".into())
        })?;
        let api_key = std::env::var("AZURE_OCR_KEY").map_err(|_| {
            SentinelError::InvalidConfig("AZURE_OCR_KEY environment variable not set".into())
        })?;

        let mut config = Self::new(endpoint, api_key);
        if let Ok(version) = std::env::var("AZURE_OCR_API_VERSION") {
            config.api_version = version;
        }
        Ok(config)
    }

    fn analyze_url(&self) -> String {
        format!(
            "{}/documentintelligence/documentModels/prebuilt-read:analyze?api-version={}",
            self.endpoint.trim_end_matches('/'),
            self.api_version
        )
    }
}

#[derive(Debug, Deserialize)]
struct AnalyzeOperation {
    status: String,
    #[serde(default, rename = "analyzeResult")]
    analyze_result: Option<AnalyzeResult>,
    #[serde(default)]
    error: Option<AnalyzeError>,
}

#[derive(Debug, Deserialize)]
struct AnalyzeResult {
    #[serde(default)]
    pages: Vec<AnalyzedPage>,
}

#[derive(Debug, Deserialize)]
struct AnalyzedPage {
    #[serde(default)]
    lines: Vec<AnalyzedLine>,
}

#[derive(Debug, Deserialize)]
struct AnalyzedLine {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnalyzeError {
    #[serde(default)]
    message: String,
}

/// Submits the document, then polls `Operation-Location` until the analysis
/// succeeds, fails or runs out of polls.
pub struct AzureReadOcr {
    client: RetryingClient,
    config: AzureReadConfig,
}

impl AzureReadOcr {
    #[instrument(level = "debug", skip_all, fields(endpoint = %config.endpoint))]
    pub fn new(config: AzureReadConfig) -> Result<Self> {
        let client = RetryingClient::new(config.http.clone(), SentinelError::OcrError)?;
        info!("Azure Read OCR client created");
        Ok(Self { client, config })
    }

    async fn submit(&self, document: &Document) -> Result<String> {
        let url = self.config.analyze_url();
        let response = self
            .client
            .send("Azure OCR", SentinelError::OcrError, |client| {
                client
                    .post(&url)
                    .header("Ocp-Apim-Subscription-Key", self.config.api_key.as_str())
                    .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                    .body(document.bytes.clone())
            })
            .await?;

        response
            .headers()
            .get("Operation-Location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                SentinelError::OcrError("Azure OCR response had no Operation-Location".into())
            })
    }

    async fn poll(&self, operation_url: &str) -> Result<AnalyzeResult> {
        for attempt in 1..=self.config.max_polls {
            tokio::time::sleep(self.config.poll_interval).await;

            let operation: AnalyzeOperation = self
                .client
                .send("Azure OCR", SentinelError::OcrError, |client| {
                    client
                        .get(operation_url)
                        .header("Ocp-Apim-Subscription-Key", self.config.api_key.as_str())
                })
                .await?
                .json()
                .await
                .map_err(|e| SentinelError::OcrError(format!("Invalid Azure OCR response: {e}")))?;

            debug!(attempt, status = %operation.status, "Polled Azure OCR");

            match operation.status.as_str() {
                "succeeded" => {
                    return operation.analyze_result.ok_or_else(|| {
                        SentinelError::OcrError("Azure OCR succeeded without a result".into())
                    })
                }
                "failed" => {
                    let message = operation
                        .error
                        .map(|e| e.message)
                        .filter(|m| !m.is_empty())
                        .unwrap_or_else(|| "Unknown error".into());
                    return Err(SentinelError::OcrError(format!(
                        "Azure OCR analysis failed: {message}"
                    )));
                }
                _ => {}
            }
        }

        Err(SentinelError::OcrError(format!(
            "Azure OCR did not finish after {} polls",
            self.config.max_polls
        )))
    }
}

#[async_trait]
impl OcrEngine for AzureReadOcr {
    #[instrument(level = "debug", skip_all, fields(document = %document.name))]
    async fn recognize(&self, document: &Document) -> Result<OcrText> {
        if let Some(text) = document.text() {
            return Ok(OcrText::plain(text));
        }

        let operation_url = self.submit(document).await?;
        let result = self.poll(&operation_url).await?;

        let pages: Vec<String> = result
            .pages
            .iter()
            .map(|page| {
                page.lines
                    .iter()
                    .map(|l| l.content.as_str())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .collect();
        let text = if pages.len() > 1 {
            super::ocr::join_pages(&pages)
        } else {
            pages.concat().trim().to_string()
        };

        let images = if document.kind.is_image() {
            vec![PageImage {
                mime_type: document.kind.mime_type(),
                bytes: document.bytes.clone(),
            }]
        } else {
            Vec::new()
        };

        Ok(OcrText {
            text,
            pages: images,
        })
    }

    fn name(&self) -> &'static str {
        "azure"
    }
}
